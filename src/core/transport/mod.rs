//! Long-lived WebSocket transport and the request correlator on top of it.
//!
//! `Transport` is the seam the manager stack is written against; the
//! production implementation is `WebSocketTransport`. `WebSocketClient`
//! wraps a transport with request/response correlation and per-action
//! notification dispatch.

mod client;
mod socket;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::BoxFuture;

use crate::error::Result;

pub use client::{NotificationHandler, WebSocketClient};
pub use socket::WebSocketTransport;

/// Sink for inbound text frames. Invoked in a fresh task per frame so the
/// read loop never blocks on handler work.
pub type ReadHandler = Arc<dyn Fn(String) -> BoxFuture<'static, ()> + Send + Sync>;

/// The transport contract the rest of the SDK is written against.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Dial `url`, blocking until the connection is established or retries
    /// are exhausted. On success the new connection becomes current and its
    /// read loop is running.
    async fn connect(&self, url: &str) -> Result<()>;

    /// Send one text frame, retrying per the write policy.
    async fn write(&self, text: String) -> Result<()>;

    /// Install the frame sink. May be changed at any time.
    fn set_read_handler(&self, handler: ReadHandler);

    /// Block until any ongoing reconnect completes; initiate one otherwise.
    async fn reconnect(&self) -> Result<()>;

    /// Latch: read-loop errors no longer reconnect automatically.
    fn prevent_auto_reconnect(&self);

    /// Close the current connection. Idempotent; the transport is terminal
    /// afterwards.
    async fn close(&self) -> Result<()>;
}

/// Dial retry policy.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    pub base_interval: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_interval: Duration::from_secs(1),
            max_delay: Duration::from_secs(32),
            max_attempts: 7,
        }
    }
}

/// Exponential doubling, capped. Advanced twice at construction so the
/// first retry sleep is already 4x the base interval.
#[derive(Debug)]
pub(crate) struct Backoff {
    delay: Duration,
    max_delay: Duration,
}

impl Backoff {
    pub(crate) fn new(config: &BackoffConfig) -> Self {
        let mut backoff = Self { delay: config.base_interval, max_delay: config.max_delay };
        backoff.advance();
        backoff.advance();
        backoff
    }

    /// The delay to sleep before the next attempt; doubles for the one
    /// after.
    pub(crate) fn next_delay(&mut self) -> Duration {
        let delay = self.delay;
        self.advance();
        delay
    }

    fn advance(&mut self) {
        self.delay = (self.delay * 2).min(self.max_delay);
    }
}

/// Full transport tuning.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub backoff: BackoffConfig,
    /// Attempts per `write` call.
    pub write_retry_attempts: u32,
    /// Sleep between failed write attempts.
    pub write_retry_delay: Duration,
    /// The failing attempt at which `write` releases the lock and forces a
    /// reconnect instead of sleeping; a successful reconnect refunds the
    /// attempt.
    pub network_interrupt_attempt: u32,
    /// Grace window before the predecessor connection is closed after a
    /// handoff, letting in-flight inbound frames drain.
    pub flush_delay: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffConfig::default(),
            write_retry_attempts: 3,
            write_retry_delay: Duration::from_secs(1),
            network_interrupt_attempt: 2,
            flush_delay: Duration::from_secs(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_first_sleep_is_four_times_base() {
        let config = BackoffConfig {
            base_interval: Duration::from_millis(100),
            max_delay: Duration::from_secs(32),
            max_attempts: 7,
        };
        let mut backoff = Backoff::new(&config);
        assert_eq!(backoff.next_delay(), Duration::from_millis(400));
        assert_eq!(backoff.next_delay(), Duration::from_millis(800));
        assert_eq!(backoff.next_delay(), Duration::from_millis(1600));
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = BackoffConfig {
            base_interval: Duration::from_secs(1),
            max_delay: Duration::from_secs(3),
            max_attempts: 7,
        };
        let mut backoff = Backoff::new(&config);
        assert_eq!(backoff.next_delay(), Duration::from_secs(3));
        assert_eq!(backoff.next_delay(), Duration::from_secs(3));
    }
}
