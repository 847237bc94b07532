//! WebSocket transport: single-flight dial with backoff, per-connection
//! read loops, graceful reconnect with overlap, and the write retry policy.
//!
//! All connection-changing transitions happen under one write mutex. Each
//! connection carries a monotonic id and a cancellation flag; at most one
//! connection is current, and a superseded connection's read loop treats
//! any further error as benign.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::{Backoff, ReadHandler, Transport, TransportConfig};
use crate::error::{Error, Result};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// One dialed connection. Owned by the transport until a successor is
/// promoted; its read half is owned by the read loop.
struct Connection {
    sink: WsSink,
    cancelled: Arc<AtomicBool>,
    id: u64,
}

pub struct WebSocketTransport {
    /// Write mutex: serialises `connect`, `write`, and promotion.
    conn: AsyncMutex<Option<Connection>>,
    read_handler: RwLock<Option<ReadHandler>>,
    url: RwLock<String>,
    connected: AtomicBool,
    reconnecting: AtomicBool,
    prevent_reconnect: AtomicBool,
    closed: AtomicBool,
    connection_id: AtomicU64,
    config: TransportConfig,
    weak: Weak<Self>,
}

impl WebSocketTransport {
    pub fn new(config: TransportConfig) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            conn: AsyncMutex::new(None),
            read_handler: RwLock::new(None),
            url: RwLock::new(String::new()),
            connected: AtomicBool::new(false),
            reconnecting: AtomicBool::new(false),
            prevent_reconnect: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            connection_id: AtomicU64::new(0),
            config,
            weak: weak.clone(),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn is_reconnecting(&self) -> bool {
        self.reconnecting.load(Ordering::SeqCst)
    }

    pub fn current_connection_id(&self) -> u64 {
        self.connection_id.load(Ordering::SeqCst)
    }

    /// Dial the recorded URL until it succeeds or attempts are exhausted.
    /// Caller holds the write mutex.
    async fn dial_locked(&self, guard: &mut Option<Connection>) -> Result<()> {
        self.reconnecting.store(true, Ordering::SeqCst);
        self.connected.store(false, Ordering::SeqCst);

        let url = self.url.read().clone();
        let mut backoff = Backoff::new(&self.config.backoff);
        let max_attempts = self.config.backoff.max_attempts;
        let mut last_error = String::from("no attempts made");

        for attempt in 1..=max_attempts {
            if self.closed.load(Ordering::SeqCst) {
                self.reconnecting.store(false, Ordering::SeqCst);
                return Err(Error::WebsocketClosingError("transport is closed".into()));
            }
            match connect_async(&url).await {
                Ok((stream, response)) => {
                    if let Some(body) = response.body() {
                        debug!(bytes = body.len(), "Handshake response carried a body");
                    }
                    info!(attempt, connection_id = self.connection_id.load(Ordering::SeqCst) + 1, "WebSocket connected");
                    self.promote_locked(guard, stream);
                    self.reconnecting.store(false, Ordering::SeqCst);
                    return Ok(());
                }
                Err(e) => {
                    last_error = e.to_string();
                    warn!(error = %e, attempt, max_attempts, "Dial failed");
                    if attempt < max_attempts {
                        tokio::time::sleep(backoff.next_delay()).await;
                    }
                }
            }
        }

        self.reconnecting.store(false, Ordering::SeqCst);
        Err(Error::WebsocketConnectFailure(format!(
            "exhausted {max_attempts} attempts, last error: {last_error}"
        )))
    }

    /// Swap the freshly dialed stream in as the current connection.
    ///
    /// Order matters: the predecessor is marked redundant before the new
    /// connection becomes current, and its socket is only closed after a
    /// flush window so in-flight inbound frames still reach the handler.
    fn promote_locked(&self, guard: &mut Option<Connection>, stream: WsStream) {
        let (sink, source) = stream.split();

        let old = guard.take();
        if let Some(ref old_conn) = old {
            old_conn.cancelled.store(true, Ordering::SeqCst);
        }

        let id = self.connection_id.fetch_add(1, Ordering::SeqCst) + 1;
        let cancelled = Arc::new(AtomicBool::new(false));
        *guard = Some(Connection { sink, cancelled: cancelled.clone(), id });
        self.connected.store(true, Ordering::SeqCst);

        if let Some(transport) = self.weak.upgrade() {
            tokio::spawn(read_loop(transport, source, cancelled, id));
        }

        if let Some(old_conn) = old {
            let delay = self.config.flush_delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let mut sink = old_conn.sink;
                debug!(connection_id = old_conn.id, "Closing superseded connection");
                if let Err(e) = sink.send(Message::Close(None)).await {
                    debug!(error = %e, connection_id = old_conn.id, "Superseded connection close failed");
                }
            });
        }
    }

    /// One send attempt under the write mutex.
    async fn write_once(&self, text: &str) -> Result<()> {
        let mut guard = self.conn.lock().await;
        if !self.connected.load(Ordering::SeqCst) {
            return Err(Error::WebsocketSendMessageFailure("not connected".into()));
        }
        let conn = guard
            .as_mut()
            .ok_or_else(|| Error::WebsocketSendMessageFailure("no current connection".into()))?;
        conn.sink
            .send(Message::Text(text.to_string()))
            .await
            .map_err(|e| Error::WebsocketRetriableSendMessageFailure(e.to_string()))
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, url: &str) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::WebsocketClosingError("transport is closed".into()));
        }
        *self.url.write() = url.to_string();
        let mut guard = self.conn.lock().await;
        self.dial_locked(&mut guard).await
    }

    async fn write(&self, text: String) -> Result<()> {
        let max_attempts = self.config.write_retry_attempts;
        let mut attempt: u32 = 0;
        loop {
            let error = match self.write_once(&text).await {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };
            attempt += 1;
            if attempt >= max_attempts {
                return Err(Error::WebsocketSendMessageFailure(error.to_string()));
            }
            warn!(error = %error, attempt, "Write failed, retrying");
            if attempt == self.config.network_interrupt_attempt {
                // Likely a half-open socket; a plain retry would fail the
                // same way. Force a fresh connection and refund the attempt
                // if it works out.
                if self.reconnect().await.is_ok() {
                    attempt -= 1;
                }
            } else {
                tokio::time::sleep(self.config.write_retry_delay).await;
            }
        }
    }

    fn set_read_handler(&self, handler: ReadHandler) {
        *self.read_handler.write() = Some(handler);
    }

    async fn reconnect(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::WebsocketClosingError("transport is closed".into()));
        }
        let epoch = self.connection_id.load(Ordering::SeqCst);
        let mut guard = self.conn.lock().await;
        // A concurrent caller may have finished a full dial while we waited
        // on the mutex; the epoch tells us whether the connection we saw
        // failing has already been replaced.
        if self.connection_id.load(Ordering::SeqCst) != epoch && self.connected.load(Ordering::SeqCst)
        {
            debug!("Reconnect already completed by a concurrent caller");
            return Ok(());
        }
        self.dial_locked(&mut guard).await
    }

    fn prevent_auto_reconnect(&self) {
        self.prevent_reconnect.store(true, Ordering::SeqCst);
    }

    async fn close(&self) -> Result<()> {
        if self.closed.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_err() {
            return Ok(());
        }
        let mut guard = self.conn.lock().await;
        self.connected.store(false, Ordering::SeqCst);
        if let Some(mut conn) = guard.take() {
            conn.cancelled.store(true, Ordering::SeqCst);
            info!(connection_id = conn.id, "Closing connection");
            conn.sink
                .send(Message::Close(None))
                .await
                .map_err(|e| Error::WebsocketClosingError(e.to_string()))?;
        }
        Ok(())
    }
}

/// Reads frames for one connection until the stream ends, then decides
/// whether the termination warrants an automatic reconnect.
async fn read_loop(
    transport: Arc<WebSocketTransport>,
    mut source: WsSource,
    cancelled: Arc<AtomicBool>,
    connection_id: u64,
) {
    debug!(connection_id, "Read loop started");
    let mut close_code: Option<CloseCode> = None;
    let mut terminal_error: Option<String> = None;

    while let Some(frame) = source.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                let handler = transport.read_handler.read().clone();
                match handler {
                    Some(handler) => {
                        tokio::spawn(handler(text));
                    }
                    None => debug!(connection_id, "No read handler installed, frame dropped"),
                }
            }
            Ok(Message::Close(frame)) => {
                close_code = frame.as_ref().map(|f| f.code);
                debug!(connection_id, code = ?close_code, "Close frame received");
            }
            Ok(other) => {
                debug!(connection_id, kind = %frame_kind(&other), "Skipping non-text frame");
            }
            Err(e) => {
                terminal_error = Some(e.to_string());
                break;
            }
        }
    }

    if cancelled.load(Ordering::SeqCst) {
        debug!(connection_id, error = ?terminal_error, "Redundant connection read loop ended");
        return;
    }

    transport.connected.store(false, Ordering::SeqCst);

    let abnormal = !matches!(close_code, Some(CloseCode::Normal) | Some(CloseCode::Away));
    if !abnormal {
        info!(connection_id, "Connection closed cleanly");
        return;
    }
    if transport.closed.load(Ordering::SeqCst)
        || transport.reconnecting.load(Ordering::SeqCst)
        || transport.prevent_reconnect.load(Ordering::SeqCst)
    {
        debug!(connection_id, error = ?terminal_error, "Connection ended, reconnect suppressed");
        return;
    }

    warn!(connection_id, error = ?terminal_error, "Connection lost, reconnecting");
    if let Err(e) = transport.reconnect().await {
        error!(error = %e, connection_id, "Automatic reconnect failed");
    }
}

fn frame_kind(message: &Message) -> &'static str {
    match message {
        Message::Text(_) => "text",
        Message::Binary(_) => "binary",
        Message::Ping(_) => "ping",
        Message::Pong(_) => "pong",
        Message::Close(_) => "close",
        Message::Frame(_) => "frame",
    }
}
