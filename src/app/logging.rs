//! Logging initialisation.

use tracing_subscriber::{fmt, EnvFilter};

/// Install the default subscriber: compact fmt output filtered by
/// `RUST_LOG`, falling back to `info` for this crate.
///
/// No-op when the host process already installed a subscriber.
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("gamelift_server_sdk=info"));
    let _ = fmt().with_env_filter(filter).with_target(true).try_init();
}
