use thiserror::Error;

/// Errors surfaced by the SDK.
///
/// Transport-level causes (`WebSocket`, `Json`, `Http`, `Io`, `Url`) convert
/// automatically; the remaining variants are the semantic error kinds the
/// facade returns to the game server.
#[derive(Error, Debug)]
pub enum Error {
    #[error("GameLift server SDK is already initialized")]
    AlreadyInitialized,

    #[error("GameLift server SDK is not initialized, call init_sdk first")]
    NotInitialized,

    #[error("validation failed for {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("local connection to the metadata endpoint failed: {0}")]
    LocalConnectionFailed(String),

    #[error("websocket connection failed: {0}")]
    WebsocketConnectFailure(String),

    #[error("websocket send message failure: {0}")]
    WebsocketSendMessageFailure(String),

    #[error("websocket send failed but may be retried: {0}")]
    WebsocketRetriableSendMessageFailure(String),

    #[error("websocket close failed: {0}")]
    WebsocketClosingError(String),

    #[error("process is not ready, call process_ready first")]
    ProcessNotReady,

    #[error("game session id is not set, no game session has been started")]
    GameSessionIdNotSet,

    #[error("termination time is not set, no terminate notice has been received")]
    TerminationTimeNotSet,

    #[error("process ending failed: {0}")]
    ProcessEndingFailed(String),

    #[error("service call failed: {0}")]
    ServiceCallFailed(String),

    #[error("internal service exception: {0}")]
    InternalService(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Validation error naming the rejected field.
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation { field, message: message.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
