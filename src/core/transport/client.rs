//! Request correlator and notification dispatch over a transport.
//!
//! Outgoing requests get a unique `RequestId` and a single-slot result
//! channel; inbound frames route by `RequestId` first and fall back to the
//! per-action notification handlers. Delivery never blocks: the result
//! channel is a oneshot and a late duplicate finds its entry already gone.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{ReadHandler, Transport};
use crate::core::model::{FrameHeader, RequestEnvelope};
use crate::error::Result;

/// Handler for one server-initiated action; receives the raw frame.
pub type NotificationHandler = Arc<dyn Fn(String) -> BoxFuture<'static, ()> + Send + Sync>;

pub struct WebSocketClient {
    transport: Arc<dyn Transport>,
    pending: Mutex<HashMap<String, oneshot::Sender<String>>>,
    handlers: RwLock<HashMap<String, NotificationHandler>>,
}

impl WebSocketClient {
    /// Wrap a transport and install the frame sink.
    pub fn new(transport: Arc<dyn Transport>) -> Arc<Self> {
        let client = Arc::new(Self {
            transport,
            pending: Mutex::new(HashMap::new()),
            handlers: RwLock::new(HashMap::new()),
        });
        let weak = Arc::downgrade(&client);
        let handler: ReadHandler = Arc::new(move |text: String| {
            let weak = weak.clone();
            Box::pin(async move {
                if let Some(client) = weak.upgrade() {
                    client.on_frame(text).await;
                }
            })
        });
        client.transport.set_read_handler(handler);
        client
    }

    /// Register the handler for one inbound action. Handlers are fixed
    /// after connect.
    pub fn register_handler(&self, action: &str, handler: NotificationHandler) {
        self.handlers.write().insert(action.to_string(), handler);
    }

    pub async fn connect(&self, url: &str) -> Result<()> {
        self.transport.connect(url).await
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.transport.close().await
    }

    pub fn prevent_auto_reconnect(&self) {
        self.transport.prevent_auto_reconnect();
    }

    /// Send a request frame, wiring `sink` to receive the raw response.
    ///
    /// Assigns the envelope's `RequestId` if the caller left it empty and
    /// returns the id in use. On write failure the pending entry is removed
    /// before the error surfaces.
    pub async fn send_request<T: Serialize>(
        &self,
        envelope: &mut RequestEnvelope<T>,
        sink: oneshot::Sender<String>,
    ) -> Result<String> {
        if envelope.request_id.is_empty() {
            envelope.request_id = Uuid::new_v4().to_string();
        }
        let request_id = envelope.request_id.clone();
        let frame = serde_json::to_string(envelope)?;

        self.pending.lock().insert(request_id.clone(), sink);
        if let Err(e) = self.transport.write(frame).await {
            self.pending.lock().remove(&request_id);
            return Err(e);
        }
        Ok(request_id)
    }

    /// Forget a pending request without signalling its sink.
    pub fn cancel_request(&self, request_id: &str) {
        self.pending.lock().remove(request_id);
    }

    /// Fire-and-forget write.
    pub async fn send_message<T: Serialize>(&self, envelope: &RequestEnvelope<T>) -> Result<()> {
        let frame = serde_json::to_string(envelope)?;
        self.transport.write(frame).await
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    async fn on_frame(&self, text: String) {
        let header: FrameHeader = match serde_json::from_str(&text) {
            Ok(header) => header,
            Err(e) => {
                warn!(error = %e, "Malformed inbound frame dropped");
                return;
            }
        };

        if let Some(request_id) = header.request_id.as_deref() {
            let sink = self.pending.lock().remove(request_id);
            if let Some(sink) = sink {
                if sink.send(text).is_err() {
                    debug!(request_id, "Requester gone before response delivery");
                }
                return;
            }
        }

        let Some(action) = header.action else {
            warn!("Inbound frame without action or matching request dropped");
            return;
        };
        let handler = self.handlers.read().get(&action).cloned();
        match handler {
            Some(handler) => handler(text).await,
            None => warn!(action = %action, "No handler registered, frame dropped"),
        }
    }
}
