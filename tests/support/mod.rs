#![allow(dead_code)]

//! Shared test harness: a scriptable transport double and state builders.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};

use gamelift_server_sdk::app::config::{SdkConfig, ServerParameters};
use gamelift_server_sdk::core::state::GameLiftServerState;
use gamelift_server_sdk::core::transport::{ReadHandler, Transport};
use gamelift_server_sdk::error::{Error, Result};

/// Builds the response body for a recorded request, or `None` to stay
/// silent.
pub type Responder = Arc<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

/// Transport double: records connect URLs and writes, answers requests via
/// per-action responders, and lets tests inject inbound frames through the
/// installed read handler.
pub struct MockTransport {
    pub connect_urls: Mutex<Vec<String>>,
    pub writes: Mutex<Vec<Value>>,
    handler: Mutex<Option<ReadHandler>>,
    responders: Mutex<HashMap<String, Responder>>,
    pub fail_connect: AtomicBool,
    pub close_count: AtomicU32,
    pub reconnect_count: AtomicU32,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            connect_urls: Mutex::new(Vec::new()),
            writes: Mutex::new(Vec::new()),
            handler: Mutex::new(None),
            responders: Mutex::new(HashMap::new()),
            fail_connect: AtomicBool::new(false),
            close_count: AtomicU32::new(0),
            reconnect_count: AtomicU32::new(0),
        })
    }

    /// Answer every request for `action` with an empty success body.
    pub fn respond_ok(&self, action: &str) {
        self.respond_with(action, |_| Some(json!({})));
    }

    /// Answer requests for `action` with a scripted body.
    pub fn respond_with<F>(&self, action: &str, responder: F)
    where
        F: Fn(&Value) -> Option<Value> + Send + Sync + 'static,
    {
        self.responders.lock().insert(action.to_string(), Arc::new(responder));
    }

    /// Push a server-initiated frame through the read handler and wait for
    /// its handling to finish.
    pub async fn inject(&self, frame: Value) {
        let handler = self.handler.lock().clone().expect("read handler installed");
        handler(frame.to_string()).await;
    }

    pub fn last_connect_url(&self) -> String {
        self.connect_urls.lock().last().cloned().unwrap_or_default()
    }

    pub fn writes_for(&self, action: &str) -> Vec<Value> {
        self.writes
            .lock()
            .iter()
            .filter(|w| w["Action"] == action)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, url: &str) -> Result<()> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(Error::WebsocketConnectFailure("scripted failure".into()));
        }
        self.connect_urls.lock().push(url.to_string());
        Ok(())
    }

    async fn write(&self, text: String) -> Result<()> {
        let value: Value = serde_json::from_str(&text)
            .map_err(|e| Error::WebsocketSendMessageFailure(e.to_string()))?;
        self.writes.lock().push(value.clone());

        let action = value["Action"].as_str().unwrap_or_default().to_string();
        let responder = self.responders.lock().get(&action).cloned();
        if let Some(responder) = responder {
            if let Some(mut body) = responder(&value) {
                body["Action"] = value["Action"].clone();
                body["RequestId"] = value["RequestId"].clone();
                if body.get("StatusCode").is_none() {
                    body["StatusCode"] = json!(200);
                }
                let handler = self.handler.lock().clone();
                if let Some(handler) = handler {
                    tokio::spawn(handler(body.to_string()));
                }
            }
        }
        Ok(())
    }

    fn set_read_handler(&self, handler: ReadHandler) {
        *self.handler.lock() = Some(handler);
    }

    async fn reconnect(&self) -> Result<()> {
        self.reconnect_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn prevent_auto_reconnect(&self) {}

    async fn close(&self) -> Result<()> {
        self.close_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Auth-token parameters matching the happy-path scenarios.
pub fn server_params() -> ServerParameters {
    ServerParameters {
        websocket_url: "wss://t/".into(),
        process_id: "p1".into(),
        host_id: "h1".into(),
        fleet_id: "f1".into(),
        auth_token: "tk".into(),
        ..Default::default()
    }
}

/// Millisecond-scale timeouts so lifecycle tests run fast and jitter-free.
pub fn test_config() -> SdkConfig {
    SdkConfig {
        service_call_timeout: Duration::from_millis(200),
        activate_timeout: Duration::from_millis(200),
        healthcheck_interval: Duration::from_millis(30),
        healthcheck_timeout: Duration::from_millis(20),
        healthcheck_max_jitter: Duration::ZERO,
    }
}

/// Connected state over the given mock transport.
pub async fn connected_state(transport: Arc<MockTransport>) -> Arc<GameLiftServerState> {
    GameLiftServerState::connect_configured(server_params(), transport, test_config())
        .await
        .expect("state connects")
}
