//! Fleet-service manager: translates typed messages to and from the wire.
//!
//! Owns the correlator client (and through it the transport), frames the
//! connection URL query, and routes server-initiated notifications to the
//! state through a minimal sink interface so there is no ownership cycle.

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use url::Url;

use crate::app::config::{SDK_LANGUAGE, SDK_VERSION};
use crate::core::auth::{AwsCredentials, SigV4QueryParameters};
use crate::core::container::ContainerMetadataClient;
use crate::core::model::{
    actions, CreateGameSessionMessage, FrameHeader, RefreshConnectionMessage, RequestEnvelope,
    TerminateProcessMessage, UpdateGameSessionMessage,
};
use crate::core::transport::{Transport, WebSocketClient};
use crate::error::{Error, Result};

/// Notifications the manager pushes back into the server state.
///
/// Implemented by the state; the manager holds only a weak reference so the
/// state remains the sole owner of the stack.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn on_start_game_session(&self, message: CreateGameSessionMessage);
    async fn on_update_game_session(&self, message: UpdateGameSessionMessage);
    async fn on_terminate_process(&self, message: TerminateProcessMessage);
    async fn on_refresh_connection(&self, message: RefreshConnectionMessage);
}

pub struct FleetServiceManager {
    client: Arc<WebSocketClient>,
}

impl FleetServiceManager {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { client: WebSocketClient::new(transport) }
    }

    /// Install the four fixed notification handlers. Must happen before
    /// `connect` so no inbound frame races an empty handler table.
    pub fn register_notification_sink(&self, sink: Weak<dyn NotificationSink>) {
        let for_create = sink.clone();
        self.client.register_handler(
            actions::CREATE_GAME_SESSION,
            Arc::new(move |raw| {
                let sink = for_create.clone();
                Box::pin(async move {
                    let Some(sink) = sink.upgrade() else { return };
                    match serde_json::from_str::<CreateGameSessionMessage>(&raw) {
                        Ok(message) => sink.on_start_game_session(message).await,
                        Err(e) => warn!(error = %e, "Malformed CreateGameSession dropped"),
                    }
                })
            }),
        );

        let for_update = sink.clone();
        self.client.register_handler(
            actions::UPDATE_GAME_SESSION,
            Arc::new(move |raw| {
                let sink = for_update.clone();
                Box::pin(async move {
                    let Some(sink) = sink.upgrade() else { return };
                    match serde_json::from_str::<UpdateGameSessionMessage>(&raw) {
                        Ok(message) => sink.on_update_game_session(message).await,
                        Err(e) => warn!(error = %e, "Malformed UpdateGameSession dropped"),
                    }
                })
            }),
        );

        let for_refresh = sink.clone();
        self.client.register_handler(
            actions::REFRESH_CONNECTION,
            Arc::new(move |raw| {
                let sink = for_refresh.clone();
                Box::pin(async move {
                    let Some(sink) = sink.upgrade() else { return };
                    match serde_json::from_str::<RefreshConnectionMessage>(&raw) {
                        Ok(message) => sink.on_refresh_connection(message).await,
                        Err(e) => warn!(error = %e, "Malformed RefreshConnection dropped"),
                    }
                })
            }),
        );

        let for_terminate = sink;
        self.client.register_handler(
            actions::TERMINATE_PROCESS,
            Arc::new(move |raw| {
                let sink = for_terminate.clone();
                Box::pin(async move {
                    let Some(sink) = sink.upgrade() else { return };
                    match serde_json::from_str::<TerminateProcessMessage>(&raw) {
                        Ok(message) => sink.on_terminate_process(message).await,
                        Err(e) => warn!(error = %e, "Malformed TerminateProcess dropped"),
                    }
                })
            }),
        );
    }

    /// Dial the service with the full identity query.
    pub async fn connect(
        &self,
        endpoint: &str,
        process_id: &str,
        host_id: &str,
        fleet_id: &str,
        auth_token: &str,
        sigv4: Option<&SigV4QueryParameters>,
    ) -> Result<()> {
        let url =
            build_connection_url(endpoint, process_id, host_id, fleet_id, auth_token, sigv4)?;
        debug!(endpoint, process_id, fleet_id, "Connecting to fleet service");
        self.client.connect(url.as_str()).await
    }

    /// Send a request and wait for its correlated response.
    ///
    /// Exactly one of three things happens: the typed response is returned,
    /// the timeout fires (the pending entry is cancelled) and
    /// `ServiceCallFailed` is returned, or the write error surfaces
    /// immediately.
    pub async fn handle_request<T: DeserializeOwned>(
        &self,
        action: &str,
        body: impl Serialize,
        timeout: Duration,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        let mut envelope = RequestEnvelope::new(action, String::new(), body);
        let request_id = self.client.send_request(&mut envelope, tx).await?;

        let raw = match tokio::time::timeout(timeout, rx).await {
            Err(_) => {
                self.client.cancel_request(&request_id);
                return Err(Error::ServiceCallFailed(format!(
                    "{action} timed out after {timeout:?}"
                )));
            }
            Ok(Err(_)) => {
                return Err(Error::ServiceCallFailed(format!(
                    "{action} response channel closed"
                )))
            }
            Ok(Ok(raw)) => raw,
        };

        let header: FrameHeader = serde_json::from_str(&raw)
            .map_err(|e| Error::InternalService(format!("unparseable {action} response: {e}")))?;
        if !header.is_success() {
            let message = header
                .error_message
                .unwrap_or_else(|| format!("{action} rejected by the service"));
            return Err(match header.status_code {
                Some(400) => Error::BadRequest(message),
                _ => Error::InternalService(message),
            });
        }

        serde_json::from_str::<T>(&raw)
            .map_err(|e| Error::InternalService(format!("malformed {action} response: {e}")))
    }

    /// Fire-and-forget write; no response handling.
    pub async fn send_message(&self, action: &str, body: impl Serialize) -> Result<()> {
        let envelope =
            RequestEnvelope::new(action, uuid::Uuid::new_v4().to_string(), body);
        self.client.send_message(&envelope).await
    }

    /// Container-compute only: credential triple from the metadata agent.
    pub async fn fetch_container_credentials(&self) -> Result<AwsCredentials> {
        ContainerMetadataClient::from_env()?.fetch_credentials().await
    }

    /// Container-compute only: task id used as the compute's host identity.
    pub async fn fetch_container_task_id(&self) -> Result<String> {
        ContainerMetadataClient::from_env()?.fetch_task_id().await
    }

    pub fn prevent_auto_reconnect(&self) {
        self.client.prevent_auto_reconnect();
    }

    /// Number of requests still awaiting a response.
    pub fn pending_request_count(&self) -> usize {
        self.client.pending_count()
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.client.disconnect().await
    }
}

/// Query-string framing for the initial dial: identity parameters, the SDK
/// tags, and either the auth token or the SigV4 signed set.
fn build_connection_url(
    endpoint: &str,
    process_id: &str,
    host_id: &str,
    fleet_id: &str,
    auth_token: &str,
    sigv4: Option<&SigV4QueryParameters>,
) -> Result<Url> {
    let mut url = Url::parse(endpoint)?;
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("pID", process_id);
        query.append_pair("sdkVersion", SDK_VERSION);
        query.append_pair("sdkLanguage", SDK_LANGUAGE);
        match sigv4 {
            Some(signed) => {
                query.append_pair("ComputeId", host_id);
                query.append_pair("FleetId", fleet_id);
                for (key, value) in &signed.pairs {
                    query.append_pair(key, value);
                }
            }
            None => {
                query.append_pair("Authorization", auth_token);
                query.append_pair("ComputeId", host_id);
                query.append_pair("FleetId", fleet_id);
            }
        }
    }
    Ok(url)
}
