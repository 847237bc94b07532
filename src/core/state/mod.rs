//! Server-state state machine: init, process readiness, the heartbeat
//! loop, typed RPCs, notification handling, and teardown.

mod credentials;

pub use credentials::FleetRoleCredentialCache;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::config::{
    tool_metadata_from_env, ComputeType, ProcessParameters, SdkConfig, ServerParameters,
    AGENTLESS_CONTAINER_PROCESS_ID, SDK_LANGUAGE, SDK_VERSION,
};
use crate::core::auth::{generate_signed_query_parameters, AwsCredentials, SigV4QueryParameters};
use crate::core::manager::{FleetServiceManager, NotificationSink};
use crate::core::model::{
    actions, AcceptPlayerSessionRequest, ActivateGameSessionRequest,
    ActivateServerProcessRequest, CreateGameSessionMessage, DescribePlayerSessionsRequest,
    DescribePlayerSessionsResponse, GetComputeCertificateRequest, GetComputeCertificateResponse,
    GetFleetRoleCredentialsRequest, GetFleetRoleCredentialsResponse,
    HeartbeatServerProcessRequest, NoResponseData, PlayerSessionCreationPolicy,
    RefreshConnectionMessage, RemovePlayerSessionRequest, StartMatchBackfillRequest,
    StartMatchBackfillResponse, StopMatchBackfillRequest, TerminateProcessMessage,
    TerminateServerProcessRequest, UpdateGameSessionMessage,
    UpdatePlayerSessionCreationPolicyRequest,
};
use crate::core::transport::{Transport, TransportConfig, WebSocketTransport};
use crate::core::validate;
use crate::error::{Error, Result};

/// Called on the default terminate path instead of `std::process::exit` so
/// tests can observe the exit code.
pub type ExitHook = Arc<dyn Fn(i32) + Send + Sync>;

/// The long-lived server state for one game-server process.
pub struct GameLiftServerState {
    weak: Weak<Self>,
    manager: Mutex<Option<Arc<FleetServiceManager>>>,
    config: SdkConfig,
    process_id: String,
    host_id: String,
    fleet_id: String,
    is_ready: AtomicBool,
    ended: AtomicBool,
    on_managed_fleet: AtomicBool,
    game_session_id: Mutex<Option<String>>,
    termination_time_secs: Mutex<Option<i64>>,
    process_parameters: Mutex<Option<ProcessParameters>>,
    heartbeat_shutdown: Mutex<Option<watch::Sender<bool>>>,
    heartbeat_task: Mutex<Option<JoinHandle<()>>>,
    credential_cache: FleetRoleCredentialCache,
    exit_hook: Mutex<ExitHook>,
}

impl GameLiftServerState {
    /// Resolve parameters, validate, authenticate, and dial the service.
    ///
    /// Failure leaves nothing behind: no heartbeat task and no connection.
    pub async fn connect(params: ServerParameters) -> Result<Arc<Self>> {
        Self::connect_with_transport(params, WebSocketTransport::new(TransportConfig::default()))
            .await
    }

    /// Same as `connect` but against a caller-supplied transport.
    pub async fn connect_with_transport(
        params: ServerParameters,
        transport: Arc<dyn Transport>,
    ) -> Result<Arc<Self>> {
        Self::connect_configured(params, transport, SdkConfig::from_env()).await
    }

    /// Full-control constructor: caller supplies transport and timeouts.
    pub async fn connect_configured(
        params: ServerParameters,
        transport: Arc<dyn Transport>,
        config: SdkConfig,
    ) -> Result<Arc<Self>> {
        let mut params = params.resolve_from_env();
        let compute_type = ComputeType::from_env();
        let manager = Arc::new(FleetServiceManager::new(transport));

        validate::validate_server_parameters(&params, compute_type)?;

        let mut credentials = AwsCredentials::new(
            params.access_key.clone(),
            params.secret_key.clone(),
            params.session_token.clone(),
        );

        if compute_type == ComputeType::Container && params.auth_token.is_empty() {
            credentials = manager.fetch_container_credentials().await?;
            params.host_id = manager.fetch_container_task_id().await?;
            if params.process_id == AGENTLESS_CONTAINER_PROCESS_ID {
                params.process_id = Uuid::new_v4().to_string();
                info!(process_id = %params.process_id, "Minted process id for agentless container");
            }
        }

        let sigv4 = if params.auth_token.is_empty() {
            Some(Self::sign_connection_query(&params, &credentials)?)
        } else {
            None
        };

        let state = Arc::new_cyclic(|weak| Self {
            weak: weak.clone(),
            manager: Mutex::new(Some(Arc::clone(&manager))),
            config,
            process_id: params.process_id.clone(),
            host_id: params.host_id.clone(),
            fleet_id: params.fleet_id.clone(),
            is_ready: AtomicBool::new(false),
            ended: AtomicBool::new(false),
            on_managed_fleet: AtomicBool::new(true),
            game_session_id: Mutex::new(None),
            termination_time_secs: Mutex::new(None),
            process_parameters: Mutex::new(None),
            heartbeat_shutdown: Mutex::new(None),
            heartbeat_task: Mutex::new(None),
            credential_cache: FleetRoleCredentialCache::new(),
            exit_hook: Mutex::new(Arc::new(|code| std::process::exit(code))),
        });

        let sink: Weak<dyn NotificationSink> = Arc::downgrade(&state) as Weak<dyn NotificationSink>;
        manager.register_notification_sink(sink);

        manager
            .connect(
                &params.websocket_url,
                &params.process_id,
                &params.host_id,
                &params.fleet_id,
                &params.auth_token,
                sigv4.as_ref(),
            )
            .await?;

        Ok(state)
    }

    fn sign_connection_query(
        params: &ServerParameters,
        credentials: &AwsCredentials,
    ) -> Result<SigV4QueryParameters> {
        let base = vec![
            ("pID".to_string(), params.process_id.clone()),
            ("ComputeId".to_string(), params.host_id.clone()),
            ("FleetId".to_string(), params.fleet_id.clone()),
        ];
        generate_signed_query_parameters(
            &params.websocket_url,
            &base,
            &params.aws_region,
            credentials,
            Utc::now(),
        )
    }

    /// Replace the exit hook used on the default terminate path.
    pub fn set_exit_hook(&self, hook: ExitHook) {
        *self.exit_hook.lock() = hook;
    }

    fn manager(&self) -> Option<Arc<FleetServiceManager>> {
        self.manager.lock().clone()
    }

    fn require_manager(&self) -> Result<Arc<FleetServiceManager>> {
        self.manager().ok_or(Error::NotInitialized)
    }

    fn require_ready(&self) -> Result<Arc<FleetServiceManager>> {
        let manager = self.require_manager()?;
        if !self.is_ready.load(Ordering::SeqCst) {
            return Err(Error::ProcessNotReady);
        }
        Ok(manager)
    }

    fn require_game_session_id(&self) -> Result<String> {
        self.game_session_id.lock().clone().ok_or(Error::GameSessionIdNotSet)
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Activate the process with the service and start the heartbeat loop.
    pub async fn process_ready(&self, params: ProcessParameters) -> Result<()> {
        let manager = self.require_manager()?;
        if self.ended.load(Ordering::SeqCst) {
            return Err(Error::BadRequest("process has already been ended".into()));
        }
        validate::validate_port(params.port)?;
        let port = params.port;

        let (tool_name, tool_version) = tool_metadata_from_env();
        let request = ActivateServerProcessRequest {
            sdk_version: SDK_VERSION.into(),
            sdk_language: SDK_LANGUAGE.into(),
            port: params.port,
            log_paths: params.log_paths.clone(),
            sdk_tool_name: tool_name,
            sdk_tool_version: tool_version,
        };

        *self.process_parameters.lock() = Some(params);

        manager
            .handle_request::<NoResponseData>(
                actions::ACTIVATE_SERVER_PROCESS,
                request,
                self.config.activate_timeout,
            )
            .await?;

        if self
            .is_ready
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.start_heartbeat_loop();
            info!(port, "Process ready");
        } else {
            warn!("process_ready called while already ready, heartbeat loop unchanged");
        }
        Ok(())
    }

    /// Notify the service the process is ending and stop the health loop.
    pub async fn process_ending(&self) -> Result<()> {
        let manager = self.require_manager()?;
        self.ended.store(true, Ordering::SeqCst);
        self.stop_server_process().await;
        manager
            .handle_request::<NoResponseData>(
                actions::TERMINATE_SERVER_PROCESS,
                TerminateServerProcessRequest::default(),
                self.config.service_call_timeout,
            )
            .await
            .map(|_| ())
            .map_err(|e| Error::ProcessEndingFailed(e.to_string()))
    }

    /// Tear the whole stack down. Safe to call at any point, more than
    /// once, and without a prior `process_ready`.
    pub async fn destroy(&self) -> Result<()> {
        self.stop_server_process().await;
        let manager = self.manager.lock().take();
        if let Some(manager) = manager {
            manager.prevent_auto_reconnect();
            if let Err(e) = manager.disconnect().await {
                warn!(error = %e, "Disconnect failed during destroy");
            }
        }
        Ok(())
    }

    /// Flip readiness off and stop the heartbeat loop. The shutdown channel
    /// is closed at most once; the scheduler task is joined before this
    /// returns.
    async fn stop_server_process(&self) {
        if self
            .is_ready
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            if let Some(shutdown) = self.heartbeat_shutdown.lock().take() {
                let _ = shutdown.send(true);
            }
        }
        let task = self.heartbeat_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                debug!(error = %e, "Heartbeat task join failed");
            }
        }
    }

    // ---------------------------------------------------------------------
    // Heartbeat loop
    // ---------------------------------------------------------------------

    fn start_heartbeat_loop(&self) {
        let Some(state) = self.weak.upgrade() else { return };
        let (tx, rx) = watch::channel(false);
        *self.heartbeat_shutdown.lock() = Some(tx);
        let task = tokio::spawn(async move { state.run_heartbeat_loop(rx).await });
        *self.heartbeat_task.lock() = Some(task);
    }

    async fn run_heartbeat_loop(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        debug!("Health reporting started");
        loop {
            let state = Arc::clone(&self);
            let beat_shutdown = shutdown.clone();
            tokio::spawn(async move { state.report_health(beat_shutdown).await });

            let delay = self.next_heartbeat_delay();
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => {
                    debug!("Health reporting stopped");
                    return;
                }
            }
        }
    }

    fn next_heartbeat_delay(&self) -> std::time::Duration {
        let interval_ms = self.config.healthcheck_interval.as_millis() as i64;
        let max_jitter_ms = self.config.healthcheck_max_jitter.as_millis() as i64;
        if max_jitter_ms == 0 {
            return self.config.healthcheck_interval;
        }
        let jitter = rand::thread_rng().gen_range(-max_jitter_ms..=max_jitter_ms);
        std::time::Duration::from_millis((interval_ms + jitter).max(0) as u64)
    }

    /// One heartbeat: probe the game, then report. Aborted immediately on
    /// shutdown so teardown never waits a full service-call timeout.
    async fn report_health(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        tokio::select! {
            _ = shutdown.changed() => {}
            _ = self.probe_and_send_heartbeat() => {}
        }
    }

    async fn probe_and_send_heartbeat(&self) {
        if !self.is_ready.load(Ordering::SeqCst) {
            return;
        }
        let callback =
            self.process_parameters.lock().as_ref().and_then(|p| p.on_health_check.clone());
        let healthy = match callback {
            Some(callback) => {
                match tokio::time::timeout(self.config.healthcheck_timeout, callback()).await {
                    Ok(healthy) => healthy,
                    Err(_) => {
                        warn!("Health check callback timed out, reporting unhealthy");
                        false
                    }
                }
            }
            None => true,
        };

        let Some(manager) = self.manager() else { return };
        let request = HeartbeatServerProcessRequest { health_status: healthy };
        if let Err(e) = manager
            .handle_request::<NoResponseData>(
                actions::HEARTBEAT_SERVER_PROCESS,
                request,
                self.config.service_call_timeout,
            )
            .await
        {
            warn!(error = %e, "Heartbeat report failed");
        } else {
            debug!(healthy, "Heartbeat reported");
        }
    }

    // ---------------------------------------------------------------------
    // Typed RPCs
    // ---------------------------------------------------------------------

    pub async fn activate_game_session(&self) -> Result<()> {
        let manager = self.require_ready()?;
        let game_session_id = self.require_game_session_id()?;
        manager
            .handle_request::<NoResponseData>(
                actions::ACTIVATE_GAME_SESSION,
                ActivateGameSessionRequest { game_session_id },
                self.config.service_call_timeout,
            )
            .await
            .map(|_| ())
    }

    pub async fn update_player_session_creation_policy(
        &self,
        policy: PlayerSessionCreationPolicy,
    ) -> Result<()> {
        let manager = self.require_ready()?;
        let game_session_id = self.require_game_session_id()?;
        manager
            .handle_request::<NoResponseData>(
                actions::UPDATE_PLAYER_SESSION_CREATION_POLICY,
                UpdatePlayerSessionCreationPolicyRequest {
                    game_session_id,
                    player_session_policy: policy,
                },
                self.config.service_call_timeout,
            )
            .await
            .map(|_| ())
    }

    pub async fn accept_player_session(&self, player_session_id: String) -> Result<()> {
        let manager = self.require_ready()?;
        let game_session_id = self.require_game_session_id()?;
        manager
            .handle_request::<NoResponseData>(
                actions::ACCEPT_PLAYER_SESSION,
                AcceptPlayerSessionRequest { game_session_id, player_session_id },
                self.config.service_call_timeout,
            )
            .await
            .map(|_| ())
    }

    pub async fn remove_player_session(&self, player_session_id: String) -> Result<()> {
        let manager = self.require_ready()?;
        let game_session_id = self.require_game_session_id()?;
        manager
            .handle_request::<NoResponseData>(
                actions::REMOVE_PLAYER_SESSION,
                RemovePlayerSessionRequest { game_session_id, player_session_id },
                self.config.service_call_timeout,
            )
            .await
            .map(|_| ())
    }

    pub async fn describe_player_sessions(
        &self,
        request: DescribePlayerSessionsRequest,
    ) -> Result<DescribePlayerSessionsResponse> {
        let manager = self.require_ready()?;
        validate::validate_describe_player_sessions(&request)?;
        manager
            .handle_request(
                actions::DESCRIBE_PLAYER_SESSIONS,
                request,
                self.config.service_call_timeout,
            )
            .await
    }

    pub async fn start_match_backfill(
        &self,
        request: StartMatchBackfillRequest,
    ) -> Result<StartMatchBackfillResponse> {
        let manager = self.require_ready()?;
        validate::validate_start_match_backfill(&request)?;
        manager
            .handle_request(actions::START_MATCH_BACKFILL, request, self.config.service_call_timeout)
            .await
    }

    pub async fn stop_match_backfill(&self, request: StopMatchBackfillRequest) -> Result<()> {
        let manager = self.require_ready()?;
        validate::validate_stop_match_backfill(&request)?;
        manager
            .handle_request::<NoResponseData>(
                actions::STOP_MATCH_BACKFILL,
                request,
                self.config.service_call_timeout,
            )
            .await
            .map(|_| ())
    }

    pub async fn get_compute_certificate(&self) -> Result<GetComputeCertificateResponse> {
        let manager = self.require_ready()?;
        manager
            .handle_request(
                actions::GET_COMPUTE_CERTIFICATE,
                GetComputeCertificateRequest::default(),
                self.config.service_call_timeout,
            )
            .await
    }

    /// Fleet-role credentials, served from the cache while they have more
    /// than the freshness margin left.
    pub async fn get_fleet_role_credentials(
        &self,
        mut request: GetFleetRoleCredentialsRequest,
    ) -> Result<GetFleetRoleCredentialsResponse> {
        let manager = self.require_ready()?;
        if !self.on_managed_fleet.load(Ordering::SeqCst) {
            return Err(Error::BadRequest(
                "fleet-role credentials are only available on managed fleets".into(),
            ));
        }
        if request.role_session_name.is_empty() {
            let mut derived = format!("{}-{}", self.fleet_id, self.host_id);
            derived.truncate(64);
            request.role_session_name = derived;
        }
        validate::validate_get_fleet_role_credentials(&request)?;

        if let Some(cached) =
            self.credential_cache.get(&request.role_arn, Utc::now().timestamp_millis())
        {
            return Ok(cached);
        }

        let role_arn = request.role_arn.clone();
        let response: GetFleetRoleCredentialsResponse = manager
            .handle_request(
                actions::GET_FLEET_ROLE_CREDENTIALS,
                request,
                self.config.service_call_timeout,
            )
            .await?;

        if response.access_key_id.is_empty() {
            // The service answers with an empty triple when this compute is
            // not part of a managed fleet; remember that verdict.
            self.on_managed_fleet.store(false, Ordering::SeqCst);
            return Err(Error::BadRequest(
                "compute is not part of a managed fleet".into(),
            ));
        }

        self.credential_cache.insert(role_arn, response.clone());
        Ok(response)
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    pub fn game_session_id(&self) -> Result<String> {
        self.require_game_session_id()
    }

    /// Termination time in seconds since epoch, once a terminate notice has
    /// arrived.
    pub fn termination_time(&self) -> Result<i64> {
        (*self.termination_time_secs.lock()).ok_or(Error::TerminationTimeNotSet)
    }

    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    fn exit(&self, code: i32) {
        let hook = self.exit_hook.lock().clone();
        hook(code);
    }
}

#[async_trait]
impl NotificationSink for GameLiftServerState {
    async fn on_start_game_session(&self, message: CreateGameSessionMessage) {
        if !self.is_ready.load(Ordering::SeqCst) {
            debug!("CreateGameSession before process_ready, ignoring");
            return;
        }
        let mut session = message.into_game_session();
        session.fleet_id = self.fleet_id.clone();
        {
            let mut guard = self.game_session_id.lock();
            if guard.is_none() {
                *guard = Some(session.game_session_id.clone());
            }
        }
        let callback =
            self.process_parameters.lock().as_ref().and_then(|p| p.on_start_game_session.clone());
        match callback {
            Some(callback) => callback(session),
            None => debug!("No OnStartGameSession callback registered"),
        }
    }

    async fn on_update_game_session(&self, message: UpdateGameSessionMessage) {
        if !self.is_ready.load(Ordering::SeqCst) {
            debug!("UpdateGameSession before process_ready, ignoring");
            return;
        }
        if message.update_reason.is_none() {
            warn!("UpdateGameSession without an update reason");
        }
        let callback =
            self.process_parameters.lock().as_ref().and_then(|p| p.on_update_game_session.clone());
        match callback {
            Some(callback) => callback(message),
            None => debug!("No OnUpdateGameSession callback registered"),
        }
    }

    async fn on_terminate_process(&self, message: TerminateProcessMessage) {
        let seconds = message.termination_time / 1000;
        {
            let mut guard = self.termination_time_secs.lock();
            if guard.is_none() {
                *guard = Some(seconds);
            }
        }
        info!(termination_time_secs = seconds, "Terminate notice received");

        let callback =
            self.process_parameters.lock().as_ref().and_then(|p| p.on_process_terminate.clone());
        if let Some(callback) = callback {
            callback();
            return;
        }

        // No callback registered: wind the process down ourselves.
        let code = match self.process_ending().await {
            Ok(()) => match self.destroy().await {
                Ok(()) => 0,
                Err(e) => {
                    error!(error = %e, "Destroy failed during terminate");
                    -1
                }
            },
            Err(e) => {
                error!(error = %e, "Process ending failed during terminate");
                let _ = self.destroy().await;
                -1
            }
        };
        self.exit(code);
    }

    async fn on_refresh_connection(&self, message: RefreshConnectionMessage) {
        let Some(manager) = self.manager() else {
            warn!("RefreshConnection after destroy, ignoring");
            return;
        };
        info!(endpoint = %message.refresh_connection_endpoint, "Refreshing connection");
        if let Err(e) = manager
            .connect(
                &message.refresh_connection_endpoint,
                &self.process_id,
                &self.host_id,
                &self.fleet_id,
                &message.auth_token,
                None,
            )
            .await
        {
            // The transport's own reconnect keeps the old endpoint alive;
            // nothing more to do from here.
            error!(error = %e, "Connection refresh failed");
        }
    }
}
