//! Public facade.
//!
//! The functions here operate on one process-wide runtime instance,
//! installed by [`init_sdk`] and torn down by [`destroy`]. Embedders that
//! want an instance-scoped runtime (several in one test binary, for
//! example) can use [`GameLiftServerState`] directly instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::app::config::{ProcessParameters, ServerParameters};
use crate::app::logging;
use crate::core::model::{
    DescribePlayerSessionsRequest, DescribePlayerSessionsResponse, GetComputeCertificateResponse,
    GetFleetRoleCredentialsRequest, GetFleetRoleCredentialsResponse,
    PlayerSessionCreationPolicy, StartMatchBackfillRequest, StartMatchBackfillResponse,
    StopMatchBackfillRequest,
};
use crate::core::state::GameLiftServerState;
use crate::error::{Error, Result};

static INSTANCE: Mutex<Option<Arc<GameLiftServerState>>> = Mutex::new(None);
static INITIALIZING: AtomicBool = AtomicBool::new(false);

fn instance() -> Result<Arc<GameLiftServerState>> {
    INSTANCE.lock().clone().ok_or(Error::NotInitialized)
}

/// Install the default tracing subscriber. Optional; a host that already
/// set one up keeps its own.
pub fn init_logging() {
    logging::init();
}

/// Initialise the SDK and connect to the fleet service.
///
/// Concurrent or repeated initialisation fails with `AlreadyInitialized`;
/// a failed attempt leaves no state behind.
pub async fn init_sdk(params: ServerParameters) -> Result<()> {
    if INITIALIZING
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Err(Error::AlreadyInitialized);
    }
    let result = async {
        if INSTANCE.lock().is_some() {
            return Err(Error::AlreadyInitialized);
        }
        let state = GameLiftServerState::connect(params).await?;
        *INSTANCE.lock() = Some(state);
        Ok(())
    }
    .await;
    INITIALIZING.store(false, Ordering::SeqCst);
    result
}

/// Initialise with every parameter resolved from the environment.
pub async fn init_sdk_from_environment() -> Result<()> {
    init_sdk(ServerParameters::default()).await
}

/// Report the process ready to host game sessions.
pub async fn process_ready(params: ProcessParameters) -> Result<()> {
    instance()?.process_ready(params).await
}

/// Report the process shutting down.
pub async fn process_ending() -> Result<()> {
    instance()?.process_ending().await
}

/// Activate the game session announced by `OnStartGameSession`.
pub async fn activate_game_session() -> Result<()> {
    instance()?.activate_game_session().await
}

pub async fn update_player_session_creation_policy(
    policy: PlayerSessionCreationPolicy,
) -> Result<()> {
    instance()?.update_player_session_creation_policy(policy).await
}

/// Id of the current game session, once one has been started.
pub fn get_game_session_id() -> Result<String> {
    instance()?.game_session_id()
}

/// Scheduled termination time (seconds since epoch), once a terminate
/// notice has been received.
pub fn get_termination_time() -> Result<i64> {
    instance()?.termination_time()
}

pub async fn accept_player_session(player_session_id: impl Into<String>) -> Result<()> {
    instance()?.accept_player_session(player_session_id.into()).await
}

pub async fn remove_player_session(player_session_id: impl Into<String>) -> Result<()> {
    instance()?.remove_player_session(player_session_id.into()).await
}

pub async fn describe_player_sessions(
    request: DescribePlayerSessionsRequest,
) -> Result<DescribePlayerSessionsResponse> {
    instance()?.describe_player_sessions(request).await
}

pub async fn start_match_backfill(
    request: StartMatchBackfillRequest,
) -> Result<StartMatchBackfillResponse> {
    instance()?.start_match_backfill(request).await
}

pub async fn stop_match_backfill(request: StopMatchBackfillRequest) -> Result<()> {
    instance()?.stop_match_backfill(request).await
}

pub async fn get_compute_certificate() -> Result<GetComputeCertificateResponse> {
    instance()?.get_compute_certificate().await
}

pub async fn get_fleet_role_credentials(
    request: GetFleetRoleCredentialsRequest,
) -> Result<GetFleetRoleCredentialsResponse> {
    instance()?.get_fleet_role_credentials(request).await
}

/// Tear down the process-wide instance. Subsequent calls against the
/// facade return `NotInitialized` until the next `init_sdk`.
pub async fn destroy() -> Result<()> {
    let state = INSTANCE.lock().take().ok_or(Error::NotInitialized)?;
    state.destroy().await
}
