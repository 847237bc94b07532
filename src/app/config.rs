//! SDK parameters and configuration.
//!
//! Every parameter can come from the embedding process explicitly or from a
//! `GAMELIFT_*` environment variable; the explicit value wins whenever it is
//! non-empty.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::core::model::{GameSession, UpdateGameSessionMessage};

/// Version tag reported to the fleet service on connect and activation.
pub const SDK_VERSION: &str = "5.3.0";
/// Language tag reported alongside the version.
pub const SDK_LANGUAGE: &str = "Rust";

/// Sentinel process id for agentless container fleets; replaced with a
/// minted uuid during init.
pub const AGENTLESS_CONTAINER_PROCESS_ID: &str = "AGENTLESS_CONTAINER_PROCESS";

pub const ENV_WEBSOCKET_URL: &str = "GAMELIFT_SDK_WEBSOCKET_URL";
pub const ENV_PROCESS_ID: &str = "GAMELIFT_SDK_PROCESS_ID";
pub const ENV_HOST_ID: &str = "GAMELIFT_SDK_HOST_ID";
pub const ENV_FLEET_ID: &str = "GAMELIFT_SDK_FLEET_ID";
pub const ENV_AUTH_TOKEN: &str = "GAMELIFT_SDK_AUTH_TOKEN";
pub const ENV_AWS_REGION: &str = "GAMELIFT_SDK_AWS_REGION";
pub const ENV_AWS_ACCESS_KEY: &str = "GAMELIFT_SDK_AWS_ACCESS_KEY";
pub const ENV_AWS_SECRET_KEY: &str = "GAMELIFT_SDK_AWS_SECRET_KEY";
pub const ENV_AWS_SESSION_TOKEN: &str = "GAMELIFT_SDK_AWS_SESSION_TOKEN";
pub const ENV_COMPUTE_TYPE: &str = "GAMELIFT_COMPUTE_TYPE";
pub const ENV_HEALTHCHECK_INTERVAL: &str = "GAMELIFT_HEALTHCHECK_INTERVAL";
pub const ENV_HEALTHCHECK_TIMEOUT: &str = "GAMELIFT_HEALTHCHECK_TIMEOUT";
pub const ENV_SERVICE_CALL_TIMEOUT: &str = "GAMELIFT_SERVICE_CALL_TIMEOUT";
pub const ENV_SDK_TOOL_NAME: &str = "GAMELIFT_SDK_TOOL_NAME";
pub const ENV_SDK_TOOL_VERSION: &str = "GAMELIFT_SDK_TOOL_VERSION";

/// Compute platform this process runs on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ComputeType {
    /// Managed EC2 fleet or Anywhere compute.
    #[default]
    ManagedEc2,
    /// Container fleet; host identity and credentials come from the
    /// container metadata endpoint.
    Container,
}

impl ComputeType {
    pub fn from_env() -> Self {
        match std::env::var(ENV_COMPUTE_TYPE).unwrap_or_default().as_str() {
            "CONTAINER" => Self::Container,
            _ => Self::ManagedEc2,
        }
    }
}

/// Connection parameters supplied to `init_sdk`.
#[derive(Debug, Clone, Default)]
pub struct ServerParameters {
    pub websocket_url: String,
    pub process_id: String,
    pub host_id: String,
    pub fleet_id: String,
    pub auth_token: String,
    pub aws_region: String,
    pub access_key: String,
    pub secret_key: String,
    pub session_token: String,
}

fn env_or(explicit: String, key: &str) -> String {
    if !explicit.is_empty() {
        return explicit;
    }
    std::env::var(key).unwrap_or_default()
}

impl ServerParameters {
    /// Parameters resolved purely from the environment.
    pub fn from_env() -> Self {
        Self::default().resolve_from_env()
    }

    /// Fill every empty field from its environment variable, then apply the
    /// pre-emption rule: a non-empty auth token clears the whole SigV4 group
    /// so the two strategies are never simultaneously active.
    pub fn resolve_from_env(self) -> Self {
        let mut resolved = Self {
            websocket_url: env_or(self.websocket_url, ENV_WEBSOCKET_URL),
            process_id: env_or(self.process_id, ENV_PROCESS_ID),
            host_id: env_or(self.host_id, ENV_HOST_ID),
            fleet_id: env_or(self.fleet_id, ENV_FLEET_ID),
            auth_token: env_or(self.auth_token, ENV_AUTH_TOKEN),
            aws_region: env_or(self.aws_region, ENV_AWS_REGION),
            access_key: env_or(self.access_key, ENV_AWS_ACCESS_KEY),
            secret_key: env_or(self.secret_key, ENV_AWS_SECRET_KEY),
            session_token: env_or(self.session_token, ENV_AWS_SESSION_TOKEN),
        };
        if !resolved.auth_token.is_empty() {
            resolved.aws_region.clear();
            resolved.access_key.clear();
            resolved.secret_key.clear();
            resolved.session_token.clear();
        }
        resolved
    }
}

/// Callback invoked when the service starts a game session on this process.
pub type OnStartGameSession = Arc<dyn Fn(GameSession) + Send + Sync>;
/// Callback invoked when a game session is updated (backfill and matchmaker
/// data changes).
pub type OnUpdateGameSession = Arc<dyn Fn(UpdateGameSessionMessage) + Send + Sync>;
/// Callback invoked when the service asks the process to terminate.
pub type OnProcessTerminate = Arc<dyn Fn() + Send + Sync>;
/// Health probe; polled on every heartbeat tick under its own timeout.
pub type OnHealthCheck =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = bool> + Send>> + Send + Sync>;

/// Per-process parameters supplied to `process_ready`.
#[derive(Clone, Default)]
pub struct ProcessParameters {
    /// Port players connect to; must lie in the fleet's allowed range.
    pub port: i32,
    /// Log files and directories the service should collect.
    pub log_paths: Vec<String>,
    pub on_start_game_session: Option<OnStartGameSession>,
    pub on_update_game_session: Option<OnUpdateGameSession>,
    pub on_process_terminate: Option<OnProcessTerminate>,
    pub on_health_check: Option<OnHealthCheck>,
}

impl ProcessParameters {
    pub fn new(port: i32) -> Self {
        Self { port, ..Self::default() }
    }
}

impl std::fmt::Debug for ProcessParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessParameters")
            .field("port", &self.port)
            .field("log_paths", &self.log_paths)
            .field("on_start_game_session", &self.on_start_game_session.is_some())
            .field("on_update_game_session", &self.on_update_game_session.is_some())
            .field("on_process_terminate", &self.on_process_terminate.is_some())
            .field("on_health_check", &self.on_health_check.is_some())
            .finish()
    }
}

/// Timeouts and heartbeat cadence, resolved from the environment once at
/// init.
#[derive(Debug, Clone)]
pub struct SdkConfig {
    /// Bound on every request/response RPC except activation.
    pub service_call_timeout: Duration,
    /// Bound on the `ActivateServerProcess` call.
    pub activate_timeout: Duration,
    /// Base interval between heartbeat ticks.
    pub healthcheck_interval: Duration,
    /// Bound on the user health callback per tick.
    pub healthcheck_timeout: Duration,
    /// Uniform jitter applied to each tick, in [-max_jitter, +max_jitter].
    pub healthcheck_max_jitter: Duration,
}

impl Default for SdkConfig {
    fn default() -> Self {
        Self {
            service_call_timeout: Duration::from_secs(20),
            activate_timeout: Duration::from_secs(6),
            healthcheck_interval: Duration::from_secs(60),
            healthcheck_timeout: Duration::from_secs(10),
            healthcheck_max_jitter: Duration::from_secs(10),
        }
    }
}

fn env_duration_secs(key: &str) -> Option<Duration> {
    std::env::var(key).ok()?.trim().parse::<u64>().ok().map(Duration::from_secs)
}

impl SdkConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(interval) = env_duration_secs(ENV_HEALTHCHECK_INTERVAL) {
            config.healthcheck_interval = interval;
        }
        if let Some(timeout) = env_duration_secs(ENV_HEALTHCHECK_TIMEOUT) {
            config.healthcheck_timeout = timeout;
        }
        if let Some(timeout) = env_duration_secs(ENV_SERVICE_CALL_TIMEOUT) {
            config.service_call_timeout = timeout;
        }
        config
    }
}

/// Optional tool identification forwarded on `ActivateServerProcess`.
pub fn tool_metadata_from_env() -> (Option<String>, Option<String>) {
    let name = std::env::var(ENV_SDK_TOOL_NAME).ok().filter(|v| !v.is_empty());
    let version = std::env::var(ENV_SDK_TOOL_VERSION).ok().filter(|v| !v.is_empty());
    (name, version)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var mutation is process-global; keep these tests on one lock.
    static ENV_LOCK: parking_lot::Mutex<()> = parking_lot::Mutex::new(());

    fn clear_sdk_env() {
        for key in [
            ENV_WEBSOCKET_URL,
            ENV_PROCESS_ID,
            ENV_HOST_ID,
            ENV_FLEET_ID,
            ENV_AUTH_TOKEN,
            ENV_AWS_REGION,
            ENV_AWS_ACCESS_KEY,
            ENV_AWS_SECRET_KEY,
            ENV_AWS_SESSION_TOKEN,
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn explicit_values_win_over_environment() {
        let _guard = ENV_LOCK.lock();
        clear_sdk_env();
        std::env::set_var(ENV_PROCESS_ID, "env-proc");
        std::env::set_var(ENV_FLEET_ID, "env-fleet");

        let params = ServerParameters {
            process_id: "explicit-proc".into(),
            auth_token: "tok".into(),
            ..Default::default()
        }
        .resolve_from_env();

        assert_eq!(params.process_id, "explicit-proc");
        assert_eq!(params.fleet_id, "env-fleet");
        clear_sdk_env();
    }

    #[test]
    fn auth_token_preempts_sigv4_group() {
        let _guard = ENV_LOCK.lock();
        clear_sdk_env();
        std::env::set_var(ENV_AWS_REGION, "us-west-2");
        std::env::set_var(ENV_AWS_ACCESS_KEY, "AKIA");
        std::env::set_var(ENV_AWS_SECRET_KEY, "secret");

        let params = ServerParameters {
            auth_token: "tok".into(),
            ..Default::default()
        }
        .resolve_from_env();

        assert_eq!(params.auth_token, "tok");
        assert!(params.aws_region.is_empty());
        assert!(params.access_key.is_empty());
        assert!(params.secret_key.is_empty());
        clear_sdk_env();
    }

    #[test]
    fn sdk_config_reads_env_overrides() {
        let _guard = ENV_LOCK.lock();
        std::env::set_var(ENV_HEALTHCHECK_INTERVAL, "5");
        std::env::set_var(ENV_SERVICE_CALL_TIMEOUT, "3");
        std::env::remove_var(ENV_HEALTHCHECK_TIMEOUT);

        let config = SdkConfig::from_env();
        assert_eq!(config.healthcheck_interval, Duration::from_secs(5));
        assert_eq!(config.service_call_timeout, Duration::from_secs(3));
        assert_eq!(config.healthcheck_timeout, SdkConfig::default().healthcheck_timeout);

        std::env::remove_var(ENV_HEALTHCHECK_INTERVAL);
        std::env::remove_var(ENV_SERVICE_CALL_TIMEOUT);
    }
}
