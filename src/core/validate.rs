//! Parameter validation applied at the state's public entry points.
//!
//! Pure functions; every rejection is an `Error::Validation` naming the
//! offending field.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::app::config::{ComputeType, ServerParameters};
use crate::core::model::{
    DescribePlayerSessionsRequest, GetFleetRoleCredentialsRequest, PlayerSessionStatus,
    StartMatchBackfillRequest, StopMatchBackfillRequest,
};
use crate::error::{Error, Result};

pub const PORT_MIN: i32 = 1025;
pub const PORT_MAX: i32 = 60000;

const MAX_ID_LENGTH: usize = 128;
const MAX_TICKET_ID_LENGTH: usize = 128;
const MIN_ROLE_SESSION_NAME_LENGTH: usize = 2;
const MAX_ROLE_SESSION_NAME_LENGTH: usize = 64;

static FLEET_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9.-]+$").expect("fleet id pattern"));

static HOST_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9-]+(/[a-zA-Z0-9-]+)?$").expect("host id pattern"));

static TICKET_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9-.]*$").expect("ticket id pattern"));

static ROLE_SESSION_NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w+=,.@-]*$").expect("role session name pattern"));

/// Generic AWS ARN shape, used where the resource type is not ours to pin.
static ARN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^arn:(aws|aws-cn|aws-us-gov):\S+:\S*:\d*:\S+$").expect("arn pattern")
});

/// GameLift-specific ARN, required for matchmaking configuration.
static GAMELIFT_ARN_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^arn:(aws|aws-cn):gamelift:[a-z0-9-]+:\d*:[a-z]+/[a-zA-Z0-9-.]+$")
        .expect("gamelift arn pattern")
});

pub fn validate_websocket_url(url: &str) -> Result<()> {
    if url.is_empty() {
        return Err(Error::validation("WebSocketUrl", "must be present"));
    }
    Ok(())
}

pub fn validate_process_id(process_id: &str) -> Result<()> {
    if process_id.is_empty() {
        return Err(Error::validation("ProcessId", "must be present"));
    }
    Ok(())
}

pub fn validate_fleet_id(fleet_id: &str) -> Result<()> {
    if fleet_id.is_empty() || fleet_id.len() > MAX_ID_LENGTH {
        return Err(Error::validation(
            "FleetId",
            format!("must be 1..{MAX_ID_LENGTH} characters"),
        ));
    }
    if !FLEET_ID_PATTERN.is_match(fleet_id) {
        return Err(Error::validation(
            "FleetId",
            "may contain only letters, digits, '.' and '-'",
        ));
    }
    Ok(())
}

pub fn validate_host_id(host_id: &str) -> Result<()> {
    if host_id.is_empty() || host_id.len() > MAX_ID_LENGTH {
        return Err(Error::validation(
            "HostId",
            format!("must be 1..{MAX_ID_LENGTH} characters"),
        ));
    }
    if !HOST_ID_PATTERN.is_match(host_id) {
        return Err(Error::validation(
            "HostId",
            "must match <name> or <name>/<name> using letters, digits and '-'",
        ));
    }
    Ok(())
}

pub fn validate_port(port: i32) -> Result<()> {
    if !(PORT_MIN..=PORT_MAX).contains(&port) {
        return Err(Error::validation(
            "Port",
            format!("must be within [{PORT_MIN}, {PORT_MAX}], got {port}"),
        ));
    }
    Ok(())
}

pub fn validate_game_session_arn(game_session_id: &str) -> Result<()> {
    if !ARN_PATTERN.is_match(game_session_id) {
        return Err(Error::validation("GameSessionId", "must be a valid ARN"));
    }
    Ok(())
}

pub fn validate_matchmaking_configuration_arn(arn: &str) -> Result<()> {
    if !GAMELIFT_ARN_PATTERN.is_match(arn) {
        return Err(Error::validation(
            "MatchmakingConfigurationArn",
            "must be a valid GameLift configuration ARN",
        ));
    }
    Ok(())
}

pub fn validate_ticket_id(ticket_id: &str) -> Result<()> {
    if ticket_id.len() > MAX_TICKET_ID_LENGTH {
        return Err(Error::validation(
            "TicketId",
            format!("must be at most {MAX_TICKET_ID_LENGTH} characters"),
        ));
    }
    if !TICKET_ID_PATTERN.is_match(ticket_id) {
        return Err(Error::validation(
            "TicketId",
            "may contain only letters, digits, '-' and '.'",
        ));
    }
    Ok(())
}

pub fn validate_role_session_name(name: &str) -> Result<()> {
    if name.len() < MIN_ROLE_SESSION_NAME_LENGTH || name.len() > MAX_ROLE_SESSION_NAME_LENGTH {
        return Err(Error::validation(
            "RoleSessionName",
            format!(
                "must be {MIN_ROLE_SESSION_NAME_LENGTH}..{MAX_ROLE_SESSION_NAME_LENGTH} characters"
            ),
        ));
    }
    if !ROLE_SESSION_NAME_PATTERN.is_match(name) {
        return Err(Error::validation(
            "RoleSessionName",
            "may contain only word characters and '+=,.@-'",
        ));
    }
    Ok(())
}

pub fn validate_describe_player_sessions(request: &DescribePlayerSessionsRequest) -> Result<()> {
    let set = [
        request.game_session_id.as_deref(),
        request.player_session_id.as_deref(),
        request.player_id.as_deref(),
    ]
    .iter()
    .filter(|v| v.is_some_and(|s| !s.is_empty()))
    .count();
    if set != 1 {
        return Err(Error::validation(
            "DescribePlayerSessionsRequest",
            "exactly one of GameSessionId, PlayerSessionId or PlayerId must be set",
        ));
    }
    if let Some(game_session_id) = request.game_session_id.as_deref() {
        validate_game_session_arn(game_session_id)?;
    }
    if let Some(filter) = request.player_session_status_filter.as_deref() {
        if !PlayerSessionStatus::VALID_FILTERS.contains(&filter) {
            return Err(Error::validation(
                "PlayerSessionStatusFilter",
                format!(
                    "must be one of {:?}, got {filter:?}",
                    PlayerSessionStatus::VALID_FILTERS
                ),
            ));
        }
    }
    Ok(())
}

pub fn validate_start_match_backfill(request: &StartMatchBackfillRequest) -> Result<()> {
    validate_ticket_id(&request.ticket_id)?;
    validate_matchmaking_configuration_arn(&request.matchmaking_configuration_arn)?;
    if request.game_session_arn.is_empty() {
        return Err(Error::validation("GameSessionArn", "must be present"));
    }
    Ok(())
}

pub fn validate_stop_match_backfill(request: &StopMatchBackfillRequest) -> Result<()> {
    validate_ticket_id(&request.ticket_id)?;
    validate_matchmaking_configuration_arn(&request.matchmaking_configuration_arn)?;
    if request.game_session_arn.is_empty() {
        return Err(Error::validation("GameSessionArn", "must be present"));
    }
    Ok(())
}

pub fn validate_get_fleet_role_credentials(request: &GetFleetRoleCredentialsRequest) -> Result<()> {
    if request.role_arn.is_empty() {
        return Err(Error::validation("RoleArn", "must be present"));
    }
    validate_role_session_name(&request.role_session_name)
}

/// Full server-parameter check applied during `init`.
///
/// Exactly one authentication strategy must be active: an auth token, or the
/// SigV4 group (region + access key + secret). On container compute the
/// region alone suffices because credentials are fetched from the metadata
/// endpoint.
pub fn validate_server_parameters(
    params: &ServerParameters,
    compute_type: ComputeType,
) -> Result<()> {
    validate_websocket_url(&params.websocket_url)?;
    validate_process_id(&params.process_id)?;
    validate_fleet_id(&params.fleet_id)?;
    if compute_type != ComputeType::Container {
        validate_host_id(&params.host_id)?;
    }

    let has_token = !params.auth_token.is_empty();
    let has_sigv4 = if compute_type == ComputeType::Container {
        !params.aws_region.is_empty()
    } else {
        !params.aws_region.is_empty()
            && !params.access_key.is_empty()
            && !params.secret_key.is_empty()
    };

    match (has_token, has_sigv4) {
        (true, false) => Ok(()),
        (false, true) => Ok(()),
        (true, true) => Err(Error::validation(
            "AuthToken",
            "auth token and AWS credentials are mutually exclusive",
        )),
        (false, false) => Err(Error::validation(
            "AuthToken",
            "either an auth token or AWS region credentials must be provided",
        )),
    }
}
