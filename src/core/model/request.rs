//! Outbound request bodies, one struct per action tag.

use serde::Serialize;

use super::player::{Player, PlayerSessionCreationPolicy};

/// Registers the process with the fleet service and starts the health loop
/// server-side. Sent once per process lifetime by `process_ready`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActivateServerProcessRequest {
    pub sdk_version: String,
    pub sdk_language: String,
    pub port: i32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub log_paths: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdk_tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sdk_tool_version: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct HeartbeatServerProcessRequest {
    pub health_status: bool,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct TerminateServerProcessRequest {}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ActivateGameSessionRequest {
    pub game_session_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpdatePlayerSessionCreationPolicyRequest {
    pub game_session_id: String,
    pub player_session_policy: PlayerSessionCreationPolicy,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct AcceptPlayerSessionRequest {
    pub game_session_id: String,
    pub player_session_id: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RemovePlayerSessionRequest {
    pub game_session_id: String,
    pub player_session_id: String,
}

/// Filter for `DescribePlayerSessions`; exactly one of the three id fields
/// must be set.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribePlayerSessionsRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game_session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_session_status_filter: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StartMatchBackfillRequest {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ticket_id: String,
    pub game_session_arn: String,
    pub matchmaking_configuration_arn: String,
    pub players: Vec<Player>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StopMatchBackfillRequest {
    pub ticket_id: String,
    pub game_session_arn: String,
    pub matchmaking_configuration_arn: String,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct GetComputeCertificateRequest {}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetFleetRoleCredentialsRequest {
    pub role_arn: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub role_session_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activate_server_process_omits_absent_tool_fields() {
        let request = ActivateServerProcessRequest {
            sdk_version: "5.3.0".into(),
            sdk_language: "Rust".into(),
            port: 8080,
            log_paths: vec!["/local/game/logs".into()],
            sdk_tool_name: None,
            sdk_tool_version: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["Port"], 8080);
        assert!(value.get("SdkToolName").is_none());
        assert_eq!(value["LogPaths"][0], "/local/game/logs");
    }

    #[test]
    fn describe_player_sessions_serializes_only_set_fields() {
        let request = DescribePlayerSessionsRequest {
            player_id: Some("p-1".into()),
            limit: Some(10),
            ..Default::default()
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["PlayerId"], "p-1");
        assert_eq!(value["Limit"], 10);
        assert!(value.get("GameSessionId").is_none());
        assert!(value.get("PlayerSessionStatusFilter").is_none());
    }
}
