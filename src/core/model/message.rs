//! Frame envelope and server-initiated notification payloads.

use serde::{Deserialize, Serialize};

use super::game_session::GameSession;

/// Action tags used on the wire.
pub mod actions {
    // Outbound request actions.
    pub const ACTIVATE_SERVER_PROCESS: &str = "ActivateServerProcess";
    pub const HEARTBEAT_SERVER_PROCESS: &str = "HeartbeatServerProcess";
    pub const TERMINATE_SERVER_PROCESS: &str = "TerminateServerProcess";
    pub const ACTIVATE_GAME_SESSION: &str = "ActivateGameSession";
    pub const UPDATE_PLAYER_SESSION_CREATION_POLICY: &str = "UpdatePlayerSessionCreationPolicy";
    pub const ACCEPT_PLAYER_SESSION: &str = "AcceptPlayerSession";
    pub const REMOVE_PLAYER_SESSION: &str = "RemovePlayerSession";
    pub const DESCRIBE_PLAYER_SESSIONS: &str = "DescribePlayerSessions";
    pub const START_MATCH_BACKFILL: &str = "StartMatchBackfill";
    pub const STOP_MATCH_BACKFILL: &str = "StopMatchBackfill";
    pub const GET_COMPUTE_CERTIFICATE: &str = "GetComputeCertificate";
    pub const GET_FLEET_ROLE_CREDENTIALS: &str = "GetFleetRoleCredentials";

    // Inbound notification actions.
    pub const CREATE_GAME_SESSION: &str = "CreateGameSession";
    pub const UPDATE_GAME_SESSION: &str = "UpdateGameSession";
    pub const REFRESH_CONNECTION: &str = "RefreshConnection";
    pub const TERMINATE_PROCESS: &str = "TerminateProcess";
}

/// Outbound frame: `Action` + `RequestId` with the typed body flattened in.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RequestEnvelope<T> {
    pub action: String,
    pub request_id: String,
    #[serde(flatten)]
    pub body: T,
}

impl<T: Serialize> RequestEnvelope<T> {
    pub fn new(action: &str, request_id: impl Into<String>, body: T) -> Self {
        Self {
            action: action.to_string(),
            request_id: request_id.into(),
            body,
        }
    }
}

/// The part of an inbound frame the correlator needs: enough to route by
/// `RequestId` or `Action`, plus the response status fields.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct FrameHeader {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl FrameHeader {
    /// True when the frame carries a success status or none at all.
    pub fn is_success(&self) -> bool {
        match self.status_code {
            None => true,
            Some(code) => (200..300).contains(&code),
        }
    }
}

/// `CreateGameSession` notification. The session fields arrive at the top
/// level of the frame rather than nested.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct CreateGameSessionMessage {
    #[serde(default)]
    pub game_session_id: String,
    #[serde(default)]
    pub game_session_name: String,
    #[serde(default)]
    pub maximum_player_session_count: i32,
    #[serde(default)]
    pub ip_address: String,
    #[serde(default)]
    pub port: i32,
    #[serde(default)]
    pub dns_name: String,
    #[serde(default)]
    pub game_session_data: String,
    #[serde(default)]
    pub matchmaker_data: String,
    #[serde(default)]
    pub game_properties: std::collections::HashMap<String, String>,
}

impl CreateGameSessionMessage {
    pub fn into_game_session(self) -> GameSession {
        GameSession {
            game_session_id: self.game_session_id,
            name: self.game_session_name,
            fleet_id: String::new(),
            maximum_player_session_count: self.maximum_player_session_count,
            ip_address: self.ip_address,
            port: self.port,
            dns_name: self.dns_name,
            game_session_data: self.game_session_data,
            matchmaker_data: self.matchmaker_data,
            game_properties: self.game_properties,
        }
    }
}

/// `UpdateGameSession` notification.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct UpdateGameSessionMessage {
    #[serde(default)]
    pub game_session: GameSession,
    #[serde(default)]
    pub update_reason: Option<super::game_session::UpdateReason>,
    #[serde(default)]
    pub backfill_ticket_id: String,
}

/// `RefreshConnection` notification: endpoint rotation with a fresh token.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct RefreshConnectionMessage {
    #[serde(default)]
    pub refresh_connection_endpoint: String,
    #[serde(default)]
    pub auth_token: String,
}

/// `TerminateProcess` notification; `TerminationTime` is epoch milliseconds.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct TerminateProcessMessage {
    #[serde(default)]
    pub termination_time: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_envelope_flattens_body() {
        #[derive(Serialize)]
        #[serde(rename_all = "PascalCase")]
        struct Body {
            game_session_id: String,
        }

        let envelope = RequestEnvelope::new(
            actions::ACTIVATE_GAME_SESSION,
            "req-1",
            Body { game_session_id: "gs-1".into() },
        );
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            value,
            json!({
                "Action": "ActivateGameSession",
                "RequestId": "req-1",
                "GameSessionId": "gs-1",
            })
        );
    }

    #[test]
    fn frame_header_tolerates_missing_fields() {
        let header: FrameHeader = serde_json::from_str("{}").unwrap();
        assert!(header.action.is_none());
        assert!(header.request_id.is_none());
        assert!(header.is_success());
    }

    #[test]
    fn frame_header_reads_status() {
        let header: FrameHeader = serde_json::from_str(
            r#"{"Action":"DescribePlayerSessions","RequestId":"r1","StatusCode":400,"ErrorMessage":"nope"}"#,
        )
        .unwrap();
        assert_eq!(header.action.as_deref(), Some("DescribePlayerSessions"));
        assert_eq!(header.request_id.as_deref(), Some("r1"));
        assert!(!header.is_success());
        assert_eq!(header.error_message.as_deref(), Some("nope"));
    }

    #[test]
    fn create_game_session_parses_top_level_fields() {
        let raw = r#"{
            "Action": "CreateGameSession",
            "RequestId": "n-1",
            "GameSessionId": "arn:aws:gamelift:us-west-2::gamesession/fleet-1/gs-1",
            "GameSessionName": "my-session",
            "MaximumPlayerSessionCount": 8,
            "IpAddress": "10.0.0.1",
            "Port": 7777,
            "GameProperties": {"mode": "ffa"}
        }"#;
        let message: CreateGameSessionMessage = serde_json::from_str(raw).unwrap();
        let session = message.into_game_session();
        assert_eq!(session.name, "my-session");
        assert_eq!(session.maximum_player_session_count, 8);
        assert_eq!(session.game_properties.get("mode").map(String::as_str), Some("ffa"));
        assert!(session.fleet_id.is_empty());
    }

    #[test]
    fn terminate_process_parses_millis() {
        let message: TerminateProcessMessage =
            serde_json::from_str(r#"{"TerminationTime": 1700000000000}"#).unwrap();
        assert_eq!(message.termination_time, 1_700_000_000_000);
    }
}
