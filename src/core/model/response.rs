//! Typed response bodies. Responses arrive with their fields at the top
//! level of the frame, so each struct here parses straight from the raw
//! frame after the header check.

use serde::Deserialize;

use super::player::PlayerSession;

/// Placeholder for actions whose response carries no data beyond the header.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoResponseData {}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DescribePlayerSessionsResponse {
    #[serde(default)]
    pub next_token: Option<String>,
    #[serde(default)]
    pub player_sessions: Vec<PlayerSession>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StartMatchBackfillResponse {
    #[serde(default)]
    pub ticket_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetComputeCertificateResponse {
    #[serde(default)]
    pub certificate_path: String,
    #[serde(default)]
    pub compute_name: String,
}

/// Fleet-role credentials; `expiration` is epoch milliseconds.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GetFleetRoleCredentialsResponse {
    #[serde(default)]
    pub assumed_role_user_arn: String,
    #[serde(default)]
    pub assumed_role_id: String,
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub secret_access_key: String,
    #[serde(default)]
    pub session_token: String,
    #[serde(default)]
    pub expiration: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_parse_from_full_frame() {
        let raw = r#"{
            "Action": "GetFleetRoleCredentials",
            "RequestId": "r-9",
            "StatusCode": 200,
            "AccessKeyId": "AKIAEXAMPLE",
            "SecretAccessKey": "secret",
            "SessionToken": "token",
            "Expiration": 1700003600000
        }"#;
        let response: GetFleetRoleCredentialsResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.access_key_id, "AKIAEXAMPLE");
        assert_eq!(response.expiration, 1_700_003_600_000);
    }

    #[test]
    fn describe_player_sessions_defaults_to_empty() {
        let response: DescribePlayerSessionsResponse = serde_json::from_str("{}").unwrap();
        assert!(response.player_sessions.is_empty());
        assert!(response.next_token.is_none());
    }
}
