//! Game session entity and update reasons.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A game session as announced by the service.
///
/// Mutated only by inbound `CreateGameSession` / `UpdateGameSession`
/// notifications; the SDK stamps `fleet_id` from its own state before the
/// session reaches the game callback.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GameSession {
    #[serde(default)]
    pub game_session_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub fleet_id: String,
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
    pub game_properties: HashMap<String, String>,
}

/// Why an `UpdateGameSession` notification was sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpdateReason {
    MatchmakingDataUpdated,
    BackfillFailed,
    BackfillTimedOut,
    BackfillCancelled,
    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_reason_parses_known_values() {
        let reason: UpdateReason = serde_json::from_str("\"MATCHMAKING_DATA_UPDATED\"").unwrap();
        assert_eq!(reason, UpdateReason::MatchmakingDataUpdated);
        let reason: UpdateReason = serde_json::from_str("\"BACKFILL_TIMED_OUT\"").unwrap();
        assert_eq!(reason, UpdateReason::BackfillTimedOut);
    }

    #[test]
    fn update_reason_falls_back_on_unknown() {
        let reason: UpdateReason = serde_json::from_str("\"SOMETHING_NEW\"").unwrap();
        assert_eq!(reason, UpdateReason::Unknown);
    }
}
