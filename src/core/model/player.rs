//! Player-facing entities: sessions, matchmaking players, attributes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Player session lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerSessionStatus {
    Reserved,
    Active,
    Completed,
    Timedout,
    #[serde(other)]
    NotSet,
}

impl PlayerSessionStatus {
    pub const VALID_FILTERS: [&'static str; 4] = ["RESERVED", "ACTIVE", "COMPLETED", "TIMEDOUT"];
}

/// Whether a game session accepts new player sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerSessionCreationPolicy {
    AcceptAll,
    DenyAll,
}

impl PlayerSessionCreationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AcceptAll => "ACCEPT_ALL",
            Self::DenyAll => "DENY_ALL",
        }
    }
}

impl std::fmt::Display for PlayerSessionCreationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A player session as returned by `DescribePlayerSessions`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlayerSession {
    #[serde(default)]
    pub player_session_id: String,
    #[serde(default)]
    pub player_id: String,
    #[serde(default)]
    pub game_session_id: String,
    #[serde(default)]
    pub fleet_id: String,
    #[serde(default)]
    pub ip_address: String,
    #[serde(default)]
    pub port: i32,
    #[serde(default)]
    pub dns_name: String,
    #[serde(default)]
    pub creation_time: i64,
    #[serde(default)]
    pub termination_time: i64,
    #[serde(default)]
    pub status: Option<PlayerSessionStatus>,
    #[serde(default)]
    pub player_data: String,
}

/// Matchmaking attribute value; exactly one of the typed fields is set
/// according to `attr_type`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct AttributeValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attr_type: Option<AttributeType>,
    #[serde(rename = "S", default, skip_serializing_if = "Option::is_none")]
    pub s: Option<String>,
    #[serde(rename = "N", default, skip_serializing_if = "Option::is_none")]
    pub n: Option<f64>,
    #[serde(rename = "SL", default, skip_serializing_if = "Option::is_none")]
    pub sl: Option<Vec<String>>,
    #[serde(rename = "SDM", default, skip_serializing_if = "Option::is_none")]
    pub sdm: Option<HashMap<String, f64>>,
}

impl AttributeValue {
    pub fn string(value: impl Into<String>) -> Self {
        Self { attr_type: Some(AttributeType::String), s: Some(value.into()), ..Self::default() }
    }

    pub fn double(value: f64) -> Self {
        Self { attr_type: Some(AttributeType::Double), n: Some(value), ..Self::default() }
    }

    pub fn string_list(values: Vec<String>) -> Self {
        Self { attr_type: Some(AttributeType::StringList), sl: Some(values), ..Self::default() }
    }

    pub fn string_double_map(values: HashMap<String, f64>) -> Self {
        Self {
            attr_type: Some(AttributeType::StringDoubleMap),
            sdm: Some(values),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttributeType {
    String,
    Double,
    StringList,
    StringDoubleMap,
}

/// A player entry in a match backfill request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Player {
    #[serde(default)]
    pub player_id: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub player_attributes: HashMap<String, AttributeValue>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub team: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub latency_in_ms: HashMap<String, i32>,
}
