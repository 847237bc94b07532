//! Wire-level data model for the fleet-service control plane.
//!
//! Every frame is a single UTF-8 JSON object carrying an `Action` tag and a
//! `RequestId`, plus action-specific fields at the top level. Requests embed
//! their body through `RequestEnvelope`; responses are parsed in two passes
//! (header first, typed body second) so status handling never depends on the
//! body shape.

mod game_session;
mod message;
mod player;
mod request;
mod response;

pub use game_session::{GameSession, UpdateReason};
pub use message::{
    actions, CreateGameSessionMessage, FrameHeader, RefreshConnectionMessage, RequestEnvelope,
    TerminateProcessMessage, UpdateGameSessionMessage,
};
pub use player::{
    AttributeType, AttributeValue, Player, PlayerSession, PlayerSessionCreationPolicy,
    PlayerSessionStatus,
};
pub use request::{
    AcceptPlayerSessionRequest, ActivateGameSessionRequest, ActivateServerProcessRequest,
    DescribePlayerSessionsRequest, GetComputeCertificateRequest, GetFleetRoleCredentialsRequest,
    HeartbeatServerProcessRequest, RemovePlayerSessionRequest, StartMatchBackfillRequest,
    StopMatchBackfillRequest, TerminateServerProcessRequest,
    UpdatePlayerSessionCreationPolicyRequest,
};
pub use response::{
    DescribePlayerSessionsResponse, GetComputeCertificateResponse,
    GetFleetRoleCredentialsResponse, NoResponseData, StartMatchBackfillResponse,
};
