//! GameLift Server SDK - control-plane client runtime for game servers.
//!
//! A game-server process embeds this runtime to manage its session against
//! the managed fleet service over a single WebSocket connection: typed
//! request/response RPCs, server-initiated notifications, a periodic health
//! heartbeat, and transparent reconnect with endpoint rotation.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── api               # Process-wide facade (init_sdk, process_ready, …)
//! ├── app/              # Parameters, env resolution, logging
//! └── core/
//!     ├── model/        # Wire envelope + typed message DTOs
//!     ├── transport/    # WebSocket transport + request correlator
//!     ├── manager       # Typed message framing and dispatch
//!     ├── state/        # Lifecycle, heartbeat, credential cache
//!     ├── auth/         # SigV4 query signing
//!     ├── container     # Container metadata fetchers
//!     └── validate      # Parameter validation
//! ```
//!
//! Most embedders use the [`api`] facade; [`core::state::GameLiftServerState`]
//! is available directly for instance-scoped embedding and tests.

pub mod api;
pub mod app;
pub mod core;
pub mod error;
