//! Application layer - parameters, environment resolution, and logging.

pub mod config;
pub mod logging;

pub use config::{
    ComputeType, ProcessParameters, SdkConfig, ServerParameters, AGENTLESS_CONTAINER_PROCESS_ID,
    SDK_LANGUAGE, SDK_VERSION,
};
