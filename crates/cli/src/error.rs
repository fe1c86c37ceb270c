//! Error types for the xpudp CLI

use std::time::Duration;
use thiserror::Error;
use xplane_udp_client::XPlaneError;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("No simulator beacon received within {0:?}")]
    SimulatorNotFound(Duration),

    #[error("No pose update received within {0:?}")]
    NoPoseData(Duration),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Client error: {0}")]
    Client(#[from] XPlaneError),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::SimulatorNotFound(_) | Self::NoPoseData(_) => 2,
            Self::InvalidArgument(_) | Self::InvalidConfiguration(_) => 4,
            Self::Client(_) => 5,
        }
    }
}
