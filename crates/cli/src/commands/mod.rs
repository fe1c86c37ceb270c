//! Command implementations for the xpudp CLI

pub mod beacon;
pub mod pose;
pub mod set;
pub mod watch;

use anyhow::Result;
use clap::Args;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, warn};
use xplane_udp_client::{ClientConfig, SimulatorInfo, XPlaneClient};

use crate::error::CliError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Scalar datarefs to watch (`name` or `name[index]`)
    pub datarefs: Vec<String>,

    /// Array datarefs as NAME:LEN, e.g. sim/flightmodel/engine/ENGN_N1_:8
    #[arg(short, long = "array", value_name = "NAME:LEN")]
    pub arrays: Vec<ArraySpec>,

    /// Update rate requested from the simulator (Hz)
    #[arg(short, long, default_value_t = 5)]
    pub freq: i32,

    /// Print interval in milliseconds
    #[arg(short, long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval_ms: u64,

    /// Stop after this many samples
    #[arg(short = 'n', long)]
    pub count: Option<u64>,
}

#[derive(Args, Debug)]
pub struct SetArgs {
    /// Dataref name
    pub dataref: String,

    /// Value to write; several values write `name[0]`, `name[1]`, ...
    #[arg(required = true, num_args = 1.., allow_negative_numbers = true)]
    pub values: Vec<f32>,

    /// Array element to write (single value only)
    #[arg(short, long)]
    pub index: Option<usize>,
}

#[derive(Args, Debug)]
pub struct PoseArgs {
    /// Update rate requested from the simulator (Hz)
    #[arg(short, long, default_value_t = 5, value_parser = clap::value_parser!(i32).range(1..))]
    pub freq: i32,

    /// Number of records to print
    #[arg(short = 'n', long, default_value_t = 1)]
    pub count: u64,

    /// Print interval in milliseconds
    #[arg(short, long, default_value_t = 1000, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval_ms: u64,
}

/// `NAME:LEN` array subscription argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArraySpec {
    pub name: String,
    pub len: usize,
}

impl FromStr for ArraySpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, len) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("expected NAME:LEN, got '{s}'"))?;
        if name.is_empty() {
            return Err(format!("missing array name in '{s}'"));
        }
        let len: usize = len
            .parse()
            .map_err(|e| format!("invalid array length '{len}': {e}"))?;
        if len == 0 {
            return Err("array length must be at least 1".to_string());
        }
        Ok(Self {
            name: name.to_string(),
            len,
        })
    }
}

/// Load the client configuration, falling back to defaults.
pub fn load_config(path: Option<&Path>) -> Result<ClientConfig> {
    match path {
        Some(path) => ClientConfig::load(path).map_err(|e| {
            anyhow::Error::from(CliError::InvalidConfiguration(format!(
                "{}: {e}",
                path.display()
            )))
        }),
        None => Ok(ClientConfig::default()),
    }
}

/// Start a client that logs connectivity changes.
pub fn start_client(config: ClientConfig) -> Result<XPlaneClient> {
    let client = XPlaneClient::new(config).map_err(CliError::from)?;
    client.set_connection_callback(|connected| {
        if connected {
            info!("Simulator connected");
        } else {
            warn!("Simulator beacon lost");
        }
    });
    Ok(client)
}

/// Poll until a simulator has been discovered.
pub async fn wait_for_simulator(client: &XPlaneClient, timeout: Duration) -> Result<SimulatorInfo> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Some(simulator) = client.simulator() {
            return Ok(simulator);
        }
        if tokio::time::Instant::now() >= deadline {
            return Err(CliError::SimulatorNotFound(timeout).into());
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn test_array_spec_parse() -> TestResult {
        let spec: ArraySpec = "sim/flightmodel/engine/ENGN_N1_:8".parse()?;
        assert_eq!(spec.name, "sim/flightmodel/engine/ENGN_N1_");
        assert_eq!(spec.len, 8);
        Ok(())
    }

    #[test]
    fn test_array_spec_rejects_bad_input() {
        assert!("no-length".parse::<ArraySpec>().is_err());
        assert!(":4".parse::<ArraySpec>().is_err());
        assert!("name:0".parse::<ArraySpec>().is_err());
        assert!("name:x".parse::<ArraySpec>().is_err());
    }

    #[test]
    fn test_load_config_defaults() -> TestResult {
        let config = load_config(None)?;
        assert_eq!(config, ClientConfig::default());
        Ok(())
    }

    #[test]
    fn test_load_config_reports_path() -> TestResult {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "beacon_timeout_ms: 0\n")?;
        let err = load_config(Some(&path)).err().ok_or("expected an error")?;
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::InvalidConfiguration(_))
        ));
        Ok(())
    }
}
