//! `pose`: print the aircraft pose record.

use anyhow::Result;
use std::time::Duration;
use xplane_udp_client::ClientConfig;

use crate::commands::{PoseArgs, start_client, wait_for_simulator};
use crate::error::CliError;
use crate::output;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

pub async fn execute(
    args: &PoseArgs,
    config: ClientConfig,
    timeout: Duration,
    json: bool,
) -> Result<()> {
    let client = start_client(config)?;
    client
        .add_pose_subscription(args.freq)
        .map_err(CliError::from)?;
    wait_for_simulator(&client, timeout).await?;

    let deadline = tokio::time::Instant::now() + timeout;
    while client.pose().is_none() {
        if tokio::time::Instant::now() >= deadline {
            return Err(CliError::NoPoseData(timeout).into());
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }

    let mut ticker = tokio::time::interval(Duration::from_millis(args.interval_ms));
    for _ in 0..args.count {
        ticker.tick().await;
        if let Some(pose) = client.pose() {
            output::print_pose(&pose, json);
        }
    }
    Ok(())
}
