//! `beacon`: wait for a simulator beacon and describe it.

use anyhow::Result;
use std::time::Duration;
use xplane_udp_client::ClientConfig;

use crate::commands::{start_client, wait_for_simulator};
use crate::output;

pub async fn execute(config: ClientConfig, timeout: Duration, json: bool) -> Result<()> {
    let client = start_client(config)?;
    let simulator = wait_for_simulator(&client, timeout).await?;
    output::print_simulator(&simulator, json);
    Ok(())
}
