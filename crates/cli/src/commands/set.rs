//! `set`: write a dataref once a simulator is found.

use anyhow::Result;
use std::time::Duration;
use xplane_udp_client::ClientConfig;

use crate::commands::{SetArgs, start_client, wait_for_simulator};
use crate::error::CliError;
use crate::output;

pub async fn execute(
    args: &SetArgs,
    config: ClientConfig,
    timeout: Duration,
    json: bool,
) -> Result<()> {
    let target = match (args.values.as_slice(), args.index) {
        ([_], Some(index)) => format!("{}[{index}]", args.dataref),
        ([_], None) => args.dataref.clone(),
        (_, Some(_)) => {
            return Err(CliError::InvalidArgument(
                "--index takes a single value".to_string(),
            )
            .into());
        }
        (_, None) => args.dataref.clone(),
    };

    let mut client = start_client(config)?;
    wait_for_simulator(&client, timeout).await?;

    match args.values.as_slice() {
        [value] => client.set_dataref(&args.dataref, *value, args.index),
        values => client.set_dataref_array(&args.dataref, values),
    }
    .map_err(CliError::from)?;

    // flushes the queued frames before returning
    client.shutdown();
    output::print_write(&target, &args.values, json);
    Ok(())
}
