//! `watch`: subscribe to datarefs and print sampled values.

use anyhow::Result;
use std::time::{Duration, Instant};
use xplane_udp_client::{ClientConfig, DatarefHandle, XPlaneClient};

use crate::commands::{WatchArgs, start_client, wait_for_simulator};
use crate::error::CliError;
use crate::output::{self, Sample, SampleValue};

struct Watched {
    label: String,
    handle: DatarefHandle,
    len: usize,
}

pub async fn execute(
    args: &WatchArgs,
    config: ClientConfig,
    timeout: Duration,
    json: bool,
) -> Result<()> {
    if args.datarefs.is_empty() && args.arrays.is_empty() {
        return Err(CliError::InvalidArgument(
            "nothing to watch: pass at least one dataref or --array NAME:LEN".to_string(),
        )
        .into());
    }

    let client = start_client(config)?;
    let mut watched = Vec::with_capacity(args.datarefs.len() + args.arrays.len());
    for name in &args.datarefs {
        let handle = client
            .add_dataref(name, args.freq, None)
            .map_err(CliError::from)?;
        watched.push(Watched {
            label: name.clone(),
            handle,
            len: 1,
        });
    }
    for spec in &args.arrays {
        let handle = client
            .add_dataref_array(&spec.name, spec.len, args.freq)
            .map_err(CliError::from)?;
        watched.push(Watched {
            label: format!("{}[0..{}]", spec.name, spec.len),
            handle,
            len: spec.len,
        });
    }

    let simulator = wait_for_simulator(&client, timeout).await?;
    if !json {
        output::print_simulator(&simulator, false);
    }

    let started = Instant::now();
    let mut ticker = tokio::time::interval(Duration::from_millis(args.interval_ms));
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut seq = 0u64;
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut ctrl_c => break,
        }
        seq += 1;
        let sample = take_sample(&client, &watched, seq, started)?;
        output::print_sample(&sample, json);
        if args.count.is_some_and(|count| seq >= count) {
            break;
        }
    }
    Ok(())
}

fn take_sample(
    client: &XPlaneClient,
    watched: &[Watched],
    seq: u64,
    started: Instant,
) -> Result<Sample> {
    let mut datarefs = Vec::with_capacity(watched.len());
    for entry in watched {
        let mut values = vec![0.0f32; entry.len];
        let available = client
            .get_dataref_array(entry.handle, &mut values, f32::NAN)
            .map_err(CliError::from)?;
        datarefs.push(SampleValue {
            name: entry.label.clone(),
            available,
            values,
        });
    }
    Ok(Sample {
        seq,
        elapsed_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        connected: client.is_connected(),
        datarefs,
    })
}
