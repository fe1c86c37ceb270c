//! Output formatting for CLI responses

use anyhow::Error;
use colored::*;
use serde::Serialize;
use serde_json::{Value, json};
use xplane_udp_client::{PoseRecord, SimulatorInfo};

use crate::error::CliError;

/// One watched dataref in a sample.
#[derive(Debug, Clone, Serialize)]
pub struct SampleValue {
    pub name: String,
    pub available: bool,
    pub values: Vec<f32>,
}

/// One line of `watch` output.
#[derive(Debug, Clone, Serialize)]
pub struct Sample {
    pub seq: u64,
    pub elapsed_ms: u64,
    pub connected: bool,
    pub datarefs: Vec<SampleValue>,
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("Failed to format output as JSON: {e}"),
    }
}

/// Print error in JSON format
pub fn print_error_json(error: &Error) {
    let error_json = json!({
        "success": false,
        "error": {
            "message": error.to_string(),
            "type": error_type_name(error)
        }
    });
    print_json(&error_json);
}

/// Print error in human-readable format
pub fn print_error_human(error: &Error) {
    eprintln!("{} {}", "Error:".red().bold(), error);

    let mut source = error.source();
    while let Some(err) = source {
        eprintln!("  {} {}", "Caused by:".yellow(), err);
        source = err.source();
    }
}

fn error_type_name(error: &Error) -> &'static str {
    match error.downcast_ref::<CliError>() {
        Some(CliError::SimulatorNotFound(_)) => "simulator_not_found",
        Some(CliError::NoPoseData(_)) => "no_pose_data",
        Some(CliError::InvalidArgument(_)) => "invalid_argument",
        Some(CliError::InvalidConfiguration(_)) => "invalid_configuration",
        Some(CliError::Client(_)) => "client_error",
        None => "error",
    }
}

fn simulator_json(simulator: &SimulatorInfo) -> Value {
    let beacon = &simulator.beacon;
    json!({
        "address": simulator.addr.to_string(),
        "host": beacon.host.to_string(),
        "version": beacon.version,
        "role": beacon.role.to_string(),
        "port": beacon.port,
        "computer_name": beacon.computer_name,
        "beacon_version": format!("{}.{}", beacon.major_version, beacon.minor_version),
    })
}

/// Print discovered simulator details
pub fn print_simulator(simulator: &SimulatorInfo, json: bool) {
    if json {
        print_json(&json!({
            "success": true,
            "simulator": simulator_json(simulator)
        }));
        return;
    }

    let beacon = &simulator.beacon;
    println!("{} {}", "●".green(), "Simulator found".bold());
    println!("  Address: {}", simulator.addr);
    println!("  Host: {} {}", beacon.host, format_version(beacon.version));
    println!("  Role: {}", beacon.role);
    if let Some(name) = &beacon.computer_name {
        println!("  Computer: {name}");
    }
}

/// `120100` -> `12.1.0`
fn format_version(version: i32) -> String {
    if version <= 0 {
        return version.to_string();
    }
    format!(
        "{}.{}.{}",
        version / 10_000,
        (version / 100) % 100,
        version % 100
    )
}

/// Print a `watch` sample
pub fn print_sample(sample: &Sample, json: bool) {
    if json {
        match serde_json::to_string(sample) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("Failed to format sample as JSON: {e}"),
        }
        return;
    }

    let status = if sample.connected {
        "●".green()
    } else {
        "●".red()
    };
    println!("{} {} +{}ms", status, format!("#{}", sample.seq).bold(), sample.elapsed_ms);
    for value in &sample.datarefs {
        let rendered = if value.available {
            value
                .values
                .iter()
                .map(|v| format!("{v:.4}"))
                .collect::<Vec<_>>()
                .join(", ")
        } else {
            "inactive".dimmed().to_string()
        };
        println!("  {} = {}", value.name, rendered);
    }
}

/// Print a pose record
pub fn print_pose(pose: &PoseRecord, json: bool) {
    if json {
        match serde_json::to_string(&pose_json(pose)) {
            Ok(s) => println!("{s}"),
            Err(e) => eprintln!("Failed to format pose as JSON: {e}"),
        }
        return;
    }

    println!(
        "{} lat {:.6} lon {:.6} elev {:.1} m agl {:.1} m",
        "Pose:".bold(),
        pose.latitude,
        pose.longitude,
        pose.elevation,
        pose.agl
    );
    println!(
        "  pitch {:.2} roll {:.2} track {:.2} | v ({:.2}, {:.2}, {:.2}) | rates ({:.2}, {:.2}, {:.2})",
        pose.pitch,
        pose.roll,
        pose.track,
        pose.vx,
        pose.vy,
        pose.vz,
        pose.roll_rate,
        pose.pitch_rate,
        pose.yaw_rate
    );
}

fn pose_json(pose: &PoseRecord) -> Value {
    json!({
        "longitude": pose.longitude,
        "latitude": pose.latitude,
        "elevation": pose.elevation,
        "agl": pose.agl,
        "pitch": pose.pitch,
        "track": pose.track,
        "roll": pose.roll,
        "velocity": [pose.vx, pose.vy, pose.vz],
        "roll_rate": pose.roll_rate,
        "pitch_rate": pose.pitch_rate,
        "yaw_rate": pose.yaw_rate,
    })
}

/// Print confirmation of a dataref write
pub fn print_write(dataref: &str, values: &[f32], json: bool) {
    if json {
        print_json(&json!({
            "success": true,
            "dataref": dataref,
            "values": values,
        }));
    } else {
        println!("{} {} <- {:?}", "✓".green(), dataref.bold(), values);
    }
}
