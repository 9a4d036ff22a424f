use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use crate::app::adb::executor::{AdbCommandExecutor, DeviceBridge};
use crate::app::config::{
    backup_preferences_path, load_preferences_from_path, save_preferences_to_path,
};
use crate::app::console::render_devices;
use crate::app::error::AppError;
use crate::app::models::{split_address, ConnectionMode, ConnectionRequest};

pub const USAGE: &str = "Usage: adb_manager [--adb PATH] [--json] [devices | connect ADDR[:PORT] | pair ADDR[:PORT] CODE | disconnect ID | version]\n\
Without a command an interactive console starts.";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Args {
    pub adb: Option<String>,
    pub json: bool,
    pub command: Option<OneShot>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OneShot {
    Devices,
    Connect { address: String },
    Pair { address: String, code: String },
    Disconnect { id: String },
    Version,
}

#[derive(Debug, Serialize)]
pub struct CommandResponse<T> {
    pub trace_id: String,
    pub data: T,
}

pub fn parse_args<I>(args: I) -> Result<Args, String>
where
    I: IntoIterator<Item = String>,
{
    let mut adb = None;
    let mut json = false;
    let mut positional = Vec::new();

    let mut it = args.into_iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--adb" => {
                adb = it
                    .next()
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty());
                if adb.is_none() {
                    return Err("--adb requires a value".to_string());
                }
            }
            "--json" => {
                json = true;
            }
            "-h" | "--help" => return Err(USAGE.to_string()),
            other if other.starts_with("--") => return Err(format!("Unknown arg: {other}")),
            _ => positional.push(arg),
        }
    }

    let command = match positional
        .iter()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .as_slice()
    {
        [] => None,
        ["devices"] => Some(OneShot::Devices),
        ["version"] => Some(OneShot::Version),
        ["connect", address] => Some(OneShot::Connect {
            address: address.to_string(),
        }),
        ["pair", address] => Some(OneShot::Pair {
            address: address.to_string(),
            code: String::new(),
        }),
        ["pair", address, code] => Some(OneShot::Pair {
            address: address.to_string(),
            code: code.to_string(),
        }),
        ["disconnect", id] => Some(OneShot::Disconnect { id: id.to_string() }),
        _ => return Err(format!("Unknown command: {}\n{USAGE}", positional.join(" "))),
    };

    Ok(Args { adb, json, command })
}

/// Runs a single command synchronously and prints its result.
pub fn run_one_shot<W: Write>(
    executor: &AdbCommandExecutor,
    command: OneShot,
    json: bool,
    preferences_path: Option<&Path>,
    out: &mut W,
) -> Result<(), AppError> {
    let trace_id = Uuid::new_v4().to_string();
    let io_error = |err: std::io::Error| AppError::system(format!("Failed to write output: {err}"), &trace_id);

    let text = match command {
        OneShot::Devices => {
            let devices = executor.list_devices(&trace_id)?;
            if json {
                return print_json(out, &trace_id, &devices);
            }
            return render_devices(out, &devices, false).map_err(io_error);
        }
        OneShot::Connect { address } => {
            let request = build_request(ConnectionMode::Connect, &address, "", &trace_id)?;
            remember_address(preferences_path, &request, &trace_id);
            executor.connect(request.ip(), request.port(), &trace_id)?
        }
        OneShot::Pair { address, code } => {
            let request = build_request(ConnectionMode::Pair, &address, &code, &trace_id)?;
            remember_address(preferences_path, &request, &trace_id);
            executor.pair(
                request.ip(),
                request.port(),
                request.pairing_code().unwrap_or_default(),
                &trace_id,
            )?
        }
        OneShot::Disconnect { id } => executor.disconnect(&id, &trace_id)?,
        OneShot::Version => executor.version(&trace_id)?,
    };

    if json {
        return print_json(out, &trace_id, &text);
    }
    writeln!(out, "{}", text.trim_end()).map_err(io_error)
}

fn build_request(
    mode: ConnectionMode,
    address: &str,
    code: &str,
    trace_id: &str,
) -> Result<ConnectionRequest, AppError> {
    let (ip, port_text) = split_address(address);
    ConnectionRequest::new(mode, &ip, &port_text, code, trace_id)
}

fn remember_address(preferences_path: Option<&Path>, request: &ConnectionRequest, trace_id: &str) {
    let Some(path) = preferences_path else {
        return;
    };
    let result = load_preferences_from_path(path, trace_id).and_then(|mut preferences| {
        preferences.last_ip = request.ip().to_string();
        preferences.last_port = request.port();
        save_preferences_to_path(&preferences, path, &backup_preferences_path(path), trace_id)
    });
    if let Err(err) = result {
        warn!(trace_id = %trace_id, error = %err, "failed to remember address");
    }
}

fn print_json<W: Write, T: Serialize>(out: &mut W, trace_id: &str, data: &T) -> Result<(), AppError> {
    let response = CommandResponse {
        trace_id: trace_id.to_string(),
        data,
    };
    let payload = serde_json::to_string_pretty(&response)
        .map_err(|err| AppError::system(format!("Failed to serialize output: {err}"), trace_id))?;
    writeln!(out, "{payload}")
        .map_err(|err| AppError::system(format!("Failed to write output: {err}"), trace_id))
}
