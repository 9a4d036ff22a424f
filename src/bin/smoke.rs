use std::time::{Duration, Instant};

use adb_manager_lib::app::adb::executor::{AdbCommandExecutor, DeviceBridge};
use adb_manager_lib::app::adb::locator::{resolve_adb_program, validate_adb_program, ADB_PROGRAM_ENV};
use adb_manager_lib::app::adb::parse::parse_version_headline;
use adb_manager_lib::app::config::load_preferences;
use adb_manager_lib::app::logging::init_logging;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct Args {
    adb: Option<String>,
    json: bool,
    timeout_secs: Option<u64>,
}

#[derive(Serialize)]
struct SmokeSummary {
    tool: &'static str,
    status: &'static str,
    trace_id: String,
    adb_program: String,
    checks: Vec<SmokeCheck>,
}

#[derive(Serialize)]
struct SmokeCheck {
    name: &'static str,
    status: &'static str, // pass|fail
    duration_ms: u128,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--adb" => {
                let value = it
                    .next()
                    .ok_or_else(|| "--adb requires a value".to_string())?;
                args.adb = Some(value);
            }
            "--json" => {
                args.json = true;
            }
            "--timeout" => {
                let value = it
                    .next()
                    .ok_or_else(|| "--timeout requires a value".to_string())?;
                let secs = value
                    .parse::<u64>()
                    .map_err(|_| format!("--timeout expects seconds, got {value}"))?;
                args.timeout_secs = Some(secs);
            }
            "-h" | "--help" => {
                return Err(
                    "Usage: cargo run --bin smoke -- [--adb PATH] [--json] [--timeout SECS]\n"
                        .to_string(),
                );
            }
            other => return Err(format!("Unknown arg: {other}")),
        }
    }
    Ok(args)
}

fn run_check<F>(checks: &mut Vec<SmokeCheck>, name: &'static str, f: F) -> bool
where
    F: FnOnce() -> Result<String, (String, String)>,
{
    let start = Instant::now();
    let (status, detail, error_code, error) = match f() {
        Ok(detail) => ("pass", Some(detail), None, None),
        Err((code, err)) => ("fail", None, Some(code), Some(err)),
    };
    checks.push(SmokeCheck {
        name,
        status,
        duration_ms: start.elapsed().as_millis(),
        detail,
        error_code,
        error,
    });
    status == "pass"
}

fn main() {
    let args = match parse_args() {
        Ok(v) => v,
        Err(msg) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
    };
    init_logging("warn");

    let trace_id = Uuid::new_v4().to_string();
    let preferences = load_preferences(&trace_id).unwrap_or_default();
    let env_program = std::env::var(ADB_PROGRAM_ENV).ok();
    let adb_program = resolve_adb_program(&[
        args.adb.as_deref(),
        env_program.as_deref(),
        Some(preferences.adb_path.as_str()),
    ]);

    let mut executor = AdbCommandExecutor::new(adb_program.clone());
    if let Some(secs) = args.timeout_secs {
        executor = executor.with_timeout(Duration::from_secs(secs));
    }

    let mut checks = Vec::new();
    let mut ok = run_check(&mut checks, "adb_program", || {
        validate_adb_program(&adb_program)
            .map(|_| adb_program.clone())
            .map_err(|err| ("ERR_VALIDATION".to_string(), err))
    });
    if ok {
        ok = run_check(&mut checks, "adb_version", || {
            executor
                .version(&trace_id)
                .map(|output| parse_version_headline(&output).unwrap_or_default())
                .map_err(|err| (err.code, err.error))
        });
    }
    if ok {
        ok = run_check(&mut checks, "adb_devices", || {
            executor
                .list_devices(&trace_id)
                .map(|devices| {
                    let online = devices.iter().filter(|d| d.can_disconnect()).count();
                    format!("{} device(s), {online} online", devices.len())
                })
                .map_err(|err| (err.code, err.error))
        });
    }

    let summary = SmokeSummary {
        tool: "adb_manager_smoke",
        status: if ok { "pass" } else { "fail" },
        trace_id,
        adb_program,
        checks,
    };

    if args.json {
        match serde_json::to_string_pretty(&summary) {
            Ok(payload) => println!("{payload}"),
            Err(err) => eprintln!("Failed to serialize summary: {err}"),
        }
    } else {
        println!("smoke: {} (trace_id={})", summary.status, summary.trace_id);
        for check in &summary.checks {
            let note = check
                .detail
                .as_deref()
                .or(check.error.as_deref())
                .unwrap_or_default();
            println!(
                "  {:<12} {:<4} {:>5}ms  {}",
                check.name,
                check.status,
                check.duration_ms,
                note.lines().next().unwrap_or_default()
            );
        }
    }

    if !ok {
        std::process::exit(1);
    }
}
