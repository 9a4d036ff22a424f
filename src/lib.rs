pub mod app;

use std::io;
use std::sync::Arc;

use tracing::warn;
use uuid::Uuid;

use app::adb::executor::AdbCommandExecutor;
use app::adb::locator::{resolve_adb_program, validate_adb_program, ADB_PROGRAM_ENV};
use app::cli::{parse_args, run_one_shot};
use app::config::{load_preferences, preferences_path, Preferences};
use app::console::run_interactive;
use app::logging::init_logging;
use app::state::MANUAL_REFRESH_DELAY;

/// Entry point for the `adb_manager` binary; returns the process exit code.
pub fn run() -> i32 {
    init_logging("warn");

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(message) => {
            eprintln!("{message}");
            return 2;
        }
    };

    let trace_id = Uuid::new_v4().to_string();
    let preferences = load_preferences(&trace_id).unwrap_or_else(|err| {
        warn!(trace_id = %trace_id, error = %err, "failed to load preferences; using defaults");
        Preferences::default()
    });

    let env_program = std::env::var(ADB_PROGRAM_ENV).ok();
    let program = resolve_adb_program(&[
        args.adb.as_deref(),
        env_program.as_deref(),
        Some(preferences.adb_path.as_str()),
    ]);
    if let Err(message) = validate_adb_program(&program) {
        eprintln!("{message}: {program}");
        return 2;
    }
    let executor = AdbCommandExecutor::new(program);

    let path = preferences_path();
    let result = match args.command {
        Some(command) => run_one_shot(
            &executor,
            command,
            args.json,
            Some(path.as_path()),
            &mut io::stdout(),
        ),
        None => run_interactive(
            Arc::new(executor),
            preferences,
            Some(path),
            MANUAL_REFRESH_DELAY,
        ),
    };

    match result {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{}", err.error.trim_end());
            1
        }
    }
}
