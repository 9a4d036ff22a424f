use std::time::Duration;

use tracing::{info, warn};

use crate::app::adb::parse::parse_device_list;
use crate::app::adb::runner::{run_command_with_timeout, with_output, DEFAULT_COMMAND_TIMEOUT};
use crate::app::error::AppError;
use crate::app::models::{target_address, DeviceEntry};

/// The adb operations the connection controller dispatches.
pub trait DeviceBridge: Send + Sync {
    fn connect(&self, ip: &str, port: u16, trace_id: &str) -> Result<String, AppError>;
    fn pair(&self, ip: &str, port: u16, code: &str, trace_id: &str) -> Result<String, AppError>;
    fn list_devices(&self, trace_id: &str) -> Result<Vec<DeviceEntry>, AppError>;
    fn disconnect(&self, id: &str, trace_id: &str) -> Result<String, AppError>;
    fn version(&self, trace_id: &str) -> Result<String, AppError>;
}

#[derive(Debug, Clone)]
pub struct AdbCommandExecutor {
    program: String,
    timeout: Duration,
}

impl AdbCommandExecutor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Runs `<program> <args...>`; succeeds only on exit code 0 within the timeout.
    pub fn execute(&self, args: &[String], trace_id: &str) -> Result<String, AppError> {
        let output = run_command_with_timeout(&self.program, args, self.timeout, trace_id)?;
        if output.succeeded() {
            return Ok(output.output);
        }
        let exit_code = output
            .exit_code
            .map(|code| code.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        warn!(
            trace_id = %trace_id,
            subcommand = args.first().map(String::as_str).unwrap_or_default(),
            exit_code = %exit_code,
            "adb command failed"
        );
        Err(AppError::dependency(
            with_output(
                format!("Command failed with exit code: {exit_code}"),
                &output.output,
            ),
            trace_id,
        ))
    }
}

impl DeviceBridge for AdbCommandExecutor {
    fn connect(&self, ip: &str, port: u16, trace_id: &str) -> Result<String, AppError> {
        let target = target_address(ip, port);
        info!(trace_id = %trace_id, address = %target, "adb connect");
        self.execute(&["connect".to_string(), target], trace_id)
    }

    fn pair(&self, ip: &str, port: u16, code: &str, trace_id: &str) -> Result<String, AppError> {
        let target = target_address(ip, port);
        info!(trace_id = %trace_id, address = %target, "adb pair");
        self.execute(&["pair".to_string(), target, code.to_string()], trace_id)
    }

    fn list_devices(&self, trace_id: &str) -> Result<Vec<DeviceEntry>, AppError> {
        let output = self.execute(&["devices".to_string()], trace_id)?;
        Ok(parse_device_list(&output))
    }

    fn disconnect(&self, id: &str, trace_id: &str) -> Result<String, AppError> {
        info!(trace_id = %trace_id, device = %id, "adb disconnect");
        self.execute(&["disconnect".to_string(), id.to_string()], trace_id)
    }

    fn version(&self, trace_id: &str) -> Result<String, AppError> {
        self.execute(&["version".to_string()], trace_id)
    }
}

#[cfg(all(test, unix))]
pub(crate) mod tests {
    use super::*;

    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    /// Writes an executable shell script standing in for adb. Every invocation
    /// appends its arguments to `calls.log` next to the script.
    pub(crate) fn write_fake_adb(dir: &Path, body: &str) -> PathBuf {
        let script = dir.join("adb");
        let log = dir.join("calls.log");
        let contents = format!(
            "#!/bin/sh\n[ \"$1\" = \"__probe\" ] && exit 0\necho \"$@\" >> '{}'\n{}\n",
            log.display(),
            body
        );
        fs::write(&script, contents).expect("write fake adb");
        let mut perms = fs::metadata(&script).expect("metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&script, perms).expect("chmod");

        // Another test thread forking while we held the file open for writing
        // can make exec fail with ETXTBSY for a moment.
        for _ in 0..50 {
            match std::process::Command::new(&script).arg("__probe").status() {
                Ok(_) => break,
                Err(err) if err.raw_os_error() == Some(26) => {
                    std::thread::sleep(Duration::from_millis(20));
                }
                Err(err) => panic!("fake adb is not executable: {err}"),
            }
        }
        script
    }

    pub(crate) fn recorded_calls(dir: &Path) -> Vec<String> {
        fs::read_to_string(dir.join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    const FAKE_ADB: &str = r#"case "$1" in
  devices) printf 'List of devices attached\n192.168.1.5:5555\tdevice\nemulator-5554\toffline\n' ;;
  connect) echo "connected to $2" ;;
  pair) echo "Successfully paired to $2 [guid=adb-XYZ]" ;;
  disconnect) echo "disconnected $2" ;;
  version) printf 'Android Debug Bridge version 1.0.41\nVersion 35.0.2-12147458\n' ;;
  fail) echo "boom" >&2; exit 1 ;;
esac"#;

    fn executor(dir: &Path) -> AdbCommandExecutor {
        AdbCommandExecutor::new(write_fake_adb(dir, FAKE_ADB).display().to_string())
    }

    #[test]
    fn execute_succeeds_on_exit_zero() {
        let dir = tempfile::tempdir().expect("tempdir");
        let output = executor(dir.path())
            .execute(&["connect".to_string(), "10.0.0.2:5555".to_string()], "t-ok")
            .expect("expected success");
        assert_eq!(output, "connected to 10.0.0.2:5555\n");
    }

    #[test]
    fn execute_fails_with_exit_code_and_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = executor(dir.path())
            .execute(&["fail".to_string()], "t-fail")
            .expect_err("expected failure");
        assert_eq!(err.code, "ERR_DEPENDENCY");
        assert!(err.error.contains("exit code: 1"));
        assert!(err.error.contains("boom"));
    }

    #[test]
    fn execute_times_out() {
        let dir = tempfile::tempdir().expect("tempdir");
        let script = write_fake_adb(dir.path(), "exec sleep 30");
        let err = AdbCommandExecutor::new(script.display().to_string())
            .with_timeout(Duration::from_millis(200))
            .execute(&["devices".to_string()], "t-timeout")
            .expect_err("expected timeout");
        assert_eq!(err.code, "ERR_TIMEOUT");
    }

    #[test]
    fn derived_operations_build_expected_arguments() {
        let dir = tempfile::tempdir().expect("tempdir");
        let adb = executor(dir.path());
        adb.pair("192.168.1.5", 37000, "123456", "t-1").expect("pair");
        adb.connect("192.168.1.5", 5555, "t-2").expect("connect");
        adb.disconnect("192.168.1.5:5555", "t-3").expect("disconnect");
        adb.version("t-4").expect("version");
        assert_eq!(
            recorded_calls(dir.path()),
            vec![
                "pair 192.168.1.5:37000 123456",
                "connect 192.168.1.5:5555",
                "disconnect 192.168.1.5:5555",
                "version",
            ]
        );
    }

    #[test]
    fn list_devices_parses_tool_output() {
        let dir = tempfile::tempdir().expect("tempdir");
        let devices = executor(dir.path()).list_devices("t-list").expect("devices");
        assert_eq!(
            devices,
            vec![
                DeviceEntry::new("192.168.1.5:5555", "device"),
                DeviceEntry::new("emulator-5554", "offline"),
            ]
        );
    }

    #[test]
    fn version_is_returned_verbatim() {
        let dir = tempfile::tempdir().expect("tempdir");
        let version = executor(dir.path()).version("t-version").expect("version");
        assert_eq!(
            version,
            "Android Debug Bridge version 1.0.41\nVersion 35.0.2-12147458\n"
        );
    }
}
