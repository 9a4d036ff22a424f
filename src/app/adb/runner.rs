use std::io::Read;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::app::error::AppError;

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_millis(50);
// A grandchild (e.g. a freshly started adb server) may inherit the pipe and keep it open.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// Stdout and stderr as written by the child, interleaved.
    pub output: String,
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }
}

pub fn run_command_with_timeout(
    program: &str,
    args: &[String],
    timeout: Duration,
    trace_id: &str,
) -> Result<CommandOutput, AppError> {
    let (reader, writer) = std::io::pipe()
        .map_err(|err| AppError::system(format!("Failed to create output pipe: {err}"), trace_id))?;
    let stderr_writer = writer
        .try_clone()
        .map_err(|err| AppError::system(format!("Failed to create output pipe: {err}"), trace_id))?;

    // The temporary Command owns our copies of the write end; it is dropped at the end of this
    // statement so the reader sees EOF once the child (and its inheritors) close the pipe.
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(writer)
        .stderr(stderr_writer)
        .spawn()
        .map_err(|err| AppError::system(format!("Failed to spawn command: {err}"), trace_id))?;

    debug!(trace_id = %trace_id, program = %program, args = ?args, "spawned command");

    // Drain while waiting; a chatty child would otherwise block on a full pipe buffer.
    let (chunk_tx, chunks) = mpsc::channel::<Vec<u8>>();
    std::thread::spawn(move || {
        let mut reader = reader;
        let mut temp = [0u8; 4096];
        loop {
            match reader.read(&mut temp) {
                Ok(0) => break,
                Ok(count) => {
                    if chunk_tx.send(temp[..count].to_vec()).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    let mut captured = Vec::<u8>::new();
    let start = Instant::now();
    let exit_code = loop {
        captured.extend(chunks.try_iter().flatten());
        match child.try_wait() {
            Ok(Some(status)) => break status.code(),
            Ok(None) => {
                if start.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    drain_remaining(&chunks, &mut captured);
                    let output = String::from_utf8_lossy(&captured);
                    warn!(
                        trace_id = %trace_id,
                        program = %program,
                        timeout_secs = timeout.as_secs(),
                        "command timed out"
                    );
                    return Err(AppError::timeout(
                        with_output(
                            format!("Command timed out after {}s", timeout.as_secs()),
                            &output,
                        ),
                        trace_id,
                    ));
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(AppError::system(
                    format!("Failed to poll command: {err}"),
                    trace_id,
                ));
            }
        }
    };

    drain_remaining(&chunks, &mut captured);

    Ok(CommandOutput {
        output: String::from_utf8_lossy(&captured).into_owned(),
        exit_code,
    })
}

fn drain_remaining(chunks: &Receiver<Vec<u8>>, captured: &mut Vec<u8>) {
    let deadline = Instant::now() + DRAIN_GRACE;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match chunks.recv_timeout(remaining) {
            Ok(chunk) => captured.extend_from_slice(&chunk),
            // Disconnected means EOF; Timeout means someone else still holds the pipe.
            Err(_) => break,
        }
    }
}

pub(crate) fn with_output(headline: String, output: &str) -> String {
    if output.is_empty() {
        headline
    } else {
        format!("{headline}\n{output}")
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> (String, Vec<String>) {
        ("sh".to_string(), vec!["-c".to_string(), script.to_string()])
    }

    #[test]
    fn captures_stdout_and_stderr_in_one_stream() {
        let (program, args) = sh("echo out; echo err 1>&2; echo again");
        let output = run_command_with_timeout(&program, &args, Duration::from_secs(10), "t-merge")
            .expect("command should run");
        assert!(output.succeeded());
        assert_eq!(output.output, "out\nerr\nagain\n");
    }

    #[test]
    fn reports_non_zero_exit_code() {
        let (program, args) = sh("echo nope; exit 3");
        let output = run_command_with_timeout(&program, &args, Duration::from_secs(10), "t-exit")
            .expect("command should run");
        assert_eq!(output.exit_code, Some(3));
        assert!(!output.succeeded());
        assert_eq!(output.output, "nope\n");
    }

    #[test]
    fn kills_command_after_timeout() {
        let (program, args) = sh("echo started; sleep 30");
        let start = Instant::now();
        let err = run_command_with_timeout(&program, &args, Duration::from_millis(300), "t-slow")
            .expect_err("expected timeout");
        assert_eq!(err.code, "ERR_TIMEOUT");
        assert_eq!(err.trace_id, "t-slow");
        assert!(err.error.contains("started"));
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn spawn_failure_is_a_system_error() {
        let err = run_command_with_timeout(
            "/this/path/should/not/exist/adb",
            &[],
            Duration::from_secs(1),
            "t-spawn",
        )
        .expect_err("expected spawn failure");
        assert_eq!(err.code, "ERR_SYSTEM");
        assert!(err.error.contains("Failed to spawn command"));
    }

    #[test]
    fn does_not_deadlock_on_large_output() {
        let (program, args) =
            sh("i=0; while [ $i -lt 100000 ]; do echo 1234567890; i=$((i+1)); done");
        let output = run_command_with_timeout(&program, &args, Duration::from_secs(20), "t-large")
            .expect("expected large-output command to complete without timing out");
        assert_eq!(output.exit_code, Some(0));
        assert!(
            output.output.len() >= 1_000_000,
            "expected output >= 1000000, got {}",
            output.output.len()
        );
    }
}
