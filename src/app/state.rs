use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::app::adb::executor::DeviceBridge;
use crate::app::error::AppError;
use crate::app::models::{ConnectionMode, ConnectionOutcome, ConnectionRequest, DeviceEntry};
use crate::app::scheduler::CommandWorker;

pub const MANUAL_REFRESH_DELAY: Duration = Duration::from_secs(1);
const WORKER_GONE: &str = "Command worker is not running";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    Startup,
    Manual,
    /// The view came back from a minimized state.
    Restored,
}

/// Everything the worker reports back to the UI owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiMessage {
    ConnectStarted {
        mode: ConnectionMode,
        target: String,
        trace_id: String,
    },
    ConnectFinished {
        outcome: ConnectionOutcome,
        /// Present only after a successful connect.
        devices: Option<Result<Vec<DeviceEntry>, AppError>>,
    },
    RefreshStarted {
        trigger: RefreshTrigger,
    },
    DevicesRefreshed {
        trigger: RefreshTrigger,
        result: Result<Vec<DeviceEntry>, AppError>,
    },
    DisconnectFinished {
        id: String,
        result: Result<String, AppError>,
        devices: Option<Result<Vec<DeviceEntry>, AppError>>,
    },
    VersionLoaded(Result<String, AppError>),
}

pub type UiEmitter = Arc<dyn Fn(UiMessage) + Send + Sync>;

/// At most one connect/pair may hold this at a time.
#[derive(Debug, Clone, Default)]
pub struct InFlightGuard(Arc<AtomicBool>);

impl InFlightGuard {
    pub fn try_acquire(&self) -> bool {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn release(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_held(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

pub struct ConnectionController {
    bridge: Arc<dyn DeviceBridge>,
    worker: Arc<CommandWorker>,
    in_flight: InFlightGuard,
    minimized: AtomicBool,
    emitter: UiEmitter,
    refresh_delay: Duration,
}

impl ConnectionController {
    pub fn new(
        bridge: Arc<dyn DeviceBridge>,
        emitter: UiEmitter,
        refresh_delay: Duration,
    ) -> std::io::Result<Self> {
        Ok(Self {
            bridge,
            worker: Arc::new(CommandWorker::spawn("adb-worker")?),
            in_flight: InFlightGuard::default(),
            minimized: AtomicBool::new(false),
            emitter,
            refresh_delay,
        })
    }

    /// The UI owner releases this after applying `ConnectFinished`.
    pub fn in_flight(&self) -> &InFlightGuard {
        &self.in_flight
    }

    /// Returns false when nothing was dispatched: another connect/pair is in
    /// flight, or the worker is gone (then a failed `ConnectFinished` is posted).
    pub fn attempt_connect(&self, request: ConnectionRequest) -> bool {
        if !self.in_flight.try_acquire() {
            return false;
        }

        let trace_id = Uuid::new_v4().to_string();
        let mode = request.mode();
        let target = request.target();
        info!(
            trace_id = %trace_id,
            mode = mode.display_name(),
            address = %target,
            "dispatching connection request"
        );
        (self.emitter)(UiMessage::ConnectStarted {
            mode,
            target: target.clone(),
            trace_id: trace_id.clone(),
        });

        let bridge = Arc::clone(&self.bridge);
        let emitter = Arc::clone(&self.emitter);
        let job_target = target.clone();
        let job_trace_id = trace_id.clone();
        let submitted = self.worker.submit(move || {
            let trace_id = job_trace_id;
            let result = match mode {
                ConnectionMode::Connect => bridge.connect(request.ip(), request.port(), &trace_id),
                ConnectionMode::Pair => bridge.pair(
                    request.ip(),
                    request.port(),
                    request.pairing_code().unwrap_or_default(),
                    &trace_id,
                ),
            };
            let devices = match (&result, mode) {
                (Ok(_), ConnectionMode::Connect) => Some(bridge.list_devices(&trace_id)),
                _ => None,
            };
            let (succeeded, message) = match result {
                Ok(text) => (true, text),
                Err(err) => {
                    warn!(
                        trace_id = %trace_id,
                        mode = mode.display_name(),
                        error = %err,
                        "connection request failed"
                    );
                    (false, format!("Error: {}", err.error))
                }
            };
            emitter(UiMessage::ConnectFinished {
                outcome: ConnectionOutcome {
                    mode,
                    target: job_target,
                    succeeded,
                    message,
                    trace_id,
                    finished_at: Utc::now(),
                },
                devices,
            });
        });

        if !submitted {
            warn!(trace_id = %trace_id, "command worker is gone; dropping connection request");
            self.in_flight.release();
            (self.emitter)(UiMessage::ConnectFinished {
                outcome: ConnectionOutcome {
                    mode,
                    target,
                    succeeded: false,
                    message: format!("Error: {WORKER_GONE}"),
                    trace_id,
                    finished_at: Utc::now(),
                },
                devices: None,
            });
        }
        submitted
    }

    /// Does not consult the in-flight guard.
    pub fn refresh_devices(&self, trigger: RefreshTrigger) {
        (self.emitter)(UiMessage::RefreshStarted { trigger });

        let bridge = Arc::clone(&self.bridge);
        let emitter = Arc::clone(&self.emitter);
        let job = move || {
            let trace_id = Uuid::new_v4().to_string();
            let result = bridge.list_devices(&trace_id);
            if let Err(err) = &result {
                warn!(trace_id = %trace_id, error = %err, "device refresh failed");
            }
            emitter(UiMessage::DevicesRefreshed { trigger, result });
        };
        let emitter = Arc::clone(&self.emitter);
        let reject = move || {
            emitter(UiMessage::DevicesRefreshed {
                trigger,
                result: Err(worker_gone()),
            });
        };

        if trigger == RefreshTrigger::Manual && !self.refresh_delay.is_zero() {
            let worker = Arc::clone(&self.worker);
            let delay = self.refresh_delay;
            thread::spawn(move || {
                thread::sleep(delay);
                if !worker.submit(job) {
                    reject();
                }
            });
        } else if !self.worker.submit(job) {
            reject();
        }
    }

    /// Passive refresh when the view leaves the minimized state.
    pub fn on_visibility_change(&self, minimized: bool) {
        let was_minimized = self.minimized.swap(minimized, Ordering::AcqRel);
        if was_minimized && !minimized {
            self.refresh_devices(RefreshTrigger::Restored);
        }
    }

    pub fn disconnect(&self, id: &str) {
        let bridge = Arc::clone(&self.bridge);
        let emitter = Arc::clone(&self.emitter);
        let job_id = id.to_string();
        let submitted = self.worker.submit(move || {
            let trace_id = Uuid::new_v4().to_string();
            let result = bridge.disconnect(&job_id, &trace_id);
            let devices = result.as_ref().ok().map(|_| bridge.list_devices(&trace_id));
            emitter(UiMessage::DisconnectFinished {
                id: job_id,
                result,
                devices,
            });
        });
        if !submitted {
            (self.emitter)(UiMessage::DisconnectFinished {
                id: id.to_string(),
                result: Err(worker_gone()),
                devices: None,
            });
        }
    }

    pub fn load_version(&self) {
        let bridge = Arc::clone(&self.bridge);
        let emitter = Arc::clone(&self.emitter);
        let submitted = self.worker.submit(move || {
            let trace_id = Uuid::new_v4().to_string();
            emitter(UiMessage::VersionLoaded(bridge.version(&trace_id)));
        });
        if !submitted {
            (self.emitter)(UiMessage::VersionLoaded(Err(worker_gone())));
        }
    }

    /// Stops the worker after queued commands finish. Later requests report failure.
    pub fn shutdown(&self) {
        self.worker.shutdown();
    }
}

fn worker_gone() -> AppError {
    let trace_id = Uuid::new_v4().to_string();
    warn!(trace_id = %trace_id, "command worker is gone; dropping request");
    AppError::system(WORKER_GONE, trace_id)
}
