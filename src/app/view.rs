use crate::app::error::AppError;
use crate::app::models::{ConnectionOutcome, DeviceEntry};
use crate::app::state::{InFlightGuard, RefreshTrigger, UiMessage};

/// View state owned by the UI loop. It changes only through [`DeviceListView::apply`].
#[derive(Debug, Default)]
pub struct DeviceListView {
    pub devices: Vec<DeviceEntry>,
    pub is_connecting: bool,
    pub is_refreshing: bool,
    pub adb_version: Option<String>,
    pub last_error: Option<String>,
    pub last_notice: Option<String>,
    connection_result: Option<ConnectionOutcome>,
    version_dialog: Option<String>,
}

impl DeviceListView {
    pub fn apply(&mut self, message: UiMessage, in_flight: &InFlightGuard) {
        match message {
            UiMessage::ConnectStarted { .. } => {
                self.is_connecting = true;
            }
            UiMessage::ConnectFinished { outcome, devices } => {
                // Order matters: the guard is released last.
                self.connection_result = Some(outcome);
                if let Some(devices) = devices {
                    self.replace_devices(devices);
                }
                self.is_connecting = false;
                in_flight.release();
            }
            UiMessage::RefreshStarted { trigger } => {
                if trigger == RefreshTrigger::Manual {
                    self.is_refreshing = true;
                }
            }
            UiMessage::DevicesRefreshed { trigger, result } => {
                if trigger == RefreshTrigger::Manual {
                    self.is_refreshing = false;
                }
                self.replace_devices(result);
            }
            UiMessage::DisconnectFinished {
                id,
                result,
                devices,
            } => match result {
                Ok(_) => {
                    self.last_notice = Some(format!("Disconnected {id}"));
                    if let Some(devices) = devices {
                        self.replace_devices(devices);
                    }
                }
                Err(err) => {
                    self.last_error = Some(err.error);
                }
            },
            UiMessage::VersionLoaded(result) => match result {
                Ok(version) => {
                    self.adb_version = Some(version.clone());
                    self.version_dialog = Some(version);
                }
                Err(err) => {
                    self.last_error = Some(err.error);
                }
            },
        }
    }

    /// The result dialog is shown once; taking it clears it.
    pub fn take_connection_result(&mut self) -> Option<ConnectionOutcome> {
        self.connection_result.take()
    }

    pub fn take_version_dialog(&mut self) -> Option<String> {
        self.version_dialog.take()
    }

    pub fn take_error(&mut self) -> Option<String> {
        self.last_error.take()
    }

    pub fn take_notice(&mut self) -> Option<String> {
        self.last_notice.take()
    }

    /// A failed listing keeps the previous devices on screen.
    fn replace_devices(&mut self, result: Result<Vec<DeviceEntry>, AppError>) {
        match result {
            Ok(devices) => self.devices = devices,
            Err(err) => self.last_error = Some(err.error),
        }
    }
}
