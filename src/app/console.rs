use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Local;
use crossterm::style::{Color, Stylize};
use tracing::warn;
use uuid::Uuid;

use crate::app::adb::executor::DeviceBridge;
use crate::app::config::{backup_preferences_path, save_preferences_to_path, Preferences};
use crate::app::error::AppError;
use crate::app::models::{
    split_address, ConnectionMode, ConnectionOutcome, ConnectionRequest, DeviceEntry, StatusTone,
};
use crate::app::state::{ConnectionController, RefreshTrigger, UiEmitter, UiMessage};
use crate::app::view::DeviceListView;

/// Everything the UI loop consumes: worker messages and user input share one channel.
#[derive(Debug)]
pub enum ConsoleEvent {
    Ui(UiMessage),
    Line(String),
    InputClosed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellCommand {
    Connect { address: String },
    Pair { address: String, code: String },
    /// Submit with the current mode; address falls back to the remembered one.
    Go { address: Option<String>, code: String },
    Mode(ConnectionMode),
    Refresh,
    Devices,
    Disconnect { id: String, confirmed: bool },
    Version,
    HideVersion,
    Minimize,
    Restore,
    Help,
    Quit,
}

pub const HELP_TEXT: &str = "Commands:
  connect ADDR[:PORT]        connect to a device over Wi-Fi
  pair ADDR[:PORT] CODE      pair using a pairing code
  mode connect|pair          select the mode used by `go`
  go [ADDR[:PORT]] [CODE]    submit with the current mode (defaults to the last address)
  refresh                    reload the device list
  devices                    show the device list
  disconnect ID [--yes]      disconnect an online device (asks first without --yes)
  version                    show the adb version
  hide-version               stop showing the adb version at startup
  minimize | restore         simulate the window leaving/returning
  help | quit";

pub fn parse_shell_command(line: &str) -> Result<ShellCommand, String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some((&head, rest)) = tokens.split_first() else {
        return Err("empty command".to_string());
    };
    let command = match (head.to_lowercase().as_str(), rest) {
        ("connect", [address]) => ShellCommand::Connect {
            address: address.to_string(),
        },
        ("connect", _) => return Err("usage: connect ADDR[:PORT]".to_string()),
        ("pair", [address]) => ShellCommand::Pair {
            address: address.to_string(),
            code: String::new(),
        },
        ("pair", [address, code]) => ShellCommand::Pair {
            address: address.to_string(),
            code: code.to_string(),
        },
        ("pair", _) => return Err("usage: pair ADDR[:PORT] CODE".to_string()),
        ("go", []) => ShellCommand::Go {
            address: None,
            code: String::new(),
        },
        ("go", [address]) => ShellCommand::Go {
            address: Some(address.to_string()),
            code: String::new(),
        },
        ("go", [address, code]) => ShellCommand::Go {
            address: Some(address.to_string()),
            code: code.to_string(),
        },
        ("go", _) => return Err("usage: go [ADDR[:PORT]] [CODE]".to_string()),
        ("mode", [value]) => match ConnectionMode::parse(value) {
            Some(mode) => ShellCommand::Mode(mode),
            None => return Err("usage: mode connect|pair".to_string()),
        },
        ("refresh", []) => ShellCommand::Refresh,
        ("devices", []) => ShellCommand::Devices,
        ("disconnect", [id]) => ShellCommand::Disconnect {
            id: id.to_string(),
            confirmed: false,
        },
        ("disconnect", [id, "--yes" | "-y"]) => ShellCommand::Disconnect {
            id: id.to_string(),
            confirmed: true,
        },
        ("disconnect", _) => return Err("usage: disconnect ID [--yes]".to_string()),
        ("version", []) => ShellCommand::Version,
        ("hide-version", []) => ShellCommand::HideVersion,
        ("minimize", []) => ShellCommand::Minimize,
        ("restore", []) => ShellCommand::Restore,
        ("help", _) | ("?", _) => ShellCommand::Help,
        ("quit", _) | ("exit", _) => ShellCommand::Quit,
        (other, _) => return Err(format!("unknown command: {other} (try `help`)")),
    };
    Ok(command)
}

fn tone_color(tone: StatusTone) -> Option<Color> {
    match tone {
        StatusTone::Accent => Some(Color::Blue),
        StatusTone::Warning => Some(Color::Rgb {
            r: 0xf2,
            g: 0xc6,
            b: 0x61,
        }),
        StatusTone::Danger => Some(Color::Rgb {
            r: 0xe3,
            g: 0x7d,
            b: 0x80,
        }),
        StatusTone::Neutral => None,
    }
}

pub fn render_devices<W: Write>(out: &mut W, devices: &[DeviceEntry], refreshing: bool) -> io::Result<()> {
    let suffix = if refreshing { " (refreshing...)" } else { "" };
    writeln!(out, "{}{suffix}", "Connected Devices".bold())?;
    if devices.is_empty() {
        writeln!(out, "  No devices connected")?;
        return Ok(());
    }
    for device in devices {
        let status = device.status_kind();
        let label = status.label();
        match tone_color(status.tone()) {
            Some(color) => write!(out, "  {}  {}", device.id, label.with(color))?,
            None => write!(out, "  {}  {}", device.id, label)?,
        }
        if device.can_disconnect() {
            write!(out, "  (disconnect {})", device.id)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

pub fn render_outcome<W: Write>(out: &mut W, outcome: &ConnectionOutcome) -> io::Result<()> {
    let stamp = outcome.finished_at.with_timezone(&Local).format("%H:%M:%S");
    let title = format!("{} Status", outcome.mode.display_name());
    let title = if outcome.succeeded {
        title.green()
    } else {
        title.red()
    };
    writeln!(out, "[{stamp}] {title}: {}", outcome.message.trim_end())
}

/// Owns the view and the controller; every state change goes through [`ConsoleShell::handle`].
pub struct ConsoleShell<W: Write> {
    controller: ConnectionController,
    view: DeviceListView,
    preferences: Preferences,
    preferences_path: Option<PathBuf>,
    mode: ConnectionMode,
    /// Device id waiting for a yes/no answer.
    pending_disconnect: Option<String>,
    input_closed: bool,
    out: W,
}

impl<W: Write> ConsoleShell<W> {
    pub fn new(
        controller: ConnectionController,
        preferences: Preferences,
        preferences_path: Option<PathBuf>,
        out: W,
    ) -> Self {
        Self {
            controller,
            view: DeviceListView::default(),
            preferences,
            preferences_path,
            mode: ConnectionMode::Connect,
            pending_disconnect: None,
            input_closed: false,
            out,
        }
    }

    pub fn view(&self) -> &DeviceListView {
        &self.view
    }

    pub fn preferences(&self) -> &Preferences {
        &self.preferences
    }

    pub fn mode(&self) -> ConnectionMode {
        self.mode
    }

    pub fn start(&mut self) -> io::Result<()> {
        writeln!(self.out, "ADB Manager. Type `help` for commands.")?;
        if !self.preferences.last_ip.is_empty() {
            writeln!(
                self.out,
                "Last address: {}:{}",
                self.preferences.last_ip, self.preferences.last_port
            )?;
        }
        self.controller.refresh_devices(RefreshTrigger::Startup);
        if self.preferences.show_adb_version {
            self.controller.load_version();
        }
        Ok(())
    }

    /// Returns false once the loop should stop.
    pub fn handle(&mut self, event: ConsoleEvent) -> io::Result<bool> {
        let keep_running = match event {
            ConsoleEvent::Ui(message) => {
                self.apply(message)?;
                true
            }
            ConsoleEvent::Line(line) => {
                if let Some(id) = self.pending_disconnect.take() {
                    self.answer_disconnect(&id, &line)?;
                    true
                } else if line.trim().is_empty() {
                    true
                } else {
                    match parse_shell_command(&line) {
                        Ok(command) => self.execute(command)?,
                        Err(message) => {
                            writeln!(self.out, "{message}")?;
                            true
                        }
                    }
                }
            }
            ConsoleEvent::InputClosed => {
                self.input_closed = true;
                true
            }
        };
        self.out.flush()?;
        // With stdin gone, stay only until a pending connect/pair reports back.
        Ok(keep_running && !(self.input_closed && !self.controller.in_flight().is_held()))
    }

    fn apply(&mut self, message: UiMessage) -> io::Result<()> {
        let devices_changed = matches!(
            message,
            UiMessage::DevicesRefreshed { .. }
                | UiMessage::ConnectFinished {
                    devices: Some(_),
                    ..
                }
                | UiMessage::DisconnectFinished { .. }
        );
        if let UiMessage::ConnectStarted { mode, target, .. } = &message {
            writeln!(self.out, "{}ing {target}...", mode.display_name())?;
        }
        self.view.apply(message, self.controller.in_flight());

        if let Some(outcome) = self.view.take_connection_result() {
            render_outcome(&mut self.out, &outcome)?;
        }
        if let Some(version) = self.view.take_version_dialog() {
            writeln!(self.out, "{}", "ADB Installed".bold())?;
            writeln!(self.out, "{}", version.trim_end())?;
            if self.preferences.show_adb_version {
                writeln!(self.out, "(type `hide-version` to stop showing this at startup)")?;
            }
        }
        if let Some(notice) = self.view.take_notice() {
            writeln!(self.out, "{notice}")?;
        }
        if let Some(error) = self.view.take_error() {
            writeln!(self.out, "{} {}", "Error:".red(), error.trim_end())?;
        }
        if devices_changed {
            render_devices(&mut self.out, &self.view.devices, self.view.is_refreshing)?;
        }
        Ok(())
    }

    fn execute(&mut self, command: ShellCommand) -> io::Result<bool> {
        match command {
            ShellCommand::Connect { address } => {
                self.submit(ConnectionMode::Connect, &address, "")?;
            }
            ShellCommand::Pair { address, code } => {
                self.submit(ConnectionMode::Pair, &address, &code)?;
            }
            ShellCommand::Go { address, code } => {
                let address = match address {
                    Some(address) => address,
                    None if self.preferences.last_ip.is_empty() => String::new(),
                    None => format!("{}:{}", self.preferences.last_ip, self.preferences.last_port),
                };
                self.submit(self.mode, &address, &code)?;
            }
            ShellCommand::Mode(mode) => {
                self.mode = mode;
                writeln!(self.out, "Mode: {}", mode.display_name())?;
            }
            ShellCommand::Refresh => {
                self.controller.refresh_devices(RefreshTrigger::Manual);
            }
            ShellCommand::Devices => {
                render_devices(&mut self.out, &self.view.devices, self.view.is_refreshing)?;
            }
            ShellCommand::Disconnect { id, confirmed } => {
                let online = self
                    .view
                    .devices
                    .iter()
                    .any(|device| device.id == id && device.can_disconnect());
                if !online {
                    writeln!(self.out, "{id} is not an online device")?;
                } else if confirmed {
                    self.dispatch_disconnect(&id)?;
                } else {
                    writeln!(self.out, "{}", "Disconnect device?".bold())?;
                    writeln!(self.out, "You are about to disconnect {id}. Continue? [y/N]")?;
                    self.pending_disconnect = Some(id);
                }
            }
            ShellCommand::Version => match self.view.adb_version.clone() {
                Some(version) => writeln!(self.out, "{}", version.trim_end())?,
                None => self.controller.load_version(),
            },
            ShellCommand::HideVersion => {
                self.preferences.show_adb_version = false;
                self.persist_preferences();
                writeln!(self.out, "The adb version will no longer be shown at startup.")?;
            }
            ShellCommand::Minimize => self.controller.on_visibility_change(true),
            ShellCommand::Restore => self.controller.on_visibility_change(false),
            ShellCommand::Help => writeln!(self.out, "{HELP_TEXT}")?,
            ShellCommand::Quit => return Ok(false),
        }
        Ok(true)
    }

    fn answer_disconnect(&mut self, id: &str, answer: &str) -> io::Result<()> {
        match answer.trim().to_lowercase().as_str() {
            "y" | "yes" => self.dispatch_disconnect(id),
            _ => writeln!(self.out, "Disconnect cancelled."),
        }
    }

    fn dispatch_disconnect(&mut self, id: &str) -> io::Result<()> {
        writeln!(self.out, "Disconnecting {id}...")?;
        self.controller.disconnect(id);
        Ok(())
    }

    fn submit(&mut self, mode: ConnectionMode, address: &str, code: &str) -> io::Result<()> {
        if self.controller.in_flight().is_held() {
            // Same as clicking a disabled button: nothing happens.
            return Ok(());
        }
        let trace_id = Uuid::new_v4().to_string();
        let (ip, port_text) = split_address(address);
        let request = match ConnectionRequest::new(mode, &ip, &port_text, code, &trace_id) {
            Ok(request) => request,
            Err(err) => {
                writeln!(self.out, "{} {}", "Error:".red(), err.error)?;
                return Ok(());
            }
        };
        self.preferences.last_ip = request.ip().to_string();
        self.preferences.last_port = request.port();
        self.persist_preferences();
        self.controller.attempt_connect(request);
        Ok(())
    }

    fn persist_preferences(&self) {
        let Some(path) = &self.preferences_path else {
            return;
        };
        let trace_id = Uuid::new_v4().to_string();
        if let Err(err) =
            save_preferences_to_path(&self.preferences, path, &backup_preferences_path(path), &trace_id)
        {
            warn!(trace_id = %trace_id, error = %err, "failed to save preferences");
        }
    }
}

fn spawn_input_reader(events: Sender<ConsoleEvent>) {
    thread::spawn(move || {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if events.send(ConsoleEvent::Line(line)).is_err() {
                return;
            }
        }
        let _ = events.send(ConsoleEvent::InputClosed);
    });
}

pub fn channel_emitter(events: Sender<ConsoleEvent>) -> UiEmitter {
    Arc::new(move |message| {
        let _ = events.send(ConsoleEvent::Ui(message));
    })
}

/// Interactive loop: the calling thread is the UI owner.
pub fn run_interactive(
    bridge: Arc<dyn DeviceBridge>,
    preferences: Preferences,
    preferences_path: Option<PathBuf>,
    refresh_delay: Duration,
) -> Result<(), AppError> {
    let trace_id = Uuid::new_v4().to_string();
    let io_error = |err: io::Error| AppError::system(format!("Console I/O failed: {err}"), &trace_id);

    let (events, receiver) = mpsc::channel::<ConsoleEvent>();
    let controller = ConnectionController::new(bridge, channel_emitter(events.clone()), refresh_delay)
        .map_err(io_error)?;
    spawn_input_reader(events);

    let mut shell = ConsoleShell::new(controller, preferences, preferences_path, io::stdout());
    shell.start().map_err(io_error)?;
    for event in receiver {
        if !shell.handle(event).map_err(io_error)? {
            break;
        }
    }
    Ok(())
}
