use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::error::AppError;

pub const DEFAULT_ADB_PORT: u16 = 5555;

/// One row of `adb devices` output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeviceEntry {
    pub id: String,
    pub status: String,
}

impl DeviceEntry {
    pub fn new(id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: status.into(),
        }
    }

    pub fn status_kind(&self) -> DeviceStatus {
        DeviceStatus::from_raw(&self.status)
    }

    pub fn can_disconnect(&self) -> bool {
        self.status_kind() == DeviceStatus::Device
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceStatus {
    Device,
    Unauthorized,
    Offline,
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusTone {
    Accent,
    Warning,
    Danger,
    Neutral,
}

impl DeviceStatus {
    pub fn from_raw(raw: &str) -> Self {
        match raw {
            "device" => Self::Device,
            "unauthorized" => Self::Unauthorized,
            "offline" => Self::Offline,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Device => "Device".to_string(),
            Self::Unauthorized => "Unauthorized".to_string(),
            Self::Offline => "Offline".to_string(),
            Self::Other(raw) => capitalize(raw),
        }
    }

    pub fn tone(&self) -> StatusTone {
        match self {
            Self::Device => StatusTone::Accent,
            Self::Unauthorized => StatusTone::Warning,
            Self::Offline => StatusTone::Danger,
            Self::Other(_) => StatusTone::Neutral,
        }
    }
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    Connect,
    Pair,
}

impl ConnectionMode {
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Connect => "Connect",
            Self::Pair => "Pair",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "connect" => Some(Self::Connect),
            "pair" => Some(Self::Pair),
            _ => None,
        }
    }
}

/// A connect/pair request that has passed validation and is ready to dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionRequest {
    mode: ConnectionMode,
    ip: String,
    port: u16,
    pairing_code: Option<String>,
}

impl ConnectionRequest {
    pub fn new(
        mode: ConnectionMode,
        ip: &str,
        port_text: &str,
        pairing_code: &str,
        trace_id: &str,
    ) -> Result<Self, AppError> {
        let ip = ip.trim();
        if ip.is_empty() {
            return Err(AppError::validation("address is required", trace_id));
        }
        let pairing_code = match mode {
            ConnectionMode::Connect => None,
            ConnectionMode::Pair => {
                let code = pairing_code.trim();
                if code.is_empty() {
                    return Err(AppError::validation("Pairing code is required", trace_id));
                }
                Some(code.to_string())
            }
        };
        Ok(Self {
            mode,
            ip: ip.to_string(),
            port: parse_port(port_text),
            pairing_code,
        })
    }

    pub fn mode(&self) -> ConnectionMode {
        self.mode
    }

    pub fn ip(&self) -> &str {
        &self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn pairing_code(&self) -> Option<&str> {
        self.pairing_code.as_deref()
    }

    pub fn target(&self) -> String {
        target_address(&self.ip, self.port)
    }
}

pub fn parse_port(text: &str) -> u16 {
    text.trim().parse::<u16>().unwrap_or(DEFAULT_ADB_PORT)
}

pub fn target_address(ip: &str, port: u16) -> String {
    format!("{ip}:{port}")
}

/// Splits `host:port` input into host and raw port text (empty when absent).
pub fn split_address(input: &str) -> (String, String) {
    let trimmed = input.trim();
    match trimmed.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() => (host.to_string(), port.to_string()),
        _ => (trimmed.to_string(), String::new()),
    }
}

/// Result text of a finished connect/pair, shown once as a dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionOutcome {
    pub mode: ConnectionMode,
    pub target: String,
    pub succeeded: bool,
    pub message: String,
    pub trace_id: String,
    pub finished_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_statuses_to_labels_and_tones() {
        let device = DeviceStatus::from_raw("device");
        assert_eq!(device.label(), "Device");
        assert_eq!(device.tone(), StatusTone::Accent);
        assert_eq!(DeviceStatus::from_raw("unauthorized").tone(), StatusTone::Warning);
        assert_eq!(DeviceStatus::from_raw("offline").label(), "Offline");
        assert_eq!(DeviceStatus::from_raw("offline").tone(), StatusTone::Danger);
    }

    #[test]
    fn capitalizes_unknown_statuses() {
        let status = DeviceStatus::from_raw("recovery");
        assert_eq!(status.label(), "Recovery");
        assert_eq!(status.tone(), StatusTone::Neutral);
        assert_eq!(DeviceStatus::from_raw("").label(), "");
    }

    #[test]
    fn only_online_devices_can_disconnect() {
        assert!(DeviceEntry::new("192.168.1.5:5555", "device").can_disconnect());
        assert!(!DeviceEntry::new("emulator-5554", "offline").can_disconnect());
    }

    #[test]
    fn pair_request_requires_pairing_code() {
        let err = ConnectionRequest::new(ConnectionMode::Pair, "192.168.1.5", "37000", "  ", "t-1")
            .expect_err("expected validation error");
        assert!(err.is_validation());
        assert_eq!(err.trace_id, "t-1");
        assert!(err.error.contains("Pairing code"));
    }

    #[test]
    fn connect_request_ignores_pairing_code() {
        let request =
            ConnectionRequest::new(ConnectionMode::Connect, " 192.168.1.5 ", "5556", "123456", "t-2")
                .expect("valid request");
        assert_eq!(request.ip(), "192.168.1.5");
        assert_eq!(request.port(), 5556);
        assert_eq!(request.pairing_code(), None);
        assert_eq!(request.target(), "192.168.1.5:5556");
    }

    #[test]
    fn request_rejects_blank_address() {
        let err = ConnectionRequest::new(ConnectionMode::Connect, "", "5555", "", "t-3")
            .expect_err("expected validation error");
        assert!(err.is_validation());
    }

    #[test]
    fn non_numeric_port_defaults_to_5555() {
        assert_eq!(parse_port("abc"), 5555);
        assert_eq!(parse_port(""), 5555);
        assert_eq!(parse_port("70000"), 5555);
        assert_eq!(parse_port(" 4444 "), 4444);
        let request = ConnectionRequest::new(ConnectionMode::Pair, "10.0.0.2", "port", "999999", "t-4")
            .expect("valid request");
        assert_eq!(request.port(), DEFAULT_ADB_PORT);
    }

    #[test]
    fn splits_host_and_port() {
        assert_eq!(
            split_address("10.0.0.2:37123"),
            ("10.0.0.2".to_string(), "37123".to_string())
        );
        assert_eq!(split_address("10.0.0.2"), ("10.0.0.2".to_string(), String::new()));
        let (_, port) = split_address("10.0.0.2:x");
        assert_eq!(parse_port(&port), DEFAULT_ADB_PORT);
    }

    #[test]
    fn parses_connection_mode() {
        assert_eq!(ConnectionMode::parse("PAIR"), Some(ConnectionMode::Pair));
        assert_eq!(ConnectionMode::parse("connect"), Some(ConnectionMode::Connect));
        assert_eq!(ConnectionMode::parse("other"), None);
    }
}
