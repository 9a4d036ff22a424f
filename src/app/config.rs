use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app::error::AppError;
use crate::app::models::DEFAULT_ADB_PORT;

pub const PREFERENCES_PATH_ENV: &str = "ADB_MANAGER_PREFERENCES_PATH";
const PREFERENCES_FILE_NAME: &str = ".adb_manager_preferences.json";
const BACKUP_FILE_NAME: &str = ".adb_manager_preferences.backup.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Preferences {
    pub last_ip: String,
    pub last_port: u16,
    pub show_adb_version: bool,
    /// Empty means `adb` from `PATH`.
    pub adb_path: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            last_ip: String::new(),
            last_port: DEFAULT_ADB_PORT,
            show_adb_version: true,
            adb_path: String::new(),
        }
    }
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

pub fn preferences_path() -> PathBuf {
    if let Ok(path) = std::env::var(PREFERENCES_PATH_ENV) {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    home_dir().join(PREFERENCES_FILE_NAME)
}

pub fn backup_preferences_path(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) => parent.join(BACKUP_FILE_NAME),
        None => home_dir().join(BACKUP_FILE_NAME),
    }
}

pub fn load_preferences(trace_id: &str) -> Result<Preferences, AppError> {
    load_preferences_from_path(&preferences_path(), trace_id)
}

pub fn load_preferences_from_path(path: &Path, trace_id: &str) -> Result<Preferences, AppError> {
    if !path.exists() {
        return Ok(Preferences::default());
    }
    let raw = fs::read_to_string(path)
        .map_err(|err| AppError::system(format!("Failed to read preferences: {err}"), trace_id))?;
    let value: serde_json::Value = serde_json::from_str(&raw)
        .map_err(|err| AppError::system(format!("Failed to parse preferences: {err}"), trace_id))?;
    Ok(validate_preferences(preferences_from_value(&value)))
}

pub fn save_preferences_to_path(
    preferences: &Preferences,
    path: &Path,
    backup_path: &Path,
    trace_id: &str,
) -> Result<(), AppError> {
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    if path.exists() {
        let _ = fs::copy(path, backup_path);
    }
    let payload = serde_json::to_string_pretty(preferences).map_err(|err| {
        AppError::system(format!("Failed to serialize preferences: {err}"), trace_id)
    })?;
    fs::write(path, payload)
        .map_err(|err| AppError::system(format!("Failed to write preferences: {err}"), trace_id))?;
    Ok(())
}

/// Reads each key on its own so one malformed value does not reset the rest.
fn preferences_from_value(value: &serde_json::Value) -> Preferences {
    let mut preferences = Preferences::default();
    if let Some(last_ip) = value.get("last_ip").and_then(|v| v.as_str()) {
        preferences.last_ip = last_ip.to_string();
    }
    if let Some(last_port) = value.get("last_port") {
        let parsed = match last_port {
            serde_json::Value::Number(number) => number.as_u64(),
            serde_json::Value::String(text) => text.trim().parse::<u64>().ok(),
            _ => None,
        };
        if let Some(port) = parsed.and_then(|port| u16::try_from(port).ok()) {
            preferences.last_port = port;
        }
    }
    if let Some(show) = value.get("show_adb_version") {
        match show {
            serde_json::Value::Bool(flag) => preferences.show_adb_version = *flag,
            serde_json::Value::String(text) => {
                preferences.show_adb_version = text.trim().eq_ignore_ascii_case("true")
            }
            _ => {}
        }
    }
    if let Some(adb_path) = value.get("adb_path").and_then(|v| v.as_str()) {
        preferences.adb_path = adb_path.to_string();
    }
    preferences
}

fn validate_preferences(mut preferences: Preferences) -> Preferences {
    if preferences.last_port == 0 {
        preferences.last_port = DEFAULT_ADB_PORT;
    }
    preferences.last_ip = preferences.last_ip.trim().to_string();
    preferences
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let prefs = load_preferences_from_path(&dir.path().join("missing.json"), "t-1")
            .expect("defaults");
        assert_eq!(prefs, Preferences::default());
        assert_eq!(prefs.last_port, 5555);
        assert!(prefs.show_adb_version);
    }

    #[test]
    fn round_trips_and_keeps_backup() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("prefs.json");
        let backup = dir.path().join("prefs.backup.json");

        let first = Preferences {
            last_ip: "192.168.1.5".to_string(),
            ..Preferences::default()
        };
        save_preferences_to_path(&first, &path, &backup, "t-2").expect("save");
        assert!(!backup.exists());

        let second = Preferences {
            last_ip: "10.0.0.2".to_string(),
            last_port: 37123,
            show_adb_version: false,
            adb_path: "/opt/platform-tools/adb".to_string(),
        };
        save_preferences_to_path(&second, &path, &backup, "t-2").expect("save");

        assert_eq!(load_preferences_from_path(&path, "t-2").expect("load"), second);
        assert_eq!(load_preferences_from_path(&backup, "t-2").expect("load"), first);
    }

    #[test]
    fn tolerates_string_values_and_bad_fields() {
        let value = serde_json::json!({
            "last_ip": " 10.0.0.9 ",
            "last_port": "4444",
            "show_adb_version": "FALSE",
            "adb_path": 42
        });
        let prefs = validate_preferences(preferences_from_value(&value));
        assert_eq!(prefs.last_ip, "10.0.0.9");
        assert_eq!(prefs.last_port, 4444);
        assert!(!prefs.show_adb_version);
        assert_eq!(prefs.adb_path, "");
    }

    #[test]
    fn clamps_invalid_port() {
        let value = serde_json::json!({ "last_port": 0 });
        assert_eq!(validate_preferences(preferences_from_value(&value)).last_port, 5555);
        let value = serde_json::json!({ "last_port": 70000 });
        assert_eq!(validate_preferences(preferences_from_value(&value)).last_port, 5555);
    }

    #[test]
    fn rejects_unparseable_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("prefs.json");
        fs::write(&path, "not json").expect("write");
        let err = load_preferences_from_path(&path, "t-3").expect_err("expected error");
        assert_eq!(err.code, "ERR_SYSTEM");
    }
}
