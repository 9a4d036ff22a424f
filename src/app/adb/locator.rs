use std::path::Path;

pub const DEFAULT_ADB_PROGRAM: &str = "adb";
pub const ADB_PROGRAM_ENV: &str = "ADB_MANAGER_ADB";

pub fn normalize_command_path(value: &str) -> String {
    let trimmed = value.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = trimmed
            .strip_prefix(quote)
            .and_then(|candidate| candidate.strip_suffix(quote))
        {
            return inner.trim().to_string();
        }
    }
    trimmed.to_string()
}

/// Picks the first non-empty candidate, in priority order (flag, env, preference).
pub fn resolve_adb_program(candidates: &[Option<&str>]) -> String {
    candidates
        .iter()
        .flatten()
        .map(|candidate| normalize_command_path(candidate))
        .find(|candidate| !candidate.is_empty())
        .unwrap_or_else(|| DEFAULT_ADB_PROGRAM.to_string())
}

/// A bare program name is left to the `PATH` search at spawn time.
pub fn validate_adb_program(program: &str) -> Result<(), String> {
    if program.trim().is_empty() {
        return Err("ADB command is empty".to_string());
    }
    let path = Path::new(program);
    if path.components().count() == 1 && !path.is_absolute() {
        return Ok(());
    }
    if path.is_dir() {
        return Err("ADB path must point to an executable file".to_string());
    }
    if !path.exists() {
        return Err("ADB executable not found at the configured path".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_wrapping_quotes() {
        assert_eq!(
            normalize_command_path("  \"/opt/android/platform-tools/adb\"  "),
            "/opt/android/platform-tools/adb"
        );
        assert_eq!(
            normalize_command_path("'/opt/android/platform-tools/adb'"),
            "/opt/android/platform-tools/adb"
        );
    }

    #[test]
    fn falls_back_to_default_adb() {
        assert_eq!(resolve_adb_program(&[]), "adb");
        assert_eq!(resolve_adb_program(&[None, Some("   "), Some("")]), "adb");
    }

    #[test]
    fn earlier_candidates_win() {
        assert_eq!(
            resolve_adb_program(&[None, Some("/env/adb"), Some("/pref/adb")]),
            "/env/adb"
        );
        assert_eq!(resolve_adb_program(&[Some("'/flag/adb'"), Some("/env/adb")]), "/flag/adb");
    }

    #[test]
    fn validates_paths() {
        assert!(validate_adb_program("adb").is_ok());
        let err = validate_adb_program("/this/path/should/not/exist/adb").unwrap_err();
        assert!(err.to_lowercase().contains("not found"));
        let dir = tempfile::tempdir().expect("tempdir");
        let err = validate_adb_program(&dir.path().display().to_string()).unwrap_err();
        assert!(err.contains("executable file"));
    }
}
