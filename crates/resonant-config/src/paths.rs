//! Platform-specific paths for the server config file.
//!
//! - **User config**: `~/.config/resonant/` (Linux), `~/Library/Application Support/resonant/` (macOS), `%APPDATA%\resonant\` (Windows)
//! - **System config**: `/usr/share/resonant/` (Linux), `/Library/Application Support/resonant/` (macOS)

use std::path::PathBuf;

const APP_NAME: &str = "resonant";
const CONFIG_FILENAME: &str = "server.toml";

/// Returns the user-specific configuration directory.
///
/// Returns a fallback path if the config directory cannot be determined.
pub fn user_config_dir() -> PathBuf {
    dirs::config_dir().unwrap_or_else(|| PathBuf::from(".")).join(APP_NAME)
}

/// Returns the system-wide configuration directory.
///
/// This directory is typically read-only and holds the distribution's
/// default config.
pub fn system_config_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/usr/share").join(APP_NAME)
    }
    #[cfg(target_os = "macos")]
    {
        PathBuf::from("/Library/Application Support").join(APP_NAME)
    }
    #[cfg(target_os = "windows")]
    {
        dirs::data_dir().unwrap_or_else(|| PathBuf::from("C:\\ProgramData")).join(APP_NAME)
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join(APP_NAME)
    }
}

/// Finds the server config file by name or path.
///
/// Searches, in order:
/// 1. `name` itself, if it is already a valid file path
/// 2. The user config directory
/// 3. The system config directory
///
/// `name` with no extension is assumed to be `server.toml`.
pub fn find_config(name: &str) -> Option<PathBuf> {
    let path = PathBuf::from(name);
    if path.is_file() {
        return Some(path);
    }

    let filename = if name.ends_with(".toml") { name.to_string() } else { CONFIG_FILENAME.to_string() };

    let user_path = user_config_dir().join(&filename);
    if user_path.is_file() {
        return Some(user_path);
    }

    let system_path = system_config_dir().join(&filename);
    if system_path.is_file() {
        return Some(system_path);
    }

    None
}

/// Ensures the user config directory exists, creating it if necessary.
pub fn ensure_user_config_dir() -> Result<PathBuf, crate::ConfigError> {
    let dir = user_config_dir();
    if !dir.exists() {
        std::fs::create_dir_all(&dir).map_err(|e| crate::ConfigError::create_dir(&dir, e))?;
    }
    Ok(dir)
}
