//! Crash-log path resolution for governd
//!
//! The governed host writes its crash file to `$GOVERND_HOME` when that is
//! set and writable, falling back to the current working directory.

use std::path::PathBuf;

/// Environment variable naming the preferred crash-log directory
pub const GOVERND_HOME_ENV: &str = "GOVERND_HOME";

/// Get the preferred crash-log directory, if one is designated.
pub fn crash_home_dir() -> Option<PathBuf> {
    match std::env::var(GOVERND_HOME_ENV) {
        Ok(dir) if !dir.trim().is_empty() => Some(PathBuf::from(dir)),
        _ => None,
    }
}

/// Get the fallback crash-log directory: the current working directory,
/// or `.` if even that cannot be resolved.
pub fn crash_fallback_dir() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
