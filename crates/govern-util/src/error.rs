//! Error types for governd

use thiserror::Error;

use crate::AppName;

/// Core error type for governd operations
#[derive(Debug, Error)]
pub enum GovernError {
    #[error("Application not found: {0}")]
    AppNotFound(AppName),

    #[error("Application already running: {0}")]
    AlreadyRunning(AppName),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Spawn error: {0}")]
    SpawnError(String),

    #[error("Kill error: {0}")]
    KillError(String),

    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("Terminal error: {0}")]
    TerminalError(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GovernError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn spawn(msg: impl Into<String>) -> Self {
        Self::SpawnError(msg.into())
    }

    pub fn kill(msg: impl Into<String>) -> Self {
        Self::KillError(msg.into())
    }

    pub fn channel(msg: impl Into<String>) -> Self {
        Self::ChannelError(msg.into())
    }

    pub fn terminal(msg: impl Into<String>) -> Self {
        Self::TerminalError(msg.into())
    }

    pub fn permission(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, GovernError>;
