//! Sipc control channel for governd
//!
//! Provides:
//! - Governor-side TCP listener with a per-application session registry
//! - Child-side client that identifies itself back to the governor
//! - Binding-URI construction and parsing
//! - Line-based text protocol (advisory commands, no acknowledgement)

mod client;
mod server;
mod uri;

pub use client::*;
pub use server::*;
pub use uri::*;

use thiserror::Error;

/// The one command the governor pushes to a child: begin graceful shutdown.
pub const CMD_STOP: &str = "stop";

/// First word of the identification line a child sends on connect.
pub const HELLO_WORD: &str = "hello";

/// Sipc errors
#[derive(Debug, Error)]
pub enum SipcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Invalid binding URI: {0}")]
    InvalidUri(String),

    #[error("Invalid hello line: {0}")]
    InvalidHello(String),

    #[error("Server error: {0}")]
    ServerError(String),
}

pub type SipcResult<T> = Result<T, SipcError>;
