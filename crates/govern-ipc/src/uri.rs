//! Governor binding URI: `{scheme}://{host}:{port}/{appName}`
//!
//! This is the value substituted for the IPC pragma token in a child's
//! launch arguments, and the address a governed child dials back to.

use govern_util::AppName;
use std::fmt;

use crate::{SipcError, SipcResult};

/// Parsed form of a governor binding URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingUri {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub app: AppName,
}

impl BindingUri {
    pub fn new(
        scheme: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        app: AppName,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            host: host.into(),
            port,
            app,
        }
    }

    /// Parse `scheme://host:port/appName`
    pub fn parse(s: &str) -> SipcResult<Self> {
        let (scheme, rest) = s
            .split_once("://")
            .ok_or_else(|| SipcError::InvalidUri(format!("missing scheme: {s}")))?;

        let (authority, app) = rest
            .split_once('/')
            .ok_or_else(|| SipcError::InvalidUri(format!("missing app name: {s}")))?;

        let (host, port) = authority
            .rsplit_once(':')
            .ok_or_else(|| SipcError::InvalidUri(format!("missing port: {s}")))?;

        let port: u16 = port
            .parse()
            .map_err(|_| SipcError::InvalidUri(format!("bad port: {s}")))?;

        if scheme.is_empty() || host.is_empty() || app.is_empty() {
            return Err(SipcError::InvalidUri(s.to_string()));
        }

        Ok(Self {
            scheme: scheme.to_string(),
            host: host.to_string(),
            port,
            app: AppName::new(app),
        })
    }
}

impl fmt::Display for BindingUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}://{}:{}/{}",
            self.scheme, self.host, self.port, self.app
        )
    }
}
