//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Governor listen settings
    #[serde(default)]
    pub governor: RawGovernor,

    /// Applications the governor manages
    #[serde(default)]
    pub applications: Vec<RawApplication>,
}

/// Governor-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawGovernor {
    /// Host to bind the control channel on (default: 127.0.0.1)
    pub bind_host: Option<String>,

    /// Port to bind the control channel on (default: 0, OS-assigned)
    pub bind_port: Option<u16>,

    /// URI scheme used in pragma substitution (default: sipc)
    pub scheme: Option<String>,
}

/// Raw application definition
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawApplication {
    /// Unique application name
    pub name: String,

    /// Seconds to wait for a graceful exit before force-killing.
    /// Zero kills immediately if the process has not already exited.
    pub stop_timeout_seconds: Option<u64>,

    /// Opaque start section. The activator reads `working-directory`,
    /// `executable`, `args`, and `ipc-pragma`; other keys are carried
    /// but not interpreted here.
    #[serde(default)]
    pub start: BTreeMap<String, String>,
}
