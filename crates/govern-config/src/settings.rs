//! Validated configuration types

use govern_util::AppName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::schema::{RawApplication, RawConfig, RawGovernor};

/// Start-section attribute: working directory
pub const ATTR_WORKING_DIRECTORY: &str = "working-directory";
/// Start-section attribute: executable path
pub const ATTR_EXECUTABLE: &str = "executable";
/// Start-section attribute: executable argument string
pub const ATTR_ARGS: &str = "args";
/// Start-section attribute: IPC pragma token
pub const ATTR_IPC_PRAGMA: &str = "ipc-pragma";

/// Default pragma token substituted with the governor binding URI
pub const DEFAULT_IPC_PRAGMA: &str = "{{gov}}";

/// Default graceful-stop timeout
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Validated configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub governor: GovernorSettings,
    pub applications: Vec<ApplicationConfig>,
}

/// Governor listen settings
#[derive(Debug, Clone)]
pub struct GovernorSettings {
    pub bind_host: String,
    pub bind_port: u16,
    pub scheme: String,
}

impl Default for GovernorSettings {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".into(),
            bind_port: 0,
            scheme: "sipc".into(),
        }
    }
}

/// One application the governor manages
#[derive(Debug, Clone)]
pub struct ApplicationConfig {
    pub name: AppName,
    pub stop_timeout: Duration,
    pub start: StartConfig,
}

/// Opaque key/value start section for one application.
///
/// The activator reads the attributes it knows; everything else is carried
/// untouched for external collaborators.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartConfig(BTreeMap<String, String>);

impl StartConfig {
    pub fn new(attrs: BTreeMap<String, String>) -> Self {
        Self(attrs)
    }

    /// Build a start config from key/value pairs. Test and wiring helper.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn get(&self, attr: &str) -> Option<&str> {
        self.0.get(attr).map(String::as_str)
    }

    pub fn working_directory(&self) -> Option<&str> {
        self.get(ATTR_WORKING_DIRECTORY)
    }

    pub fn executable(&self) -> Option<&str> {
        self.get(ATTR_EXECUTABLE)
    }

    pub fn args(&self) -> Option<&str> {
        self.get(ATTR_ARGS)
    }

    /// The pragma token replaced with the governor binding URI. Defaults to
    /// `{{gov}}` when the section does not override it.
    pub fn ipc_pragma(&self) -> &str {
        self.get(ATTR_IPC_PRAGMA).unwrap_or(DEFAULT_IPC_PRAGMA)
    }
}

impl Config {
    /// Convert a validated raw config into settings
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            governor: GovernorSettings::from_raw(raw.governor),
            applications: raw
                .applications
                .into_iter()
                .map(ApplicationConfig::from_raw)
                .collect(),
        }
    }
}

impl GovernorSettings {
    fn from_raw(raw: RawGovernor) -> Self {
        let defaults = Self::default();
        Self {
            bind_host: raw.bind_host.unwrap_or(defaults.bind_host),
            bind_port: raw.bind_port.unwrap_or(defaults.bind_port),
            scheme: raw.scheme.unwrap_or(defaults.scheme),
        }
    }
}

impl ApplicationConfig {
    fn from_raw(raw: RawApplication) -> Self {
        Self {
            name: AppName::new(raw.name),
            stop_timeout: raw
                .stop_timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_STOP_TIMEOUT),
            start: StartConfig::new(raw.start),
        }
    }
}
