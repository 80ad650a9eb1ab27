//! Per-application governance record

use chrono::{DateTime, Utc};
use govern_config::{ApplicationConfig, StartConfig};
use govern_ipc::SessionSender;
use govern_util::AppName;
use std::time::Duration;
use tracing::error;

use crate::ActivationContext;

/// One subordinate application the governor manages.
///
/// The activation context is present iff the application is considered
/// running from the governor's perspective; it is owned exclusively by the
/// activator once assigned. The connection is a non-owning reference to a
/// control-channel session; the channel owns its own lifecycle.
#[derive(Debug)]
pub struct HostedApplication {
    name: AppName,
    start: StartConfig,
    stop_timeout: Duration,
    last_start_attempt: Option<DateTime<Utc>>,
    activation: Option<ActivationContext>,
    connection: Option<SessionSender>,
    failure_reason: Option<String>,
}

impl HostedApplication {
    pub fn new(config: ApplicationConfig) -> Self {
        Self {
            name: config.name,
            start: config.start,
            stop_timeout: config.stop_timeout,
            last_start_attempt: None,
            activation: None,
            connection: None,
            failure_reason: None,
        }
    }

    pub fn name(&self) -> &AppName {
        &self.name
    }

    pub fn start_config(&self) -> &StartConfig {
        &self.start
    }

    pub fn stop_timeout(&self) -> Duration {
        self.stop_timeout
    }

    /// Running from the governor's perspective: an activation is attached.
    /// This reflects intent, not confirmed process liveness.
    pub fn is_running(&self) -> bool {
        self.activation.is_some()
    }

    pub fn last_start_attempt(&self) -> Option<DateTime<Utc>> {
        self.last_start_attempt
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Record a start-attempt failure. Terminal for the attempt: no process
    /// handle exists once this is called. Never raises.
    pub fn fail(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        error!(app = %self.name, reason = %reason, "Application failed");
        self.failure_reason = Some(reason);
    }

    pub(crate) fn stamp_start_attempt(&mut self, at: DateTime<Utc>) {
        self.last_start_attempt = Some(at);
        self.failure_reason = None;
    }

    pub(crate) fn set_activation(&mut self, context: ActivationContext) {
        self.activation = Some(context);
    }

    pub(crate) fn activation_mut(&mut self) -> Option<&mut ActivationContext> {
        self.activation.as_mut()
    }

    pub(crate) fn take_activation(&mut self) -> Option<ActivationContext> {
        self.activation.take()
    }

    /// Bind a reconnecting child's control-channel session. Called whenever
    /// the child dials back, independent of start/stop sequencing.
    pub fn attach_connection(&mut self, sender: SessionSender) {
        self.connection = Some(sender);
    }

    pub fn detach_connection(&mut self) {
        self.connection = None;
    }

    pub fn connection(&self) -> Option<&SessionSender> {
        self.connection.as_ref()
    }
}
