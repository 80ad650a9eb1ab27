//! The governor: registry and start/stop sequencing for hosted applications

use chrono::{DateTime, Utc};
use govern_config::Config;
use govern_ipc::SessionSender;
use govern_util::{AppName, GovernError, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{Activator, HostedApplication, StartOutcome, StopOutcome};

/// Point-in-time view of one hosted application, for the terminal
#[derive(Debug, Clone)]
pub struct AppStatus {
    pub name: AppName,
    pub running: bool,
    pub connected: bool,
    pub last_start_attempt: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
}

/// Summary of a bulk start/stop pass
#[derive(Debug, Default)]
pub struct BulkOutcome {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// The governor owns the table of hosted applications and drives their
/// start/stop sequencing through the activator.
///
/// Each application sits behind its own mutex so start, stop, and
/// connection updates for one application serialize without blocking its
/// siblings.
pub struct Governor {
    apps: BTreeMap<AppName, Arc<Mutex<HostedApplication>>>,
    activator: Arc<dyn Activator>,
}

impl Governor {
    pub fn new(config: &Config, activator: Arc<dyn Activator>) -> Self {
        let apps = config
            .applications
            .iter()
            .map(|app_config| {
                (
                    app_config.name.clone(),
                    Arc::new(Mutex::new(HostedApplication::new(app_config.clone()))),
                )
            })
            .collect();

        Self { apps, activator }
    }

    pub fn names(&self) -> Vec<AppName> {
        self.apps.keys().cloned().collect()
    }

    pub fn app(&self, name: &AppName) -> Option<Arc<Mutex<HostedApplication>>> {
        self.apps.get(name).cloned()
    }

    /// Start one application by name
    pub async fn start(&self, name: &AppName) -> Result<StartOutcome> {
        let app = self
            .app(name)
            .ok_or_else(|| GovernError::AppNotFound(name.clone()))?;
        let mut app = app.lock().await;
        Ok(self.activator.start(&mut app).await)
    }

    /// Stop one application by name
    pub async fn stop(&self, name: &AppName) -> Result<StopOutcome> {
        let app = self
            .app(name)
            .ok_or_else(|| GovernError::AppNotFound(name.clone()))?;
        let mut app = app.lock().await;
        Ok(self.activator.stop(&mut app).await)
    }

    /// Start every hosted application, sequentially. A failure is recorded
    /// on the individual application and does not block its siblings.
    pub async fn start_all(&self) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();

        for (name, app) in &self.apps {
            let mut app = app.lock().await;
            let started = self.activator.start(&mut app).await;
            if started.started {
                outcome.succeeded += 1;
            } else if app.failure_reason().is_some() {
                warn!(app = %name, "Application failed to start");
                outcome.failed += 1;
            } else {
                outcome.skipped += 1;
            }
        }

        info!(
            succeeded = outcome.succeeded,
            skipped = outcome.skipped,
            failed = outcome.failed,
            "Bulk start complete"
        );
        outcome
    }

    /// Stop every hosted application, sequentially.
    pub async fn stop_all(&self) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();

        for app in self.apps.values() {
            let mut app = app.lock().await;
            let stopped = self.activator.stop(&mut app).await;
            if stopped.stopped {
                outcome.succeeded += 1;
            } else {
                outcome.skipped += 1;
            }
        }

        info!(
            succeeded = outcome.succeeded,
            skipped = outcome.skipped,
            "Bulk stop complete"
        );
        outcome
    }

    /// Bind a reconnecting child's control-channel session to its record.
    /// Unknown names are logged and dropped; a child cannot register a
    /// session the governor never configured.
    pub async fn attach_connection(&self, name: &AppName, sender: SessionSender) {
        match self.app(name) {
            Some(app) => {
                app.lock().await.attach_connection(sender);
                info!(app = %name, "Control-channel session attached");
            }
            None => {
                warn!(app = %name, "Connection from unknown application ignored");
            }
        }
    }

    /// Drop the control-channel session for a disconnected child.
    pub async fn detach_connection(&self, name: &AppName) {
        if let Some(app) = self.app(name) {
            app.lock().await.detach_connection();
        }
    }

    /// Snapshot every application's state for the terminal.
    pub async fn status(&self) -> Vec<AppStatus> {
        let mut statuses = Vec::with_capacity(self.apps.len());
        for (name, app) in &self.apps {
            let app = app.lock().await;
            statuses.push(AppStatus {
                name: name.clone(),
                running: app.is_running(),
                connected: app.connection().is_some(),
                last_start_attempt: app.last_start_attempt(),
                failure_reason: app.failure_reason().map(str::to_string),
            });
        }
        statuses
    }
}
