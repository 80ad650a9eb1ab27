//! Process activator: OS-level start/stop mechanics
//!
//! The activator never propagates errors out of `start`/`stop`. Failures
//! are recorded on the application, logged, and absorbed; the outcome
//! structs carry the observed booleans plus an optional warning for
//! callers that need stricter guarantees.

use async_trait::async_trait;
use govern_ipc::{BindingUri, CMD_STOP};
use govern_util::{AppName, CorrelationId, GovernError};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::{ActivationContext, HostedApplication};

/// Interval between process-exited checks during a stop sequence
pub const STOP_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Result of a start attempt.
///
/// `started` keeps the observed contract: `true` even when the spawn call
/// itself failed (the error is logged and swallowed). Such a failure is
/// carried in `warning`.
#[derive(Debug)]
pub struct StartOutcome {
    pub started: bool,
    pub warning: Option<GovernError>,
}

impl StartOutcome {
    fn not_started() -> Self {
        Self {
            started: false,
            warning: None,
        }
    }

    fn started() -> Self {
        Self {
            started: true,
            warning: None,
        }
    }

    fn started_with_warning(warning: GovernError) -> Self {
        Self {
            started: true,
            warning: Some(warning),
        }
    }
}

/// Result of a stop attempt.
///
/// `stopped` means a stop sequence was attempted, not that the process is
/// confirmed dead. `forced` marks the timeout escalation having fired;
/// `warning` carries a failed kill or handle release.
#[derive(Debug)]
pub struct StopOutcome {
    pub stopped: bool,
    pub forced: bool,
    pub warning: Option<GovernError>,
}

impl StopOutcome {
    fn not_stopped() -> Self {
        Self {
            stopped: false,
            forced: false,
            warning: None,
        }
    }
}

/// The activator contract: OS-level start/stop for one hosted application.
/// Process-based today; pluggable for container-based alternatives.
#[async_trait]
pub trait Activator: Send + Sync {
    async fn start(&self, app: &mut HostedApplication) -> StartOutcome;
    async fn stop(&self, app: &mut HostedApplication) -> StopOutcome;
}

/// The governor's own control-channel coordinates, baked into pragma
/// substitution
#[derive(Debug, Clone)]
pub struct GovernorBinding {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl GovernorBinding {
    pub fn uri_for(&self, app: &AppName) -> BindingUri {
        BindingUri::new(
            self.scheme.as_str(),
            self.host.as_str(),
            self.port,
            app.clone(),
        )
    }
}

/// OS-process activator
pub struct ProcessActivator {
    binding: GovernorBinding,
}

impl ProcessActivator {
    pub fn new(binding: GovernorBinding) -> Self {
        Self { binding }
    }

    /// Substitute every occurrence of the pragma token in the argument
    /// string with this application's governor binding URI.
    fn resolve_args(&self, app: &HostedApplication) -> String {
        let raw = app.start_config().args().unwrap_or("");
        let pragma = app.start_config().ipc_pragma();
        if pragma.is_empty() {
            return raw.to_string();
        }
        raw.replace(pragma, &self.binding.uri_for(app.name()).to_string())
    }
}

#[async_trait]
impl Activator for ProcessActivator {
    async fn start(&self, app: &mut HostedApplication) -> StartOutcome {
        let correlation = CorrelationId::new();

        if app.is_running() {
            debug!(
                app = %app.name(),
                correlation = %correlation,
                "Start ignored: already running"
            );
            return StartOutcome::not_started();
        }

        let executable = app
            .start_config()
            .executable()
            .unwrap_or("")
            .trim()
            .to_string();

        if executable.is_empty() {
            let reason = format!(
                "application '{}' executable attribute missing",
                app.name()
            );
            error!(
                app = %app.name(),
                correlation = %correlation,
                "Start rejected: executable attribute missing"
            );
            app.fail(reason);
            return StartOutcome::not_started();
        }

        let working_directory = app
            .start_config()
            .working_directory()
            .map(str::to_string);

        if let Some(ref dir) = working_directory {
            if !Path::new(dir).is_dir() {
                let reason = format!(
                    "application '{}' working directory does not exist: {}",
                    app.name(),
                    dir
                );
                error!(
                    app = %app.name(),
                    correlation = %correlation,
                    working_directory = %dir,
                    "Start rejected: working directory does not exist"
                );
                app.fail(reason);
                return StartOutcome::not_started();
            }
        }

        let args = self.resolve_args(app);
        let argv: Vec<String> = args.split_whitespace().map(str::to_string).collect();

        // Context is attached and the attempt stamped before the spawn;
        // the application counts as running from here even if the spawn
        // call itself fails below.
        app.set_activation(ActivationContext::new());
        app.stamp_start_attempt(govern_util::now_utc());

        info!(
            app = %app.name(),
            correlation = %correlation,
            executable = %executable,
            args = %args,
            working_directory = ?working_directory,
            "Starting application"
        );

        let context = app
            .activation_mut()
            .expect("activation attached above; start is serialized per application");

        match context.launch(
            &executable,
            working_directory.as_deref().map(Path::new),
            &argv,
        ) {
            Ok(pid) => {
                info!(
                    app = %app.name(),
                    correlation = %correlation,
                    pid = pid,
                    "Application process spawned"
                );
                StartOutcome::started()
            }
            Err(e) => {
                error!(
                    app = %app.name(),
                    correlation = %correlation,
                    error = %e,
                    "Spawn failed; start still reported as successful"
                );
                StartOutcome::started_with_warning(e)
            }
        }
    }

    async fn stop(&self, app: &mut HostedApplication) -> StopOutcome {
        let correlation = CorrelationId::new();

        // Clearing the activation up front makes "is running" reflect
        // intent: the application is administratively stopped from here
        // even though the OS process may still be alive.
        let Some(mut context) = app.take_activation() else {
            debug!(
                app = %app.name(),
                correlation = %correlation,
                "Stop ignored: already stopped"
            );
            return StopOutcome::not_stopped();
        };

        info!(
            app = %app.name(),
            correlation = %correlation,
            pid = ?context.pid(),
            timeout_secs = app.stop_timeout().as_secs(),
            "Stopping application"
        );

        // Advisory stop command over the control channel, if the child
        // ever dialed back. Loss of the message does not block the stop.
        if let Some(connection) = app.connection() {
            match connection.send_command(CMD_STOP) {
                Ok(()) => {
                    debug!(
                        app = %app.name(),
                        correlation = %correlation,
                        "Stop command sent over control channel"
                    );
                }
                Err(e) => {
                    error!(
                        app = %app.name(),
                        correlation = %correlation,
                        error = %e,
                        "Failed to send stop command; continuing stop sequence"
                    );
                }
            }
        }

        let timeout = app.stop_timeout();
        let waiting_since = Instant::now();
        let mut forced = false;
        let mut warning = None;

        loop {
            match context.has_exited() {
                Ok(true) => {
                    info!(
                        app = %app.name(),
                        correlation = %correlation,
                        "Application exited"
                    );
                    break;
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        app = %app.name(),
                        correlation = %correlation,
                        error = %e,
                        "Exit check failed"
                    );
                }
            }

            if waiting_since.elapsed() >= timeout {
                warn!(
                    app = %app.name(),
                    correlation = %correlation,
                    timeout_secs = timeout.as_secs(),
                    "Graceful-stop timeout exceeded; killing process"
                );
                match context.kill() {
                    Ok(()) => {
                        info!(
                            app = %app.name(),
                            correlation = %correlation,
                            "Process killed"
                        );
                    }
                    Err(e) => {
                        error!(
                            app = %app.name(),
                            correlation = %correlation,
                            error = %e,
                            "Kill failed"
                        );
                        warning = Some(e);
                    }
                }
                forced = true;
                break;
            }

            tokio::time::sleep(STOP_POLL_INTERVAL).await;
        }

        if let Err(e) = context.release() {
            error!(
                app = %app.name(),
                correlation = %correlation,
                error = %e,
                "Failed to release process handle"
            );
            warning = warning.or(Some(e));
        }

        StopOutcome {
            stopped: true,
            forced,
            warning,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use govern_config::{ApplicationConfig, StartConfig};
    use std::time::Duration;

    fn binding() -> GovernorBinding {
        GovernorBinding {
            scheme: "sipc".into(),
            host: "127.0.0.1".into(),
            port: 4410,
        }
    }

    fn make_app(start: StartConfig, stop_timeout: Duration) -> HostedApplication {
        HostedApplication::new(ApplicationConfig {
            name: AppName::new("billing"),
            stop_timeout,
            start,
        })
    }

    #[tokio::test]
    async fn start_rejects_blank_executable() {
        let activator = ProcessActivator::new(binding());
        let mut app = make_app(
            StartConfig::from_pairs([("executable", "   ")]),
            Duration::from_secs(1),
        );

        let outcome = activator.start(&mut app).await;

        assert!(!outcome.started);
        assert!(!app.is_running());
        let reason = app.failure_reason().expect("failure reason recorded");
        assert!(reason.contains("executable attribute missing"));
    }

    #[tokio::test]
    async fn start_rejects_missing_working_directory() {
        let activator = ProcessActivator::new(binding());
        let mut app = make_app(
            StartConfig::from_pairs([
                ("executable", "/bin/true"),
                ("working-directory", "/nonexistent/governd-test-dir"),
            ]),
            Duration::from_secs(1),
        );

        let outcome = activator.start(&mut app).await;

        assert!(!outcome.started);
        assert!(!app.is_running());
        let reason = app.failure_reason().expect("failure reason recorded");
        assert!(reason.contains("/nonexistent/governd-test-dir"));
    }

    #[tokio::test]
    async fn start_accepts_existing_working_directory() {
        let dir = tempfile::tempdir().unwrap();
        let activator = ProcessActivator::new(binding());
        let mut app = make_app(
            StartConfig::from_pairs([
                ("executable".to_string(), "true".to_string()),
                (
                    "working-directory".to_string(),
                    dir.path().to_string_lossy().into_owned(),
                ),
            ]),
            Duration::from_secs(2),
        );

        let outcome = activator.start(&mut app).await;
        assert!(outcome.started);
        assert!(outcome.warning.is_none());

        let stop = activator.stop(&mut app).await;
        assert!(stop.stopped);
        assert!(!stop.forced);
    }

    #[tokio::test]
    async fn start_twice_returns_false_second_time() {
        let activator = ProcessActivator::new(binding());
        let mut app = make_app(
            StartConfig::from_pairs([
                ("executable", "sleep"),
                ("args", "30"),
            ]),
            Duration::from_secs(1),
        );

        let first = activator.start(&mut app).await;
        assert!(first.started);
        assert!(app.is_running());
        let stamp = app.last_start_attempt();

        let second = activator.start(&mut app).await;
        assert!(!second.started);
        assert!(second.warning.is_none());
        // No side effects on the second call
        assert_eq!(app.last_start_attempt(), stamp);

        activator.stop(&mut app).await;
    }

    #[tokio::test]
    async fn stop_without_activation_is_a_no_op() {
        let activator = ProcessActivator::new(binding());
        let mut app = make_app(
            StartConfig::from_pairs([("executable", "/bin/true")]),
            Duration::from_secs(1),
        );

        let outcome = activator.stop(&mut app).await;

        assert!(!outcome.stopped);
        assert!(!outcome.forced);
    }

    #[tokio::test]
    async fn spawn_failure_still_reports_started() {
        let activator = ProcessActivator::new(binding());
        let mut app = make_app(
            StartConfig::from_pairs([
                ("executable", "/nonexistent/governd-test-binary"),
            ]),
            Duration::from_secs(1),
        );

        let outcome = activator.start(&mut app).await;

        // Observed contract: the spawn error is swallowed
        assert!(outcome.started);
        assert!(outcome.warning.is_some());
        assert!(app.is_running());
        assert!(app.failure_reason().is_none());

        // The stop sequence completes promptly: nothing to wait for
        let stop = activator.stop(&mut app).await;
        assert!(stop.stopped);
        assert!(!app.is_running());
    }

    #[tokio::test]
    async fn pragma_substitution_replaces_every_occurrence() {
        let activator = ProcessActivator::new(binding());
        let app = make_app(
            StartConfig::from_pairs([
                ("executable", "/bin/true"),
                ("args", "--primary {{gov}} --mirror {{gov}}"),
            ]),
            Duration::from_secs(1),
        );

        let resolved = activator.resolve_args(&app);

        assert!(!resolved.contains("{{gov}}"));
        assert_eq!(
            resolved,
            "--primary sipc://127.0.0.1:4410/billing --mirror sipc://127.0.0.1:4410/billing"
        );
    }

    #[tokio::test]
    async fn custom_pragma_token_is_honored() {
        let activator = ProcessActivator::new(binding());
        let app = make_app(
            StartConfig::from_pairs([
                ("executable", "/bin/true"),
                ("args", "--uri %GOV%"),
                ("ipc-pragma", "%GOV%"),
            ]),
            Duration::from_secs(1),
        );

        let resolved = activator.resolve_args(&app);
        assert_eq!(resolved, "--uri sipc://127.0.0.1:4410/billing");
    }
}
