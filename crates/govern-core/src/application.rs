//! The application container a host entry point boots

use govern_util::AppName;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::Governor;

/// The governor-managed application a host process runs.
///
/// Holds the governor plus the shutdown latch both entry-point flavors
/// block on. `stop` requests shutdown; it does not terminate the process.
pub struct Application {
    name: AppName,
    governor: Arc<Governor>,
    stopping: Arc<AtomicBool>,
}

impl Application {
    pub fn new(name: AppName, governor: Arc<Governor>) -> Self {
        Self {
            name,
            governor,
            stopping: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn name(&self) -> &AppName {
        &self.name
    }

    pub fn governor(&self) -> &Arc<Governor> {
        &self.governor
    }

    /// Request shutdown. Idempotent; callers observe it via
    /// [`Application::is_stopping`] or [`Application::wait_for_stop`].
    pub fn stop(&self) {
        if !self.stopping.swap(true, Ordering::SeqCst) {
            info!(app = %self.name, "Application stop requested");
        }
    }

    pub fn is_stopping(&self) -> bool {
        self.stopping.load(Ordering::SeqCst)
    }

    /// Block until a stop has been requested, polling at the given
    /// interval.
    pub async fn wait_for_stop(&self, poll: Duration) {
        loop {
            if self.is_stopping() {
                return;
            }
            tokio::time::sleep(poll).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GovernorBinding, ProcessActivator};
    use govern_config::parse_config;

    fn make_application() -> Application {
        let config = parse_config("config_version = 1").unwrap();
        let activator = Arc::new(ProcessActivator::new(GovernorBinding {
            scheme: "sipc".into(),
            host: "127.0.0.1".into(),
            port: 4410,
        }));
        Application::new(
            AppName::new("host"),
            Arc::new(Governor::new(&config, activator)),
        )
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_observable() {
        let application = make_application();
        assert!(!application.is_stopping());

        application.stop();
        application.stop();
        assert!(application.is_stopping());

        // Returns immediately once stopping
        application.wait_for_stop(Duration::from_millis(10)).await;
    }

    #[tokio::test]
    async fn wait_for_stop_observes_late_request() {
        let application = Arc::new(make_application());

        let waiter = application.clone();
        let handle = tokio::spawn(async move {
            waiter.wait_for_stop(Duration::from_millis(10)).await;
        });

        tokio::time::sleep(Duration::from_millis(30)).await;
        application.stop();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("waiter should finish")
            .unwrap();
    }
}
