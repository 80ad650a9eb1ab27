//! Crash capture for the governed entry point
//!
//! An uncaught error escaping the governed host is the one fatal path in
//! this process: it is rendered with its full chain, persisted to a crash
//! file, echoed to the console best-effort, and surfaced only as the
//! process exit code.

use chrono::{DateTime, Utc};
use govern_util::{crash_fallback_dir, crash_home_dir, crash_stamp};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

/// Exit code for an uncaught top-level error in the governed host.
/// On Unix the OS reports the low 8 bits; the constant stays signed to
/// keep the documented contract.
pub const CRASH_EXIT_CODE: i32 = -100;

/// Exit code for a clean stop
pub const CLEAN_EXIT_CODE: i32 = 0;

/// App-id placeholder when none was supplied
const UNSET_APP_ID: &str = "unset";

/// Human-readable marker naming the last major step the governed host
/// entered, so a crash can be attributed to it.
#[derive(Debug)]
pub struct TracePoint(Mutex<&'static str>);

impl TracePoint {
    pub fn new(initial: &'static str) -> Self {
        Self(Mutex::new(initial))
    }

    pub fn set(&self, step: &'static str) {
        if let Ok(mut guard) = self.0.lock() {
            *guard = step;
        }
    }

    pub fn get(&self) -> &'static str {
        self.0.lock().map(|guard| *guard).unwrap_or("unknown")
    }
}

/// Captured crash, ready to render and persist
pub struct CrashReport {
    pub component: String,
    pub trace_point: &'static str,
    pub app_id: Option<String>,
    pub error: anyhow::Error,
}

impl CrashReport {
    pub fn new(
        component: impl Into<String>,
        trace_point: &'static str,
        app_id: Option<String>,
        error: anyhow::Error,
    ) -> Self {
        Self {
            component: component.into(),
            trace_point,
            app_id,
            error,
        }
    }

    /// Deterministic crash-file name:
    /// `{yyyyMMdd-HHmmssff}-{component}-{appId|unset}.crash.log`
    pub fn file_name(&self, at: &DateTime<Utc>) -> String {
        format!(
            "{}-{}-{}.crash.log",
            crash_stamp(at),
            self.component,
            self.app_id.as_deref().unwrap_or(UNSET_APP_ID)
        )
    }

    /// Plain-text body: a header naming the component and last trace
    /// point, then the error chain outermost-first.
    pub fn render(&self) -> String {
        let mut out = format!(
            "{} crashed at trace point '{}'\n",
            self.component, self.trace_point
        );
        for (depth, cause) in self.error.chain().enumerate() {
            out.push_str(&format!("  {depth}: {cause}\n"));
        }
        out
    }

    /// Persist the report, preferring `$GOVERND_HOME` and falling back to
    /// the current working directory when that write fails. Returns the
    /// path written, or the last write error.
    pub fn persist(&self, at: &DateTime<Utc>) -> std::io::Result<PathBuf> {
        let file_name = self.file_name(at);
        let body = self.render();

        if let Some(home) = crash_home_dir() {
            let path = home.join(&file_name);
            match std::fs::write(&path, &body) {
                Ok(()) => return Ok(path),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Crash file write failed in home directory; falling back"
                    );
                }
            }
        }

        let path = crash_fallback_dir().join(&file_name);
        std::fs::write(&path, &body)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};
    use govern_util::GOVERND_HOME_ENV;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 7, 14, 5, 9)
            .unwrap()
            .with_nanosecond(420_000_000)
            .unwrap()
    }

    fn make_report(app_id: Option<&str>) -> CrashReport {
        let error = anyhow::anyhow!("listener refused")
            .context("control channel failed")
            .context("host start failed");
        CrashReport::new("governd", "host-start", app_id.map(str::to_string), error)
    }

    #[test]
    fn file_name_matches_documented_format() {
        let report = make_report(Some("billing"));
        assert_eq!(
            report.file_name(&fixed_time()),
            "20240307-14050942-governd-billing.crash.log"
        );
    }

    #[test]
    fn file_name_uses_unset_without_app_id() {
        let report = make_report(None);
        assert_eq!(
            report.file_name(&fixed_time()),
            "20240307-14050942-governd-unset.crash.log"
        );
    }

    #[test]
    fn render_includes_trace_point_and_chain() {
        let report = make_report(None);
        let body = report.render();

        assert!(body.starts_with("governd crashed at trace point 'host-start'"));
        assert!(body.contains("0: host start failed"));
        assert!(body.contains("1: control channel failed"));
        assert!(body.contains("2: listener refused"));
    }

    #[test]
    fn persist_falls_back_to_cwd_when_home_unwritable() {
        let cwd = tempfile::tempdir().unwrap();
        let old_cwd = std::env::current_dir().unwrap();
        std::env::set_current_dir(cwd.path()).unwrap();

        // Point the home variable somewhere that cannot be written
        unsafe {
            std::env::set_var(GOVERND_HOME_ENV, "/nonexistent/governd-test-home");
        }

        let report = make_report(Some("billing"));
        let path = report.persist(&fixed_time()).unwrap();

        assert!(path.exists());
        assert!(path.ends_with("20240307-14050942-governd-billing.crash.log"));

        unsafe {
            std::env::remove_var(GOVERND_HOME_ENV);
        }
        std::env::set_current_dir(old_cwd).unwrap();
    }

    #[test]
    fn trace_point_tracks_last_step() {
        let trace = TracePoint::new("boot");
        assert_eq!(trace.get(), "boot");
        trace.set("wait-for-stop");
        assert_eq!(trace.get(), "wait-for-stop");
    }
}
