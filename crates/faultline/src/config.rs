//! Monitor configuration.

use faultline_types::Identity;

/// Environment variable overriding the configured collector endpoint.
pub const REPORT_URL_ENV: &str = "FAULTLINE_REPORT_URL";

/// Configuration for [`crate::init`]. All three fields are required.
#[derive(Debug, Clone)]
pub struct Config {
    /// Collector endpoint fault reports are delivered to.
    pub report_url: String,
    /// Project identifier stamped on every event.
    pub project_name: String,
    /// Environment tag stamped on every event (e.g. "production").
    pub environment: String,
}

impl Config {
    pub fn new(
        report_url: impl Into<String>,
        project_name: impl Into<String>,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            report_url: report_url.into(),
            project_name: project_name.into(),
            environment: environment.into(),
        }
    }

    /// Collector endpoint after applying the environment override.
    pub(crate) fn resolved_report_url(&self) -> String {
        match std::env::var(REPORT_URL_ENV) {
            Ok(url) if !url.trim().is_empty() => url,
            _ => self.report_url.clone(),
        }
    }

    pub(crate) fn identity(&self) -> Identity {
        Identity::new(self.project_name.as_str(), self.environment.as_str())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Mutex, OnceLock};

    use super::*;

    fn env_guard() -> std::sync::MutexGuard<'static, ()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD
            .get_or_init(|| Mutex::new(()))
            .lock()
            .expect("env guard mutex poisoned")
    }

    #[test]
    fn configured_url_is_used_without_override() {
        let _guard = env_guard();
        unsafe { std::env::remove_var(REPORT_URL_ENV) };

        let config = Config::new("http://collector.test/error-report", "demo", "test");
        assert_eq!(
            config.resolved_report_url(),
            "http://collector.test/error-report"
        );
    }

    #[test]
    fn environment_variable_overrides_report_url() {
        let _guard = env_guard();
        unsafe { std::env::set_var(REPORT_URL_ENV, "http://other.test/report") };

        let config = Config::new("http://collector.test/error-report", "demo", "test");
        assert_eq!(config.resolved_report_url(), "http://other.test/report");

        unsafe { std::env::remove_var(REPORT_URL_ENV) };
    }

    #[test]
    fn identity_carries_both_fields() {
        let config = Config::new("http://collector.test/error-report", "demo", "production");
        let identity = config.identity();
        assert_eq!(identity.project_name, "demo");
        assert_eq!(identity.environment, "production");
    }
}
