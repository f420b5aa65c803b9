//! Middleware configuration.
//!
//! Plain serde structs, readable from TOML:
//!
//! ```toml
//! [error_reporting]
//! enabled = true
//! backend = "tracing"
//! release_stage = "production"
//! app_version = "1.4.2"
//! notify_release_stages = ["production", "staging"]
//!
//! [metrics_collector]
//! enabled = true
//! backend = "recorder"
//! app_name = "checkout"
//! labels = { team = "payments" }
//! ```
//!
//! Validation runs before any backend is touched and reports every problem
//! at once, so a bad deploy fails on startup instead of on the first request.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for every cross-cutting concern the router can apply.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct MiddlewareConfig {
    pub error_reporting: ErrorReportingConfig,
    pub metrics_collector: MetricsConfig,
}

impl MiddlewareConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    /// Checks every enabled concern. Disabled concerns are not inspected.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();
        if self.error_reporting.enabled {
            self.error_reporting.collect_problems(&mut problems);
        }
        if self.metrics_collector.enabled {
            self.metrics_collector.collect_problems(&mut problems);
        }
        if problems.is_empty() { Ok(()) } else { Err(ConfigError::Invalid(problems)) }
    }
}

// ── Error reporting ───────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorBackend {
    /// Structured `tracing` events at `ERROR` level.
    #[default]
    Tracing,
    /// Connector installed with [`Registry::with_error_connector`](crate::Registry::with_error_connector).
    Custom,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct ErrorReportingConfig {
    pub enabled: bool,
    pub backend: ErrorBackend,
    /// Credential for remote backends. Required by `custom`.
    pub api_key: String,
    pub release_stage: String,
    pub app_type: String,
    pub app_version: String,
    /// Module prefixes that belong to the application, as opposed to its
    /// dependencies. Forwarded to the backend.
    pub project_packages: Vec<String>,
    /// Report only when `release_stage` is one of these. Empty means always.
    pub notify_release_stages: Vec<String>,
    /// Query parameters whose name contains one of these are redacted.
    pub params_filters: Vec<String>,
    pub hostname: Option<String>,
}

impl Default for ErrorReportingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            backend: ErrorBackend::default(),
            api_key: String::new(),
            release_stage: "production".to_owned(),
            app_type: String::new(),
            app_version: String::new(),
            project_packages: Vec::new(),
            notify_release_stages: Vec::new(),
            params_filters: vec!["password".to_owned(), "secret".to_owned()],
            hostname: None,
        }
    }
}

impl ErrorReportingConfig {
    /// Whether errors raised in the configured release stage are reported.
    pub fn notifies_in_stage(&self) -> bool {
        self.notify_release_stages.is_empty()
            || self.notify_release_stages.iter().any(|s| *s == self.release_stage)
    }

    fn collect_problems(&self, problems: &mut Vec<String>) {
        if self.backend == ErrorBackend::Custom && self.api_key.trim().is_empty() {
            problems.push("error_reporting.api_key is required by the custom backend".into());
        }
        if self.release_stage.trim().is_empty() {
            problems.push("error_reporting.release_stage must not be empty".into());
        }
        if self.project_packages.iter().any(|p| p.trim().is_empty()) {
            problems.push("error_reporting.project_packages contains an empty entry".into());
        }
        if self.notify_release_stages.iter().any(|s| s.trim().is_empty()) {
            problems.push("error_reporting.notify_release_stages contains an empty entry".into());
        }
        if self.params_filters.iter().any(|f| f.is_empty()) {
            problems.push("error_reporting.params_filters contains an empty entry".into());
        }
    }
}

// ── Metrics ───────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricsBackend {
    /// Emits through whatever `metrics` recorder the process installed.
    #[default]
    Recorder,
    /// Connector installed with [`Registry::with_metrics_connector`](crate::Registry::with_metrics_connector).
    Custom,
}

/// At most this many user labels are attached to a metric.
pub const MAX_LABELS: usize = 64;

#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub backend: MetricsBackend,
    /// Log every transaction at `DEBUG`.
    pub debug: bool,
    pub app_name: String,
    /// Credential for remote backends. Required by `custom`.
    pub license: String,
    pub labels: BTreeMap<String, String>,
    pub host_display_name: Option<String>,
}

impl MetricsConfig {
    fn collect_problems(&self, problems: &mut Vec<String>) {
        if self.app_name.trim().is_empty() {
            problems.push("metrics_collector.app_name must not be empty".into());
        }
        if self.backend == MetricsBackend::Custom && self.license.trim().is_empty() {
            problems.push("metrics_collector.license is required by the custom backend".into());
        }
        if self.labels.len() > MAX_LABELS {
            problems.push(format!(
                "metrics_collector.labels has {} entries, at most {MAX_LABELS} are allowed",
                self.labels.len()
            ));
        }
        if self.labels.keys().any(|k| k.trim().is_empty()) {
            problems.push("metrics_collector.labels contains an empty key".into());
        }
    }
}
