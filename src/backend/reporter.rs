use std::error::Error as StdError;

use tracing::error;
use url::form_urlencoded;

use crate::backend::ErrorReporter;
use crate::config::ErrorReportingConfig;
use crate::error::BackendError;
use crate::request::RequestHead;

const FILTERED: &str = "[FILTERED]";

/// Reports errors as `ERROR` events on the `switchyard::errors` target.
///
/// Pair it with a `tracing` layer that ships events somewhere a human looks.
#[derive(Debug)]
pub struct TracingReporter {
    release_stage: String,
    app_type: String,
    app_version: String,
    hostname: Option<String>,
    notify: bool,
    params_filters: Vec<String>,
}

impl TracingReporter {
    pub fn new(config: &ErrorReportingConfig) -> Self {
        Self {
            release_stage: config.release_stage.clone(),
            app_type: config.app_type.clone(),
            app_version: config.app_version.clone(),
            hostname: config.hostname.clone(),
            notify: config.notifies_in_stage(),
            params_filters: config.params_filters.iter().map(|f| f.to_lowercase()).collect(),
        }
    }

    /// Replaces the value of every query parameter whose decoded name
    /// contains a filtered word (case-insensitively) with `[FILTERED]`.
    /// The result is re-encoded; names keep their casing.
    fn redact_query(&self, query: &str) -> String {
        let mut redacted = form_urlencoded::Serializer::new(String::new());
        for (name, value) in form_urlencoded::parse(query.as_bytes()) {
            let lowered = name.to_lowercase();
            if self.params_filters.iter().any(|f| lowered.contains(f.as_str())) {
                redacted.append_pair(&name, FILTERED);
            } else {
                redacted.append_pair(&name, &value);
            }
        }
        redacted.finish()
    }
}

impl ErrorReporter for TracingReporter {
    fn notify(
        &self,
        class: &str,
        err: &(dyn StdError + 'static),
        context: Option<&RequestHead>,
    ) -> Result<(), BackendError> {
        if !self.notify {
            return Ok(());
        }

        let (method, path, query) = match context {
            Some(head) => (
                head.method().as_str(),
                head.path(),
                head.query().map(|q| self.redact_query(q)),
            ),
            None => ("", "", None),
        };

        error!(
            target: "switchyard::errors",
            class,
            error = %err,
            method,
            path,
            query = query.as_deref().unwrap_or_default(),
            release_stage = %self.release_stage,
            app_type = %self.app_type,
            app_version = %self.app_version,
            hostname = self.hostname.as_deref().unwrap_or_default(),
            "error reported"
        );
        Ok(())
    }
}
