use std::error::Error as StdError;
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::Instant;

use http::StatusCode;
use metrics::{Label, counter, histogram};
use tracing::debug;

use crate::backend::{MetricsCollector, SegmentRecorder, TransactionRecorder};
use crate::config::MetricsConfig;

const TRANSACTIONS_TOTAL: &str = "switchyard_transactions_total";
const TRANSACTION_DURATION: &str = "switchyard_transaction_duration_seconds";
const SEGMENT_DURATION: &str = "switchyard_segment_duration_seconds";
const ERRORS_TOTAL: &str = "switchyard_transaction_errors_total";

/// Emits transactions and segments through the `metrics` facade.
///
/// Metrics land in whichever recorder the process installed (for example
/// `metrics-exporter-prometheus`); without one they are dropped.
///
/// | Metric | Type | Labels |
/// |---|---|---|
/// | `switchyard_transactions_total` | counter | `transaction`, `status` |
/// | `switchyard_transaction_duration_seconds` | histogram | `transaction` |
/// | `switchyard_segment_duration_seconds` | histogram | `transaction`, `segment` |
/// | `switchyard_transaction_errors_total` | counter | `transaction` |
///
/// Every metric also carries `app`, `host` (when configured) and the
/// configured user labels.
#[derive(Debug)]
pub struct RecorderCollector {
    labels: Arc<[Label]>,
    debug: bool,
}

impl RecorderCollector {
    pub fn new(config: &MetricsConfig) -> Self {
        let mut labels = vec![Label::new("app", config.app_name.clone())];
        if let Some(host) = &config.host_display_name {
            labels.push(Label::new("host", host.clone()));
        }
        labels.extend(config.labels.iter().map(|(k, v)| Label::new(k.clone(), v.clone())));
        Self { labels: labels.into(), debug: config.debug }
    }
}

impl MetricsCollector for RecorderCollector {
    fn start_transaction(&self, name: &str) -> Box<dyn TransactionRecorder> {
        let mut labels = self.labels.to_vec();
        labels.push(Label::new("transaction", name.to_owned()));
        if self.debug {
            debug!(transaction = name, "transaction started");
        }
        Box::new(RecorderTransaction {
            labels,
            started: Instant::now(),
            status: AtomicU16::new(0),
            debug: self.debug,
        })
    }
}

struct RecorderTransaction {
    labels: Vec<Label>,
    started: Instant,
    status: AtomicU16,
    debug: bool,
}

impl TransactionRecorder for RecorderTransaction {
    fn start_segment(&self, name: &str) -> Box<dyn SegmentRecorder> {
        let mut labels = self.labels.clone();
        labels.push(Label::new("segment", name.to_owned()));
        Box::new(RecorderSegment { labels, started: Instant::now() })
    }

    fn notice_error(&self, err: &(dyn StdError + 'static)) {
        if self.debug {
            debug!(error = %err, "transaction error noticed");
        }
        counter!(ERRORS_TOTAL, self.labels.clone()).increment(1);
    }

    fn set_status(&self, status: StatusCode) {
        self.status.store(status.as_u16(), Ordering::Relaxed);
    }

    fn end(&self) {
        let elapsed = self.started.elapsed();
        histogram!(TRANSACTION_DURATION, self.labels.clone()).record(elapsed.as_secs_f64());

        let status = match self.status.load(Ordering::Relaxed) {
            0 => "none".to_owned(),
            code => code.to_string(),
        };
        let mut labels = self.labels.clone();
        labels.push(Label::new("status", status));
        counter!(TRANSACTIONS_TOTAL, labels).increment(1);

        if self.debug {
            debug!(elapsed_secs = elapsed.as_secs_f64(), "transaction ended");
        }
    }
}

struct RecorderSegment {
    labels: Vec<Label>,
    started: Instant,
}

impl SegmentRecorder for RecorderSegment {
    fn end(self: Box<Self>) {
        let elapsed = self.started.elapsed().as_secs_f64();
        histogram!(SEGMENT_DURATION, self.labels).record(elapsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carries_app_host_and_user_labels() {
        let config = MetricsConfig {
            app_name: "checkout".into(),
            host_display_name: Some("web-1".into()),
            labels: [("team".to_owned(), "payments".to_owned())].into(),
            ..MetricsConfig::default()
        };
        let collector = RecorderCollector::new(&config);
        let keys: Vec<_> = collector.labels.iter().map(|l| l.key().to_owned()).collect();
        assert_eq!(keys, ["app", "host", "team"]);
    }

    #[test]
    fn debug_logging_reports_elapsed_time() {
        let config = MetricsConfig { debug: true, app_name: "app".into(), ..MetricsConfig::default() };
        let txn = RecorderCollector::new(&config).start_transaction("/slow");
        txn.notice_error(&std::io::Error::other("boom"));
        txn.end();
    }

    #[test]
    fn runs_without_installed_recorder() {
        let collector = RecorderCollector::new(&MetricsConfig::default());
        let txn = collector.start_transaction("/healthz");
        txn.start_segment("db").end();
        txn.notice_error(&std::io::Error::other("boom"));
        txn.set_status(StatusCode::OK);
        txn.end();
    }
}
