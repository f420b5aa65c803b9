//! Observability backend interfaces.
//!
//! The router never speaks a telemetry wire protocol itself. It talks to two
//! kinds of backend through the traits below, and ships one local
//! implementation of each:
//!
//! | Kind | Trait | Built-in selector |
//! |---|---|---|
//! | Error reporting | [`ErrorReporter`] | `tracing`: structured `error!` events |
//! | Metrics / tracing | [`MetricsCollector`] | `recorder`: the `metrics` facade |
//!
//! Remote services (hosted error trackers, APM agents) plug in through a
//! connector installed on the [`Registry`](crate::Registry) and the `custom`
//! selector. Every call is a straight pass-through: no buffering, no
//! batching, no timeouts of our own.

mod recorder;
mod reporter;

pub use recorder::RecorderCollector;
pub use reporter::TracingReporter;

use std::error::Error as StdError;

use http::StatusCode;

use crate::error::BackendError;
use crate::request::RequestHead;

/// Receives errors worth a human's attention.
pub trait ErrorReporter: Send + Sync + 'static {
    /// `class` groups related errors together (for panics it is `"panic"`).
    /// `context` is the request the error happened in, when there was one.
    fn notify(
        &self,
        class: &str,
        error: &(dyn StdError + 'static),
        context: Option<&RequestHead>,
    ) -> Result<(), BackendError>;
}

/// Starts named transactions.
pub trait MetricsCollector: Send + Sync + 'static {
    fn start_transaction(&self, name: &str) -> Box<dyn TransactionRecorder>;
}

/// Backend side of one transaction. Calls after [`end`](Self::end) are
/// never made; the [`Transaction`](crate::Transaction) handle guarantees it.
pub trait TransactionRecorder: Send + Sync {
    fn start_segment(&self, name: &str) -> Box<dyn SegmentRecorder>;

    fn start_datastore_segment(&self, datastore: &DataStore) -> Box<dyn SegmentRecorder> {
        self.start_segment(&datastore.segment_name())
    }

    fn notice_error(&self, error: &(dyn StdError + 'static));

    fn set_status(&self, _status: StatusCode) {}

    fn end(&self);
}

/// Backend side of one segment.
pub trait SegmentRecorder: Send {
    fn end(self: Box<Self>);
}

/// Describes a call to a datastore made inside a transaction.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DataStore {
    /// e.g. `Postgres`, `Redis`.
    pub product: String,
    /// Table or collection name.
    pub collection: String,
    /// e.g. `SELECT`, `GET`.
    pub operation: String,
    pub parameterized_query: Option<String>,
    pub host: Option<String>,
    pub port_path_or_id: Option<String>,
    pub database_name: Option<String>,
}

impl DataStore {
    /// `Datastore/<product>/<collection>/<operation>`, with empty parts skipped.
    pub fn segment_name(&self) -> String {
        let mut name = String::from("Datastore");
        for part in [&self.product, &self.collection, &self.operation] {
            if !part.is_empty() {
                name.push('/');
                name.push_str(part);
            }
        }
        name
    }
}

// ── No-op implementations ─────────────────────────────────────────────────────

pub(crate) struct NoopTransaction;

impl TransactionRecorder for NoopTransaction {
    fn start_segment(&self, _name: &str) -> Box<dyn SegmentRecorder> {
        Box::new(NoopSegment)
    }

    fn notice_error(&self, _error: &(dyn StdError + 'static)) {}

    fn end(&self) {}
}

pub(crate) struct NoopSegment;

impl SegmentRecorder for NoopSegment {
    fn end(self: Box<Self>) {}
}
