//! Backend client registry.
//!
//! One shared handle per backend kind, created the first time a router is
//! built with that concern enabled and reused by every router built from the
//! same registry afterwards.
//!
//! # Initialization rules
//!
//! - At most one initialization succeeds. The slot mutex is held across the
//!   attempt, so concurrent first callers queue behind one attempt and all
//!   observe its outcome.
//! - A failure is remembered together with the configuration that caused
//!   it. Asking again with the same configuration returns the same error
//!   without retrying; a different (corrected) configuration retries.
//! - Once a client exists, later configurations are ignored: the client
//!   lives for the lifetime of the registry.

use std::error::Error as StdError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::backend::{ErrorReporter, MetricsCollector, RecorderCollector, TracingReporter};
use crate::config::{ErrorBackend, ErrorReportingConfig, MetricsBackend, MetricsConfig};
use crate::error::{BackendError, BackendKind};
use crate::request::RequestHead;
use crate::transaction::{Collector, Transaction};

/// Builds an error reporter for the `custom` selector.
pub type ErrorConnector = Arc<
    dyn Fn(&ErrorReportingConfig) -> Result<Arc<dyn ErrorReporter>, BackendError> + Send + Sync,
>;

/// Builds a metrics collector for the `custom` selector.
pub type MetricsConnector =
    Arc<dyn Fn(&MetricsConfig) -> Result<Arc<dyn MetricsCollector>, BackendError> + Send + Sync>;

// ── BackendSlot ───────────────────────────────────────────────────────────────

enum State<T: ?Sized, C> {
    Empty,
    Ready(Arc<T>),
    Failed { config: C, error: BackendError },
}

/// Single-flight, lazily initialized holder for one backend client.
pub(crate) struct BackendSlot<T: ?Sized, C> {
    state: Mutex<State<T, C>>,
    attempts: AtomicUsize,
}

impl<T: ?Sized, C: Clone + PartialEq> BackendSlot<T, C> {
    pub(crate) fn new() -> Self {
        Self { state: Mutex::new(State::Empty), attempts: AtomicUsize::new(0) }
    }

    pub(crate) fn get_or_try_init(
        &self,
        config: &C,
        init: impl FnOnce(&C) -> Result<Arc<T>, BackendError>,
    ) -> Result<Arc<T>, BackendError> {
        let mut state = self.state.lock();
        match &*state {
            State::Ready(client) => return Ok(Arc::clone(client)),
            State::Failed { config: failed, error } if failed == config => return Err(error.clone()),
            _ => {}
        }

        self.attempts.fetch_add(1, Ordering::Relaxed);
        match init(config) {
            Ok(client) => {
                *state = State::Ready(Arc::clone(&client));
                Ok(client)
            }
            Err(error) => {
                *state = State::Failed { config: config.clone(), error: error.clone() };
                Err(error)
            }
        }
    }

    pub(crate) fn get(&self) -> Option<Arc<T>> {
        match &*self.state.lock() {
            State::Ready(client) => Some(Arc::clone(client)),
            _ => None,
        }
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// Process- or test-scoped home of the backend clients.
///
/// Pass one to [`build_router_with_registry`](crate::build_router_with_registry),
/// or let [`build_router_with_middleware`](crate::build_router_with_middleware)
/// use [`Registry::global`].
pub struct Registry {
    reporter: BackendSlot<dyn ErrorReporter, ErrorReportingConfig>,
    collector: BackendSlot<Collector, MetricsConfig>,
    error_connector: Option<ErrorConnector>,
    metrics_connector: Option<MetricsConnector>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            reporter: BackendSlot::new(),
            collector: BackendSlot::new(),
            error_connector: None,
            metrics_connector: None,
        }
    }

    /// The registry shared by every router built without an explicit one.
    pub fn global() -> &'static Registry {
        static GLOBAL: OnceLock<Registry> = OnceLock::new();
        GLOBAL.get_or_init(Registry::new)
    }

    pub fn with_error_connector(
        mut self,
        connector: impl Fn(&ErrorReportingConfig) -> Result<Arc<dyn ErrorReporter>, BackendError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.error_connector = Some(Arc::new(connector));
        self
    }

    pub fn with_metrics_connector(
        mut self,
        connector: impl Fn(&MetricsConfig) -> Result<Arc<dyn MetricsCollector>, BackendError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.metrics_connector = Some(Arc::new(connector));
        self
    }

    /// Returns the error reporter, creating it from `config` on first use.
    pub fn error_reporter(
        &self,
        config: &ErrorReportingConfig,
    ) -> Result<Arc<dyn ErrorReporter>, BackendError> {
        self.reporter.get_or_try_init(config, |config| {
            let reporter: Arc<dyn ErrorReporter> = match config.backend {
                ErrorBackend::Tracing => Arc::new(TracingReporter::new(config)),
                ErrorBackend::Custom => {
                    let connect = self.error_connector.as_ref().ok_or(
                        BackendError::MissingConnector { kind: BackendKind::ErrorReporter },
                    )?;
                    connect(config)?
                }
            };
            info!(backend = ?config.backend, release_stage = %config.release_stage, "error reporter ready");
            Ok(reporter)
        })
    }

    /// Returns the metrics collector, creating it from `config` on first use.
    pub fn metrics_collector(&self, config: &MetricsConfig) -> Result<Arc<Collector>, BackendError> {
        self.collector.get_or_try_init(config, |config| {
            let backend: Arc<dyn MetricsCollector> = match config.backend {
                MetricsBackend::Recorder => Arc::new(RecorderCollector::new(config)),
                MetricsBackend::Custom => {
                    let connect = self.metrics_connector.as_ref().ok_or(
                        BackendError::MissingConnector { kind: BackendKind::MetricsCollector },
                    )?;
                    connect(config)?
                }
            };
            info!(backend = ?config.backend, app = %config.app_name, "metrics collector ready");
            Ok(Arc::new(Collector::new(backend)))
        })
    }

    /// How many initializations of `kind` have been attempted.
    pub fn init_attempts(&self, kind: BackendKind) -> usize {
        match kind {
            BackendKind::ErrorReporter => self.reporter.attempts(),
            BackendKind::MetricsCollector => self.collector.attempts(),
        }
    }

    /// Reports `err` if an error reporter is running; otherwise does nothing.
    /// A backend failure is logged, never returned.
    pub fn notify(
        &self,
        class: &str,
        err: &(dyn StdError + 'static),
        context: Option<&RequestHead>,
    ) {
        if let Some(reporter) = self.reporter.get() {
            if let Err(e) = reporter.notify(class, err, context) {
                warn!(error = %e, class, "error notification failed");
            }
        }
    }

    /// The keyed transaction `(id, name)`, or a no-op transaction when no
    /// metrics collector is running.
    pub fn transaction(&self, id: &str, name: &str) -> Transaction {
        match self.collector.get() {
            Some(collector) => collector.transaction(id, name),
            None => Transaction::noop(name),
        }
    }

    pub fn collector(&self) -> Option<Arc<Collector>> {
        self.collector.get()
    }
}

impl Default for Registry {
    fn default() -> Self { Self::new() }
}
