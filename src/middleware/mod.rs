//! Middleware chain.
//!
//! Two cross-cutting concerns, applied at two different depths:
//!
//! ```text
//! ErrorReporting            ← once, around the whole router
//!   └─ Router
//!        └─ panic boundary  ← one per request
//!             └─ Instrumented("/users/{id}")   ← per route, metrics
//!                  └─ handler
//! ```
//!
//! Metrics wrap each route so a transaction measures only the handler's own
//! work and carries the route's name. Error reporting wraps everything so a
//! failure in any layer, metrics included, is seen.
//!
//! A disabled concern is skipped entirely: [`Chain::wrap`] hands back the
//! very same handler, and [`App`](crate::App) carries no reporting layer.

pub(crate) mod error_reporting;
pub(crate) mod metrics;

use std::sync::Arc;

use tracing::warn;

use crate::config::MiddlewareConfig;
use crate::error::{BackendError, Error};
use crate::handler::BoxedHandler;
use crate::registry::Registry;
use crate::transaction::Collector;

use self::error_reporting::ErrorReporting;
use self::metrics::Instrumented;

/// Backend handles resolved for one router build.
#[derive(Default)]
pub(crate) struct Chain {
    collector: Option<Arc<Collector>>,
    reporting: Option<ErrorReporting>,
    degraded: Vec<BackendError>,
}

impl Chain {
    /// Validates `config`, then fetches a client for every enabled concern.
    ///
    /// Invalid configuration is an error. A backend that fails to start is
    /// not: it is logged, recorded in [`Chain::degraded`], and treated as
    /// disabled.
    pub(crate) fn resolve(registry: &Registry, config: &MiddlewareConfig) -> Result<Self, Error> {
        config.validate()?;
        let mut chain = Self::default();

        if config.metrics_collector.enabled {
            match registry.metrics_collector(&config.metrics_collector) {
                Ok(collector) => chain.collector = Some(collector),
                Err(e) => chain.degrade(e),
            }
        }

        if config.error_reporting.enabled {
            match registry.error_reporter(&config.error_reporting) {
                Ok(reporter) => chain.reporting = Some(ErrorReporting::new(reporter)),
                Err(e) => chain.degrade(e),
            }
        }

        Ok(chain)
    }

    fn degrade(&mut self, error: BackendError) {
        warn!(%error, "backend unavailable, continuing without it");
        self.degraded.push(error);
    }

    /// Applies the per-route layers to `handler`. `path` names the
    /// transaction.
    pub(crate) fn wrap(&self, handler: BoxedHandler, path: &str) -> BoxedHandler {
        match &self.collector {
            Some(collector) => Arc::new(Instrumented::new(handler, path, Arc::clone(collector))),
            None => handler,
        }
    }

    pub(crate) fn into_parts(self) -> (Option<ErrorReporting>, Vec<BackendError>) {
        (self.reporting, self.degraded)
    }
}
