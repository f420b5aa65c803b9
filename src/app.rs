//! The single request-handling entry point.

use bytes::Bytes;
use http_body_util::Full;

use crate::error::BackendError;
use crate::middleware::error_reporting::ErrorReporting;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;

/// A compiled router plus whatever error reporting wraps it.
///
/// Built by [`build_router`](crate::build_router) and friends; hand it to
/// [`Server::serve`](crate::Server::serve) or call [`App::handle`] from your
/// own listener. Immutable and shareable across tasks.
pub struct App {
    router: Router,
    reporting: Option<ErrorReporting>,
    degraded: Vec<BackendError>,
}

impl App {
    pub(crate) fn new(
        router: Router,
        reporting: Option<ErrorReporting>,
        degraded: Vec<BackendError>,
    ) -> Self {
        Self { router, reporting, degraded }
    }

    pub async fn handle(&self, req: Request) -> Response {
        match &self.reporting {
            Some(reporting) => reporting.around(&self.router, req).await,
            None => self.router.handle(req).await,
        }
    }

    /// [`handle`](Self::handle) for plain `http` types.
    pub async fn call(&self, req: http::Request<Bytes>) -> http::Response<Full<Bytes>> {
        self.handle(req.into()).await.into_inner()
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Whether a reporting layer wraps the router.
    pub fn reports_errors(&self) -> bool {
        self.reporting.is_some()
    }

    /// Backends that were enabled but failed to start. Their concerns are
    /// switched off for this app.
    pub fn degraded(&self) -> &[BackendError] {
        &self.degraded
    }
}
