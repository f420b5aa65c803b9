//! # switchyard
//!
//! Compiles a list of routes into an HTTP router with the cross-cutting
//! pieces every service ends up writing by hand.
//!
//! ## What you get
//!
//! - Radix-tree routing: one [`matchit`] tree per method, built once.
//! - A generated `OPTIONS` route per path, answering CORS preflights with
//!   the path's methods and an allowed-headers list.
//! - A panic boundary per request. A panicking handler becomes a `500` (or
//!   whatever your [`Routes::panic_handler`] returns), never a dead task.
//! - Optional middleware: per-route metrics transactions and error
//!   reporting around the whole router, both driven by [`MiddlewareConfig`].
//!   A disabled concern costs nothing at request time.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use switchyard::{Method, Request, Response, Routes, Server, build_router, handlers};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), switchyard::Error> {
//!     let routes = Routes::new()
//!         .on(Method::Get, "/robots.txt", handlers::plain_text(["User-agent: *", "Disallow: /"]))
//!         .on(Method::Get, "/users/:id", get_user)
//!         .on(Method::Post, "/users", create_user);
//!
//!     let app = build_router(routes, &["Authorization"])?;
//!     Server::bind("0.0.0.0:3000")?.serve(app).await
//! }
//!
//! async fn get_user(req: Request) -> Response {
//!     let id = req.param("id").unwrap_or("unknown");
//!     Response::json(format!(r#"{{"id":"{id}"}}"#))
//! }
//!
//! async fn create_user(req: Request) -> Response {
//!     if req.body().is_empty() {
//!         return Response::status(http::StatusCode::BAD_REQUEST);
//!     }
//!     Response::builder()
//!         .status(http::StatusCode::CREATED)
//!         .header("location", "/users/99")
//!         .json("{}")
//! }
//! ```

mod app;
mod cors;
mod error;
mod handler;
mod method;
mod middleware;
mod panic;
mod registry;
mod request;
mod response;
mod router;
mod server;
mod transaction;

pub mod backend;
pub mod config;
pub mod handlers;

pub use app::App;
pub use config::MiddlewareConfig;
pub use cors::BASELINE_HEADERS;
pub use error::{BackendError, BackendKind, ConfigError, Error};
pub use handler::Handler;
pub use method::{ExtensionMethod, InvalidMethod, Method};
pub use middleware::error_reporting::PANIC_CLASS;
pub use panic::{Fault, PanicHandler, default_panic_handler};
pub use registry::{ErrorConnector, MetricsConnector, Registry};
pub use request::{Request, RequestHead};
pub use response::{ContentType, IntoResponse, Json, Response, ResponseBuilder};
pub use router::{Route, RouteTable, Router, Routes};
pub use server::Server;
pub use transaction::{Collector, Segment, Transaction};

use middleware::Chain;

/// Compiles `routes` with no middleware.
///
/// `additional_headers` extend the allowed-headers list of every generated
/// `OPTIONS` route.
pub fn build_router(routes: Routes, additional_headers: &[&str]) -> Result<App, Error> {
    let router = Router::compile(routes, additional_headers, &Chain::default())?;
    Ok(App::new(router, None, Vec::new()))
}

/// Compiles `routes` with the middleware `config` enables, using the
/// process-wide [`Registry::global`].
pub fn build_router_with_middleware(
    config: &MiddlewareConfig,
    routes: Routes,
    additional_headers: &[&str],
) -> Result<App, Error> {
    build_router_with_registry(Registry::global(), config, routes, additional_headers)
}

/// Like [`build_router_with_middleware`], with backend clients taken from
/// (and cached in) `registry`.
///
/// Invalid configuration fails the build. A backend that cannot start does
/// not: its concern is switched off and listed in [`App::degraded`].
pub fn build_router_with_registry(
    registry: &Registry,
    config: &MiddlewareConfig,
    routes: Routes,
    additional_headers: &[&str],
) -> Result<App, Error> {
    let chain = Chain::resolve(registry, config)?;
    let router = Router::compile(routes, additional_headers, &chain)?;
    let (reporting, degraded) = chain.into_parts();
    Ok(App::new(router, reporting, degraded))
}
