//! Route-table compiler.
//!
//! One radix tree per HTTP method, built once from a list of [`Route`]s and
//! read-only afterwards: no locks on the hot path. Compilation fails fast on
//! anything that would otherwise surface as a surprise at request time:
//! duplicate routes, conflicting patterns, explicit `OPTIONS` routes, and
//! CORS headers that are not valid header values.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use matchit::Router as MatchitRouter;
use tracing::{debug, info};

use crate::cors;
use crate::error::Error;
use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;
use crate::middleware::Chain;
use crate::panic::{self, PanicHandler, Recovered};
use crate::request::{Request, RequestHead};
use crate::response::Response;

// ── Route descriptors ─────────────────────────────────────────────────────────

/// One `(method, path, handler)` triple.
pub struct Route {
    method: Method,
    path: String,
    handler: BoxedHandler,
}

impl Route {
    /// Path parameters use `{name}` (or httprouter-style `:name`) syntax, and
    /// a trailing catch-all uses `{*name}` (or `*name`).
    pub fn new(method: Method, path: impl Into<String>, handler: impl Handler) -> Self {
        Self { method, path: path.into(), handler: handler.into_boxed_handler() }
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn path(&self) -> &str { &self.path }
}

/// The full description of an application's routes.
///
/// ```rust,no_run
/// # use switchyard::{Method, Request, Response, Routes};
/// # async fn get_user(_: Request) -> Response { Response::text("") }
/// # async fn create_user(_: Request) -> Response { Response::text("") }
/// let routes = Routes::new()
///     .on(Method::Get,  "/users/{id}", get_user)
///     .on(Method::Post, "/users",      create_user)
///     .panic_handler(|_head, _fault| Response::status(http::StatusCode::INTERNAL_SERVER_ERROR));
/// ```
#[derive(Default)]
pub struct Routes {
    list: Vec<Route>,
    panic_handler: Option<PanicHandler>,
}

impl Routes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a method + path pair. Returns `self` for chaining.
    pub fn on(self, method: Method, path: impl Into<String>, handler: impl Handler) -> Self {
        self.route(Route::new(method, path, handler))
    }

    pub fn route(mut self, route: Route) -> Self {
        self.list.push(route);
        self
    }

    /// Sets the callback that answers requests whose handler panicked.
    /// Without one, such requests get an empty `500`.
    pub fn panic_handler(
        mut self,
        handler: impl Fn(&RequestHead, &panic::Fault) -> Response + Send + Sync + 'static,
    ) -> Self {
        self.panic_handler = Some(Arc::new(handler));
        self
    }

    pub fn len(&self) -> usize { self.list.len() }
    pub fn is_empty(&self) -> bool { self.list.is_empty() }
}

impl FromIterator<Route> for Routes {
    fn from_iter<I: IntoIterator<Item = Route>>(iter: I) -> Self {
        Self { list: iter.into_iter().collect(), panic_handler: None }
    }
}

// ── RouteTable ────────────────────────────────────────────────────────────────

/// `path → methods` for every explicit route, methods in registration order.
///
/// Paths iterate in lexicographic order so generated output is stable.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RouteTable {
    paths: BTreeMap<String, Vec<Method>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `method` for `path`. Returns `false` if it was already there.
    pub fn insert(&mut self, path: &str, method: Method) -> bool {
        let methods = self.paths.entry(path.to_owned()).or_default();
        if methods.contains(&method) {
            return false;
        }
        methods.push(method);
        true
    }

    pub fn methods(&self, path: &str) -> Option<&[Method]> {
        self.paths.get(path).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[Method])> {
        self.paths.iter().map(|(p, m)| (p.as_str(), m.as_slice()))
    }

    /// Number of distinct paths.
    pub fn len(&self) -> usize { self.paths.len() }
    pub fn is_empty(&self) -> bool { self.paths.is_empty() }
}

// ── Router ────────────────────────────────────────────────────────────────────

struct Endpoint {
    handler: BoxedHandler,
    pattern: Arc<str>,
}

/// The compiled, immutable router.
pub struct Router {
    trees: HashMap<Method, MatchitRouter<Endpoint>>,
    table: RouteTable,
    explicit: usize,
    panic_handler: PanicHandler,
}

impl Router {
    /// Compiles `routes` into per-method radix trees, wrapping each handler
    /// with `chain`, then adds one generated `OPTIONS` route per path.
    pub(crate) fn compile(
        routes: Routes,
        additional_headers: &[&str],
        chain: &Chain,
    ) -> Result<Self, Error> {
        let Routes { list, panic_handler } = routes;
        let mut trees: HashMap<Method, MatchitRouter<Endpoint>> = HashMap::new();
        let mut table = RouteTable::new();
        let explicit = list.len();

        for Route { method, path, handler } in list {
            if method == Method::Options {
                return Err(Error::ReservedMethod { path });
            }
            let pattern = normalize(&path);
            if !table.insert(&pattern, method.clone()) {
                return Err(Error::DuplicateRoute { method, path });
            }
            debug!(%method, path = %pattern, "route registered");
            let handler = chain.wrap(handler, &path);
            insert(&mut trees, method, &pattern, handler)?;
        }

        for (pattern, preflight) in cors::synthesize(&table, additional_headers)? {
            insert(&mut trees, Method::Options, &pattern, preflight)?;
        }

        info!(routes = explicit, preflight = table.len(), "router compiled");

        Ok(Self {
            trees,
            table,
            explicit,
            panic_handler: panic_handler.unwrap_or_else(panic::default_panic_handler),
        })
    }

    pub fn route_table(&self) -> &RouteTable {
        &self.table
    }

    /// Total registered `(method, path)` pairs, generated `OPTIONS` included.
    pub fn len(&self) -> usize {
        self.explicit + self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Routes one request and produces one response.
    pub async fn handle(&self, req: Request) -> Response {
        self.dispatch(req).await.response
    }

    pub(crate) async fn dispatch(&self, mut req: Request) -> Recovered {
        let Some((endpoint, params)) = self.lookup(req.method(), req.path()) else {
            return Recovered { response: Response::not_found(), fault: None };
        };
        let handler = Arc::clone(&endpoint.handler);
        let pattern = Arc::clone(&endpoint.pattern);
        req.set_params(params);
        panic::recover(handler, pattern, req, &self.panic_handler).await
    }

    fn lookup(
        &self,
        method: &http::Method,
        path: &str,
    ) -> Option<(&Endpoint, HashMap<String, String>)> {
        let matched = self.trees.get(&Method::from(method))?.at(path).ok()?;
        let params = matched
            .params
            .iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((matched.value, params))
    }
}

fn insert(
    trees: &mut HashMap<Method, MatchitRouter<Endpoint>>,
    method: Method,
    pattern: &str,
    handler: BoxedHandler,
) -> Result<(), Error> {
    let endpoint = Endpoint { handler, pattern: Arc::from(pattern) };
    trees
        .entry(method)
        .or_default()
        .insert(pattern, endpoint)
        .map_err(|source| Error::InvalidRoute { path: pattern.to_owned(), source })
}

/// Rewrites httprouter-style segments (`:id`, `*rest`) into the `{id}` /
/// `{*rest}` form the radix tree expects. Other segments pass through.
pub(crate) fn normalize(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':').filter(|n| !n.is_empty()) {
                format!("{{{name}}}")
            } else if let Some(name) = segment.strip_prefix('*').filter(|n| !n.is_empty()) {
                format!("{{*{name}}}")
            } else {
                segment.to_owned()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
