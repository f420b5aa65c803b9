use std::error::Error as StdError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::BodyExt;
use switchyard::backend::{ErrorReporter, MetricsCollector, SegmentRecorder, TransactionRecorder};
use switchyard::config::{ErrorBackend, MetricsBackend};
use switchyard::{
    App, BackendError, BackendKind, Method, MiddlewareConfig, PANIC_CLASS, Registry, Request,
    RequestHead, Response, Routes, build_router, build_router_with_registry, handlers,
};

// ── Helpers ───────────────────────────────────────────────────────────────────

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

struct Reply {
    status: StatusCode,
    headers: http::HeaderMap,
    body: Bytes,
}

async fn send(app: &App, method: http::Method, uri: &str) -> Reply {
    let req = http::Request::builder().method(method).uri(uri).body(Bytes::new()).unwrap();
    let res = app.call(req).await;
    let (parts, body) = res.into_parts();
    let body = body.collect().await.unwrap().to_bytes();
    Reply { status: parts.status, headers: parts.headers, body }
}

async fn get(app: &App, uri: &str) -> Reply {
    send(app, http::Method::GET, uri).await
}

fn header<'a>(reply: &'a Reply, name: &str) -> &'a str {
    reply.headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or_default()
}

async fn boom(_req: Request) -> Response {
    panic!("boom");
}

/// The usual service: two static answers, a parameterised route, a panic.
fn routes(panics: Arc<AtomicUsize>) -> Routes {
    Routes::new()
        .on(Method::Get, "/robots.txt", handlers::plain_text(["User-agent: *", "Disallow: /"]))
        .on(
            Method::Get,
            "/healthz",
            handlers::json(|_req| (r#"{"status":"up"}"#.to_owned(), StatusCode::OK)),
        )
        .on(Method::Get, "/users/:id", |req: Request| async move {
            Response::text(req.param("id").unwrap_or_default().to_owned())
        })
        .on(Method::Post, "/users/:id", |_req: Request| async { StatusCode::CREATED })
        .on(Method::Get, "/boom", boom)
        .panic_handler(move |_head, fault| {
            panics.fetch_add(1, Ordering::SeqCst);
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .text(fault.message().to_owned())
        })
}

fn enabled_config() -> MiddlewareConfig {
    let mut config = MiddlewareConfig::default();
    config.error_reporting.enabled = true;
    config.metrics_collector.enabled = true;
    config.metrics_collector.app_name = "switchyard-tests".into();
    config
}

async fn assert_serves_routes(app: &App, panics: &AtomicUsize) {
    let robots = get(app, "/robots.txt").await;
    assert_eq!(robots.status, StatusCode::OK);
    assert_eq!(header(&robots, "content-type"), "text/plain");
    assert_eq!(robots.body, "User-agent: *\nDisallow: /");

    let health = get(app, "/healthz").await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(header(&health, "content-type"), "application/json");
    assert_eq!(health.body, r#"{"status":"up"}"#);

    let user = get(app, "/users/7").await;
    assert_eq!(user.body, "7");

    let missing = get(app, "/nope").await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.body, "404 page not found\n");
    assert_eq!(header(&missing, "content-type"), "text/plain; charset=utf-8");

    let before = panics.load(Ordering::SeqCst);
    let crashed = get(app, "/boom").await;
    assert_eq!(crashed.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(crashed.body, "boom");
    assert_eq!(panics.load(Ordering::SeqCst), before + 1);
}

// ── Plain router ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn serves_routes_without_middleware() {
    init_tracing();
    let panics = Arc::new(AtomicUsize::new(0));
    let app = build_router(routes(Arc::clone(&panics)), &[]).unwrap();
    assert!(!app.reports_errors());
    assert_serves_routes(&app, &panics).await;
}

#[tokio::test]
async fn counts_generated_options_routes() {
    let app = build_router(routes(Arc::new(AtomicUsize::new(0))), &[]).unwrap();
    // 5 explicit routes over 4 distinct paths.
    assert_eq!(app.router().route_table().len(), 4);
    assert_eq!(app.router().len(), 9);
    assert_eq!(
        app.router().route_table().methods("/users/{id}"),
        Some(&[Method::Get, Method::Post][..])
    );
}

#[tokio::test]
async fn preflight_lists_methods_and_headers() {
    let app = build_router(routes(Arc::new(AtomicUsize::new(0))), &["Authorization", "X-Request-Id"])
        .unwrap();

    let reply = send(&app, http::Method::OPTIONS, "/users/42").await;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(header(&reply, "access-control-allow-origin"), "*");
    assert_eq!(header(&reply, "access-control-allow-methods"), "GET,POST,OPTIONS");
    assert_eq!(
        header(&reply, "access-control-allow-headers"),
        "Host,Content-Type,Connection,User-Agent,Cache-Control,Accept-Encoding,Authorization,X-Request-Id"
    );
    assert_eq!(header(&reply, "content-type"), "application/json");
    assert_eq!(reply.body, "{}");
}

#[tokio::test]
async fn method_without_route_is_not_found() {
    let app = build_router(routes(Arc::new(AtomicUsize::new(0))), &[]).unwrap();
    let reply = send(&app, http::Method::DELETE, "/healthz").await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[test]
fn rejects_invalid_route_lists() {
    let dup = Routes::new()
        .on(Method::Get, "/a", |_req: Request| async { "a" })
        .on(Method::Get, "/a", |_req: Request| async { "b" });
    assert!(matches!(build_router(dup, &[]), Err(switchyard::Error::DuplicateRoute { .. })));

    let options = Routes::new().on(Method::Options, "/a", |_req: Request| async { "a" });
    assert!(matches!(build_router(options, &[]), Err(switchyard::Error::ReservedMethod { .. })));

    let header = Routes::new().on(Method::Get, "/a", |_req: Request| async { "a" });
    assert!(matches!(
        build_router(header, &["bad\nheader"]),
        Err(switchyard::Error::InvalidHeader(_))
    ));
}

#[test]
fn empty_route_list_compiles() {
    let app = build_router(Routes::new(), &[]).unwrap();
    assert!(app.router().is_empty());
}

// ── With middleware ───────────────────────────────────────────────────────────

#[tokio::test]
async fn serves_routes_with_middleware_enabled() {
    init_tracing();
    let panics = Arc::new(AtomicUsize::new(0));
    let registry = Registry::new();
    let app = build_router_with_registry(&registry, &enabled_config(), routes(Arc::clone(&panics)), &[])
        .unwrap();

    assert!(app.reports_errors());
    assert!(app.degraded().is_empty());
    assert_serves_routes(&app, &panics).await;
}

#[tokio::test]
async fn disabled_middleware_matches_plain_router() {
    let registry = Registry::new();
    let plain = build_router(routes(Arc::new(AtomicUsize::new(0))), &[]).unwrap();
    let disabled = build_router_with_registry(
        &registry,
        &MiddlewareConfig::default(),
        routes(Arc::new(AtomicUsize::new(0))),
        &[],
    )
    .unwrap();

    assert!(!disabled.reports_errors());
    assert_eq!(registry.init_attempts(BackendKind::ErrorReporter), 0);
    assert_eq!(registry.init_attempts(BackendKind::MetricsCollector), 0);

    for (method, uri) in [
        (http::Method::GET, "/robots.txt"),
        (http::Method::GET, "/healthz"),
        (http::Method::GET, "/nope"),
        (http::Method::OPTIONS, "/users/1"),
        (http::Method::GET, "/boom"),
    ] {
        let a = send(&plain, method.clone(), uri).await;
        let b = send(&disabled, method, uri).await;
        assert_eq!(a.status, b.status, "{uri}");
        assert_eq!(a.headers, b.headers, "{uri}");
        assert_eq!(a.body, b.body, "{uri}");
    }
}

#[test]
fn invalid_middleware_config_fails_the_build() {
    let mut config = MiddlewareConfig::default();
    config.metrics_collector.enabled = true;
    let result = build_router_with_registry(&Registry::new(), &config, Routes::new(), &[]);
    assert!(matches!(result, Err(switchyard::Error::Config(_))));
}

// ── Custom backends ───────────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct Notices(Arc<Mutex<Vec<(String, String, String)>>>);

impl ErrorReporter for Notices {
    fn notify(
        &self,
        class: &str,
        error: &(dyn StdError + 'static),
        context: Option<&RequestHead>,
    ) -> Result<(), BackendError> {
        let path = context.map(|head| head.path().to_owned()).unwrap_or_default();
        self.0.lock().unwrap().push((class.to_owned(), error.to_string(), path));
        Ok(())
    }
}

#[tokio::test]
async fn panics_reach_a_custom_reporter_once() {
    init_tracing();
    let notices = Notices::default();
    let connector_notices = notices.clone();
    let registry = Registry::new().with_error_connector(move |_config| {
        Ok(Arc::new(connector_notices.clone()) as Arc<dyn ErrorReporter>)
    });

    let mut config = MiddlewareConfig::default();
    config.error_reporting.enabled = true;
    config.error_reporting.backend = ErrorBackend::Custom;
    config.error_reporting.api_key = "secret".into();

    let app =
        build_router_with_registry(&registry, &config, routes(Arc::new(AtomicUsize::new(0))), &[])
            .unwrap();

    assert_eq!(get(&app, "/healthz").await.status, StatusCode::OK);
    assert_eq!(get(&app, "/boom").await.status, StatusCode::INTERNAL_SERVER_ERROR);

    let seen = notices.0.lock().unwrap().clone();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, PANIC_CLASS);
    assert_eq!(seen[0].1, "handler panicked: boom");
    assert_eq!(seen[0].2, "/boom");
}

#[derive(Clone, Default)]
struct Counted(Arc<Mutex<Vec<String>>>);

struct CountedTxn(Arc<Mutex<Vec<String>>>, String);
struct CountedSegment;

impl MetricsCollector for Counted {
    fn start_transaction(&self, name: &str) -> Box<dyn TransactionRecorder> {
        Box::new(CountedTxn(Arc::clone(&self.0), name.to_owned()))
    }
}

impl TransactionRecorder for CountedTxn {
    fn start_segment(&self, _name: &str) -> Box<dyn SegmentRecorder> {
        Box::new(CountedSegment)
    }

    fn notice_error(&self, error: &(dyn StdError + 'static)) {
        self.0.lock().unwrap().push(format!("error {}: {error}", self.1));
    }

    fn end(&self) {
        self.0.lock().unwrap().push(format!("end {}", self.1));
    }
}

impl SegmentRecorder for CountedSegment {
    fn end(self: Box<Self>) {}
}

#[tokio::test]
async fn custom_metrics_backend_initializes_once_under_concurrency() {
    const BUILDERS: usize = 8;
    let inits = Arc::new(AtomicUsize::new(0));
    let recorded = Counted::default();

    let connector_inits = Arc::clone(&inits);
    let connector_recorded = recorded.clone();
    let registry = Registry::new().with_metrics_connector(move |_config| {
        connector_inits.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(connector_recorded.clone()) as Arc<dyn MetricsCollector>)
    });

    let mut config = MiddlewareConfig::default();
    config.metrics_collector.enabled = true;
    config.metrics_collector.backend = MetricsBackend::Custom;
    config.metrics_collector.app_name = "app".into();
    config.metrics_collector.license = "license".into();

    let barrier = Barrier::new(BUILDERS);
    let apps: Vec<App> = thread::scope(|s| {
        let handles: Vec<_> = (0..BUILDERS)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    build_router_with_registry(
                        &registry,
                        &config,
                        routes(Arc::new(AtomicUsize::new(0))),
                        &[],
                    )
                    .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(apps.len(), BUILDERS);
    assert_eq!(inits.load(Ordering::SeqCst), 1);
    assert_eq!(registry.init_attempts(BackendKind::MetricsCollector), 1);

    get(&apps[0], "/users/1").await;
    get(&apps[0], "/boom").await;
    get(&apps[0], "/nope").await;

    let lines = recorded.0.lock().unwrap().clone();
    assert_eq!(
        lines,
        [
            "end /users/:id",
            "error /boom: handler panicked: transaction `/boom` unwound by a panic",
            "end /boom",
        ]
    );
    assert_eq!(registry.collector().unwrap().open_transactions(), 0);
}

#[test]
fn missing_connector_degrades_instead_of_failing() {
    let mut config = MiddlewareConfig::default();
    config.error_reporting.enabled = true;
    config.error_reporting.backend = ErrorBackend::Custom;
    config.error_reporting.api_key = "secret".into();

    let registry = Registry::new();
    let app = build_router_with_registry(&registry, &config, Routes::new(), &[]).unwrap();

    assert!(!app.reports_errors());
    assert_eq!(
        app.degraded(),
        [BackendError::MissingConnector { kind: BackendKind::ErrorReporter }]
    );

    // The same broken config is not retried.
    build_router_with_registry(&registry, &config, Routes::new(), &[]).unwrap();
    assert_eq!(registry.init_attempts(BackendKind::ErrorReporter), 1);
}
