//! A small service with every piece switched on.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/users/42
//!   curl -X POST http://localhost:3000/users -d '{"name":"alice"}'
//!   curl -i -X OPTIONS http://localhost:3000/users/42
//!   curl -i http://localhost:3000/boom
//!   curl http://localhost:3000/healthz

use http::StatusCode;
use serde_json::json;
use switchyard::{
    Json, Method, MiddlewareConfig, Request, Response, Routes, Server,
    build_router_with_middleware, handlers,
};

const CONFIG: &str = r#"
[error_reporting]
enabled = true
release_stage = "development"
notify_release_stages = ["development", "production"]

[metrics_collector]
enabled = true
app_name = "switchyard-demo"

[metrics_collector.labels]
team = "platform"
"#;

#[tokio::main]
async fn main() -> Result<(), switchyard::Error> {
    tracing_subscriber::fmt::init();

    let config = MiddlewareConfig::from_toml_str(CONFIG)?;

    let routes = Routes::new()
        .on(Method::Get, "/robots.txt", handlers::plain_text(["User-agent: *", "Disallow: /"]))
        .on(Method::Get, "/healthz", handlers::json(|_req| (r#"{"status":"up"}"#.to_owned(), StatusCode::OK)))
        .on(Method::Get, "/users/:id", get_user)
        .on(Method::Post, "/users", create_user)
        .on(Method::Delete, "/users/:id", delete_user)
        .on(Method::Get, "/boom", boom)
        .panic_handler(|head, fault| {
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .json(json!({ "error": fault.message(), "path": head.path() }).to_string())
        });

    let app = build_router_with_middleware(&config, routes, &["Authorization"])?;
    for degraded in app.degraded() {
        tracing::warn!(%degraded, "running without backend");
    }

    Server::bind("0.0.0.0:3000")?.serve(app).await
}

async fn get_user(req: Request) -> Json<serde_json::Value> {
    let id = req.param("id").unwrap_or("unknown");
    if let Some(txn) = req.transaction() {
        txn.start_segment("load-user").end();
    }
    Json(json!({ "id": id, "name": "alice" }))
}

async fn create_user(req: Request) -> Response {
    if req.body().is_empty() {
        return Response::status(StatusCode::BAD_REQUEST);
    }
    Response::builder()
        .status(StatusCode::CREATED)
        .header("location", "/users/99")
        .json(req.body().to_vec())
}

async fn delete_user(_req: Request) -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn boom(_req: Request) -> Response {
    panic!("boom");
}
