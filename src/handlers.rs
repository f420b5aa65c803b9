//! Ready-made handlers for common response shapes.
//!
//! ```rust,no_run
//! use switchyard::{Method, Routes, handlers};
//! use http::StatusCode;
//!
//! let routes = Routes::new()
//!     .on(Method::Get, "/robots.txt", handlers::plain_text(["User-agent: *", "Disallow: /"]))
//!     .on(Method::Get, "/healthz", handlers::json(|_req| (r#"{"status":"up"}"#.to_owned(), StatusCode::OK)))
//!     .on(Method::Get, "/favicon.ico", handlers::static_file("assets/favicon.ico"));
//! ```

use std::future::{Ready, ready};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use tracing::warn;

use crate::handler::Handler;
use crate::request::Request;
use crate::response::{ContentType, Response};

/// `200 OK`, `text/plain`, the lines joined with `\n`. The body is built once.
pub fn plain_text<I, S>(lines: I) -> impl Handler
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let body = Bytes::from(
        lines.into_iter().map(|l| l.as_ref().to_owned()).collect::<Vec<_>>().join("\n"),
    );
    move |_req: Request| -> Ready<Response> {
        ready(Response::builder().bytes(ContentType::PlainText, body.clone()))
    }
}

/// `application/json` from a function returning `(body, status)`.
pub fn json<F>(f: F) -> impl Handler
where
    F: Fn(&Request) -> (String, StatusCode) + Send + Sync + 'static,
{
    move |req: Request| -> Ready<Response> {
        let (body, status) = f(&req);
        ready(Response::builder().status(status).json(body))
    }
}

/// `text/html; charset=utf-8` from a function returning `(body, status)`.
pub fn html<F>(f: F) -> impl Handler
where
    F: Fn(&Request) -> (String, StatusCode) + Send + Sync + 'static,
{
    move |req: Request| -> Ready<Response> {
        let (body, status) = f(&req);
        ready(Response::builder().status(status).html(body))
    }
}

/// Serves one file, read on every request so edits show up without a
/// restart. The content type comes from the file extension.
///
/// A missing file is `404`; any other read error is `500` and logged.
pub fn static_file(path: impl Into<PathBuf>) -> impl Handler {
    let path: Arc<PathBuf> = Arc::new(path.into());
    let content_type = path
        .extension()
        .and_then(|e| e.to_str())
        .map_or(ContentType::OctetStream, ContentType::from_extension);

    move |_req: Request| {
        let path = Arc::clone(&path);
        async move {
            match tokio::fs::read(path.as_ref()).await {
                Ok(contents) => Response::builder().bytes(content_type, contents),
                Err(e) if e.kind() == ErrorKind::NotFound => Response::not_found(),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to read static file");
                    Response::status(StatusCode::INTERNAL_SERVER_ERROR)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> Request {
        http::Request::get("/").body(Bytes::new()).unwrap().into()
    }

    #[tokio::test]
    async fn plain_text_joins_lines() {
        let handler = plain_text(["User-agent: *", "Disallow: /"]).into_boxed_handler();
        let res = handler.call(request()).await;
        assert_eq!(res.status_code(), StatusCode::OK);
        assert_eq!(res.header("content-type"), Some("text/plain"));
        assert_eq!(res.body(), b"User-agent: *\nDisallow: /");
    }

    #[tokio::test]
    async fn json_uses_returned_status() {
        let handler = json(|_req| ("{}".to_owned(), StatusCode::CREATED)).into_boxed_handler();
        let res = handler.call(request()).await;
        assert_eq!(res.status_code(), StatusCode::CREATED);
        assert_eq!(res.header("content-type"), Some("application/json"));
    }

    #[tokio::test]
    async fn html_sets_charset() {
        let handler = html(|_req| ("<p>hi</p>".to_owned(), StatusCode::OK)).into_boxed_handler();
        let res = handler.call(request()).await;
        assert_eq!(res.header("content-type"), Some("text/html; charset=utf-8"));
    }

    #[tokio::test]
    async fn static_file_serves_contents_and_404s_when_missing() {
        let dir = std::env::temp_dir().join(format!("switchyard-static-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("hello.txt");
        std::fs::write(&file, "hello").unwrap();

        let res = static_file(&file).into_boxed_handler().call(request()).await;
        assert_eq!(res.body(), b"hello");
        assert_eq!(res.header("content-type"), Some("text/plain"));

        let res = static_file(dir.join("missing.txt")).into_boxed_handler().call(request()).await;
        assert_eq!(res.status_code(), StatusCode::NOT_FOUND);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
