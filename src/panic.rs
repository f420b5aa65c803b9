//! The panic-recovery boundary.
//!
//! Every matched handler runs under exactly one [`recover`] call. A request
//! either completes normally or panics; on a panic the unwind is stopped at
//! the boundary, the payload becomes a typed [`Fault`], and the caller's
//! [`PanicHandler`] decides the terminal response. Middleware layers between
//! the boundary and the handler have already unwound (and run their `Drop`
//! cleanup) by the time the callback runs.
//!
//! The callback must not panic. If it does, the panic propagates out of the
//! router and is not handled here.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use http::StatusCode;
use thiserror::Error;
use tracing::error;

use crate::handler::BoxedHandler;
use crate::request::{Request, RequestHead};
use crate::response::Response;

/// A handler panic, captured.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("handler panicked: {message}")]
pub struct Fault {
    message: String,
    route: Option<Arc<str>>,
}

impl Fault {
    pub fn new(message: impl Into<String>, route: Option<Arc<str>>) -> Self {
        Self { message: message.into(), route }
    }

    fn from_payload(payload: &(dyn Any + Send), route: Arc<str>) -> Self {
        Self::new(panic_message(payload), Some(route))
    }

    /// The panic message, or a placeholder for non-string payloads.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The route pattern whose handler panicked.
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }
}

/// Turns a panic into the terminal response for its request.
pub type PanicHandler = Arc<dyn Fn(&RequestHead, &Fault) -> Response + Send + Sync + 'static>;

/// Answers `500 Internal Server Error` with an empty body.
pub fn default_panic_handler() -> PanicHandler {
    Arc::new(|_head: &RequestHead, _fault: &Fault| {
        Response::status(StatusCode::INTERNAL_SERVER_ERROR)
    })
}

/// What a recovered request produced.
pub(crate) struct Recovered {
    pub(crate) response: Response,
    pub(crate) fault: Option<Fault>,
}

/// Runs `handler` for `req`, catching any panic raised while building or
/// polling its future.
pub(crate) async fn recover(
    handler: BoxedHandler,
    route: Arc<str>,
    req: Request,
    on_panic: &PanicHandler,
) -> Recovered {
    let head = req.shared_head();

    // The call itself goes inside the async block: a handler may panic
    // before it ever returns a future.
    let outcome = AssertUnwindSafe(async move { handler.call(req).await })
        .catch_unwind()
        .await;

    match outcome {
        Ok(response) => Recovered { response, fault: None },
        Err(payload) => {
            let fault = Fault::from_payload(payload.as_ref(), route);
            error!(
                method = %head.method(),
                path = head.path(),
                route = fault.route().unwrap_or_default(),
                panic = fault.message(),
                "handler panicked"
            );
            let response = on_panic(&head, &fault);
            Recovered { response, fault: Some(fault) }
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use bytes::Bytes;

    use super::*;
    use crate::handler::Handler;

    fn request(path: &str) -> Request {
        http::Request::get(path).body(Bytes::new()).unwrap().into()
    }

    #[test]
    fn extracts_string_payloads() {
        assert_eq!(panic_message(&"static"), "static");
        assert_eq!(panic_message(&String::from("owned")), "owned");
        assert_eq!(panic_message(&42_u8), "non-string panic payload");
    }

    #[tokio::test]
    async fn completed_request_has_no_fault() {
        let handler = (|_req: Request| async { Response::text("ok") }).into_boxed_handler();
        let out = recover(handler, Arc::from("/ok"), request("/ok"), &default_panic_handler()).await;
        assert_eq!(out.response.status_code(), StatusCode::OK);
        assert!(out.fault.is_none());
    }

    #[tokio::test]
    async fn panic_before_future_calls_callback_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let on_panic: PanicHandler = Arc::new(move |head: &RequestHead, fault: &Fault| {
            counter.fetch_add(1, Ordering::SeqCst);
            assert_eq!(head.path(), "/sync");
            assert_eq!(fault.message(), "sync boom");
            Response::status(StatusCode::SERVICE_UNAVAILABLE)
        });

        let handler = (|_req: Request| -> std::future::Ready<Response> { panic!("sync boom") })
            .into_boxed_handler();
        let out = recover(handler, Arc::from("/sync"), request("/sync"), &on_panic).await;

        assert_eq!(out.response.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(out.fault.unwrap().route(), Some("/sync"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn panic_inside_future_is_caught() {
        let handler = (|req: Request| async move {
            if req.path() == "/async" {
                panic!("async boom");
            }
            Response::text("never")
        })
        .into_boxed_handler();
        let out = recover(handler, Arc::from("/async"), request("/async"), &default_panic_handler()).await;
        assert_eq!(out.response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(out.response.body().is_empty());
        assert_eq!(out.fault.unwrap().message(), "async boom");
    }
}
