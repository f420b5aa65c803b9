//! Error reporting around the whole router.

use std::panic::{AssertUnwindSafe, resume_unwind};
use std::sync::Arc;

use futures::FutureExt;
use tracing::warn;

use crate::backend::ErrorReporter;
use crate::panic::{Fault, panic_message};
use crate::request::{Request, RequestHead};
use crate::response::Response;
use crate::router::Router;

/// Error class under which recovered panics are reported.
pub const PANIC_CLASS: &str = "panic";

/// Reports every fault the router produces, and any panic that escapes it.
pub(crate) struct ErrorReporting {
    reporter: Arc<dyn ErrorReporter>,
}

impl ErrorReporting {
    pub(crate) fn new(reporter: Arc<dyn ErrorReporter>) -> Self {
        Self { reporter }
    }

    pub(crate) async fn around(&self, router: &Router, req: Request) -> Response {
        let head = req.shared_head();
        match AssertUnwindSafe(router.dispatch(req)).catch_unwind().await {
            Ok(recovered) => {
                if let Some(fault) = &recovered.fault {
                    self.report(fault, &head);
                }
                recovered.response
            }
            // Only the panic callback can get here. Report, then let the
            // panic continue: it is not ours to swallow.
            Err(payload) => {
                let fault = Fault::new(panic_message(payload.as_ref()), None);
                self.report(&fault, &head);
                resume_unwind(payload)
            }
        }
    }

    fn report(&self, fault: &Fault, head: &RequestHead) {
        if let Err(e) = self.reporter.notify(PANIC_CLASS, fault, Some(head)) {
            warn!(error = %e, "failed to report panic");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as StdError;
    use std::sync::Mutex;

    use bytes::Bytes;
    use http::StatusCode;

    use super::*;
    use crate::error::BackendError;
    use crate::method::Method;
    use crate::middleware::Chain;
    use crate::router::Routes;

    #[derive(Default)]
    struct Notices(Mutex<Vec<String>>);

    impl Notices {
        fn lines(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    impl ErrorReporter for Notices {
        fn notify(
            &self,
            class: &str,
            error: &(dyn StdError + 'static),
            context: Option<&RequestHead>,
        ) -> Result<(), BackendError> {
            let path = context.map_or("", |head| head.path());
            self.0.lock().unwrap().push(format!("{class}: {error} @ {path}"));
            Ok(())
        }
    }

    fn request(path: &str) -> Request {
        http::Request::get(path).body(Bytes::new()).unwrap().into()
    }

    async fn boom(_req: Request) -> Response {
        panic!("handler boom");
    }

    #[tokio::test]
    async fn recovered_panic_is_reported_once() {
        let notices = Arc::new(Notices::default());
        let reporting = ErrorReporting::new(notices.clone());
        let router = Router::compile(
            Routes::new().on(Method::Get, "/boom", boom),
            &[],
            &Chain::default(),
        )
        .unwrap();

        let res = reporting.around(&router, request("/boom")).await;

        assert_eq!(res.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(notices.lines(), ["panic: handler panicked: handler boom @ /boom"]);

        reporting.around(&router, request("/nope")).await;
        assert_eq!(notices.lines().len(), 1);
    }

    #[tokio::test]
    async fn panicking_callback_is_reported_then_resumed() {
        let notices = Arc::new(Notices::default());
        let reporting = ErrorReporting::new(notices.clone());
        let router = Router::compile(
            Routes::new()
                .on(Method::Get, "/boom", boom)
                .panic_handler(|_head, _fault| panic!("callback boom")),
            &[],
            &Chain::default(),
        )
        .unwrap();

        let outcome = AssertUnwindSafe(reporting.around(&router, request("/boom")))
            .catch_unwind()
            .await;

        let payload = outcome.err().expect("panic resumed past the reporter");
        assert_eq!(panic_message(payload.as_ref()), "callback boom");
        assert_eq!(notices.lines(), ["panic: handler panicked: callback boom @ /boom"]);
    }
}
