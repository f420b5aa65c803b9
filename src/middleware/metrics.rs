//! Per-route metrics instrumentation.

use std::sync::Arc;

use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::request::Request;
use crate::transaction::Collector;

/// Runs the inner handler inside a transaction named after the route.
///
/// If the request already carries a transaction, the route becomes a
/// segment of it instead of opening a second transaction.
pub(crate) struct Instrumented {
    inner: BoxedHandler,
    name: Arc<str>,
    collector: Arc<Collector>,
}

impl Instrumented {
    pub(crate) fn new(inner: BoxedHandler, name: &str, collector: Arc<Collector>) -> Self {
        Self { inner, name: Arc::from(name), collector }
    }
}

impl ErasedHandler for Instrumented {
    fn call(&self, mut req: Request) -> BoxFuture {
        let inner = Arc::clone(&self.inner);
        let name = Arc::clone(&self.name);
        let collector = Arc::clone(&self.collector);

        Box::pin(async move {
            if let Some(txn) = req.transaction().cloned() {
                let segment = txn.start_segment(&name);
                let response = inner.call(req).await;
                segment.end();
                return response;
            }

            // Dropped without `end` if the handler panics; the transaction
            // then records the panic and ends itself while unwinding.
            let txn = collector.start_transaction(&name);
            req.set_transaction(txn.clone());
            let response = inner.call(req).await;
            txn.set_status(response.status_code());
            txn.end();
            response
        })
    }
}
