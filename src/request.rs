//! Incoming HTTP request type.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, Uri};

use crate::transaction::Transaction;

/// The parts of a request that outlive the handler call.
///
/// Shared behind an `Arc` so the panic callback and the error reporter can
/// still see the method, path and headers after the handler has consumed the
/// [`Request`] and unwound.
#[derive(Clone, Debug)]
pub struct RequestHead {
    method: http::Method,
    uri: Uri,
    headers: HeaderMap,
}

impl RequestHead {
    pub fn method(&self) -> &http::Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn query(&self) -> Option<&str> { self.uri.query() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }

    /// Case-insensitive header lookup. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// An incoming HTTP request.
pub struct Request {
    head: Arc<RequestHead>,
    body: Bytes,
    params: HashMap<String, String>,
    transaction: Option<Transaction>,
}

impl Request {
    pub fn new(method: http::Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            head: Arc::new(RequestHead { method, uri, headers }),
            body,
            params: HashMap::new(),
            transaction: None,
        }
    }

    pub fn method(&self) -> &http::Method { &self.head.method }
    pub fn path(&self) -> &str { self.head.path() }
    pub fn query(&self) -> Option<&str> { self.head.query() }
    pub fn headers(&self) -> &HeaderMap { &self.head.headers }
    pub fn body(&self) -> &[u8] { &self.body }
    pub fn head(&self) -> &RequestHead { &self.head }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.header(name)
    }

    /// Returns a named path parameter.
    ///
    /// For a route `/users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// The metrics transaction this request runs under, if the metrics
    /// middleware is active for its route.
    ///
    /// ```rust,ignore
    /// if let Some(txn) = req.transaction() {
    ///     let _segment = txn.start_segment("load-user");
    ///     // ...
    /// }
    /// ```
    pub fn transaction(&self) -> Option<&Transaction> {
        self.transaction.as_ref()
    }

    pub(crate) fn shared_head(&self) -> Arc<RequestHead> {
        Arc::clone(&self.head)
    }

    pub(crate) fn set_params(&mut self, params: HashMap<String, String>) {
        self.params = params;
    }

    pub(crate) fn set_transaction(&mut self, transaction: Transaction) {
        self.transaction = Some(transaction);
    }
}

impl From<http::Request<Bytes>> for Request {
    fn from(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self::new(parts.method, parts.uri, parts.headers, body)
    }
}
