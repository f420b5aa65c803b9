//! Generated `OPTIONS` handlers with CORS headers.
//!
//! After every explicit route is registered, each distinct path gets one
//! `OPTIONS` handler answering the CORS preflight:
//!
//! ```text
//! HTTP/1.1 200 OK
//! access-control-allow-origin: *
//! access-control-allow-methods: GET,POST,OPTIONS
//! access-control-allow-headers: Host,Content-Type,Connection,User-Agent,Cache-Control,Accept-Encoding
//! content-type: application/json
//!
//! {}
//! ```
//!
//! Header values are built once, when the router is compiled. At request
//! time the handler only copies them into the response.

use std::future::ready;
use std::sync::Arc;

use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    HeaderValue,
};

use crate::error::Error;
use crate::handler::{BoxFuture, BoxedHandler, ErasedHandler};
use crate::method::Method;
use crate::request::Request;
use crate::response::Response;
use crate::router::RouteTable;

/// Request headers every preflight allows.
pub const BASELINE_HEADERS: [&str; 6] = [
    "Host",
    "Content-Type",
    "Connection",
    "User-Agent",
    "Cache-Control",
    "Accept-Encoding",
];

/// Builds one preflight handler per path in `table`.
pub(crate) fn synthesize(
    table: &RouteTable,
    additional_headers: &[&str],
) -> Result<Vec<(String, BoxedHandler)>, Error> {
    let allow_headers = allow_headers(additional_headers)?;
    table
        .iter()
        .map(|(path, methods)| {
            let preflight = Preflight::new(methods, allow_headers.clone());
            Ok((path.to_owned(), Arc::new(preflight) as BoxedHandler))
        })
        .collect()
}

fn allow_headers(additional_headers: &[&str]) -> Result<HeaderValue, Error> {
    let joined = BASELINE_HEADERS
        .iter()
        .chain(additional_headers)
        .copied()
        .collect::<Vec<_>>()
        .join(",");
    HeaderValue::try_from(joined.as_str()).map_err(|_| Error::InvalidHeader(joined))
}

/// `GET,POST` → `GET,POST,OPTIONS`. OPTIONS itself never appears twice.
fn allow_methods(methods: &[Method]) -> HeaderValue {
    let list = methods
        .iter()
        .filter(|m| **m != Method::Options)
        .map(|m| m.as_str())
        .chain(["OPTIONS"])
        .collect::<Vec<_>>()
        .join(",");
    // Method names are ASCII tokens; the list is always a valid value.
    HeaderValue::try_from(list).unwrap_or_else(|_| HeaderValue::from_static("OPTIONS"))
}

/// Precomputed preflight answer for one path.
pub(crate) struct Preflight {
    allow_methods: HeaderValue,
    allow_headers: HeaderValue,
}

impl Preflight {
    pub(crate) fn new(methods: &[Method], allow_headers: HeaderValue) -> Self {
        Self { allow_methods: allow_methods(methods), allow_headers }
    }

    fn response(&self) -> Response {
        Response::builder()
            .typed_header(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"))
            .typed_header(ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.clone())
            .typed_header(ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.clone())
            .json("{}")
    }
}

impl ErasedHandler for Preflight {
    fn call(&self, _req: Request) -> BoxFuture {
        Box::pin(ready(self.response()))
    }
}
