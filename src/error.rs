//! Unified error types.
//!
//! Application-level outcomes (404, 500, etc.) are expressed as HTTP
//! [`Response`](crate::Response) values, never as errors. The types here
//! surface the two things that can go wrong outside a request: building the
//! router from a bad description, and talking to an observability backend.

use std::fmt;

use thiserror::Error;

use crate::method::Method;

/// Error returned by router construction and by the server.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid listen address `{addr}`: {source}")]
    Addr {
        addr: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("route `{method} {path}` is registered more than once")]
    DuplicateRoute { method: Method, path: String },

    #[error("`OPTIONS {path}` is generated by the router and cannot be registered")]
    ReservedMethod { path: String },

    #[error("invalid route `{path}`: {source}")]
    InvalidRoute {
        path: String,
        #[source]
        source: matchit::InsertError,
    },

    #[error("invalid CORS header list `{0}`")]
    InvalidHeader(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Middleware configuration could not be read or is not usable.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("config: {0}")]
    Parse(String),

    /// Every problem found by validation, not just the first.
    #[error("invalid middleware configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Which backend an operation concerns.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum BackendKind {
    ErrorReporter,
    MetricsCollector,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ErrorReporter => "error reporter",
            Self::MetricsCollector => "metrics collector",
        })
    }
}

/// An observability backend failed to start or to accept a call.
///
/// `Clone` so a remembered initialization failure can be handed to every
/// caller that asks for the same configuration.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum BackendError {
    #[error("{kind} backend is `custom` but no connector was installed")]
    MissingConnector { kind: BackendKind },

    #[error("{kind} backend unavailable: {reason}")]
    Unavailable { kind: BackendKind, reason: String },

    #[error("{kind} backend rejected the call: {reason}")]
    Rejected { kind: BackendKind, reason: String },
}
