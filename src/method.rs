//! HTTP method as a typed enum.
//!
//! Covers RFC 9110 standard methods, WebDAV extensions (RFC 4918 / 4791 / 3253 / 5323),
//! and `PURGE` used by nginx and Varnish for cache invalidation. Any other
//! valid method token is carried as [`Method::Extension`], so it can be
//! registered, dispatched and advertised like the named ones.

use std::fmt;
use std::str::FromStr;

/// A routable HTTP method.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Method {
    // RFC 9110 ─────────────────────────────────────────────────────────────────
    Connect,
    Delete,
    Get,
    Head,
    Options,
    Patch,
    Post,
    Put,
    Trace,
    // WebDAV RFC 4918 ──────────────────────────────────────────────────────────
    Copy,
    Lock,
    Mkcol,
    Move,
    Propfind,
    Proppatch,
    Unlock,
    // WebDAV extensions ────────────────────────────────────────────────────────
    Mkcalendar, // RFC 4791, CalDAV
    Report,     // RFC 3253
    Search,     // RFC 5323
    // Cache invalidation ───────────────────────────────────────────────────────
    Purge, // nginx / Varnish
    /// Any other method token. Never holds a name covered by a variant above.
    Extension(ExtensionMethod),
}

/// A method token with no dedicated [`Method`] variant. Built only by
/// parsing, so `GET` can never hide in here.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ExtensionMethod(http::Method);

impl Method {
    /// Uppercase wire representation (e.g. `"GET"`).
    pub fn as_str(&self) -> &str {
        match self {
            Self::Connect    => "CONNECT",
            Self::Copy       => "COPY",
            Self::Delete     => "DELETE",
            Self::Get        => "GET",
            Self::Head       => "HEAD",
            Self::Lock       => "LOCK",
            Self::Mkcalendar => "MKCALENDAR",
            Self::Mkcol      => "MKCOL",
            Self::Move       => "MOVE",
            Self::Options    => "OPTIONS",
            Self::Patch      => "PATCH",
            Self::Post       => "POST",
            Self::Propfind   => "PROPFIND",
            Self::Proppatch  => "PROPPATCH",
            Self::Purge      => "PURGE",
            Self::Put        => "PUT",
            Self::Report     => "REPORT",
            Self::Search     => "SEARCH",
            Self::Trace      => "TRACE",
            Self::Unlock     => "UNLOCK",
            Self::Extension(ext) => ext.0.as_str(),
        }
    }

    fn named(s: &str) -> Option<Self> {
        Some(match s {
            "CONNECT"    => Self::Connect,
            "COPY"       => Self::Copy,
            "DELETE"     => Self::Delete,
            "GET"        => Self::Get,
            "HEAD"       => Self::Head,
            "LOCK"       => Self::Lock,
            "MKCALENDAR" => Self::Mkcalendar,
            "MKCOL"      => Self::Mkcol,
            "MOVE"       => Self::Move,
            "OPTIONS"    => Self::Options,
            "PATCH"      => Self::Patch,
            "POST"       => Self::Post,
            "PROPFIND"   => Self::Propfind,
            "PROPPATCH"  => Self::Proppatch,
            "PURGE"      => Self::Purge,
            "PUT"        => Self::Put,
            "REPORT"     => Self::Report,
            "SEARCH"     => Self::Search,
            "TRACE"      => Self::Trace,
            "UNLOCK"     => Self::Unlock,
            _            => return None,
        })
    }
}

/// Not a valid method token (empty, or containing a separator or space).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InvalidMethod(pub String);

impl fmt::Display for InvalidMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid HTTP method `{}`", self.0)
    }
}

impl std::error::Error for InvalidMethod {}

/// Parses a method token. Case-sensitive per RFC 9110 §9.1: `get` is an
/// extension method, not `GET`.
impl FromStr for Method {
    type Err = InvalidMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(method) = Self::named(s) {
            return Ok(method);
        }
        http::Method::from_bytes(s.as_bytes())
            .map(|m| Self::Extension(ExtensionMethod(m)))
            .map_err(|_| InvalidMethod(s.to_owned()))
    }
}

/// Every request method maps to a route key; unregistered ones simply miss.
impl From<&http::Method> for Method {
    fn from(method: &http::Method) -> Self {
        Self::named(method.as_str())
            .unwrap_or_else(|| Self::Extension(ExtensionMethod(method.clone())))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
