//! Error types for metapage

use std::fmt;
use std::net::IpAddr;

use thiserror::Error;

/// Errors that can occur while resolving a URL into [`Metadata`](crate::Metadata).
///
/// The set is closed. Every variant is terminal: nothing is retried.
#[derive(Debug, Error)]
pub enum Error {
    /// The URL could not be parsed, has an unsupported scheme, could not be
    /// resolved via DNS, or resolves to a blocked address.
    #[error("could not resolve {url}: {reason}")]
    Resolve { url: String, reason: ResolveFailure },

    /// Non-2xx response or any transport-level failure.
    #[error("HTTP request for {url} failed: {reason}")]
    HttpResponse { url: String, reason: HttpFailure },

    /// The body does not look like an HTML document.
    #[error("document at {url} does not seem to be valid html")]
    ContentType { url: String },

    /// The resolved title matches the ignore list (login walls and the like).
    #[error("title {title:?} of {url} matches the ignore list")]
    IgnoredTitle { url: String, title: String },
}

/// Why a URL was refused before any request was issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveFailure {
    /// The URL is not parsable at all.
    Parse(url::ParseError),
    /// Scheme other than http/https.
    InvalidScheme(String),
    /// The URL has no host component.
    MissingHost,
    /// DNS lookup failed or returned no records.
    Dns(String),
    /// The host resolves to an address inside the blocklist.
    PrivateAddress(IpAddr),
}

impl fmt::Display for ResolveFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "cannot parse url: {err}"),
            Self::InvalidScheme(scheme) => {
                write!(f, "unsupported scheme '{scheme}', only http/https allowed")
            }
            Self::MissingHost => f.write_str("missing host"),
            Self::Dns(msg) => write!(f, "could not find any DNS records: {msg}"),
            Self::PrivateAddress(ip) => write!(f, "address {ip} is in a blocked network"),
        }
    }
}

/// Why a fetch failed once the URL passed the guard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpFailure {
    /// The server answered with a non-2xx status.
    Status(u16),
    /// Connect, TLS, timeout, redirect or body read failure.
    Transport(String),
}

impl fmt::Display for HttpFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Status(status) => write!(f, "invalid response status {status}"),
            Self::Transport(msg) => f.write_str(msg),
        }
    }
}

/// Copyable tag for an [`Error`], handy for metrics and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Resolve,
    HttpResponse,
    ContentType,
    IgnoredTitle,
}

impl Error {
    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Resolve { .. } => ErrorKind::Resolve,
            Self::HttpResponse { .. } => ErrorKind::HttpResponse,
            Self::ContentType { .. } => ErrorKind::ContentType,
            Self::IgnoredTitle { .. } => ErrorKind::IgnoredTitle,
        }
    }

    /// The URL the failing pipeline was started with.
    pub fn url(&self) -> &str {
        match self {
            Self::Resolve { url, .. }
            | Self::HttpResponse { url, .. }
            | Self::ContentType { url }
            | Self::IgnoredTitle { url, .. } => url,
        }
    }

    pub(crate) fn resolve(url: impl Into<String>, reason: ResolveFailure) -> Self {
        Self::Resolve {
            url: url.into(),
            reason,
        }
    }

    pub(crate) fn http(url: impl Into<String>, reason: HttpFailure) -> Self {
        Self::HttpResponse {
            url: url.into(),
            reason,
        }
    }
}

/// Result type alias for metapage operations.
pub type Result<T> = std::result::Result<T, Error>;
