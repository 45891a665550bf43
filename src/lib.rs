//! # metapage
//!
//! Fetch a URL and extract link-preview metadata: title, description,
//! preview image, canonical URL, site name and a stable id.
//!
//! ## Features
//!
//! - OpenGraph tags with HTML fallbacks (`<title>`, `description`, canonical
//!   and apple-touch-icon links)
//! - Images detected from their bytes, not from headers
//! - SSRF protection: hosts are resolved through fixed public nameservers and
//!   refused when they point into private networks
//! - Bounded fetching: short timeouts, capped body size, no retries
//! - Extraction of every URL mentioned in free text
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! #[tokio::main]
//! async fn main() -> metapage::Result<()> {
//!     let meta = metapage::try_fetch("https://github.com/colszowka/simplecov").await?;
//!
//!     println!("Title: {:?}", meta.title());
//!     println!("Canonical: {}", meta.canonical_url());
//!     println!("{}", meta.to_json().unwrap_or_default());
//!
//!     Ok(())
//! }
//! ```
//!
//! ## URLs in text
//!
//! ```rust,no_run
//! # #[tokio::main]
//! # async fn main() {
//! let previews = metapage::extract("see www.xkcd.com/about/ and http://example.com.").await;
//! for meta in &previews {
//!     println!("{} -> {:?}", meta.url(), meta.title());
//! }
//! # }
//! ```
//!
//! `fetch` and `extract` drop failing URLs; `try_fetch` and `try_extract`
//! return the first [`Error`].
//!
//! ## Custom options
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use metapage::{HttpOptions, Metapage};
//!
//! # #[tokio::main]
//! # async fn main() -> metapage::Result<()> {
//! let client = Metapage::with_options(
//!     HttpOptions::new()
//!         .timeout(Duration::from_secs(5))
//!         .user_agent("PreviewBot/1.0"),
//! );
//! let meta = client.try_fetch("https://example.org").await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Without HTTP (parsing only)
//!
//! Disable the default `http` feature and build records from responses you
//! fetched yourself with [`Metadata::from_response`].

mod document;
mod error;
mod metadata;
mod normalize;
mod response;
mod sniff;

#[cfg(feature = "http")]
mod guard;
#[cfg(feature = "http")]
mod http;

pub use document::{Document, LinkRel, MetaKey};
pub use error::{Error, ErrorKind, HttpFailure, ResolveFailure, Result};
pub use metadata::{DEFAULT_IGNORED_TITLE_WORDS, Metadata, MetadataMap, TitleFilter, TitleLookup};
pub use normalize::{CandidateUrls, candidate_urls, strip_trailing_punctuation};
pub use response::FetchResult;
pub use sniff::ContentClass;

#[cfg(feature = "http")]
pub use guard::{
    BoxError, DEFAULT_BLOCKED_NETWORKS, DEFAULT_NAMESERVERS, LEGACY_BLOCKED_NETWORKS,
    PublicDnsResolver, Resolve, Target, default_blocked_networks, is_blocked,
    legacy_blocked_networks, parse_networks,
};
#[cfg(feature = "http")]
pub use http::HttpOptions;
#[cfg(feature = "http")]
pub use ipnet::{AddrParseError, IpNet};

#[cfg(feature = "http")]
use std::fmt;
#[cfg(feature = "http")]
use std::sync::Arc;

#[cfg(feature = "http")]
use futures_util::{StreamExt, TryStreamExt, future, stream};
#[cfg(feature = "http")]
use tracing::debug;

/// Resolves URLs into [`Metadata`].
///
/// Holds immutable options and the DNS resolver; clones share both.
#[cfg(feature = "http")]
#[derive(Clone)]
pub struct Metapage {
    options: Arc<HttpOptions>,
    resolver: Arc<dyn Resolve>,
}

#[cfg(feature = "http")]
impl fmt::Debug for Metapage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metapage")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(feature = "http")]
impl Default for Metapage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "http")]
impl Metapage {
    /// A client with default options.
    pub fn new() -> Self {
        Self::with_options(HttpOptions::default())
    }

    /// A client resolving hosts through `options.nameservers`.
    pub fn with_options(options: HttpOptions) -> Self {
        let resolver = PublicDnsResolver::new(&options.nameservers, options.dns_timeout);
        Self {
            options: Arc::new(options),
            resolver: Arc::new(resolver),
        }
    }

    /// Replace the DNS resolver.
    pub fn with_resolver(mut self, resolver: impl Resolve + 'static) -> Self {
        self.resolver = Arc::new(resolver);
        self
    }

    /// The options this client fetches with.
    pub fn options(&self) -> &HttpOptions {
        &self.options
    }

    /// Fetch and resolve a single URL, returning the first error.
    pub async fn try_fetch(&self, url: &str) -> Result<Metadata> {
        let response = http::fetch(url, &self.options, self.resolver.as_ref()).await?;
        Metadata::from_response_with(url, response, &self.options.title_filter)
    }

    /// Fetch and resolve a single URL; any failure yields `None`.
    pub async fn fetch(&self, url: &str) -> Option<Metadata> {
        match self.try_fetch(url).await {
            Ok(meta) => Some(meta),
            Err(err) => {
                debug!(url, kind = ?err.kind(), error = %err, "dropping url");
                None
            }
        }
    }

    /// Resolve every URL mentioned in `text`, skipping those that fail.
    ///
    /// Records come back in the order their URLs appear in the text.
    pub async fn extract(&self, text: &str) -> Vec<Metadata> {
        let candidates = candidate_urls(text);
        let urls: Vec<&str> = candidates.iter().collect();

        stream::iter(urls)
            .map(|url| self.fetch(url))
            .buffered(self.concurrency())
            .filter_map(future::ready)
            .collect()
            .await
    }

    /// Resolve every URL mentioned in `text`; the first failure aborts the
    /// whole batch.
    pub async fn try_extract(&self, text: &str) -> Result<Vec<Metadata>> {
        let candidates = candidate_urls(text);
        let urls: Vec<&str> = candidates.iter().collect();

        stream::iter(urls)
            .map(|url| self.try_fetch(url))
            .buffered(self.concurrency())
            .try_collect()
            .await
    }

    fn concurrency(&self) -> usize {
        self.options.batch_concurrency.max(1)
    }
}

/// [`Metapage::fetch`] with default options.
#[cfg(feature = "http")]
pub async fn fetch(url: &str) -> Option<Metadata> {
    Metapage::new().fetch(url).await
}

/// [`Metapage::try_fetch`] with default options.
#[cfg(feature = "http")]
pub async fn try_fetch(url: &str) -> Result<Metadata> {
    Metapage::new().try_fetch(url).await
}

/// [`Metapage::extract`] with default options.
#[cfg(feature = "http")]
pub async fn extract(text: &str) -> Vec<Metadata> {
    Metapage::new().extract(text).await
}

/// [`Metapage::try_extract`] with default options.
#[cfg(feature = "http")]
pub async fn try_extract(text: &str) -> Result<Vec<Metadata>> {
    Metapage::new().try_extract(text).await
}
