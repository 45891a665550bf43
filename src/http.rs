//! Bounded HTTP fetching behind the SSRF guard

use std::net::IpAddr;
use std::time::Duration;

use futures_util::StreamExt;
use ipnet::IpNet;
use reqwest::{Client, Response};
use tracing::debug;

use crate::error::{Error, HttpFailure, Result};
use crate::guard::{self, DEFAULT_NAMESERVERS, Resolve, Target};
use crate::metadata::TitleFilter;
use crate::response::FetchResult;

const DEFAULT_MAX_REDIRECTS: usize = 10;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 3;
const DEFAULT_READ_TIMEOUT_SECS: u64 = 3;
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_KEEP_ALIVE_SECS: u64 = 3;
const DEFAULT_DNS_TIMEOUT_SECS: u64 = 3;
const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024; // 10 MB
const DEFAULT_BATCH_CONCURRENCY: usize = 4;

/// Configuration for fetching and resolving URLs.
#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// Follow HTTP redirects
    pub follow_redirects: bool,

    /// Maximum number of redirects to follow
    pub max_redirects: usize,

    /// TCP/TLS connect timeout
    pub connect_timeout: Duration,

    /// Longest wait for the next chunk of the response, headers included
    pub read_timeout: Duration,

    /// Whole-request timeout, body included
    pub timeout: Duration,

    /// How long an idle pooled connection is kept
    pub keep_alive_timeout: Duration,

    /// Timeout of each DNS query
    pub dns_timeout: Duration,

    /// Maximum response body size in bytes.
    ///
    /// Responses larger than this are truncated. Default: 10 MB.
    pub max_body_size: usize,

    /// User-Agent header
    pub user_agent: String,

    /// Additional headers to send
    pub headers: Vec<(String, String)>,

    /// Nameservers queried by the default resolver
    pub nameservers: Vec<IpAddr>,

    /// Refuse hosts resolving into [`blocked_networks`](Self::blocked_networks).
    ///
    /// **Security Note:** Disabling this exposes your application to SSRF attacks
    /// if URLs come from untrusted sources.
    pub block_private_ips: bool,

    /// Address ranges considered internal
    pub blocked_networks: Vec<IpNet>,

    /// Titles rejected as login walls
    pub title_filter: TitleFilter,

    /// How many URLs of one batch are fetched at the same time
    pub batch_concurrency: usize,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            follow_redirects: true,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            read_timeout: Duration::from_secs(DEFAULT_READ_TIMEOUT_SECS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            keep_alive_timeout: Duration::from_secs(DEFAULT_KEEP_ALIVE_SECS),
            dns_timeout: Duration::from_secs(DEFAULT_DNS_TIMEOUT_SECS),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            user_agent: format!("metapage/{}", env!("CARGO_PKG_VERSION")),
            headers: Vec::new(),
            nameservers: DEFAULT_NAMESERVERS.to_vec(),
            block_private_ips: true,
            blocked_networks: guard::default_blocked_networks(),
            title_filter: TitleFilter::default(),
            batch_concurrency: DEFAULT_BATCH_CONCURRENCY,
        }
    }
}

impl HttpOptions {
    /// Create a new HttpOptions with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether to follow redirects.
    pub fn follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    /// Set the maximum number of redirects to follow.
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the per-read timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the whole-request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the idle keep-alive timeout of pooled connections.
    pub fn keep_alive_timeout(mut self, timeout: Duration) -> Self {
        self.keep_alive_timeout = timeout;
        self
    }

    /// Set the DNS query timeout.
    pub fn dns_timeout(mut self, timeout: Duration) -> Self {
        self.dns_timeout = timeout;
        self
    }

    /// Set the maximum response body size in bytes.
    pub fn max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    /// Set the User-Agent header.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Add a custom header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the nameservers of the default resolver.
    pub fn nameservers(mut self, nameservers: impl IntoIterator<Item = IpAddr>) -> Self {
        self.nameservers = nameservers.into_iter().collect();
        self
    }

    /// Set whether to refuse hosts resolving to blocked networks.
    pub fn block_private_ips(mut self, block: bool) -> Self {
        self.block_private_ips = block;
        self
    }

    /// Replace the blocked address ranges.
    pub fn blocked_networks(mut self, networks: impl IntoIterator<Item = IpNet>) -> Self {
        self.blocked_networks = networks.into_iter().collect();
        self
    }

    /// Replace the title filter.
    pub fn title_filter(mut self, filter: TitleFilter) -> Self {
        self.title_filter = filter;
        self
    }

    /// Set how many URLs of a batch are fetched concurrently (at least one).
    pub fn batch_concurrency(mut self, concurrency: usize) -> Self {
        self.batch_concurrency = concurrency.max(1);
        self
    }

    /// Networks the guard enforces.
    pub(crate) fn active_blocklist(&self) -> &[IpNet] {
        if self.block_private_ips {
            &self.blocked_networks
        } else {
            &[]
        }
    }

    /// Build a reqwest Client for one guarded target.
    fn build_client(&self, target: &Target) -> reqwest::Result<Client> {
        let redirect_policy = if self.follow_redirects {
            let max_redirects = self.max_redirects;
            let blocked = self.active_blocklist().to_vec();
            reqwest::redirect::Policy::custom(move |attempt| {
                if attempt.previous().len() >= max_redirects {
                    return attempt.error("too many redirects");
                }
                match guard::redirect_refusal(attempt.url(), &blocked) {
                    Some(reason) => attempt.error(reason),
                    None => attempt.follow(),
                }
            })
        } else {
            reqwest::redirect::Policy::none()
        };

        let mut builder = Client::builder()
            .redirect(redirect_policy)
            .connect_timeout(self.connect_timeout)
            .read_timeout(self.read_timeout)
            .timeout(self.timeout)
            .pool_idle_timeout(self.keep_alive_timeout)
            .user_agent(&self.user_agent);

        let mut headers = reqwest::header::HeaderMap::new();
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                name.parse::<reqwest::header::HeaderName>(),
                value.parse::<reqwest::header::HeaderValue>(),
            ) {
                headers.insert(name, value);
            }
        }
        builder = builder.default_headers(headers);

        if let Some(addr) = target.pinned {
            builder = builder.resolve(&target.host, addr);
        }

        builder.build()
    }
}

/// Describe a transport error with its whole source chain.
fn transport_failure(err: &(dyn std::error::Error + 'static)) -> HttpFailure {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    HttpFailure::Transport(message)
}

/// Guard, then GET `url` and buffer the body.
///
/// Only 2xx responses succeed. Transport failures of any kind surface as
/// [`Error::HttpResponse`].
pub async fn fetch(url: &str, options: &HttpOptions, resolver: &dyn Resolve) -> Result<FetchResult> {
    let target = guard::check(url, resolver, options.active_blocklist()).await?;

    let client = options
        .build_client(&target)
        .map_err(|e| Error::http(url, transport_failure(&e)))?;
    let response = client
        .get(target.url.clone())
        .send()
        .await
        .map_err(|e| Error::http(url, transport_failure(&e)))?;

    let status = response.status();
    debug!(url, status = status.as_u16(), final_url = %response.url(), "received response");
    if !status.is_success() {
        return Err(Error::http(url, HttpFailure::Status(status.as_u16())));
    }

    response_to_result(response, options.max_body_size)
        .await
        .map_err(|e| Error::http(url, transport_failure(&e)))
}

/// Convert a reqwest Response to a FetchResult with streaming body size limit.
async fn response_to_result(response: Response, max_body_size: usize) -> reqwest::Result<FetchResult> {
    let url = response.url().to_string();
    let status = response.status().as_u16();

    let headers: Vec<(String, String)> = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.to_string(), v.to_string()))
        })
        .collect();

    // Stream body with size limit - stops downloading when limit reached
    let content_length = response.content_length().unwrap_or(0) as usize;
    let capacity = content_length.min(max_body_size).min(1024 * 1024); // Cap initial alloc at 1MB
    let mut body = Vec::with_capacity(capacity);
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let remaining = max_body_size.saturating_sub(body.len());
        if remaining == 0 {
            break;
        }
        let to_take = chunk.len().min(remaining);
        body.extend_from_slice(&chunk[..to_take]);
        if to_take < chunk.len() {
            debug!(url, max_body_size, "truncated response body");
            break;
        }
    }

    Ok(FetchResult {
        url,
        status,
        headers,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = HttpOptions::default();
        assert!(options.follow_redirects);
        assert_eq!(options.max_redirects, DEFAULT_MAX_REDIRECTS);
        assert_eq!(options.connect_timeout, Duration::from_secs(3));
        assert_eq!(options.read_timeout, Duration::from_secs(3));
        assert_eq!(options.keep_alive_timeout, Duration::from_secs(3));
        assert_eq!(options.dns_timeout, Duration::from_secs(3));
        assert_eq!(options.timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(options.max_body_size, DEFAULT_MAX_BODY_SIZE);
        assert!(options.block_private_ips);
        assert_eq!(options.blocked_networks.len(), guard::DEFAULT_BLOCKED_NETWORKS.len());
        assert_eq!(options.nameservers, DEFAULT_NAMESERVERS.to_vec());
        assert!(options.user_agent.starts_with("metapage/"));
        assert_eq!(options.batch_concurrency, DEFAULT_BATCH_CONCURRENCY);
    }

    #[test]
    fn test_builder_pattern() {
        let options = HttpOptions::new()
            .follow_redirects(false)
            .max_redirects(5)
            .connect_timeout(Duration::from_secs(1))
            .read_timeout(Duration::from_secs(7))
            .timeout(Duration::from_secs(60))
            .keep_alive_timeout(Duration::from_secs(2))
            .dns_timeout(Duration::from_secs(4))
            .max_body_size(1024)
            .block_private_ips(false)
            .user_agent("Custom Agent")
            .header("X-Custom", "Value")
            .nameservers(["1.1.1.1".parse().unwrap()])
            .blocked_networks(guard::legacy_blocked_networks())
            .title_filter(TitleFilter::disabled())
            .batch_concurrency(0);

        assert!(!options.follow_redirects);
        assert_eq!(options.max_redirects, 5);
        assert_eq!(options.connect_timeout, Duration::from_secs(1));
        assert_eq!(options.read_timeout, Duration::from_secs(7));
        assert_eq!(options.timeout, Duration::from_secs(60));
        assert_eq!(options.keep_alive_timeout, Duration::from_secs(2));
        assert_eq!(options.dns_timeout, Duration::from_secs(4));
        assert_eq!(options.max_body_size, 1024);
        assert!(!options.block_private_ips);
        assert_eq!(options.user_agent, "Custom Agent");
        assert_eq!(options.headers.len(), 1);
        assert_eq!(options.nameservers.len(), 1);
        assert_eq!(options.blocked_networks.len(), 4);
        assert_eq!(options.title_filter, TitleFilter::disabled());
        assert_eq!(options.batch_concurrency, 1);
        assert!(options.active_blocklist().is_empty());
    }

    #[test]
    fn test_transport_failure_keeps_cause() {
        let inner = std::io::Error::new(std::io::ErrorKind::TimedOut, "receive timeout");
        let outer = std::io::Error::other(inner);
        let HttpFailure::Transport(message) = transport_failure(&outer) else {
            panic!("expected transport failure");
        };
        assert!(message.contains("receive timeout"));
    }
}
