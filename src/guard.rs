//! SSRF protection: scheme check, DNS resolution and address blocklist

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use ipnet::{AddrParseError, IpNet};
use tracing::{debug, warn};
use url::{Host, Url};

use crate::error::{Error, ResolveFailure, Result};

/// Error type returned by [`Resolve`] implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Google Public DNS, used instead of the system resolver configuration.
pub const DEFAULT_NAMESERVERS: [IpAddr; 2] = [
    IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8)),
    IpAddr::V4(Ipv4Addr::new(8, 8, 4, 4)),
];

/// Loopback and RFC 1918 ranges.
pub const LEGACY_BLOCKED_NETWORKS: &[&str] = &[
    "127.0.0.0/8",
    "10.0.0.0/8",
    "172.16.0.0/12",
    "192.168.0.0/16",
];

/// [`LEGACY_BLOCKED_NETWORKS`] plus link-local (cloud metadata), the
/// "this network" block, and IPv6 loopback, unique-local and link-local.
pub const DEFAULT_BLOCKED_NETWORKS: &[&str] = &[
    "127.0.0.0/8",
    "10.0.0.0/8",
    "172.16.0.0/12",
    "192.168.0.0/16",
    "169.254.0.0/16",
    "0.0.0.0/8",
    "::1/128",
    "fc00::/7",
    "fe80::/10",
];

/// Parse a list of CIDR strings. Any malformed entry fails the whole list.
pub fn parse_networks(cidrs: &[&str]) -> std::result::Result<Vec<IpNet>, AddrParseError> {
    cidrs.iter().map(|cidr| cidr.parse()).collect()
}

/// [`DEFAULT_BLOCKED_NETWORKS`] parsed.
pub fn default_blocked_networks() -> Vec<IpNet> {
    builtin_networks(DEFAULT_BLOCKED_NETWORKS)
}

/// [`LEGACY_BLOCKED_NETWORKS`] parsed.
pub fn legacy_blocked_networks() -> Vec<IpNet> {
    builtin_networks(LEGACY_BLOCKED_NETWORKS)
}

fn builtin_networks(cidrs: &[&str]) -> Vec<IpNet> {
    parse_networks(cidrs).expect("built-in network lists are valid CIDR")
}

/// Hostname to address resolution.
#[async_trait]
pub trait Resolve: Send + Sync {
    /// Resolve `host` to all of its addresses.
    async fn resolve(&self, host: &str) -> std::result::Result<Vec<IpAddr>, BoxError>;
}

/// Resolves through fixed nameservers, ignoring `/etc/resolv.conf` and the
/// hosts file. A fresh resolver is built per lookup so nothing is cached
/// between calls.
#[derive(Debug, Clone)]
pub struct PublicDnsResolver {
    config: ResolverConfig,
    opts: ResolverOpts,
}

impl PublicDnsResolver {
    pub fn new(nameservers: &[IpAddr], timeout: Duration) -> Self {
        let group = NameServerConfigGroup::from_ips_clear(nameservers, 53, true);
        let config = ResolverConfig::from_parts(None, Vec::new(), group);

        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        opts.attempts = 1;
        opts.use_hosts_file = false;

        Self { config, opts }
    }
}

impl Default for PublicDnsResolver {
    fn default() -> Self {
        Self::new(&DEFAULT_NAMESERVERS, Duration::from_secs(3))
    }
}

#[async_trait]
impl Resolve for PublicDnsResolver {
    async fn resolve(&self, host: &str) -> std::result::Result<Vec<IpAddr>, BoxError> {
        let resolver = TokioAsyncResolver::tokio(self.config.clone(), self.opts.clone());
        let lookup = resolver.lookup_ip(host).await?;
        Ok(lookup.iter().collect())
    }
}

/// A URL that passed the guard.
#[derive(Debug, Clone)]
pub struct Target {
    pub url: Url,

    /// Host as written in the URL
    pub host: String,

    /// Vetted address for domain hosts. The fetcher connects here instead of
    /// resolving again. `None` for IP-literal hosts.
    pub pinned: Option<SocketAddr>,
}

/// Whether `ip` falls into any of `networks`. IPv4-mapped IPv6 addresses
/// are checked as IPv4.
pub fn is_blocked(ip: IpAddr, networks: &[IpNet]) -> bool {
    let ip = match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(IpAddr::V6(v6), IpAddr::V4),
        v4 => v4,
    };
    networks.iter().any(|net| net.contains(&ip))
}

/// Parse the URL and require an http(s) scheme.
pub fn parse_http_url(url: &str) -> Result<Url> {
    let parsed = Url::parse(url).map_err(|e| Error::resolve(url, ResolveFailure::Parse(e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(Error::resolve(
            url,
            ResolveFailure::InvalidScheme(scheme.to_string()),
        )),
    }
}

/// Validate `url` before any request is made.
///
/// Every address the host resolves to must lie outside `blocked`; a single
/// hit rejects the URL.
pub async fn check(url: &str, resolver: &dyn Resolve, blocked: &[IpNet]) -> Result<Target> {
    let parsed = parse_http_url(url)?;

    let (host, addrs, is_domain) = match parsed.host() {
        Some(Host::Domain(domain)) => {
            let addrs = resolver
                .resolve(domain)
                .await
                .map_err(|e| Error::resolve(url, ResolveFailure::Dns(e.to_string())))?;
            (domain.to_string(), addrs, true)
        }
        Some(Host::Ipv4(ip)) => (ip.to_string(), vec![IpAddr::V4(ip)], false),
        Some(Host::Ipv6(ip)) => (ip.to_string(), vec![IpAddr::V6(ip)], false),
        None => return Err(Error::resolve(url, ResolveFailure::MissingHost)),
    };

    let Some(&first) = addrs.first() else {
        return Err(Error::resolve(
            url,
            ResolveFailure::Dns(format!("no addresses for {host}")),
        ));
    };

    if let Some(&ip) = addrs.iter().find(|&&ip| is_blocked(ip, blocked)) {
        warn!(url, %ip, "refusing url resolving to blocked address");
        return Err(Error::resolve(url, ResolveFailure::PrivateAddress(ip)));
    }

    debug!(url, host = host.as_str(), addresses = ?addrs, "url passed ssrf guard");

    let pinned = is_domain.then(|| {
        let port = parsed.port_or_known_default().unwrap_or(80);
        SocketAddr::new(first, port)
    });

    Ok(Target {
        url: parsed,
        host,
        pinned,
    })
}

/// Reason to refuse following a redirect to `url`, if any.
///
/// Only IP-literal hosts can be checked here without a lookup; domain hosts
/// on redirect hops are resolved by the transport.
pub(crate) fn redirect_refusal(url: &Url, blocked: &[IpNet]) -> Option<String> {
    if !matches!(url.scheme(), "http" | "https") {
        return Some(format!("redirect to unsupported scheme '{}'", url.scheme()));
    }
    let ip = match url.host() {
        Some(Host::Ipv4(ip)) => IpAddr::V4(ip),
        Some(Host::Ipv6(ip)) => IpAddr::V6(ip),
        Some(Host::Domain(domain)) => {
            debug!(host = domain, "following redirect to unchecked host");
            return None;
        }
        None => return Some("redirect without host".to_string()),
    };
    is_blocked(ip, blocked).then(|| format!("redirect to blocked address {ip}"))
}
