#![allow(dead_code)]

use std::collections::HashMap;
use std::net::IpAddr;

use async_trait::async_trait;
use metapage::{BoxError, HttpOptions, Metapage, Resolve, parse_networks};
use sha1::{Digest, Sha1};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const JPEG: &[u8] = &[
    0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00, 0x01, 0x01, 0x00,
];

/// Answers from a fixed table; unknown names fail like NXDOMAIN.
pub struct StaticResolver(HashMap<String, Vec<IpAddr>>);

impl StaticResolver {
    pub fn new(records: &[(&str, &str)]) -> Self {
        let mut table: HashMap<String, Vec<IpAddr>> = HashMap::new();
        for (host, ip) in records {
            table
                .entry(host.to_string())
                .or_default()
                .push(ip.parse().unwrap());
        }
        Self(table)
    }
}

#[async_trait]
impl Resolve for StaticResolver {
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, BoxError> {
        self.0
            .get(host)
            .cloned()
            .ok_or_else(|| format!("no record found for {host}").into())
    }
}

/// Hosts served by the mock server on loopback.
pub const LOOPBACK_HOSTS: &[(&str, &str)] = &[
    ("example.com", "127.0.0.1"),
    ("www.example.com", "127.0.0.1"),
    ("github.test", "127.0.0.1"),
    ("hamburg.test", "127.0.0.1"),
    ("intranet.test", "10.20.30.40"),
];

/// Only 10.0.0.0/8 is blocked so the loopback mock server stays reachable.
pub fn options() -> HttpOptions {
    HttpOptions::new().blocked_networks(parse_networks(&["10.0.0.0/8"]).unwrap())
}

pub fn client() -> Metapage {
    client_with(options())
}

pub fn client_with(options: HttpOptions) -> Metapage {
    Metapage::with_options(options).with_resolver(StaticResolver::new(LOOPBACK_HOSTS))
}

pub fn url(server: &MockServer, host: &str, page: &str) -> String {
    format!("http://{host}:{}{page}", server.address().port())
}

pub fn html(head: &str) -> String {
    format!("<!DOCTYPE html>\n<html><head>{head}</head><body><div>content</div></body></html>")
}

pub async fn serve_html(server: &MockServer, page: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html"))
        .mount(server)
        .await;
}

pub fn sha1_hex(s: &str) -> String {
    hex::encode(Sha1::digest(s.as_bytes()))
}
