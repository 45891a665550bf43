//! Buffered HTTP response handed to the metadata resolver

/// Result of a single GET: status, headers, and the fully buffered body.
///
/// The body is raw bytes because both the sniffer and the HTML parser need
/// random access to all of it.
#[derive(Debug, Clone, Default)]
pub struct FetchResult {
    /// The final URL after following redirects
    pub url: String,

    /// HTTP status code
    pub status: u16,

    /// Response headers
    pub headers: Vec<(String, String)>,

    /// Response body
    pub body: Vec<u8>,
}

impl FetchResult {
    /// Build a 200 response with no headers, mostly useful when the caller
    /// has fetched the body by other means.
    pub fn new(url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            url: url.into(),
            status: 200,
            headers: Vec::new(),
            body: body.into(),
        }
    }
}
