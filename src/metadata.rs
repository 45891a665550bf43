//! Link-preview metadata resolved from a fetched resource

use std::sync::OnceLock;

use serde::{Deserialize, Serialize, Serializer};
use sha1::{Digest, Sha1};
use tracing::debug;
use url::Url;

use crate::document::{Document, LinkRel, MetaKey};
use crate::error::{Error, Result};
use crate::response::FetchResult;
use crate::sniff::ContentClass;

/// Words marking authentication pages. Matched against the title lower-cased
/// with spaces removed.
pub const DEFAULT_IGNORED_TITLE_WORDS: &[&str] = &[
    "signup",
    "signin",
    "login",
    "anmeldung",
    "anmelden",
    "registration",
];

/// Rejects titles of login walls and sign-up forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleFilter {
    words: Vec<String>,
}

impl Default for TitleFilter {
    fn default() -> Self {
        Self::new(DEFAULT_IGNORED_TITLE_WORDS.iter().copied())
    }
}

impl TitleFilter {
    /// Build a filter from a word list. Words are lower-cased and stripped of
    /// spaces so they compare like titles do.
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            words: words.into_iter().map(|w| squash(w.as_ref())).collect(),
        }
    }

    /// A filter that lets every title through.
    pub fn disabled() -> Self {
        Self { words: Vec::new() }
    }

    /// Whether `title` contains one of the ignored words.
    pub fn is_blocked(&self, title: &str) -> bool {
        let title = squash(title);
        self.words
            .iter()
            .any(|word| !word.is_empty() && title.contains(word.as_str()))
    }

    /// Classify an optional title.
    pub fn check(&self, title: Option<&str>) -> TitleLookup {
        match title {
            None => TitleLookup::Absent,
            Some(t) if self.is_blocked(t) => TitleLookup::Blocked(t.to_string()),
            Some(t) => TitleLookup::Present(t.to_string()),
        }
    }
}

fn squash(text: &str) -> String {
    text.to_lowercase().replace(' ', "")
}

/// Outcome of the title lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TitleLookup {
    Present(String),
    Absent,
    Blocked(String),
}

/// Metadata of one fetched page or image.
///
/// Construction sniffs the body, parses it as HTML unless it is an image and
/// resolves the title; any of these may fail. Every other field is derived
/// on first access and cached for the lifetime of the record.
///
/// # Example
/// ```
/// use metapage::{FetchResult, Metadata};
///
/// let html = r#"<!DOCTYPE html><html><head>
///     <meta property="og:title" content="A">
///     <meta property="og:type" content="article">
/// </head><body><div></div></body></html>"#;
///
/// let meta = Metadata::from_response("https://example.com/a", FetchResult::new("https://example.com/a", html))?;
/// assert_eq!(meta.title(), Some("A"));
/// assert_eq!(meta.kind(), "article");
/// assert_eq!(meta.canonical_url(), "https://example.com/a");
/// assert_eq!(meta.site_name(), Some("example.com"));
/// # Ok::<(), metapage::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Metadata {
    url: String,
    response: FetchResult,
    class: Option<ContentClass>,
    document: Option<Document>,
    title: Option<String>,

    canonical_url: OnceLock<String>,
    canonical: OnceLock<Option<Url>>,
    image_url: OnceLock<Option<String>>,
    id: OnceLock<String>,
}

impl Metadata {
    /// Resolve a response fetched for `url` with the default title filter.
    pub fn from_response(url: &str, response: FetchResult) -> Result<Self> {
        Self::from_response_with(url, response, &TitleFilter::default())
    }

    /// Resolve a response fetched for `url`.
    pub fn from_response_with(url: &str, response: FetchResult, filter: &TitleFilter) -> Result<Self> {
        let class = ContentClass::sniff(&response.body);
        debug!(
            url,
            mime_type = class.as_ref().map(|c| c.mime_type.as_str()),
            "sniffed content"
        );

        let is_image = class.as_ref().is_some_and(ContentClass::is_image);
        let document = if is_image {
            None
        } else {
            let doc = Document::parse(&response.body).ok_or_else(|| Error::ContentType {
                url: url.to_string(),
            })?;
            Some(doc)
        };

        let title = match document.as_ref() {
            None => None,
            Some(doc) => {
                let candidate = doc.meta(MetaKey::OgTitle).or_else(|| doc.title());
                match filter.check(candidate) {
                    TitleLookup::Present(title) => Some(title),
                    TitleLookup::Absent => None,
                    TitleLookup::Blocked(title) => {
                        return Err(Error::IgnoredTitle {
                            url: url.to_string(),
                            title,
                        });
                    }
                }
            }
        };

        Ok(Self {
            url: url.to_string(),
            response,
            class,
            document,
            title,
            canonical_url: OnceLock::new(),
            canonical: OnceLock::new(),
            image_url: OnceLock::new(),
            id: OnceLock::new(),
        })
    }

    /// The URL this record was requested for.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The URL after redirects.
    pub fn final_url(&self) -> &str {
        &self.response.url
    }

    /// The response the record was built from.
    pub fn response(&self) -> &FetchResult {
        &self.response
    }

    /// Whether the resource is an image.
    pub fn is_image(&self) -> bool {
        self.document.is_none()
    }

    /// `og:title`, else the `<title>` text. Absent for images.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// `og:description`, else the `description` meta tag. Absent for images.
    pub fn description(&self) -> Option<&str> {
        let doc = self.document.as_ref()?;
        doc.meta(MetaKey::OgDescription)
            .or_else(|| doc.meta(MetaKey::Description))
    }

    /// Preview image: the resource itself for images, else `og:image:secure_url`,
    /// `og:image`, or the apple-touch-icon link.
    pub fn image_url(&self) -> Option<&str> {
        let Some(doc) = self.document.as_ref() else {
            return Some(&self.url);
        };
        self.image_url
            .get_or_init(|| {
                doc.meta(MetaKey::OgImageSecureUrl)
                    .or_else(|| doc.meta(MetaKey::OgImage))
                    .map(str::to_string)
                    .or_else(|| {
                        doc.link(LinkRel::AppleTouchIcon)
                            .and_then(|href| absolute_url(href, self.canonical_url()))
                    })
            })
            .as_deref()
    }

    /// Page type: "image" for images, else `og:type`, else "website".
    pub fn kind(&self) -> &str {
        match self.document.as_ref() {
            None => "image",
            Some(doc) => doc.meta(MetaKey::OgType).unwrap_or("website"),
        }
    }

    /// `og:url`, else the canonical link, else the requested URL.
    pub fn canonical_url(&self) -> &str {
        let Some(doc) = self.document.as_ref() else {
            return &self.url;
        };
        self.canonical_url.get_or_init(|| {
            doc.meta(MetaKey::OgUrl)
                .map(str::to_string)
                .or_else(|| {
                    doc.link(LinkRel::Canonical)
                        .and_then(|href| absolute_url(href, &self.url))
                })
                .unwrap_or_else(|| self.url.clone())
        })
    }

    /// Hex SHA-1 of the canonical URL.
    pub fn id(&self) -> &str {
        self.id
            .get_or_init(|| hex::encode(Sha1::digest(self.canonical_url().as_bytes())))
    }

    /// `og:site_name`, else the host of the canonical URL. Absent for images.
    pub fn site_name(&self) -> Option<&str> {
        let doc = self.document.as_ref()?;
        doc.meta(MetaKey::OgSiteName).or_else(|| self.host())
    }

    /// Sniffed top-level media type, e.g. "image".
    pub fn media_type(&self) -> Option<&str> {
        self.class.as_ref().map(|c| c.media_type.as_str())
    }

    /// Sniffed MIME type, e.g. "image/jpeg".
    pub fn mime_type(&self) -> Option<&str> {
        self.class.as_ref().map(|c| c.mime_type.as_str())
    }

    fn host(&self) -> Option<&str> {
        self.canonical
            .get_or_init(|| Url::parse(self.canonical_url()).ok())
            .as_ref()
            .and_then(Url::host_str)
    }

    /// Plain projection of all fields.
    pub fn to_map(&self) -> MetadataMap {
        MetadataMap {
            id: self.id().to_string(),
            title: self.title().map(str::to_string),
            description: self.description().map(str::to_string),
            image_url: self.image_url().map(str::to_string),
            kind: self.kind().to_string(),
            canonical_url: self.canonical_url().to_string(),
            site_name: self.site_name().map(str::to_string),
            media_type: self.media_type().map(str::to_string),
            content_type: self.mime_type().map(str::to_string),
        }
    }

    /// [`to_map`](Self::to_map) encoded as JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(&self.to_map())
    }
}

impl Serialize for Metadata {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_map().serialize(serializer)
    }
}

/// Flat view of a [`Metadata`] record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataMap {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub canonical_url: String,
    pub site_name: Option<String>,
    pub media_type: Option<String>,
    pub content_type: Option<String>,
}

/// Hrefs starting with "http" are taken as is. Protocol-relative hrefs take
/// the scheme of `base`; anything else is rooted at the host of `base`.
fn absolute_url(href: &str, base: &str) -> Option<String> {
    if href.starts_with("http") {
        return Some(href.to_string());
    }
    let base = Url::parse(base).ok()?;
    let joined = if href.starts_with("//") {
        base.join(href)
    } else {
        base.join(&format!("/{}", href.trim_start_matches('/')))
    };
    joined.ok().map(String::from)
}
