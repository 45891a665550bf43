//! HTML document parsing and tag lookup

use std::collections::HashMap;
use std::sync::OnceLock;

use scraper::{Html, Selector};

fn title_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("title").unwrap())
}

fn meta_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("meta[content]").unwrap())
}

fn link_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("link[rel][href]").unwrap())
}

fn div_selector() -> &'static Selector {
    static SELECTOR: OnceLock<Selector> = OnceLock::new();
    SELECTOR.get_or_init(|| Selector::parse("div").unwrap())
}

/// Meta tags consulted by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetaKey {
    OgTitle,
    OgDescription,
    OgImage,
    OgImageSecureUrl,
    OgType,
    OgUrl,
    OgSiteName,
    Description,
}

impl MetaKey {
    const ALL: [MetaKey; 8] = [
        MetaKey::OgTitle,
        MetaKey::OgDescription,
        MetaKey::OgImage,
        MetaKey::OgImageSecureUrl,
        MetaKey::OgType,
        MetaKey::OgUrl,
        MetaKey::OgSiteName,
        MetaKey::Description,
    ];

    /// The `property`/`name` attribute value this key matches.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OgTitle => "og:title",
            Self::OgDescription => "og:description",
            Self::OgImage => "og:image",
            Self::OgImageSecureUrl => "og:image:secure_url",
            Self::OgType => "og:type",
            Self::OgUrl => "og:url",
            Self::OgSiteName => "og:site_name",
            Self::Description => "description",
        }
    }

    fn from_attr(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.as_str() == value)
    }
}

/// `<link rel="...">` relations consulted by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkRel {
    Canonical,
    AppleTouchIcon,
}

impl LinkRel {
    const ALL: [LinkRel; 2] = [LinkRel::Canonical, LinkRel::AppleTouchIcon];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Canonical => "canonical",
            Self::AppleTouchIcon => "apple-touch-icon",
        }
    }

    fn from_attr(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|rel| rel.as_str() == value)
    }
}

/// The parts of a parsed HTML page the resolver can ask about.
///
/// Values are captured in a single pass at parse time, keeping the first
/// occurrence of each key as a CSS `first` lookup would.
#[derive(Debug, Clone, Default)]
pub struct Document {
    title: Option<String>,
    by_property: HashMap<MetaKey, String>,
    by_name: HashMap<MetaKey, String>,
    links: HashMap<LinkRel, String>,
}

impl Document {
    /// Parse a body as HTML.
    ///
    /// Returns `None` when the tree has no `div` at all, which means the body
    /// was something else (JSON, plain text) that the parser wrapped in an
    /// empty skeleton.
    pub fn parse(body: &[u8]) -> Option<Self> {
        let html = String::from_utf8_lossy(body);
        let document = Html::parse_document(&html);

        if document.select(div_selector()).next().is_none() {
            return None;
        }

        let mut doc = Self {
            title: document
                .select(title_selector())
                .next()
                .map(|el| el.text().collect::<String>().trim().to_string())
                .filter(|s| !s.is_empty()),
            ..Default::default()
        };
        doc.extract_meta_tags(&document);
        doc.extract_links(&document);
        Some(doc)
    }

    fn extract_meta_tags(&mut self, document: &Html) {
        for element in document.select(meta_selector()) {
            let el = element.value();
            let content = match el.attr("content").map(str::trim) {
                Some(c) if !c.is_empty() => c,
                _ => continue,
            };

            if let Some(key) = el.attr("property").and_then(MetaKey::from_attr) {
                self.by_property
                    .entry(key)
                    .or_insert_with(|| content.to_string());
            }
            if let Some(key) = el.attr("name").and_then(MetaKey::from_attr) {
                self.by_name.entry(key).or_insert_with(|| content.to_string());
            }
        }
    }

    fn extract_links(&mut self, document: &Html) {
        for element in document.select(link_selector()) {
            let el = element.value();
            let rel = el.attr("rel").map(str::trim).and_then(LinkRel::from_attr);
            let href = el.attr("href").map(str::trim).filter(|s| !s.is_empty());
            if let (Some(rel), Some(href)) = (rel, href) {
                self.links.entry(rel).or_insert_with(|| href.to_string());
            }
        }
    }

    /// Content of the first meta tag with `property=key`, else the first with `name=key`.
    pub fn meta(&self, key: MetaKey) -> Option<&str> {
        self.by_property
            .get(&key)
            .or_else(|| self.by_name.get(&key))
            .map(String::as_str)
    }

    /// Raw `href` of the first `<link>` with the given relation.
    pub fn link(&self, rel: LinkRel) -> Option<&str> {
        self.links.get(&rel).map(String::as_str)
    }

    /// Text of the first `<title>` element.
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }
}
