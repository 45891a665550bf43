//! Candidate URL extraction from free text

use std::sync::OnceLock;

use regex::Regex;

/// Matches `www.` at the start of the text or after anything but a slash.
fn bare_www_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"(^|[^/])www\.").unwrap())
}

/// An http(s) URL runs until whitespace or a character that cannot occur in a URI.
fn url_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r#"(?i)https?://[^\s<>"{}|\\^`]+"#).unwrap())
}

/// Candidate URLs found in a piece of text.
///
/// Built by [`candidate_urls`]. Holds the rewritten text, so iterating is
/// lazy and can be restarted with another call to [`CandidateUrls::iter`].
#[derive(Debug, Clone)]
pub struct CandidateUrls {
    text: String,
}

impl CandidateUrls {
    /// Iterate the candidates in order of first occurrence.
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        url_regex()
            .find_iter(&self.text)
            .map(|m| strip_trailing_punctuation(m.as_str()))
    }

    /// Whether the text contains no candidate at all.
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

impl<'a> IntoIterator for &'a CandidateUrls {
    type Item = &'a str;
    type IntoIter = Box<dyn Iterator<Item = &'a str> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// Find http(s) URLs mentioned in `text`.
///
/// Protocol-less `www.` mentions are treated as `http://www.`, unless the
/// `www.` follows a slash (it is then part of a path or already prefixed).
///
/// # Example
/// ```
/// use metapage::candidate_urls;
///
/// let urls = candidate_urls("See www.example.com/about, or http://example.org/x...");
/// let urls: Vec<&str> = urls.iter().collect();
/// assert_eq!(urls, ["http://www.example.com/about", "http://example.org/x"]);
/// ```
pub fn candidate_urls(text: &str) -> CandidateUrls {
    let text = bare_www_regex()
        .replace_all(text, "${1}http://www.")
        .into_owned();
    CandidateUrls { text }
}

/// Remove trailing runs of `.` and `,` (sentence punctuation) from a URL.
pub fn strip_trailing_punctuation(url: &str) -> &str {
    url.trim_end_matches(['.', ','])
}
