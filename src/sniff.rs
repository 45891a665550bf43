//! Magic-byte content classification

/// Media and MIME type derived from the leading bytes of a body,
/// independent of any declared Content-Type header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentClass {
    /// Top-level type, e.g. "image" or "text"
    pub media_type: String,

    /// Full MIME type, e.g. "image/jpeg" or "text/html"
    pub mime_type: String,
}

impl ContentClass {
    /// Sniff `bytes` against known signatures. `None` when nothing matches.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        let kind = infer::get(bytes)?;
        Some(Self::from_mime(kind.mime_type()))
    }

    fn from_mime(mime: &str) -> Self {
        let media_type = mime.split('/').next().unwrap_or(mime);
        Self {
            media_type: media_type.to_string(),
            mime_type: mime.to_string(),
        }
    }

    /// Whether the body is an image. Image resources skip document parsing.
    pub fn is_image(&self) -> bool {
        self.media_type == "image"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, b'J', b'F', b'I', b'F', 0x00];
    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00];

    #[test]
    fn test_images() {
        let jpeg = ContentClass::sniff(JPEG).unwrap();
        assert_eq!(jpeg.media_type, "image");
        assert_eq!(jpeg.mime_type, "image/jpeg");
        assert!(jpeg.is_image());

        let png = ContentClass::sniff(PNG).unwrap();
        assert_eq!(png.mime_type, "image/png");
        assert!(png.is_image());
    }

    #[test]
    fn test_html() {
        let html = ContentClass::sniff(b"<!DOCTYPE html>\n<html><body><div></div></body></html>")
            .unwrap();
        assert_eq!(html.media_type, "text");
        assert_eq!(html.mime_type, "text/html");
        assert!(!html.is_image());
    }

    #[test]
    fn test_unknown() {
        assert_eq!(ContentClass::sniff(br#"{"name": "rails"}"#), None);
        assert_eq!(ContentClass::sniff(b""), None);
    }
}
