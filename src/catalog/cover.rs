//! Cover-image classification for book listings.
//!
//! The books API returns a `largeImageUrl` for almost every listing, but a
//! good share of those point at a generic "no image" / "coming soon" graphic
//! instead of real cover art. Those are detected by URL marker so scoring can
//! push them to the bottom.

/// Size query appended to every emitted cover URL.
pub const DISPLAY_SIZE_QUERY: &str = "_ex=300x420";

/// Case-insensitive URL fragments that identify stand-in artwork.
pub const PLACEHOLDER_MARKERS: [&str; 9] = [
    "noimage",
    "no_image",
    "no-image",
    "no image",
    "no%20image",
    "comingsoon",
    "coming_soon",
    "substitution",
    "cabinet/img/",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoverKind {
    /// Looks like real cover art.
    Artwork,
    /// Generic stand-in image.
    Placeholder,
    /// No URL at all.
    Missing,
}

/// Classify a raw image URL.
///
/// ```
/// use manga_catalog::catalog::cover::{classify_cover, CoverKind};
///
/// assert_eq!(classify_cover("https://thumbnail.image.rakuten.co.jp/0_mall/book/cabinet/1234/x.jpg"), CoverKind::Artwork);
/// assert_eq!(classify_cover("https://thumbnail.image.rakuten.co.jp/0_mall/book/cabinet/img/noimage.gif"), CoverKind::Placeholder);
/// assert_eq!(classify_cover("  "), CoverKind::Missing);
/// ```
pub fn classify_cover(url: &str) -> CoverKind {
    let url = url.trim();
    if url.is_empty() {
        return CoverKind::Missing;
    }
    let url_lc = url.to_ascii_lowercase();
    if PLACEHOLDER_MARKERS.iter().any(|m| url_lc.contains(m)) {
        CoverKind::Placeholder
    } else {
        CoverKind::Artwork
    }
}

/// Drop any existing query string and fragment, then pin the display size.
pub fn display_cover_url(url: &str) -> String {
    let url = url.trim();
    let base = url
        .split_once('?')
        .map(|(base, _)| base)
        .unwrap_or(url);
    let base = base.split_once('#').map(|(b, _)| b).unwrap_or(base);
    format!("{base}?{DISPLAY_SIZE_QUERY}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_placeholder(url: &str) -> bool {
        classify_cover(url) == CoverKind::Placeholder
    }

    #[test]
    fn placeholder_markers_are_case_insensitive() {
        assert!(is_placeholder("https://img.example/NoImage_300.jpg"));
        assert!(is_placeholder("https://img.example/ComingSoon.png"));
        assert!(is_placeholder("https://img.example/image_substitution.gif"));
        assert!(is_placeholder("https://img.example/book/cabinet/img/x.gif"));
        assert!(!is_placeholder("https://img.example/book/cabinet/0001/x.jpg"));
    }

    #[test]
    fn spaced_no_image_markers_are_placeholders() {
        assert!(is_placeholder("https://img.example/No Image.jpg"));
        assert!(is_placeholder("https://img.example/no%20image_l.gif"));
        assert!(is_placeholder("https://img.example/NO%20IMAGE.png"));
    }

    #[test]
    fn missing_urls_are_not_placeholders() {
        assert_eq!(classify_cover(""), CoverKind::Missing);
        assert!(!is_placeholder(""));
    }

    #[test]
    fn display_url_replaces_existing_query() {
        assert_eq!(
            display_cover_url("https://img.example/a.jpg?_ex=200x200&x=1"),
            "https://img.example/a.jpg?_ex=300x420"
        );
        assert_eq!(
            display_cover_url("https://img.example/a.jpg"),
            "https://img.example/a.jpg?_ex=300x420"
        );
        assert_eq!(
            display_cover_url(" https://img.example/a.jpg#top "),
            "https://img.example/a.jpg?_ex=300x420"
        );
    }
}
