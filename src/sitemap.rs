//! Sitemap projection of a finished catalog.
//!
//! One location per static page, one per entry (`/manga/{id}`) and one per
//! distinct tag (`/tag/{tag}`), rendered as a sitemaps.org `urlset`.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use tracing::info;

use crate::catalog::model::CatalogEntry;
use crate::pipeline::read_catalog;
use crate::util::env::env_opt;

pub const DEFAULT_BASE_URL: &str = "https://manga-reach.com";
pub const DEFAULT_OUTPUT: &str = "public/sitemap.xml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeFreq {
    Daily,
    Weekly,
    Monthly,
}

impl ChangeFreq {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeFreq::Daily => "daily",
            ChangeFreq::Weekly => "weekly",
            ChangeFreq::Monthly => "monthly",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SitemapUrl {
    pub loc: String,
    pub changefreq: ChangeFreq,
    pub priority: f32,
}

impl SitemapUrl {
    fn new(loc: String, changefreq: ChangeFreq, priority: f32) -> Self {
        Self {
            loc,
            changefreq,
            priority,
        }
    }
}

const STATIC_PAGES: [(&str, ChangeFreq, f32); 3] = [
    ("/", ChangeFreq::Daily, 1.0),
    ("/about", ChangeFreq::Monthly, 0.5),
    ("/privacy", ChangeFreq::Monthly, 0.5),
];

#[derive(Debug, Clone)]
pub struct SitemapConfig {
    pub base_url: String,
    pub output: String,
}

impl Default for SitemapConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            output: DEFAULT_OUTPUT.to_string(),
        }
    }
}

impl SitemapConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            base_url: env_opt("SITEMAP_BASE_URL").unwrap_or(d.base_url),
            output: env_opt("SITEMAP_OUTPUT").unwrap_or(d.output),
        }
    }
}

/// Static pages, then entries in catalog order, then distinct non-empty tags
/// in first-seen order.
pub fn project(base_url: &str, entries: &[CatalogEntry]) -> Vec<SitemapUrl> {
    let base = base_url.trim_end_matches('/');
    let mut urls: Vec<SitemapUrl> = STATIC_PAGES
        .iter()
        .map(|(path, freq, prio)| {
            let loc = if *path == "/" {
                format!("{base}/")
            } else {
                format!("{base}{path}")
            };
            SitemapUrl::new(loc, *freq, *prio)
        })
        .collect();

    urls.extend(entries.iter().map(|e| {
        SitemapUrl::new(format!("{base}/manga/{}", e.id), ChangeFreq::Weekly, 0.8)
    }));

    let mut seen = HashSet::new();
    for tag in entries.iter().flat_map(|e| e.tags.iter()) {
        let tag = tag.trim();
        if tag.is_empty() || !seen.insert(tag) {
            continue;
        }
        urls.push(SitemapUrl::new(
            format!("{base}/tag/{}", urlencoding::encode(tag)),
            ChangeFreq::Daily,
            0.9,
        ));
    }
    urls
}

fn escape_xml(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn render(urls: &[SitemapUrl], lastmod: NaiveDate) -> String {
    let lastmod = lastmod.format("%Y-%m-%d").to_string();
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );
    for url in urls {
        // Writing into a String cannot fail.
        let _ = write!(
            xml,
            "  <url>\n    <loc>{}</loc>\n    <lastmod>{}</lastmod>\n    <changefreq>{}</changefreq>\n    <priority>{:.1}</priority>\n  </url>\n",
            escape_xml(&url.loc),
            lastmod,
            url.changefreq.as_str(),
            url.priority
        );
    }
    xml.push_str("</urlset>\n");
    xml
}

/// Render and write the sitemap; returns the number of `<url>` records.
pub fn write_sitemap(
    path: impl AsRef<Path>,
    base_url: &str,
    entries: &[CatalogEntry],
    lastmod: NaiveDate,
) -> Result<usize> {
    let path = path.as_ref();
    let urls = project(base_url, entries);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating sitemap directory {}", parent.display()))?;
    }
    fs::write(path, render(&urls, lastmod))
        .with_context(|| format!("writing sitemap to {}", path.display()))?;
    info!(path = %path.display(), urls = urls.len(), entries = entries.len(), "sitemap written");
    Ok(urls.len())
}

/// Read a catalog JSON file and write its sitemap dated today.
pub fn generate_from_catalog(input: impl AsRef<Path>, cfg: &SitemapConfig) -> Result<usize> {
    let entries = read_catalog(input)?;
    write_sitemap(&cfg.output, &cfg.base_url, &entries, Local::now().date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: u32, tags: &[&str]) -> CatalogEntry {
        CatalogEntry {
            id,
            is_real: true,
            title: format!("title {id}"),
            description: String::new(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            author: "作者".into(),
            rating: 4.5,
            cover: String::new(),
        }
    }

    #[test]
    fn projects_static_entries_and_distinct_tags() {
        let entries = vec![
            entry(1, &["作者", "溺愛"]),
            entry(2, &["溺愛", " ", "学園もの"]),
        ];
        let urls = project("https://example.com/", &entries);
        let locs: Vec<&str> = urls.iter().map(|u| u.loc.as_str()).collect();
        assert_eq!(
            locs,
            vec![
                "https://example.com/",
                "https://example.com/about",
                "https://example.com/privacy",
                "https://example.com/manga/1",
                "https://example.com/manga/2",
                "https://example.com/tag/%E4%BD%9C%E8%80%85",
                "https://example.com/tag/%E6%BA%BA%E6%84%9B",
                "https://example.com/tag/%E5%AD%A6%E5%9C%92%E3%82%82%E3%81%AE",
            ]
        );
        assert_eq!(urls[0].changefreq, ChangeFreq::Daily);
        assert_eq!(urls[1].changefreq, ChangeFreq::Monthly);
        assert_eq!(urls[3].changefreq, ChangeFreq::Weekly);
        assert_eq!(urls[5].priority, 0.9);
    }

    #[test]
    fn empty_catalog_still_lists_static_pages() {
        assert_eq!(project(DEFAULT_BASE_URL, &[]).len(), 3);
    }

    #[test]
    fn renders_urlset_with_lastmod() {
        let urls = project("https://example.com", &[entry(7, &["A&B"])]);
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let xml = render(&urls, date);
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert_eq!(xml.matches("<url>").count(), 5);
        assert!(xml.contains("<loc>https://example.com/manga/7</loc>"));
        assert!(xml.contains("<lastmod>2024-05-01</lastmod>"));
        assert!(xml.contains("<priority>1.0</priority>"));
        assert!(xml.contains("/tag/A%26B"));
        assert!(xml.trim_end().ends_with("</urlset>"));
    }

    #[test]
    fn escapes_reserved_characters() {
        assert_eq!(escape_xml("a&b<c>"), "a&amp;b&lt;c&gt;");
    }

    #[test]
    fn writes_file_and_counts_urls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("public").join("sitemap.xml");
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let count = write_sitemap(&path, "https://example.com", &[entry(1, &["x"])], date).unwrap();
        assert_eq!(count, 5);
        let xml = fs::read_to_string(&path).unwrap();
        assert_eq!(xml.matches("<url>").count(), count);
    }
}
