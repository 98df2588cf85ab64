use anyhow::{anyhow, Context, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::catalog::content_filter::COMICS_GENRE_PREFIX;
use crate::catalog::model::{RawItem, SourceTag};
use crate::providers::{SearchError, SearchProvider, SearchQuery};
use crate::util::env::{env_parse, env_req};

const BOOKS_SEARCH_URL: &str = "https://app.rakuten.co.jp/services/api/BooksBook/Search/20170404";
const EBOOK_SEARCH_URL: &str = "https://app.rakuten.co.jp/services/api/BooksEbook/Search/20170404";

/// Rakuten Books search endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RakutenEndpoint {
    /// Printed books (`BooksBook/Search`).
    Books,
    /// E-books sold through Rakuten Books (`BooksEbook/Search`).
    Ebook,
}

impl RakutenEndpoint {
    pub fn url(self) -> &'static str {
        match self {
            RakutenEndpoint::Books => BOOKS_SEARCH_URL,
            RakutenEndpoint::Ebook => EBOOK_SEARCH_URL,
        }
    }

    pub fn source(self) -> SourceTag {
        match self {
            RakutenEndpoint::Books => SourceTag::Primary,
            RakutenEndpoint::Ebook => SourceTag::Secondary,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            RakutenEndpoint::Books => "rakuten_books",
            RakutenEndpoint::Ebook => "rakuten_ebook",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RakutenConfig {
    pub app_id: String,
    /// Page size (`hits`), 1..=30.
    pub hits: u32,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl RakutenConfig {
    pub fn new(app_id: impl Into<String>) -> Self {
        Self {
            app_id: app_id.into(),
            hits: 30,
            timeout_secs: 15,
            user_agent: "Mozilla/5.0 (compatible; manga-catalog/0.1)".to_string(),
        }
    }

    /// `RAKUTEN_APP_ID` is required; `RAKUTEN_HITS` and
    /// `RAKUTEN_TIMEOUT_SECS` override the defaults.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::new(env_req("RAKUTEN_APP_ID")?);
        cfg.hits = env_parse("RAKUTEN_HITS", cfg.hits).clamp(1, 30);
        cfg.timeout_secs = env_parse("RAKUTEN_TIMEOUT_SECS", cfg.timeout_secs).max(1);
        Ok(cfg)
    }
}

// ---------- API shapes (minimal) ----------
// Only the fields the catalog reads are modeled; everything else is ignored.

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "Items", default)]
    items: Vec<ItemWrapper>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItemWrapper {
    #[serde(rename = "Item")]
    item: Option<ApiItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    item_caption: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    large_image_url: Option<String>,
    #[serde(default)]
    books_genre_id: Option<String>,
}

impl ApiItem {
    fn into_raw(self, source: SourceTag) -> Option<RawItem> {
        let title = self.title.filter(|t| !t.trim().is_empty())?;
        Some(
            RawItem::new(title)
                .with_description(self.item_caption.unwrap_or_default())
                .with_author(self.author.unwrap_or_default())
                .with_image_url(self.large_image_url.unwrap_or_default())
                .with_genre_id(self.books_genre_id.unwrap_or_default())
                .with_source(source),
        )
    }
}

/// Decode one search response body. Items without a title are skipped.
pub fn parse_items(body: &str, source: SourceTag) -> Result<Vec<RawItem>> {
    let parsed: SearchResponse =
        serde_json::from_str(body).context("decoding rakuten search response")?;
    if let Some(err) = parsed.error {
        return Err(anyhow!(
            "rakuten api error {}: {}",
            err,
            parsed.error_description.unwrap_or_default()
        ));
    }
    Ok(parsed
        .items
        .into_iter()
        .filter_map(|w| w.item)
        .filter_map(|item| item.into_raw(source))
        .collect())
}

/// Rakuten Books / BooksEbook search client.
#[derive(Debug, Clone)]
pub struct RakutenProvider {
    http: Client,
    cfg: RakutenConfig,
    endpoint: RakutenEndpoint,
}

impl RakutenProvider {
    pub fn new(cfg: RakutenConfig, endpoint: RakutenEndpoint) -> Result<Self> {
        let http = Client::builder()
            .user_agent(cfg.user_agent.clone())
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("building rakuten http client")?;
        Ok(Self {
            http,
            cfg,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> RakutenEndpoint {
        self.endpoint
    }

    /// Query pairs for one page. The genre is pinned inside the comics tree:
    /// no genre or a foreign genre both fall back to the comics root.
    pub fn query_params(&self, query: &SearchQuery) -> Vec<(&'static str, String)> {
        let genre = query
            .genre_id
            .as_deref()
            .map(str::trim)
            .filter(|g| g.starts_with(COMICS_GENRE_PREFIX))
            .unwrap_or(COMICS_GENRE_PREFIX);

        let mut params = vec![
            ("format", "json".to_string()),
            ("applicationId", self.cfg.app_id.clone()),
            ("hits", self.cfg.hits.to_string()),
            ("page", query.page.max(1).to_string()),
            ("sort", query.sort.as_param().to_string()),
            ("imageFlag", "1".to_string()),
            ("booksGenreId", genre.to_string()),
        ];
        if let Some(keyword) = query.keyword.as_deref().filter(|k| !k.trim().is_empty()) {
            params.push(("title", keyword.to_string()));
        }
        params
    }
}

fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[async_trait::async_trait]
impl SearchProvider for RakutenProvider {
    fn name(&self) -> &'static str {
        self.endpoint.name()
    }

    fn source(&self) -> SourceTag {
        self.endpoint.source()
    }

    #[instrument(skip(self, query), fields(provider = self.endpoint.name(), query = %query.label(), page = query.page))]
    async fn search(&self, query: &SearchQuery) -> Result<Vec<RawItem>, SearchError> {
        let resp = self
            .http
            .get(self.endpoint.url())
            .header("Accept", "application/json")
            .query(&self.query_params(query))
            .send()
            .await
            .context("sending rakuten search request")?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SearchError::RateLimited {
                retry_after: retry_after(resp.headers()),
            });
        }
        let body = resp.text().await.context("reading rakuten search body")?;
        if !status.is_success() {
            return Err(SearchError::Failed(anyhow!(
                "rakuten search failed (status={}): {}",
                status,
                truncate_for_log(&body, 200)
            )));
        }
        let items = parse_items(&body, self.endpoint.source())?;
        debug!(count = items.len(), "rakuten page fetched");
        Ok(items)
    }
}

fn truncate_for_log(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalization::UNKNOWN_AUTHOR;
    use crate::providers::SortOrder;

    fn provider() -> RakutenProvider {
        RakutenProvider::new(RakutenConfig::new("test-app"), RakutenEndpoint::Books).unwrap()
    }

    fn param<'a>(params: &'a [(&'static str, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn keyword_query_defaults_to_comics_root() {
        let params = provider().query_params(&SearchQuery::keyword("溺愛", SortOrder::Sales, 2));
        assert_eq!(param(&params, "title"), Some("溺愛"));
        assert_eq!(param(&params, "booksGenreId"), Some("001001"));
        assert_eq!(param(&params, "sort"), Some("sales"));
        assert_eq!(param(&params, "page"), Some("2"));
        assert_eq!(param(&params, "hits"), Some("30"));
        assert_eq!(param(&params, "imageFlag"), Some("1"));
        assert_eq!(param(&params, "applicationId"), Some("test-app"));
    }

    #[test]
    fn foreign_genres_are_pinned_to_comics() {
        let p = provider();
        let params = p.query_params(&SearchQuery::genre("001004", SortOrder::ReviewCount, 1));
        assert_eq!(param(&params, "booksGenreId"), Some("001001"));
        let params = p.query_params(&SearchQuery::genre("001001002", SortOrder::ReviewCount, 1));
        assert_eq!(param(&params, "booksGenreId"), Some("001001002"));
        assert_eq!(param(&params, "title"), None);
    }

    #[test]
    fn parses_items_and_defaults_missing_fields() {
        let body = r#"{
            "count": 3,
            "Items": [
                {"Item": {"title": "Hero Tale 1", "itemCaption": "cap", "author": "作者",
                          "largeImageUrl": "https://img.example/a.jpg?_ex=200x200",
                          "booksGenreId": "001001001"}},
                {"Item": {"title": "Hero Tale 2"}},
                {"Item": {"itemCaption": "no title"}}
            ]
        }"#;
        let items = parse_items(body, SourceTag::Secondary).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].author, "作者");
        assert_eq!(items[0].genre_id.as_deref(), Some("001001001"));
        assert_eq!(items[0].source, Some(SourceTag::Secondary));
        assert_eq!(items[1].author, UNKNOWN_AUTHOR);
        assert!(items[1].image_url.is_empty());
    }

    #[test]
    fn empty_and_error_bodies() {
        assert!(parse_items(r#"{"count":0,"Items":[]}"#, SourceTag::Primary)
            .unwrap()
            .is_empty());
        assert!(parse_items(r#"{}"#, SourceTag::Primary).unwrap().is_empty());
        let err = parse_items(
            r#"{"error":"wrong_parameter","error_description":"page must be <= 100"}"#,
            SourceTag::Primary,
        )
        .unwrap_err();
        assert!(err.to_string().contains("wrong_parameter"));
        assert!(parse_items("not json", SourceTag::Primary).is_err());
    }

    #[test]
    fn log_snippets_are_char_safe() {
        assert_eq!(truncate_for_log("エラー詳細", 3), "エラー…");
        assert_eq!(truncate_for_log("ok", 3), "ok");
    }

    #[test]
    fn endpoints_map_to_sources() {
        assert_eq!(RakutenEndpoint::Books.source(), SourceTag::Primary);
        assert_eq!(RakutenEndpoint::Ebook.source(), SourceTag::Secondary);
        assert!(RakutenEndpoint::Ebook.url().contains("BooksEbook"));
    }
}
