//! Search providers: the external catalogue APIs the pipeline pages through.

pub mod rakuten;

use std::time::Duration;

use crate::catalog::model::{RawItem, SourceTag};

/// Result ordering requested from a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortOrder {
    /// Provider default ("standard") ordering.
    Standard,
    ReviewCount,
    Sales,
    ReviewAverage,
}

impl SortOrder {
    pub fn as_param(self) -> &'static str {
        match self {
            SortOrder::Standard => "standard",
            SortOrder::ReviewCount => "reviewCount",
            SortOrder::Sales => "sales",
            SortOrder::ReviewAverage => "reviewAverage",
        }
    }
}

/// One page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub keyword: Option<String>,
    pub genre_id: Option<String>,
    pub sort: SortOrder,
    /// 1-based.
    pub page: u32,
}

impl SearchQuery {
    pub fn keyword(keyword: impl Into<String>, sort: SortOrder, page: u32) -> Self {
        Self {
            keyword: Some(keyword.into()),
            genre_id: None,
            sort,
            page,
        }
    }

    pub fn genre(genre_id: impl Into<String>, sort: SortOrder, page: u32) -> Self {
        Self {
            keyword: None,
            genre_id: Some(genre_id.into()),
            sort,
            page,
        }
    }

    /// Short human label for logs.
    pub fn label(&self) -> String {
        match (&self.keyword, &self.genre_id) {
            (Some(k), _) => format!("keyword:{k}"),
            (None, Some(g)) => format!("genre:{g}"),
            (None, None) => "all".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("rate limited by provider")]
    RateLimited { retry_after: Option<Duration> },

    #[error("provider request failed: {0}")]
    Failed(#[from] anyhow::Error),
}

/// A paged catalogue search. An empty page means the query is exhausted.
#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn source(&self) -> SourceTag;

    async fn search(&self, query: &SearchQuery) -> Result<Vec<RawItem>, SearchError>;
}
