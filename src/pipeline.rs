//! Batch driver: page through the providers, group listings into series,
//! consolidate, and write the catalog.
//!
//! Everything runs front to back on one task. The only waits are the
//! politeness delay after each page and the back-off after a rate-limit
//! response; both live here, not in the consolidation core.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info, warn};

use crate::catalog::consolidate::{consolidate_all, ConsolidationPolicy, ConsolidationStats};
use crate::catalog::content_filter::{ContentFilter, FilterStats};
use crate::catalog::model::{CatalogEntry, RawItem};
use crate::catalog::series::SeriesMap;
use crate::normalization::tags::{GENERAL_KEYWORDS, TARGETED_KEYWORDS};
use crate::normalization::TitleNormalizer;
use crate::providers::{SearchError, SearchProvider, SearchQuery, SortOrder};
use crate::util::env::{env_opt, env_parse};

pub const DEFAULT_OUTPUT: &str = "src/data/mangaData.json";

/// Shoujo, ladies and BL genres, scanned deeply.
pub const INTENSE_GENRES: [&str; 3] = ["001001002", "001001004", "001001011"];

/// General comics genres for the broad pass.
pub const BROAD_GENRES: [&str; 7] = [
    "001001001",
    "001001002",
    "001001003",
    "001001004",
    "001001006",
    "001001007",
    "001001008",
];

/// What a scan step searches by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryTerms {
    Keywords(Vec<String>),
    Genres(Vec<String>),
}

impl QueryTerms {
    fn terms(&self) -> &[String] {
        match self {
            QueryTerms::Keywords(v) | QueryTerms::Genres(v) => v,
        }
    }

    fn query_for(&self, term: &str, sort: SortOrder, page: u32) -> SearchQuery {
        match self {
            QueryTerms::Keywords(_) => SearchQuery::keyword(term, sort, page),
            QueryTerms::Genres(_) => SearchQuery::genre(term, sort, page),
        }
    }
}

/// One pass of the scan: every term × every sort, paging until empty.
#[derive(Debug, Clone)]
pub struct ScanStep {
    pub label: &'static str,
    pub terms: QueryTerms,
    pub sorts: Vec<SortOrder>,
    pub max_pages: u32,
    /// Skip the step unless the map is still below target when it starts.
    pub only_below_target: bool,
}

#[derive(Debug, Clone)]
pub struct ScanPlan {
    pub steps: Vec<ScanStep>,
}

fn owned(terms: &[&str]) -> Vec<String> {
    terms.iter().map(|t| t.to_string()).collect()
}

impl ScanPlan {
    /// Targeted keywords, deep female-genre scan, broad genres, then general
    /// keywords as a last resort.
    pub fn standard() -> Self {
        Self {
            steps: vec![
                ScanStep {
                    label: "targeted_keywords",
                    terms: QueryTerms::Keywords(owned(&TARGETED_KEYWORDS)),
                    sorts: vec![SortOrder::ReviewCount, SortOrder::Sales],
                    max_pages: 10,
                    only_below_target: false,
                },
                ScanStep {
                    label: "intense_genres",
                    terms: QueryTerms::Genres(owned(&INTENSE_GENRES)),
                    sorts: vec![
                        SortOrder::ReviewCount,
                        SortOrder::Sales,
                        SortOrder::ReviewAverage,
                    ],
                    max_pages: 100,
                    only_below_target: false,
                },
                ScanStep {
                    label: "broad_genres",
                    terms: QueryTerms::Genres(owned(&BROAD_GENRES)),
                    sorts: vec![SortOrder::ReviewCount],
                    max_pages: 80,
                    only_below_target: false,
                },
                ScanStep {
                    label: "last_resort_keywords",
                    terms: QueryTerms::Keywords(owned(&GENERAL_KEYWORDS)),
                    sorts: vec![SortOrder::ReviewCount],
                    max_pages: 20,
                    only_below_target: true,
                },
            ],
        }
    }

}

/// Bounded retry around provider calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Wait after a rate-limit response (a longer `Retry-After` wins).
    pub rate_limit_delay: Duration,
    /// Wait after every successful page.
    pub request_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            rate_limit_delay: Duration::from_secs(5),
            request_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            max_attempts: env_parse("RAKUTEN_MAX_ATTEMPTS", d.max_attempts).max(1),
            rate_limit_delay: Duration::from_millis(env_parse(
                "RAKUTEN_RATE_LIMIT_DELAY_MS",
                d.rate_limit_delay.as_millis() as u64,
            )),
            request_delay: Duration::from_millis(env_parse(
                "RAKUTEN_REQUEST_DELAY_MS",
                d.request_delay.as_millis() as u64,
            )),
        }
    }

    /// No waiting at all; for tests and dry runs.
    pub fn immediate() -> Self {
        Self {
            max_attempts: 3,
            rate_limit_delay: Duration::ZERO,
            request_delay: Duration::ZERO,
        }
    }
}

/// Size goals for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogTarget {
    /// Entries wanted in the final catalog.
    pub entries: usize,
    /// Extra groups gathered past `entries` before scanning stops, since
    /// some groups are dropped at consolidation.
    pub overshoot: usize,
}

impl Default for CatalogTarget {
    fn default() -> Self {
        Self {
            entries: 15_500,
            overshoot: 2_000,
        }
    }
}

impl CatalogTarget {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            entries: env_parse("CATALOG_TARGET_COUNT", d.entries),
            overshoot: env_parse("CATALOG_OVERSHOOT", d.overshoot),
        }
    }

    fn saturated(&self, map: &SeriesMap) -> bool {
        map.len() > self.entries + self.overshoot
    }
}

/// Counters for the ingestion pass.
#[derive(Debug, Default, Clone)]
pub struct IngestStats {
    pub pages_fetched: usize,
    pub pages_failed: usize,
    pub rate_limited: usize,
    pub items_seen: usize,
    pub filter: FilterStats,
}

impl IngestStats {
    pub fn log_summary(&self, map: &SeriesMap) {
        info!(
            pages_fetched = self.pages_fetched,
            pages_failed = self.pages_failed,
            rate_limited = self.rate_limited,
            items_seen = self.items_seen,
            series = map.len(),
            listings = map.item_count(),
            empty_key_items = map.empty_key_items(),
            "ingestion summary"
        );
        self.filter.log_summary();
    }
}

/// Everything ingestion needs besides the providers and the map.
#[derive(Debug, Clone, Default)]
pub struct Ingestor {
    pub plan: ScanPlan,
    pub normalizer: TitleNormalizer,
    pub filter: ContentFilter,
    pub retry: RetryPolicy,
    pub target: CatalogTarget,
}

impl Default for ScanPlan {
    fn default() -> Self {
        Self::standard()
    }
}

impl Ingestor {
    /// Run the scan plan against every provider, appending admitted
    /// listings to `map`. Never fails: provider errors shrink the result.
    pub async fn run(&self, providers: &[Box<dyn SearchProvider>], map: &mut SeriesMap) -> IngestStats {
        let mut stats = IngestStats::default();
        info!(
            target_entries = self.target.entries,
            overshoot = self.target.overshoot,
            providers = providers.len(),
            "starting catalog scan"
        );

        'steps: for step in &self.plan.steps {
            if self.target.saturated(map) {
                break;
            }
            if step.only_below_target && map.len() >= self.target.entries {
                info!(step = step.label, series = map.len(), "skipping step; target already met");
                continue;
            }
            for term in step.terms.terms() {
                info!(step = step.label, term = %term, series = map.len(), "scanning");
                for sort in &step.sorts {
                    for provider in providers {
                        for page in 1..=step.max_pages {
                            let query = step.terms.query_for(term, *sort, page);
                            let items = fetch_page(provider.as_ref(), &query, &self.retry, &mut stats).await;
                            if items.is_empty() {
                                debug!(provider = provider.name(), query = %query.label(), page, "query exhausted");
                                break;
                            }
                            self.admit(items, map, &mut stats);
                            if self.target.saturated(map) {
                                info!(series = map.len(), "scan target reached");
                                break 'steps;
                            }
                        }
                    }
                }
            }
        }

        stats.log_summary(map);
        stats
    }

    fn admit(&self, items: Vec<RawItem>, map: &mut SeriesMap, stats: &mut IngestStats) {
        for item in items {
            stats.items_seen += 1;
            let verdict = self
                .filter
                .check(&item.title, &item.description, item.genre_id.as_deref());
            stats.filter.record(verdict);
            if verdict.is_ok() {
                let key = self.normalizer.normalize(&item.title);
                map.insert(key, item);
            }
        }
    }
}

/// One page with bounded retry. Rate limits are retried after a delay; any
/// other failure, or running out of attempts, yields an empty page.
pub async fn fetch_page(
    provider: &dyn SearchProvider,
    query: &SearchQuery,
    retry: &RetryPolicy,
    stats: &mut IngestStats,
) -> Vec<RawItem> {
    let attempts = retry.max_attempts.max(1);
    for attempt in 1..=attempts {
        match provider.search(query).await {
            Ok(items) => {
                stats.pages_fetched += 1;
                if !retry.request_delay.is_zero() {
                    tokio::time::sleep(retry.request_delay).await;
                }
                return items;
            }
            Err(SearchError::RateLimited { retry_after }) => {
                stats.rate_limited += 1;
                let wait = retry_after
                    .map(|ra| ra.max(retry.rate_limit_delay))
                    .unwrap_or(retry.rate_limit_delay);
                warn!(
                    provider = provider.name(),
                    query = %query.label(),
                    page = query.page,
                    attempt,
                    wait_ms = wait.as_millis() as u64,
                    "rate limited; backing off"
                );
                if attempt < attempts && !wait.is_zero() {
                    tokio::time::sleep(wait).await;
                }
            }
            Err(SearchError::Failed(err)) => {
                warn!(
                    provider = provider.name(),
                    query = %query.label(),
                    page = query.page,
                    error = %err,
                    "search failed; treating page as empty"
                );
                break;
            }
        }
    }
    stats.pages_failed += 1;
    Vec::new()
}

/// Consolidate, optionally shuffle, then number entries 1..=n in final order.
pub fn build_catalog<R: Rng + ?Sized>(
    map: &SeriesMap,
    policy: &ConsolidationPolicy,
    limit: Option<usize>,
    shuffle: bool,
    rng: &mut R,
) -> (Vec<CatalogEntry>, ConsolidationStats) {
    info!(series = map.len(), "refining series records");
    let (mut entries, stats) = consolidate_all(map, policy, limit, rng);
    if shuffle {
        entries.shuffle(rng);
    }
    assign_ids(&mut entries);
    stats.log_summary();
    (entries, stats)
}

/// Dense, 1-based ids in slice order.
pub fn assign_ids(entries: &mut [CatalogEntry]) {
    for (idx, entry) in entries.iter_mut().enumerate() {
        entry.id = idx as u32 + 1;
    }
}

/// Catalog sink path: `CATALOG_OUTPUT` or the site's data file.
pub fn default_output_path() -> String {
    env_opt("CATALOG_OUTPUT").unwrap_or_else(|| DEFAULT_OUTPUT.to_string())
}

/// Pretty-printed UTF-8 JSON; parent directories are created.
pub fn write_catalog(path: impl AsRef<Path>, entries: &[CatalogEntry]) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(entries).context("serializing catalog")?;
    fs::write(path, json).with_context(|| format!("writing catalog to {}", path.display()))?;
    info!(path = %path.display(), count = entries.len(), "catalog written");
    Ok(())
}

pub fn read_catalog(path: impl AsRef<Path>) -> Result<Vec<CatalogEntry>> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading catalog {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing catalog {}", path.display()))
}
