//! Series consolidation: one catalog entry per series group.
//!
//! Each group is handled on its own. Volumes are put in a rough reading
//! order (shorter titles first), every volume with an image becomes a scored
//! candidate, and the best candidate supplies the cover and attribution.
//! Groups are never compared against each other.

use std::cmp::Ordering;

use rand::Rng;
use tracing::debug;

use crate::catalog::cover::{classify_cover, display_cover_url, CoverKind};
use crate::catalog::model::{CatalogEntry, RawItem, SourceTag};
use crate::catalog::series::SeriesMap;
use crate::normalization::{RatingRange, TagPolicy, UNKNOWN_AUTHOR};

/// Score adjustments applied per candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringWeights {
    pub placeholder_penalty: i64,
    pub first_volume_bonus: i64,
    pub last_volume_penalty: i64,
    /// Extra points for listings from one particular endpoint.
    pub source_bonus: Option<(SourceTag, i64)>,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            placeholder_penalty: -100_000,
            first_volume_bonus: 5_000,
            last_volume_penalty: -3_000,
            source_bonus: None,
        }
    }
}

/// Where an entry's description comes from.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptionPolicy {
    /// The winning candidate's caption is used when at least this long.
    pub preferred_min_chars: usize,
    /// Otherwise the longest caption in the group, when at least this long.
    pub fallback_min_chars: usize,
    /// Used when neither applies; `{title}` is replaced by the series key.
    pub template: String,
}

impl Default for DescriptionPolicy {
    fn default() -> Self {
        Self {
            preferred_min_chars: 20,
            fallback_min_chars: 1,
            template: "「{title}」の圧倒的な世界観。不朽の名作を美麗な書影と共にお楽しみください。"
                .to_string(),
        }
    }
}

impl DescriptionPolicy {
    fn synthesize(&self, title: &str) -> String {
        self.template.replace("{title}", title)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConsolidationPolicy {
    pub scoring: ScoringWeights,
    pub description: DescriptionPolicy,
    pub tags: TagPolicy,
    pub rating: RatingRange,
}

/// A scored volume considered as the face of its series.
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub score: i64,
    pub item: &'a RawItem,
    pub cover_url: String,
    pub kind: CoverKind,
}

impl Candidate<'_> {
    // (score, caption length): higher wins.
    fn rank_cmp(&self, other: &Self) -> Ordering {
        self.score
            .cmp(&other.score)
            .then_with(|| self.item.description_len().cmp(&other.item.description_len()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    EmptyKey,
    NoCover,
    PlaceholderOnly,
}

impl DropReason {
    pub fn label(self) -> &'static str {
        match self {
            DropReason::EmptyKey => "empty_key",
            DropReason::NoCover => "no_cover",
            DropReason::PlaceholderOnly => "placeholder_only",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptionSource {
    Representative,
    LongestInGroup,
    Synthesized,
}

/// Entry plus how it was assembled.
#[derive(Debug, Clone)]
pub struct Consolidated {
    pub entry: CatalogEntry,
    pub description_source: DescriptionSource,
}

/// Put volumes in reading-order proxy: title length in characters, then
/// lexicographic. Trailing volume markers are stripped inconsistently
/// upstream, so shorter raw titles tend to be earlier volumes.
pub fn volume_order(items: &[RawItem]) -> Vec<&RawItem> {
    let mut ordered: Vec<&RawItem> = items.iter().collect();
    ordered.sort_by(|a, b| {
        a.title
            .chars()
            .count()
            .cmp(&b.title.chars().count())
            .then_with(|| a.title.cmp(&b.title))
    });
    ordered
}

/// Score every volume that has an image URL.
pub fn score_candidates<'a>(items: &'a [RawItem], weights: &ScoringWeights) -> Vec<Candidate<'a>> {
    let ordered = volume_order(items);
    let count = ordered.len();
    let mut candidates = Vec::with_capacity(count);

    for (position, item) in ordered.into_iter().enumerate() {
        let kind = classify_cover(&item.image_url);
        if kind == CoverKind::Missing {
            continue;
        }
        let mut score = 0i64;
        if kind == CoverKind::Placeholder {
            score += weights.placeholder_penalty;
        }
        if position == 0 {
            score += weights.first_volume_bonus;
        } else if count > 1 && position == count - 1 {
            score += weights.last_volume_penalty;
        }
        if let (Some((source, bonus)), Some(item_source)) = (weights.source_bonus, item.source) {
            if source == item_source {
                score += bonus;
            }
        }
        candidates.push(Candidate {
            score,
            item,
            cover_url: display_cover_url(&item.image_url),
            kind,
        });
    }
    candidates
}

/// Highest (score, caption length); the earliest volume wins a full tie.
pub fn select_candidate<'a, 'b>(candidates: &'b [Candidate<'a>]) -> Option<&'b Candidate<'a>> {
    candidates.iter().fold(None, |best, candidate| match best {
        Some(current) if candidate.rank_cmp(current) != Ordering::Greater => Some(current),
        _ => Some(candidate),
    })
}

/// Consolidate one group, reporting why it was dropped if it was.
pub fn evaluate<R: Rng + ?Sized>(
    key: &str,
    items: &[RawItem],
    policy: &ConsolidationPolicy,
    rng: &mut R,
) -> Result<Consolidated, DropReason> {
    if key.trim().is_empty() {
        return Err(DropReason::EmptyKey);
    }

    let candidates = score_candidates(items, &policy.scoring);
    if candidates.is_empty() {
        return Err(DropReason::NoCover);
    }
    if candidates.iter().all(|c| c.kind == CoverKind::Placeholder) {
        return Err(DropReason::PlaceholderOnly);
    }
    let best = select_candidate(&candidates).ok_or(DropReason::NoCover)?;

    let (description, description_source) = derive_description(key, best.item, items, &policy.description);
    let author = derive_author(best.item, items);
    let tags = policy.tags.derive(key, &description, &author);

    Ok(Consolidated {
        entry: CatalogEntry {
            id: 0,
            is_real: true,
            title: key.to_string(),
            description,
            tags,
            author,
            rating: policy.rating.sample(rng),
            cover: best.cover_url.clone(),
        },
        description_source,
    })
}

/// Consolidate one group; `None` when it has no usable cover.
///
/// The returned entry carries `id == 0`; ids are assigned once the final
/// output order is known.
pub fn consolidate<R: Rng + ?Sized>(
    key: &str,
    items: &[RawItem],
    policy: &ConsolidationPolicy,
    rng: &mut R,
) -> Option<CatalogEntry> {
    evaluate(key, items, policy, rng).ok().map(|c| c.entry)
}

fn derive_description(
    title: &str,
    representative: &RawItem,
    items: &[RawItem],
    policy: &DescriptionPolicy,
) -> (String, DescriptionSource) {
    let own = representative.description.trim();
    if !own.is_empty() && own.chars().count() >= policy.preferred_min_chars {
        return (own.to_string(), DescriptionSource::Representative);
    }

    let longest = items
        .iter()
        .map(|item| item.description.trim())
        .filter(|d| !d.is_empty())
        .fold(None::<&str>, |best, d| match best {
            Some(b) if b.chars().count() >= d.chars().count() => Some(b),
            _ => Some(d),
        });
    match longest {
        Some(d) if d.chars().count() >= policy.fallback_min_chars => {
            (d.to_string(), DescriptionSource::LongestInGroup)
        }
        _ => (policy.synthesize(title), DescriptionSource::Synthesized),
    }
}

// Representative's author, else the first attributed volume in reading order.
fn derive_author(representative: &RawItem, items: &[RawItem]) -> String {
    if representative.author != UNKNOWN_AUTHOR && !representative.author.is_empty() {
        return representative.author.clone();
    }
    volume_order(items)
        .into_iter()
        .map(|item| item.author.as_str())
        .find(|a| *a != UNKNOWN_AUTHOR && !a.is_empty())
        .unwrap_or(UNKNOWN_AUTHOR)
        .to_string()
}

/// Per-run quality counters.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConsolidationStats {
    pub groups_seen: usize,
    pub entries: usize,
    pub dropped_empty_key: usize,
    pub dropped_no_cover: usize,
    pub dropped_placeholder_only: usize,
    pub synthesized_descriptions: usize,
}

impl ConsolidationStats {
    pub fn dropped(&self) -> usize {
        self.dropped_empty_key + self.dropped_no_cover + self.dropped_placeholder_only
    }

    fn record(&mut self, outcome: &Result<Consolidated, DropReason>) {
        self.groups_seen += 1;
        match outcome {
            Ok(c) => {
                self.entries += 1;
                if c.description_source == DescriptionSource::Synthesized {
                    self.synthesized_descriptions += 1;
                }
            }
            Err(DropReason::EmptyKey) => self.dropped_empty_key += 1,
            Err(DropReason::NoCover) => self.dropped_no_cover += 1,
            Err(DropReason::PlaceholderOnly) => self.dropped_placeholder_only += 1,
        }
    }

    pub fn log_summary(&self) {
        tracing::info!(
            groups_seen = self.groups_seen,
            entries = self.entries,
            dropped = self.dropped(),
            dropped_empty_key = self.dropped_empty_key,
            dropped_no_cover = self.dropped_no_cover,
            dropped_placeholder_only = self.dropped_placeholder_only,
            synthesized_descriptions = self.synthesized_descriptions,
            "consolidation summary"
        );
    }
}

/// Consolidate every group in ingestion order, stopping once `limit`
/// entries exist. Entries come back with `id == 0`.
pub fn consolidate_all<R: Rng + ?Sized>(
    map: &SeriesMap,
    policy: &ConsolidationPolicy,
    limit: Option<usize>,
    rng: &mut R,
) -> (Vec<CatalogEntry>, ConsolidationStats) {
    let mut stats = ConsolidationStats::default();
    let mut entries = Vec::new();
    for (key, items) in map.iter() {
        if limit.is_some_and(|l| entries.len() >= l) {
            break;
        }
        let outcome = evaluate(key, items, policy, rng);
        stats.record(&outcome);
        match outcome {
            Ok(c) => entries.push(c.entry),
            Err(reason) => debug!(series = %key, reason = reason.label(), volumes = items.len(), "series dropped"),
        }
    }
    (entries, stats)
}
