//! Admission filter applied before a listing joins a series group.
//!
//! The comics genre tree also contains score books, artbooks, study manga,
//! calendars and box sets. None of those belong in a catalog of serialized
//! works, so they are rejected by genre prefix, deny keyword or study-manga
//! phrase.

use std::collections::HashMap;

use crate::util::env::env_opt;

/// Genre id prefix of the comics tree.
pub const COMICS_GENRE_PREFIX: &str = "001001";

/// Listings whose title or caption contains any of these are not stories.
pub const DENY_KEYWORDS: [&str; 46] = [
    "楽譜",
    "スコア",
    "画集",
    "設定資料集",
    "イラスト集",
    "カレンダー",
    "雑誌",
    "攻略本",
    "実用",
    "教本",
    "入門",
    "解説",
    "ガイド",
    "テキスト",
    "問題集",
    "事典",
    "辞典",
    "アトラス",
    "のための",
    "コメディカル",
    "臨床",
    "医学",
    "看護",
    "図鑑",
    "学習",
    "アンソロジー",
    "ファンブック",
    "ポストカード",
    "手帳",
    "日記",
    "ぬりえ",
    "box",
    "ボックス",
    "セット",
    "全巻",
    "合本",
    "ベストシーン",
    "テレビ絵本",
    "絵本",
    "総集編",
    "増刊",
    "ドラマcd",
    "限定版",
    "特装版",
    "アニメコミック",
    "ポケットアトラス",
];

/// Explanatory "learn X through manga" phrasing.
pub const STUDY_PHRASES: [&str; 6] = [
    "マンガでわかる",
    "まんがでわかる",
    "漫画でわかる",
    "はじめての",
    "入門編",
    "図解",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    OutsideComicsGenre,
    DenyKeyword,
    StudyManga,
}

impl Rejection {
    pub fn label(self) -> &'static str {
        match self {
            Rejection::OutsideComicsGenre => "outside_comics_genre",
            Rejection::DenyKeyword => "deny_keyword",
            Rejection::StudyManga => "study_manga",
        }
    }
}

/// Allow-list / deny-list admission policy.
#[derive(Debug, Clone)]
pub struct ContentFilter {
    genre_prefix: String,
    deny: Vec<String>,
    study: Vec<String>,
}

impl Default for ContentFilter {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ContentFilter {
    pub fn with_defaults() -> Self {
        Self {
            genre_prefix: COMICS_GENRE_PREFIX.to_string(),
            deny: DENY_KEYWORDS.iter().map(|k| k.to_lowercase()).collect(),
            study: STUDY_PHRASES.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// Defaults plus any comma-separated terms in `CATALOG_EXTRA_DENY`.
    pub fn from_env() -> Self {
        env_opt("CATALOG_EXTRA_DENY")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|k| !k.is_empty())
                    .fold(Self::with_defaults(), |f, k| f.deny_keyword(k))
            })
            .unwrap_or_else(Self::with_defaults)
    }

    pub fn deny_keyword(mut self, keyword: &str) -> Self {
        let keyword = keyword.to_lowercase();
        if !self.deny.contains(&keyword) {
            self.deny.push(keyword);
        }
        self
    }

    /// Check one listing by its raw title (series keys have the box-set and
    /// edition suffixes stripped) and caption. A missing genre id passes.
    pub fn check(
        &self,
        title: &str,
        description: &str,
        genre_id: Option<&str>,
    ) -> Result<(), Rejection> {
        if let Some(genre) = genre_id.map(str::trim) {
            if !genre.is_empty() && !genre.starts_with(self.genre_prefix.as_str()) {
                return Err(Rejection::OutsideComicsGenre);
            }
        }

        let text = format!("{title} {description}").to_lowercase();
        if self.deny.iter().any(|k| text.contains(k.as_str())) {
            return Err(Rejection::DenyKeyword);
        }
        if self.study.iter().any(|p| text.contains(p.as_str())) {
            return Err(Rejection::StudyManga);
        }
        Ok(())
    }
}

/// Admission counters for one ingestion run.
#[derive(Debug, Default, Clone)]
pub struct FilterStats {
    pub admitted: usize,
    pub rejected: HashMap<Rejection, usize>,
}

impl FilterStats {
    pub fn record(&mut self, outcome: Result<(), Rejection>) {
        match outcome {
            Ok(()) => self.admitted += 1,
            Err(reason) => *self.rejected.entry(reason).or_insert(0) += 1,
        }
    }

    pub fn rejected_total(&self) -> usize {
        self.rejected.values().sum()
    }

    pub fn log_summary(&self) {
        tracing::info!(
            admitted = self.admitted,
            rejected = self.rejected_total(),
            "content filter summary"
        );
        for (reason, count) in &self.rejected {
            tracing::debug!(reason = reason.label(), count, "content filter rejections");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_genres_outside_comics_tree() {
        let filter = ContentFilter::with_defaults();
        assert_eq!(
            filter.check("Hero Tale", "", Some("001004008")),
            Err(Rejection::OutsideComicsGenre)
        );
        assert_eq!(filter.check("Hero Tale", "", Some("001001001")), Ok(()));
        assert_eq!(filter.check("Hero Tale", "", None), Ok(()));
        assert_eq!(filter.check("Hero Tale", "", Some("")), Ok(()));
    }

    #[test]
    fn rejects_non_narrative_works() {
        let filter = ContentFilter::with_defaults();
        assert_eq!(
            filter.check("ワンピース イラスト集", "", None),
            Err(Rejection::DenyKeyword)
        );
        assert_eq!(
            filter.check("Hero Tale", "全巻 BOX 収納", None),
            Err(Rejection::DenyKeyword)
        );
        assert_eq!(
            filter.check("マンガでわかる経済", "", None),
            Err(Rejection::StudyManga)
        );
    }

    #[test]
    fn deny_keywords_ignore_case() {
        let filter = ContentFilter::with_defaults();
        assert!(filter.check("Hero Tale Box", "", None).is_err());
        assert!(filter.check("Hero Tale", "ドラマCD付き", None).is_err());
    }

    #[test]
    fn box_sets_and_editions_are_caught_by_raw_title() {
        let filter = ContentFilter::with_defaults();
        for raw in [
            "ダンジョン飯 全14巻セット",
            "呪術廻戦 1-3巻 セット",
            "鬼滅の刃 23 限定版",
            "チェンソーマン 16 特装版",
            "ONE PIECE BOX",
        ] {
            assert_eq!(
                filter.check(raw, "", Some("001001001")),
                Err(Rejection::DenyKeyword),
                "{raw}"
            );
        }
    }

    #[test]
    fn extra_deny_terms_come_from_env() {
        std::env::set_var("CATALOG_EXTRA_DENY", " 小説版 , ,Guidebook");
        let filter = ContentFilter::from_env();
        std::env::remove_var("CATALOG_EXTRA_DENY");
        assert_eq!(filter.check("Hero Tale 小説版", "", None), Err(Rejection::DenyKeyword));
        assert_eq!(filter.check("Hero Tale GUIDEBOOK", "", None), Err(Rejection::DenyKeyword));
        assert_eq!(filter.check("Hero Tale", "", None), Ok(()));
    }

    #[test]
    fn stats_count_outcomes() {
        let filter = ContentFilter::with_defaults();
        let mut stats = FilterStats::default();
        stats.record(filter.check("Hero Tale", "", None));
        stats.record(filter.check("画集", "", None));
        stats.record(filter.check("Hero Tale", "", Some("002")));
        assert_eq!(stats.admitted, 1);
        assert_eq!(stats.rejected_total(), 2);
        assert_eq!(stats.rejected.get(&Rejection::DenyKeyword), Some(&1));
    }
}
