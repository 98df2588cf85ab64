//! Series-key canonicalization for raw, volume-specific book titles.
//!
//! Titles coming back from the search API carry per-volume noise: trailing
//! volume numbers (with or without the 巻 counter), parenthesized indices in
//! ASCII or full-width brackets, ranges like `1-3`, edition qualifiers and
//! box-set suffixes. Stripping them lets every volume of a work collapse onto
//! one key. The rule set is best-effort: two different works can collide on a
//! key and one work can split across keys when its raw titles disagree.

use std::sync::OnceLock;

use regex::Regex;

/// One strip rule: every match of `pattern` is replaced by `replacement`.
#[derive(Debug, Clone)]
pub struct StripRule {
    pub name: &'static str,
    pub pattern: Regex,
    pub replacement: &'static str,
}

impl StripRule {
    pub fn new(
        name: &'static str,
        pattern: &str,
        replacement: &'static str,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            name,
            pattern: Regex::new(pattern)?,
            replacement,
        })
    }

    // Built-in patterns are constants exercised by the tests below.
    fn builtin(name: &'static str, pattern: &str) -> Self {
        Self::new(name, pattern, " ")
            .unwrap_or_else(|err| panic!("invalid title strip rule {name}: {err}"))
    }

    fn apply(&self, input: &str) -> String {
        self.pattern
            .replace_all(input, self.replacement)
            .trim_end()
            .to_string()
    }
}

/// Ordered rule table mapping raw titles onto series keys.
#[derive(Debug, Clone)]
pub struct TitleNormalizer {
    rules: Vec<StripRule>,
    bracket_chars: Regex,
}

impl TitleNormalizer {
    /// Rule table used for comic listings.
    ///
    /// Order matters: the 第N巻 form goes first so the prefix is removed with
    /// the number, and suffix qualifiers are cut after the numeric rules so
    /// the text they swallow is never re-exposed.
    pub fn with_defaults() -> Self {
        Self::from_rules(vec![
            StripRule::builtin("counted_volume", r"\s*第?\d+巻$"),
            StripRule::builtin("trailing_volume", r"\s*\d+巻?$"),
            StripRule::builtin("bracketed_index", r"\s*[\(（]\d+[\)）]$"),
            StripRule::builtin("volume_range", r"\s*[\d～〜-]+巻?(\s|$)"),
            StripRule::builtin("regular_edition", r"\s*通常版.*$"),
            StripRule::builtin("limited_time", r"\s*期間限定.*$"),
            StripRule::builtin("special_edition", r"\s*特装版.*$"),
            StripRule::builtin("limited_edition", r"\s*限定版.*$"),
            StripRule::builtin("box_set", r"\s*(全\d+巻|全巻)?\s*(セット|BOX|ボックス)$"),
            StripRule::builtin("comic_suffix", r"コミック$"),
        ])
    }

    /// Build a normalizer from a custom rule table, evaluated in order.
    pub fn from_rules(rules: Vec<StripRule>) -> Self {
        Self {
            rules,
            bracket_chars: Regex::new(r"[\(\)（）]").unwrap_or_else(|err| {
                panic!("invalid bracket pattern: {err}")
            }),
        }
    }

    /// Map a raw title to its series key. Total: any input yields some
    /// string, possibly empty.
    pub fn normalize(&self, raw: &str) -> String {
        let mut current = collapse_whitespace(raw);
        // A pass that changes the title shrinks it under the built-in rules,
        // so the character count bounds the passes. Custom rules that grow
        // the text stop there too.
        let max_passes = current.chars().count() + 1;
        for _ in 0..max_passes {
            let next = self.single_pass(&current);
            if next == current {
                break;
            }
            current = next;
        }
        current
    }

    fn single_pass(&self, input: &str) -> String {
        let stripped = self
            .rules
            .iter()
            .fold(input.to_string(), |acc, rule| rule.apply(&acc));
        let unbracketed = self.bracket_chars.replace_all(&stripped, "");
        collapse_whitespace(&unbracketed)
    }
}

impl Default for TitleNormalizer {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

static DEFAULT_NORMALIZER: OnceLock<TitleNormalizer> = OnceLock::new();

/// Normalize with the shared default rule table.
pub fn normalize(raw: &str) -> String {
    DEFAULT_NORMALIZER
        .get_or_init(TitleNormalizer::with_defaults)
        .normalize(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_trailing_volume_number() {
        assert_eq!(normalize("Series Name 12"), "Series Name");
        assert_eq!(normalize("ONE PIECE 107"), "ONE PIECE");
        assert_eq!(normalize("薬屋のひとりごと 13巻"), "薬屋のひとりごと");
    }

    #[test]
    fn strips_counted_and_bracketed_volumes() {
        assert_eq!(normalize("葬送のフリーレン 第11巻"), "葬送のフリーレン");
        assert_eq!(normalize("スパイファミリー(3)"), "スパイファミリー");
        assert_eq!(normalize("スパイファミリー（１２）"), "スパイファミリー");
    }

    #[test]
    fn strips_ranges_and_edition_markers() {
        assert_eq!(normalize("呪術廻戦 1-3巻 セット"), "呪術廻戦");
        assert_eq!(normalize("チェンソーマン 16 特装版 ポストカード付き"), "チェンソーマン");
        assert_eq!(normalize("ブルーロック 28 通常版"), "ブルーロック");
        assert_eq!(normalize("推しの子 期間限定 無料お試し版"), "推しの子");
        assert_eq!(normalize("ダンジョン飯 全14巻セット"), "ダンジョン飯");
    }

    #[test]
    fn strips_comic_suffix_and_brackets() {
        assert_eq!(normalize("ワンパンマン コミック"), "ワンパンマン");
        assert_eq!(normalize("ゆるキャン△ (まんがタイムKRコミックス)"), "ゆるキャン△ まんがタイムKRコミックス");
    }

    #[test]
    fn collapses_internal_whitespace() {
        assert_eq!(normalize("  Hero　  Tale   2 "), "Hero Tale");
    }

    #[test]
    fn normalization_is_idempotent() {
        let inputs = [
            "Series Name 12",
            "Foo (1) (2)",
            "Foo (3) 2",
            "呪術廻戦 1-3巻 セット",
            "チェンソーマン 16 特装版",
            "Hero Tale",
            "",
            "123",
            "（）",
            "Aコミックコミックコミックコミックコミックコミックコミックコミックコミックコミック",
            "Hero Tale 1 2 3 4 5 6 7 8 9 10 11 12",
        ];
        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "input {input:?}");
        }
    }

    #[test]
    fn stacked_suffixes_reach_a_fixed_point_in_one_call() {
        let stacked = format!("A{}", "コミック".repeat(10));
        assert_eq!(normalize(&stacked), "A");
    }

    #[test]
    fn degenerate_inputs_normalize_to_empty_key() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("12"), "");
        assert_eq!(normalize("(3)"), "");
        assert_eq!(normalize("   "), "");
    }

    #[test]
    fn custom_rule_table_runs_in_order() {
        let rule = StripRule::new("omnibus", r"\s*Omnibus$", " ").unwrap();
        let normalizer = TitleNormalizer::from_rules(vec![rule]);
        assert_eq!(normalizer.normalize("Hero Tale Omnibus"), "Hero Tale");
        assert_eq!(normalizer.normalize("Hero Tale 2"), "Hero Tale 2");
    }
}
