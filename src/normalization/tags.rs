
/// Author sentinel used when the listing carries no attribution.
pub const UNKNOWN_AUTHOR: &str = "不明";

/// Default cap on tags per catalog entry.
pub const DEFAULT_MAX_TAGS: usize = 8;

/// Romance / female-oriented search terms. Doubles as tag vocabulary.
pub const TARGETED_KEYWORDS: [&str; 20] = [
    "いちゃいちゃ",
    "キュンキュン",
    "溺愛",
    "イケメン",
    "美少女",
    "悪役令嬢",
    "逆ハーレム",
    "少女漫画",
    "TL",
    "オトナ女子",
    "甘々",
    "ラブストーリー",
    "年の差",
    "幼馴染",
    "契約結婚",
    "シンデレラストーリー",
    "御曹司",
    "執事",
    "俺様",
    "クール",
];

/// Broad search terms used when the targeted scans run dry.
pub const GENERAL_KEYWORDS: [&str; 16] = [
    "漫画",
    "単行本",
    "完結",
    "セット",
    "ジャンプ",
    "人気",
    "ドラマ化",
    "アニメ化",
    "異世界",
    "転生",
    "最強",
    "冒険",
    "ファンタジー",
    "バトル",
    "学園",
    "コメディ",
];

/// Which tagging strategy a run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TagMode {
    /// Author plus vocabulary hits plus compound inferences.
    #[default]
    Rich,
    /// Only the attributed author.
    AuthorOnly,
}

/// Adds `tag` when any of `triggers` occurs in the text.
#[derive(Debug, Clone)]
pub struct CompoundRule {
    pub triggers: Vec<String>,
    pub tag: String,
}

impl CompoundRule {
    pub fn new(triggers: &[&str], tag: impl Into<String>) -> Self {
        Self {
            triggers: triggers.iter().map(|t| t.to_string()).collect(),
            tag: tag.into(),
        }
    }

    fn matches(&self, text: &str) -> bool {
        self.triggers.iter().any(|t| text.contains(t.as_str()))
    }
}

/// Configuration-driven tag derivation.
#[derive(Debug, Clone)]
pub struct TagPolicy {
    mode: TagMode,
    vocabulary: Vec<String>,
    compounds: Vec<CompoundRule>,
    max_tags: usize,
}

impl Default for TagPolicy {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl TagPolicy {
    /// Empty policy: no vocabulary, no compound rules.
    pub fn new(mode: TagMode, max_tags: usize) -> Self {
        Self {
            mode,
            vocabulary: Vec::new(),
            compounds: Vec::new(),
            max_tags,
        }
    }

    /// Rich policy seeded with the search vocabulary and genre inferences.
    pub fn with_defaults() -> Self {
        Self::new(TagMode::Rich, DEFAULT_MAX_TAGS)
            .vocabulary(TARGETED_KEYWORDS.iter().chain(GENERAL_KEYWORDS.iter()).copied())
            .compound(CompoundRule::new(
                &["転生", "異世界", "聖女", "魔王"],
                "異世界ファンタジー",
            ))
            .compound(CompoundRule::new(&["学園", "学校", "部活", "高校"], "学園もの"))
            .compound(CompoundRule::new(&["ラブコメ", "恋愛", "恋", "好き"], "ラブコメ"))
    }

    pub fn author_only() -> Self {
        Self::new(TagMode::AuthorOnly, 1)
    }

    pub fn for_mode(mode: TagMode) -> Self {
        match mode {
            TagMode::Rich => Self::with_defaults(),
            TagMode::AuthorOnly => Self::author_only(),
        }
    }

    pub fn vocabulary<'a>(mut self, terms: impl IntoIterator<Item = &'a str>) -> Self {
        for term in terms {
            if !term.is_empty() && !self.vocabulary.iter().any(|v| v == term) {
                self.vocabulary.push(term.to_string());
            }
        }
        self
    }

    pub fn compound(mut self, rule: CompoundRule) -> Self {
        self.compounds.push(rule);
        self
    }

    pub fn with_max_tags(mut self, max_tags: usize) -> Self {
        self.max_tags = max_tags;
        self
    }

    pub fn mode(&self) -> TagMode {
        self.mode
    }

    pub fn max_tags(&self) -> usize {
        self.max_tags
    }

    /// Derive the tag list for one series.
    ///
    /// Order: author, vocabulary hits in vocabulary order, then compound
    /// inferences. Duplicates are dropped and the list is cut at `max_tags`.
    pub fn derive(&self, title: &str, description: &str, author: &str) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        let mut push = |tag: &str| {
            if !tag.is_empty() && !tags.iter().any(|t| t == tag) {
                tags.push(tag.to_string());
            }
        };

        let author = author.trim();
        if author != UNKNOWN_AUTHOR {
            push(author);
        }

        if self.mode == TagMode::Rich {
            let text = format!("{title} {description}");
            for term in &self.vocabulary {
                if text.contains(term.as_str()) {
                    push(term.as_str());
                }
            }
            for rule in &self.compounds {
                if rule.matches(&text) {
                    push(rule.tag.as_str());
                }
            }
        }

        tags.truncate(self.max_tags);
        tags
    }
}
