use serde::{Deserialize, Serialize};

use crate::normalization::UNKNOWN_AUTHOR;

/// Which search endpoint produced a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTag {
    /// Printed books search.
    Primary,
    /// E-book search.
    Secondary,
}

impl SourceTag {
    pub fn label(self) -> &'static str {
        match self {
            SourceTag::Primary => "primary",
            SourceTag::Secondary => "secondary",
        }
    }
}

/// One per-volume listing as returned by a search provider.
///
/// Missing fields are already defaulted: empty strings for text and image,
/// [`UNKNOWN_AUTHOR`] for the author.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "unknown_author")]
    pub author: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub genre_id: Option<String>,
    #[serde(default)]
    pub source: Option<SourceTag>,
}

fn unknown_author() -> String {
    UNKNOWN_AUTHOR.to_string()
}

impl RawItem {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            author: unknown_author(),
            image_url: String::new(),
            genre_id: None,
            source: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Blank or whitespace-only authors collapse to the sentinel.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        let author = author.into();
        self.author = if author.trim().is_empty() {
            unknown_author()
        } else {
            author.trim().to_string()
        };
        self
    }

    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = url.into();
        self
    }

    pub fn with_genre_id(mut self, genre_id: impl Into<String>) -> Self {
        let genre_id = genre_id.into();
        self.genre_id = (!genre_id.trim().is_empty()).then_some(genre_id);
        self
    }

    pub fn with_source(mut self, source: SourceTag) -> Self {
        self.source = Some(source);
        self
    }

    /// Caption length in characters, used for tie-breaks.
    pub fn description_len(&self) -> usize {
        self.description.chars().count()
    }
}

/// Final catalog record, one per series. Field names follow the JSON the
/// site bundles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: u32,
    pub is_real: bool,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub author: String,
    pub rating: f32,
    pub cover: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn entry_serializes_with_site_field_names() {
        let entry = CatalogEntry {
            id: 3,
            is_real: true,
            title: "Hero Tale".into(),
            description: "A tale.".into(),
            tags: vec!["Author".into()],
            author: "Author".into(),
            rating: 4.5,
            cover: "https://img.example/a.jpg?_ex=300x420".into(),
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            value,
            json!({
                "id": 3,
                "isReal": true,
                "title": "Hero Tale",
                "description": "A tale.",
                "tags": ["Author"],
                "author": "Author",
                "rating": 4.5,
                "cover": "https://img.example/a.jpg?_ex=300x420"
            })
        );
    }

    #[test]
    fn raw_item_defaults_missing_fields() {
        let item: RawItem = serde_json::from_value(json!({ "title": "Hero Tale 1" })).unwrap();
        assert_eq!(item.author, UNKNOWN_AUTHOR);
        assert!(item.description.is_empty());
        assert!(item.image_url.is_empty());
        assert!(item.genre_id.is_none());

        let blank = RawItem::new("x").with_author("  ").with_genre_id("");
        assert_eq!(blank.author, UNKNOWN_AUTHOR);
        assert!(blank.genre_id.is_none());
    }
}
