use indexmap::IndexMap;

use crate::catalog::model::RawItem;
use crate::normalization::TitleNormalizer;

/// Series key → volumes, in first-seen order. Append-only: re-ingesting the
/// same listing just adds weight to its group.
#[derive(Debug, Default, Clone)]
pub struct SeriesMap {
    groups: IndexMap<String, Vec<RawItem>>,
    empty_keys: usize,
}

impl SeriesMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// File `item` under the series key derived from its title. Returns the
    /// key it landed on.
    pub fn ingest(&mut self, normalizer: &TitleNormalizer, item: RawItem) -> String {
        let key = normalizer.normalize(&item.title);
        self.insert(key.clone(), item);
        key
    }

    /// File `item` under an already-computed key.
    pub fn insert(&mut self, key: String, item: RawItem) {
        if key.is_empty() {
            self.empty_keys += 1;
            tracing::debug!(raw_title = %item.title, "title normalized to an empty series key");
        }
        self.groups.entry(key).or_default().push(item);
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total listings across all groups.
    pub fn item_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Listings whose title normalized to the empty key.
    pub fn empty_key_items(&self) -> usize {
        self.empty_keys
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&[RawItem]> {
        self.groups.get(key).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[RawItem])> {
        self.groups.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}

impl Extend<(String, RawItem)> for SeriesMap {
    fn extend<T: IntoIterator<Item = (String, RawItem)>>(&mut self, iter: T) {
        for (key, item) in iter {
            self.insert(key, item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volumes_collapse_onto_one_group_in_first_seen_order() {
        let normalizer = TitleNormalizer::with_defaults();
        let mut map = SeriesMap::new();
        map.ingest(&normalizer, RawItem::new("Hero Tale 2"));
        map.ingest(&normalizer, RawItem::new("Other Story 1"));
        map.ingest(&normalizer, RawItem::new("Hero Tale 1"));
        map.ingest(&normalizer, RawItem::new("Hero Tale 1"));

        assert_eq!(map.len(), 2);
        assert_eq!(map.item_count(), 4);
        let keys: Vec<&str> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["Hero Tale", "Other Story"]);
        let hero = map.get("Hero Tale").unwrap();
        assert_eq!(hero.len(), 3);
        assert_eq!(hero[0].title, "Hero Tale 2");
    }

    #[test]
    fn empty_keys_are_kept_and_counted() {
        let normalizer = TitleNormalizer::with_defaults();
        let mut map = SeriesMap::new();
        let key = map.ingest(&normalizer, RawItem::new("12"));
        assert_eq!(key, "");
        assert_eq!(map.len(), 1);
        assert_eq!(map.empty_key_items(), 1);
    }

    #[test]
    fn extend_appends() {
        let mut map = SeriesMap::new();
        map.extend([
            ("A".to_string(), RawItem::new("A 1")),
            ("A".to_string(), RawItem::new("A 2")),
        ]);
        assert_eq!(map.get("A").map(<[RawItem]>::len), Some(2));
        assert!(!map.is_empty());
    }
}
