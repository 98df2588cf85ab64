pub mod consolidate;
pub mod content_filter;
pub mod cover;
pub mod model;
pub mod series;

pub use consolidate::{consolidate, consolidate_all, ConsolidationPolicy, ConsolidationStats};
pub use content_filter::ContentFilter;
pub use model::{CatalogEntry, RawItem, SourceTag};
pub use series::SeriesMap;
