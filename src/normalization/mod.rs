pub mod rating;
pub mod tags;
pub mod title;

pub use rating::RatingRange;
pub use tags::{TagMode, TagPolicy, UNKNOWN_AUTHOR};
pub use title::{normalize, TitleNormalizer};
