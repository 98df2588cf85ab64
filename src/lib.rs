//! Batch generator for a static manga catalog.
//!
//! Listings are paged out of the Rakuten Books search API, grouped into
//! series by a normalized title key, and consolidated into one entry per
//! series with a representative cover, description and tag set. The result
//! is written as JSON for the site, with a sitemap derived from it.

pub mod catalog;
pub mod logging;
pub mod normalization;
pub mod pipeline;
pub mod providers;
pub mod sitemap;

pub mod util {
    pub mod env;
}
