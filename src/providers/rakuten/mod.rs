pub mod provider;

pub use provider::{RakutenConfig, RakutenEndpoint, RakutenProvider};
