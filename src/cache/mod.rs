//! Generic caching layer for shared reference collections.
//!
//! This module provides a resource-agnostic caching mechanism that:
//! - Bounds freshness with a per-resource TTL
//! - Coalesces concurrent fetches for one key into a single network call
//! - Fails soft: a fetch error yields an empty collection plus a recorded
//!   reason, never an error surfaced to the page

mod key;
mod store;

pub use key::ResourceKey;
pub use store::{CacheStats, FetchState, ResourceCache};
