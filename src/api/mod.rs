//! Site backend API: wire types, HTTP client, and the cached facade.

pub mod cached_client;
pub mod client;
pub mod types;

pub use cached_client::CachedClient;
pub use client::ApiClient;
