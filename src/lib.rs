//! Client-side data layer for a content site.
//!
//! Two halves:
//! - a TTL-bounded [`ResourceCache`] that coalesces concurrent fetches of
//!   shared reference collections into a single network call, and
//! - an ad delivery pipeline that filters creatives by placement location
//!   and active window, picks one uniformly at random, and reports
//!   impression/click telemetry with per-session impression dedup.
//!
//! [`CachedClient`] wires both onto the site backend; every piece stays
//! individually constructible so tests can substitute fetchers, session
//! storage, and randomness.
//!
//! # Example
//!
//! ```ignore
//! let config = Config::load(None)?;
//! let session = Arc::new(MemoryStore::new());
//! let client = CachedClient::new(config, session)?;
//!
//! let categories = client.categories().await; // cached, fail-soft
//!
//! let placement = client.placement();
//! let state = placement.show("sidebar_main").await;
//! if let Some(creative) = state.creative() {
//!     // render it; later:
//!     placement.on_click().await;
//! }
//! ```

pub mod api;
pub mod cache;
pub mod config;
pub mod placement;
pub mod session;
pub mod targeting;
pub mod telemetry;

pub use api::types::{AdCreative, Category, Media};
pub use api::{ApiClient, CachedClient};
pub use cache::{CacheStats, FetchState, ResourceCache, ResourceKey};
pub use config::Config;
pub use placement::{BannerPlacement, PlacementState};
pub use session::{MemoryStore, SessionStore};
pub use telemetry::{Telemetry, TelemetryEvent};
