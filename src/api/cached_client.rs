//! Cached site client that wraps ApiClient with the resource cache layer.

use std::sync::Arc;

use color_eyre::Result;

use crate::api::client::ApiClient;
use crate::api::types::{AdCreative, Category};
use crate::cache::{FetchState, ResourceCache, ResourceKey};
use crate::config::Config;
use crate::placement::BannerPlacement;
use crate::session::SessionStore;
use crate::targeting;
use crate::telemetry::{Telemetry, TelemetryEvent};

/// Site client with transparent caching and telemetry wiring.
///
/// Reference collections are fetched at most once per TTL window and
/// shared by every consumer; the four backend endpoints stay reachable
/// through one object. Cloning is cheap and all clones share state.
#[derive(Clone)]
pub struct CachedClient {
  inner: ApiClient,
  config: Config,
  categories: ResourceCache<Category>,
  banners: ResourceCache<AdCreative>,
  telemetry: Arc<Telemetry>,
}

impl CachedClient {
  /// Create a cached client. `session` scopes impression dedup to the
  /// current browsing session; construct it at page-session start and
  /// reset it when the session ends.
  pub fn new(config: Config, session: Arc<dyn SessionStore>) -> Result<Self> {
    let inner = ApiClient::new(&config)?;

    let api = inner.clone();
    let telemetry = Arc::new(Telemetry::new(session, move |event| {
      let api = api.clone();
      async move {
        let result = match event {
          TelemetryEvent::Impression(id) => api.track_impression(id).await,
          TelemetryEvent::Click(id) => api.track_click(id).await,
        };
        result.map_err(|e| e.to_string())
      }
    }));

    Ok(Self {
      inner,
      config,
      categories: ResourceCache::new(),
      banners: ResourceCache::new(),
      telemetry,
    })
  }

  fn categories_key() -> ResourceKey {
    ResourceKey::new("categories")
  }

  fn banners_key() -> ResourceKey {
    ResourceKey::new("banners")
  }

  /// The category collection, cached per the configured TTL. Fail-soft:
  /// an unreachable backend yields an empty collection; see
  /// [`CachedClient::categories_state`] for the reason.
  pub async fn categories(&self) -> Arc<Vec<Category>> {
    let inner = self.inner.clone();
    let key = Self::categories_key();
    let ttl = self.config.cache.ttl_for(key.name());
    self
      .categories
      .get(&key, ttl, move || async move {
        inner.get_categories().await
      })
      .await
  }

  /// Force a category refetch, bypassing the freshness window.
  pub async fn refresh_categories(&self) -> Arc<Vec<Category>> {
    let inner = self.inner.clone();
    let key = Self::categories_key();
    let ttl = self.config.cache.ttl_for(key.name());
    self
      .categories
      .refresh(&key, ttl, move || async move {
        inner.get_categories().await
      })
      .await
  }

  /// Look up one category by id in the cached collection.
  pub async fn category(&self, id: u64) -> Option<Category> {
    self.categories().await.iter().find(|c| c.id == id).cloned()
  }

  /// The creative collection, cached per the configured TTL. Fail-soft.
  pub async fn banners(&self) -> Arc<Vec<AdCreative>> {
    let inner = self.inner.clone();
    let key = Self::banners_key();
    let ttl = self.config.cache.ttl_for(key.name());
    self
      .banners
      .get(&key, ttl, move || async move {
        inner.get_banners().await
      })
      .await
  }

  /// Warm both reference collections, typically at page-session start.
  /// The two fetches run concurrently; failures stay fail-soft.
  pub async fn warm(&self) {
    futures::future::join(self.categories(), self.banners()).await;
  }

  pub fn categories_state(&self) -> FetchState {
    self.categories.state(&Self::categories_key())
  }

  pub fn banners_state(&self) -> FetchState {
    self.banners.state(&Self::banners_key())
  }

  /// The shared telemetry recorder.
  pub fn telemetry(&self) -> Arc<Telemetry> {
    Arc::clone(&self.telemetry)
  }

  /// Build a delivery controller for one page placement, wired to the
  /// cached creative collection and production randomness.
  pub fn placement(&self) -> BannerPlacement {
    let client = self.clone();
    BannerPlacement::new(
      move || {
        let client = client.clone();
        async move { client.banners().await }
      },
      Arc::clone(&self.telemetry),
      targeting::entropy_sampler(),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::session::MemoryStore;

  #[test]
  fn test_new_client_starts_idle() {
    let config = Config::from_url("http://localhost:8000/");
    let client = CachedClient::new(config, Arc::new(MemoryStore::new())).unwrap();

    assert!(matches!(client.categories_state(), FetchState::Idle));
    assert!(matches!(client.banners_state(), FetchState::Idle));
  }

  #[test]
  fn test_rejects_unparseable_url() {
    let config = Config::from_url("not a url");
    assert!(CachedClient::new(config, Arc::new(MemoryStore::new())).is_err());
  }

  #[tokio::test]
  async fn test_unreachable_backend_is_fail_soft() {
    // Nothing listens on port 1; both fetches fail and yield empty
    // collections instead of errors.
    let config = Config::from_url("http://127.0.0.1:1/");
    let client = CachedClient::new(config, Arc::new(MemoryStore::new())).unwrap();

    client.warm().await;

    assert!(client.categories().await.is_empty());
    assert!(client.banners().await.is_empty());
    assert!(client.categories_state().is_failed());
    assert!(client.banners_state().is_failed());
  }
}
