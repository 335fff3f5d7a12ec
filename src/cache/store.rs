//! TTL-bounded resource cache with single-flight fetch coordination.

use color_eyre::Result;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, warn};

use super::key::ResourceKey;

/// Lifecycle of one cache slot.
#[derive(Debug, Clone)]
pub enum FetchState {
  /// No fetch has been attempted yet
  Idle,
  /// A fetch is in flight; concurrent callers share its result
  Loading,
  /// The slot holds a collection (possibly stale by now)
  Ready,
  /// The last fetch failed; the next `get` re-attempts
  Failed(String),
}

impl FetchState {
  pub fn is_loading(&self) -> bool {
    matches!(self, FetchState::Loading)
  }

  pub fn is_ready(&self) -> bool {
    matches!(self, FetchState::Ready)
  }

  pub fn is_failed(&self) -> bool {
    matches!(self, FetchState::Failed(_))
  }

  /// Failure reason from the last fetch, if any.
  pub fn reason(&self) -> Option<&str> {
    match self {
      FetchState::Failed(reason) => Some(reason),
      _ => None,
    }
  }
}

/// Counts of slots by condition, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
  pub total: usize,
  pub fresh: usize,
  pub stale: usize,
  pub pending: usize,
}

/// A fetched collection snapshot. Items are behind an `Arc` so every
/// caller in the same freshness window observes the identical sequence.
struct CachedCollection<T> {
  items: Arc<Vec<T>>,
  fetched_at: Instant,
  ttl: Duration,
}

impl<T> CachedCollection<T> {
  fn is_fresh(&self) -> bool {
    self.fetched_at.elapsed() < self.ttl
  }
}

/// Result published by the fetch leader to its waiters.
type Published<T> = Option<Arc<Vec<T>>>;

struct Slot<T> {
  state: FetchState,
  collection: Option<CachedCollection<T>>,
  inflight: Option<watch::Receiver<Published<T>>>,
}

impl<T> Slot<T> {
  fn idle() -> Self {
    Self {
      state: FetchState::Idle,
      collection: None,
      inflight: None,
    }
  }
}

/// In-memory TTL cache for reference collections, keyed by resource name.
///
/// Guarantees:
/// - a fresh slot is served without any network call, returning the same
///   `Arc` every time until the TTL lapses;
/// - at most one fetch is in flight per key, with concurrent callers
///   awaiting the leader's result (single-flight);
/// - a failed fetch resolves every caller with an empty collection and
///   records the reason in [`FetchState::Failed`]; the next `get`
///   re-attempts (no automatic retry, no stale-serving).
pub struct ResourceCache<T> {
  slots: Arc<Mutex<HashMap<String, Slot<T>>>>,
}

impl<T: Send + Sync + 'static> Default for ResourceCache<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> Clone for ResourceCache<T> {
  fn clone(&self) -> Self {
    Self {
      slots: Arc::clone(&self.slots),
    }
  }
}

enum Admission<T> {
  /// Another caller is already fetching; await its published result
  Join(watch::Receiver<Published<T>>),
  /// This caller runs the fetch and publishes for everyone else
  Lead(watch::Sender<Published<T>>),
}

impl<T: Send + Sync + 'static> ResourceCache<T> {
  pub fn new() -> Self {
    Self {
      slots: Arc::new(Mutex::new(HashMap::new())),
    }
  }

  /// Get the collection for `key`, fetching it if stale or absent.
  ///
  /// Fail-soft: a fetch error yields an empty collection; inspect
  /// [`ResourceCache::state`] for the reason.
  pub async fn get<F, Fut>(&self, key: &ResourceKey, ttl: Duration, fetcher: F) -> Arc<Vec<T>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
  {
    self.get_inner(key, ttl, fetcher, false).await
  }

  /// Like [`ResourceCache::get`] but skips the freshness check, forcing a
  /// refetch. Still single-flight: an in-flight fetch is joined, not
  /// duplicated.
  pub async fn refresh<F, Fut>(&self, key: &ResourceKey, ttl: Duration, fetcher: F) -> Arc<Vec<T>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
  {
    self.get_inner(key, ttl, fetcher, true).await
  }

  async fn get_inner<F, Fut>(
    &self,
    key: &ResourceKey,
    ttl: Duration,
    fetcher: F,
    force: bool,
  ) -> Arc<Vec<T>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
  {
    let hash = key.cache_key();

    let admission = {
      let mut slots = self.lock_slots();
      let slot = slots.entry(hash.clone()).or_insert_with(Slot::idle);

      if !force {
        if let Some(collection) = &slot.collection {
          if collection.is_fresh() {
            debug!(key = %hash, "cache hit");
            return Arc::clone(&collection.items);
          }
        }
      }

      if let Some(rx) = &slot.inflight {
        debug!(key = %hash, "fetch already in flight");
        Admission::Join(rx.clone())
      } else {
        let (tx, rx) = watch::channel(None);
        slot.inflight = Some(rx);
        slot.state = FetchState::Loading;
        debug!(key = %hash, "cache miss, fetching");
        Admission::Lead(tx)
      }
    };

    match admission {
      Admission::Join(rx) => self.await_leader(&hash, rx).await,
      Admission::Lead(tx) => {
        let items = match fetcher().await {
          Ok(items) => {
            let items = Arc::new(items);
            let mut slots = self.lock_slots();
            if let Some(slot) = slots.get_mut(&hash) {
              slot.collection = Some(CachedCollection {
                items: Arc::clone(&items),
                fetched_at: Instant::now(),
                ttl,
              });
              slot.state = FetchState::Ready;
              slot.inflight = None;
            }
            items
          }
          Err(e) => {
            let reason = e.to_string();
            warn!(key = %hash, error = %reason, "fetch failed");
            let mut slots = self.lock_slots();
            if let Some(slot) = slots.get_mut(&hash) {
              slot.collection = None;
              slot.state = FetchState::Failed(reason);
              slot.inflight = None;
            }
            Arc::new(Vec::new())
          }
        };

        // Waiters may all be gone; that's fine.
        let _ = tx.send(Some(Arc::clone(&items)));
        items
      }
    }
  }

  /// Await the in-flight leader's published result.
  async fn await_leader(&self, hash: &str, mut rx: watch::Receiver<Published<T>>) -> Arc<Vec<T>> {
    match rx.wait_for(|published| published.is_some()).await {
      Ok(published) => match published.as_ref() {
        Some(items) => Arc::clone(items),
        None => Arc::new(Vec::new()),
      },
      Err(_) => {
        // Leader dropped without publishing (its task was cancelled).
        // Repair the slot so the next get re-attempts instead of joining
        // a dead channel.
        let mut slots = self.lock_slots();
        if let Some(slot) = slots.get_mut(hash) {
          let dead = slot
            .inflight
            .as_ref()
            .is_some_and(|rx| rx.has_changed().is_err());
          if dead {
            slot.inflight = None;
            slot.state = FetchState::Failed("fetch was cancelled".to_string());
          }
        }
        Arc::new(Vec::new())
      }
    }
  }

  /// Current fetch state for `key`.
  pub fn state(&self, key: &ResourceKey) -> FetchState {
    let slots = self.lock_slots();
    slots
      .get(&key.cache_key())
      .map(|slot| slot.state.clone())
      .unwrap_or(FetchState::Idle)
  }

  /// Drop the slot for `key`; the next `get` fetches anew.
  pub fn invalidate(&self, key: &ResourceKey) {
    let mut slots = self.lock_slots();
    slots.remove(&key.cache_key());
  }

  /// Drop every slot.
  pub fn clear(&self) {
    let mut slots = self.lock_slots();
    slots.clear();
  }

  /// Drop slots whose TTL has lapsed and that have no fetch in flight.
  pub fn evict_expired(&self) {
    let mut slots = self.lock_slots();
    slots.retain(|_, slot| {
      slot.inflight.is_some() || slot.collection.as_ref().is_some_and(|c| c.is_fresh())
    });
  }

  /// Slot counts by condition.
  pub fn stats(&self) -> CacheStats {
    let slots = self.lock_slots();
    let mut stats = CacheStats {
      total: slots.len(),
      fresh: 0,
      stale: 0,
      pending: 0,
    };
    for slot in slots.values() {
      if slot.inflight.is_some() {
        stats.pending += 1;
      }
      match &slot.collection {
        Some(c) if c.is_fresh() => stats.fresh += 1,
        Some(_) => stats.stale += 1,
        None => {}
      }
    }
    stats
  }

  fn lock_slots(&self) -> std::sync::MutexGuard<'_, HashMap<String, Slot<T>>> {
    self.slots.lock().unwrap_or_else(PoisonError::into_inner)
  }
}
