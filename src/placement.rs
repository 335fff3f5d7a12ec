//! Per-placement banner delivery: selection state machine plus telemetry.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;

use crate::api::types::AdCreative;
use crate::targeting;
use crate::telemetry::Telemetry;

/// Delivery state for one placement location.
#[derive(Debug, Clone)]
pub enum PlacementState {
  /// No location has been shown yet
  Idle,
  /// A selection for the current location is pending
  Selecting,
  /// A creative was committed for the current location
  Selected(AdCreative),
  /// No creative is eligible for the current location
  Empty,
}

impl PlacementState {
  pub fn is_selecting(&self) -> bool {
    matches!(self, PlacementState::Selecting)
  }

  pub fn is_empty(&self) -> bool {
    matches!(self, PlacementState::Empty)
  }

  /// The committed creative, if one is showing.
  pub fn creative(&self) -> Option<&AdCreative> {
    match self {
      PlacementState::Selected(creative) => Some(creative),
      _ => None,
    }
  }
}

type CreativesFuture = Pin<Box<dyn Future<Output = Arc<Vec<AdCreative>>> + Send>>;
type CreativesFn = Box<dyn Fn() -> CreativesFuture + Send + Sync>;
type Sampler = Box<dyn FnMut() -> f64 + Send>;

struct Inner {
  state: PlacementState,
  location: Option<String>,
  epoch: u64,
  abandoned: bool,
}

struct Shared {
  creatives: CreativesFn,
  telemetry: Arc<Telemetry>,
  sampler: Mutex<Sampler>,
  inner: Mutex<Inner>,
}

/// Drives one ad placement through `Idle → Selecting → Selected | Empty`.
///
/// Selection is re-run on location identity change, never on re-render:
/// showing the same location again after a commit is a no-op. When a new
/// location arrives before a pending selection settles, the newest wins
/// and the stale result is discarded. `deactivate` abandons the placement;
/// a selection in flight at that point commits nothing and sends nothing.
pub struct BannerPlacement {
  shared: Arc<Shared>,
}

impl Clone for BannerPlacement {
  fn clone(&self) -> Self {
    Self {
      shared: Arc::clone(&self.shared),
    }
  }
}

impl BannerPlacement {
  /// Create a placement over a creative source and a telemetry recorder.
  ///
  /// `creatives` is awaited once per selection; it should be fail-soft
  /// (an empty collection simply yields an empty placement). `sampler`
  /// supplies the selection randomness; see [`targeting::select`].
  pub fn new<F, Fut, S>(creatives: F, telemetry: Arc<Telemetry>, sampler: S) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Arc<Vec<AdCreative>>> + Send + 'static,
    S: FnMut() -> f64 + Send + 'static,
  {
    Self {
      shared: Arc::new(Shared {
        creatives: Box::new(move || Box::pin(creatives())),
        telemetry,
        sampler: Mutex::new(Box::new(sampler)),
        inner: Mutex::new(Inner {
          state: PlacementState::Idle,
          location: None,
          epoch: 0,
          abandoned: false,
        }),
      }),
    }
  }

  /// Select and commit a creative for `location`, recording its impression.
  ///
  /// Returns the placement state after this call settles. If another
  /// `show` for a different location starts before this one finishes,
  /// this result is discarded and the returned state is the newer one's.
  pub async fn show(&self, location: &str) -> PlacementState {
    let epoch = {
      let mut inner = self.lock_inner();
      if inner.abandoned {
        return inner.state.clone();
      }
      // Same location and not the first activation: nothing to recompute.
      if inner.location.as_deref() == Some(location)
        && !matches!(inner.state, PlacementState::Idle)
      {
        return inner.state.clone();
      }
      inner.epoch += 1;
      inner.location = Some(location.to_string());
      inner.state = PlacementState::Selecting;
      inner.epoch
    };

    let creatives = (self.shared.creatives)().await;

    let picked = {
      let mut sampler = self
        .shared
        .sampler
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
      targeting::select(&creatives, location, Utc::now(), &mut **sampler).cloned()
    };

    // Commit only if this selection is still the latest and the
    // placement is still live.
    let committed = {
      let mut inner = self.lock_inner();
      if inner.abandoned || inner.epoch != epoch {
        None
      } else {
        inner.state = match &picked {
          Some(creative) => PlacementState::Selected(creative.clone()),
          None => PlacementState::Empty,
        };
        Some(inner.state.clone())
      }
    };

    match committed {
      Some(state) => {
        if let PlacementState::Selected(creative) = &state {
          self.shared.telemetry.record_impression(creative.id).await;
        }
        state
      }
      // Superseded or abandoned: report whatever is current now.
      None => self.state(),
    }
  }

  /// Record a click for the committed creative. No-op unless a creative
  /// is currently showing.
  pub async fn on_click(&self) {
    let banner_id = {
      let inner = self.lock_inner();
      match &inner.state {
        PlacementState::Selected(creative) if !inner.abandoned => Some(creative.id),
        _ => None,
      }
    };

    if let Some(id) = banner_id {
      self.shared.telemetry.record_click(id).await;
    }
  }

  /// Abandon the placement: discard any in-flight selection and stop all
  /// further telemetry from it.
  pub fn deactivate(&self) {
    let mut inner = self.lock_inner();
    inner.abandoned = true;
    inner.state = PlacementState::Idle;
    inner.location = None;
  }

  /// Current delivery state.
  pub fn state(&self) -> PlacementState {
    self.lock_inner().state.clone()
  }

  /// Location most recently shown, if any.
  pub fn location(&self) -> Option<String> {
    self.lock_inner().location.clone()
  }

  fn lock_inner(&self) -> std::sync::MutexGuard<'_, Inner> {
    self
      .shared
      .inner
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
  }
}
