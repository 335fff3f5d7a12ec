//! Impression and click telemetry with session-scoped impression dedup.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::warn;

use crate::session::SessionStore;

/// A telemetry event bound for the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TelemetryEvent {
  Impression(u64),
  Click(u64),
}

/// A boxed future that resolves once a send has settled
type BoxFuture = Pin<Box<dyn Future<Output = Result<(), String>> + Send>>;

/// Transport for telemetry events; production posts to the backend
type SendFn = Box<dyn Fn(TelemetryEvent) -> BoxFuture + Send + Sync>;

/// Session-scoped telemetry recorder.
///
/// Impressions are credited at most once per browsing session per
/// creative; clicks always go through. Send failures are logged and
/// swallowed so telemetry can never block the page.
pub struct Telemetry {
  session: Arc<dyn SessionStore>,
  send: SendFn,
}

impl Telemetry {
  pub fn new<F, Fut>(session: Arc<dyn SessionStore>, send: F) -> Self
  where
    F: Fn(TelemetryEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), String>> + Send + 'static,
  {
    Self {
      session,
      send: Box::new(move |event| Box::pin(send(event))),
    }
  }

  fn impression_key(banner_id: u64) -> String {
    format!("banner_impression_{}", banner_id)
  }

  /// Record an impression for `banner_id`, at most once per session.
  ///
  /// The session key is claimed before the send suspends, so two
  /// overlapping calls for the same id produce exactly one event. A
  /// failed send keeps the claim; it is not retried.
  pub async fn record_impression(&self, banner_id: u64) {
    if !self
      .session
      .set_if_absent(&Self::impression_key(banner_id), "true")
    {
      return;
    }

    if let Err(e) = (self.send)(TelemetryEvent::Impression(banner_id)).await {
      warn!(banner = banner_id, error = %e, "failed to track impression");
    }
  }

  /// Record a click for `banner_id`. Clicks are never deduplicated.
  pub async fn record_click(&self, banner_id: u64) {
    if let Err(e) = (self.send)(TelemetryEvent::Click(banner_id)).await {
      warn!(banner = banner_id, error = %e, "failed to track click");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::session::MemoryStore;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::time::Duration;

  struct Recorded {
    impressions: AtomicU32,
    clicks: AtomicU32,
  }

  fn telemetry(fail: bool, delay: Duration) -> (Arc<Telemetry>, Arc<Recorded>, Arc<MemoryStore>) {
    let recorded = Arc::new(Recorded {
      impressions: AtomicU32::new(0),
      clicks: AtomicU32::new(0),
    });
    let session = Arc::new(MemoryStore::new());

    let sink = recorded.clone();
    let telemetry = Telemetry::new(session.clone(), move |event| {
      let sink = sink.clone();
      async move {
        tokio::time::sleep(delay).await;
        match event {
          TelemetryEvent::Impression(_) => sink.impressions.fetch_add(1, Ordering::SeqCst),
          TelemetryEvent::Click(_) => sink.clicks.fetch_add(1, Ordering::SeqCst),
        };
        if fail {
          Err("503 service unavailable".to_string())
        } else {
          Ok(())
        }
      }
    });

    (Arc::new(telemetry), recorded, session)
  }

  #[tokio::test]
  async fn test_impression_recorded_once_per_session() {
    let (telemetry, recorded, _) = telemetry(false, Duration::ZERO);

    telemetry.record_impression(42).await;
    telemetry.record_impression(42).await;

    assert_eq!(recorded.impressions.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_concurrent_impressions_send_once() {
    let (telemetry, recorded, _) = telemetry(false, Duration::from_millis(20));

    let a = {
      let telemetry = telemetry.clone();
      tokio::spawn(async move { telemetry.record_impression(42).await })
    };
    let b = {
      let telemetry = telemetry.clone();
      tokio::spawn(async move { telemetry.record_impression(42).await })
    };
    a.await.unwrap();
    b.await.unwrap();

    assert_eq!(recorded.impressions.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_new_session_sends_again() {
    let (telemetry, recorded, session) = telemetry(false, Duration::ZERO);

    telemetry.record_impression(42).await;
    session.reset();
    telemetry.record_impression(42).await;

    assert_eq!(recorded.impressions.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_distinct_ids_each_send() {
    let (telemetry, recorded, _) = telemetry(false, Duration::ZERO);

    telemetry.record_impression(1).await;
    telemetry.record_impression(2).await;

    assert_eq!(recorded.impressions.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_click_always_fires() {
    let (telemetry, recorded, _) = telemetry(false, Duration::ZERO);

    telemetry.record_impression(42).await;
    telemetry.record_click(42).await;
    telemetry.record_click(42).await;

    assert_eq!(recorded.clicks.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_failed_send_keeps_the_claim() {
    let (telemetry, recorded, _) = telemetry(true, Duration::ZERO);

    telemetry.record_impression(42).await;
    telemetry.record_impression(42).await;

    // The failed first attempt still counts as attempted; no retry traffic.
    assert_eq!(recorded.impressions.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_failed_click_is_swallowed() {
    let (telemetry, recorded, _) = telemetry(true, Duration::ZERO);

    telemetry.record_click(42).await;
    assert_eq!(recorded.clicks.load(Ordering::SeqCst), 1);
  }
}
