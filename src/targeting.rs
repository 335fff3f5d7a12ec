//! Creative selection for ad placements.
//!
//! Pure functions: the caller supplies the clock and the randomness
//! source, so selection is deterministic under test.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::api::types::AdCreative;

/// Creatives that may be shown at `location` at time `now`, in input order.
pub fn eligible<'a>(
  creatives: &'a [AdCreative],
  location: &str,
  now: DateTime<Utc>,
) -> Vec<&'a AdCreative> {
  creatives
    .iter()
    .filter(|c| c.eligible_at(location, now))
    .collect()
}

/// Pick one creative for `location`, uniformly at random among those
/// eligible at `now`. Returns None when nothing qualifies; an empty
/// placement is a valid outcome, not an error.
///
/// `rng` must yield values in `[0, 1)`.
pub fn select<'a>(
  creatives: &'a [AdCreative],
  location: &str,
  now: DateTime<Utc>,
  rng: &mut dyn FnMut() -> f64,
) -> Option<&'a AdCreative> {
  let pool = eligible(creatives, location, now);
  if pool.is_empty() {
    return None;
  }

  let index = (rng() * pool.len() as f64) as usize;
  Some(pool[index.min(pool.len() - 1)])
}

/// Production sampler: uniform `f64` in `[0, 1)` from an OS-seeded
/// generator. Tests substitute a fixed sequence instead.
pub fn entropy_sampler() -> impl FnMut() -> f64 + Send {
  let mut rng = StdRng::from_os_rng();
  move || rng.random::<f64>()
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn creative(id: u64, locations: &[&str]) -> AdCreative {
    serde_json::from_value(json!({
      "id": id,
      "is_active": true,
      "locations": locations,
      "link": "https://example.com",
    }))
    .unwrap()
  }

  #[test]
  fn test_empty_pool_selects_none() {
    let creatives = vec![creative(1, &["sidebar_main"])];
    let mut rng = || 0.0;
    assert!(select(&creatives, "home_topics_list", Utc::now(), &mut rng).is_none());
    assert!(select(&[], "sidebar_main", Utc::now(), &mut rng).is_none());
  }

  #[test]
  fn test_select_filters_by_location() {
    let creatives = vec![
      creative(1, &["sidebar_main"]),
      creative(2, &["home_topics_list"]),
    ];
    let mut rng = || 0.0;
    let picked = select(&creatives, "home_topics_list", Utc::now(), &mut rng).unwrap();
    assert_eq!(picked.id, 2);
  }

  #[test]
  fn test_select_never_returns_out_of_window_creative() {
    let now: DateTime<Utc> = "2026-06-15T12:00:00Z".parse().unwrap();
    let mut expired = creative(1, &["sidebar_main"]);
    expired.end_at = Some("2026-06-01T00:00:00Z".parse().unwrap());
    let current = creative(2, &["sidebar_main"]);
    let creatives = vec![expired, current];

    for step in 0..10 {
      let mut rng = move || step as f64 / 10.0;
      let picked = select(&creatives, "sidebar_main", now, &mut rng).unwrap();
      assert_eq!(picked.id, 2);
    }
  }

  #[test]
  fn test_rng_at_upper_edge_stays_in_bounds() {
    let creatives = vec![creative(1, &["sidebar_main"]), creative(2, &["sidebar_main"])];
    let mut rng = || 0.999_999;
    let picked = select(&creatives, "sidebar_main", Utc::now(), &mut rng).unwrap();
    assert_eq!(picked.id, 2);
  }

  #[test]
  fn test_selection_is_uniform_over_eligible() {
    let creatives: Vec<AdCreative> = (1..=4).map(|id| creative(id, &["sidebar_main"])).collect();
    let now = Utc::now();

    let mut rng = StdRng::seed_from_u64(42);
    let mut sampler = move || rng.random::<f64>();

    let mut counts = [0u32; 4];
    for _ in 0..10_000 {
      let picked = select(&creatives, "sidebar_main", now, &mut sampler).unwrap();
      counts[(picked.id - 1) as usize] += 1;
    }

    // 2500 expected per creative; 10% margin
    for count in counts {
      assert!((2250..=2750).contains(&count), "skewed counts: {:?}", counts);
    }
  }

  #[test]
  fn test_select_does_not_mutate_inputs() {
    let creatives = vec![creative(1, &["sidebar_main"])];
    let before = creatives.clone();
    let mut rng = || 0.5;
    select(&creatives, "sidebar_main", Utc::now(), &mut rng);
    assert_eq!(creatives, before);
  }
}
