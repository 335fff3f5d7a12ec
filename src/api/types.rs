//! Wire types for the site backend.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// A reference category record.
#[derive(Debug, Clone, Deserialize)]
pub struct Category {
  pub id: u64,
  /// Some endpoints send `name` instead of `title`
  #[serde(alias = "name")]
  pub title: String,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub slug: Option<String>,
  #[serde(default)]
  pub icon: Option<String>,
  #[serde(default)]
  pub topics_count: u64,
}

/// One promotional creative as served by the backend.
///
/// Window bounds are optional; an unset bound is unbounded on that side.
/// Records that fail to parse (bad dates, wrong field shapes) are dropped
/// by [`parse_listing`] rather than failing the whole collection.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AdCreative {
  pub id: u64,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub image: Option<String>,
  #[serde(default)]
  pub video: Option<String>,
  #[serde(default)]
  pub link: String,
  #[serde(default)]
  pub locations: Vec<String>,
  #[serde(default, rename = "is_active")]
  pub active: bool,
  #[serde(default, rename = "start_date")]
  pub start_at: Option<DateTime<Utc>>,
  #[serde(default, rename = "end_date")]
  pub end_at: Option<DateTime<Utc>>,
}

/// Media payload of a creative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Media<'a> {
  Image(&'a str),
  Video(&'a str),
}

impl AdCreative {
  /// Whether this creative may be shown at `location` at time `now`.
  pub fn eligible_at(&self, location: &str, now: DateTime<Utc>) -> bool {
    self.active
      && self.locations.iter().any(|l| l == location)
      && self.start_at.is_none_or(|start| start <= now)
      && self.end_at.is_none_or(|end| end >= now)
  }

  /// Media to render. Video takes precedence when both are set.
  pub fn media(&self) -> Option<Media<'_>> {
    if let Some(video) = &self.video {
      Some(Media::Video(video))
    } else if let Some(image) = &self.image {
      Some(Media::Image(image))
    } else {
      None
    }
  }
}

/// Parse a collection response that is either a paginated envelope
/// (`{ "results": [...] }`) or a plain array.
///
/// Individual records that fail to parse are skipped with a warning so a
/// single malformed row cannot take down the whole collection. A body
/// that is neither shape is an error.
pub fn parse_listing<T: DeserializeOwned>(body: Value, what: &str) -> Result<Vec<T>> {
  let records = match body {
    Value::Array(records) => records,
    Value::Object(mut map) => match map.remove("results") {
      Some(Value::Array(records)) => records,
      _ => return Err(eyre!("Unexpected {} response shape", what)),
    },
    _ => return Err(eyre!("Unexpected {} response shape", what)),
  };

  let mut items = Vec::with_capacity(records.len());
  for record in records {
    match serde_json::from_value(record) {
      Ok(item) => items.push(item),
      Err(e) => warn!(collection = what, error = %e, "skipping malformed record"),
    }
  }
  Ok(items)
}
