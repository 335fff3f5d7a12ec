use crate::api::types::{parse_listing, AdCreative, Category};
use crate::config::Config;
use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

/// Site backend API client.
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base: Url,
}

impl ApiClient {
  pub fn new(config: &Config) -> Result<Self> {
    // A trailing slash keeps Url::join from clobbering the last path segment.
    let mut base = config.api.url.clone();
    if !base.ends_with('/') {
      base.push('/');
    }
    let base = Url::parse(&base).map_err(|e| eyre!("Invalid API url {}: {}", base, e))?;

    let http = reqwest::Client::builder()
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, base })
  }

  /// Fetch the category reference collection.
  pub async fn get_categories(&self) -> Result<Vec<Category>> {
    self.get_listing("categories/", "categories").await
  }

  /// Fetch all ad creatives.
  pub async fn get_banners(&self) -> Result<Vec<AdCreative>> {
    self.get_listing("banners/", "banners").await
  }

  /// Report that a banner was displayed.
  pub async fn track_impression(&self, banner_id: u64) -> Result<()> {
    self
      .post_event(&format!("banners/{}/impression", banner_id))
      .await
  }

  /// Report that a banner was clicked.
  pub async fn track_click(&self, banner_id: u64) -> Result<()> {
    self
      .post_event(&format!("banners/{}/click", banner_id))
      .await
  }

  fn endpoint(&self, path: &str) -> Result<Url> {
    self
      .base
      .join(path)
      .map_err(|e| eyre!("Invalid endpoint {}: {}", path, e))
  }

  async fn get_listing<T: DeserializeOwned>(&self, path: &str, what: &str) -> Result<Vec<T>> {
    let url = self.endpoint(path)?;

    let response = self
      .http
      .get(url)
      .send()
      .await
      .map_err(|e| eyre!("Failed to fetch {}: {}", what, e))?
      .error_for_status()
      .map_err(|e| eyre!("Failed to fetch {}: {}", what, e))?;

    let body: Value = response
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse {}: {}", what, e))?;

    parse_listing(body, what)
  }

  async fn post_event(&self, path: &str) -> Result<()> {
    let url = self.endpoint(path)?;

    self
      .http
      .post(url)
      .send()
      .await
      .map_err(|e| eyre!("Failed to post {}: {}", path, e))?
      .error_for_status()
      .map_err(|e| eyre!("Failed to post {}: {}", path, e))?;

    Ok(())
  }
}
