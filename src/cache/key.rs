//! Cache key derivation for backend resources.

/// Identifies a cacheable resource: a name plus optional query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceKey {
  name: String,
  params: Vec<(String, String)>,
}

impl ResourceKey {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name: name.into(),
      params: Vec::new(),
    }
  }

  /// Attach a query parameter to the key.
  pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.params.push((name.into(), value.into()));
    self
  }

  /// Resource name without parameters (used for TTL policy lookup).
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Stable lookup key. Parameters are sorted so the same query always
  /// maps to the same slot regardless of call-site ordering.
  pub fn cache_key(&self) -> String {
    let mut params = self.params.clone();
    params.sort();

    let mut key = self.name.trim().to_lowercase();
    for (name, value) in &params {
      key.push(':');
      key.push_str(name);
      key.push('=');
      key.push_str(value);
    }
    key
  }
}

impl std::fmt::Display for ResourceKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.cache_key())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_plain_key_is_normalized() {
    assert_eq!(ResourceKey::new(" Categories ").cache_key(), "categories");
  }

  #[test]
  fn test_param_order_does_not_matter() {
    let a = ResourceKey::new("topics")
      .with_param("page", "2")
      .with_param("ordering", "views");
    let b = ResourceKey::new("topics")
      .with_param("ordering", "views")
      .with_param("page", "2");
    assert_eq!(a.cache_key(), b.cache_key());
  }

  #[test]
  fn test_different_params_split_the_cache() {
    let a = ResourceKey::new("topics").with_param("page", "1");
    let b = ResourceKey::new("topics").with_param("page", "2");
    assert_ne!(a.cache_key(), b.cache_key());
  }
}
