//! Listing scopes and the cache keys derived from them.

use std::fmt;

/// Prefix for every product listing snapshot in the storage medium.
pub const LISTING_CACHE_PREFIX: &str = "featured_products_cache_";

/// Discriminator used for the unscoped listing.
const ALL: &str = "all";

/// Category filter a listing is fetched for.
///
/// An empty (or whitespace-only) category selects the global listing. A
/// category literally named `all` is the same scope as the global listing, so
/// two distinct scopes never share a cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Scope(Option<String>);

impl Scope {
  /// The unscoped listing.
  pub fn all() -> Self {
    Self(None)
  }

  pub fn category(name: impl Into<String>) -> Self {
    let name = name.into();
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed == ALL {
      Self(None)
    } else {
      Self(Some(trimmed.to_string()))
    }
  }

  pub fn is_all(&self) -> bool {
    self.0.is_none()
  }

  /// Value sent to the listing API; empty means "all".
  ///
  /// A category literally named `all` is the same scope, so it is sent
  /// without a `category` param and gets the global listing.
  pub fn as_param(&self) -> &str {
    self.0.as_deref().unwrap_or("")
  }

  /// Storage key of this scope's snapshot.
  pub fn cache_key(&self) -> String {
    format!("{}{}", LISTING_CACHE_PREFIX, self.0.as_deref().unwrap_or(ALL))
  }
}

impl fmt::Display for Scope {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.0.as_deref().unwrap_or(ALL))
  }
}
