//! Catalog client with transparent listing cache.

use color_eyre::Result;
use tracing::warn;

use crate::cache::{CacheStore, FetchCoordinator, LoadResult, Scope};
use crate::catalog::client::CatalogClient;
use crate::catalog::types::Product;

/// Catalog client with cache-first listings.
///
/// Listings go through the fetch coordinator; search and cart calls go
/// straight to the API.
#[derive(Clone)]
pub struct CachedCatalog {
  inner: CatalogClient,
  cache: FetchCoordinator,
}

impl CachedCatalog {
  pub fn new(inner: CatalogClient, store: CacheStore) -> Self {
    Self {
      inner,
      cache: FetchCoordinator::new(store),
    }
  }

  /// Load a listing, from cache when possible.
  pub async fn load(&self, scope: &Scope) -> LoadResult {
    self
      .cache
      .load(scope, |scope| {
        let inner = self.inner.clone();
        async move { inner.fetch_by_scope(&scope).await }
      })
      .await
  }

  /// Drop the cached listing and fetch it again.
  pub async fn refresh(&self, scope: &Scope) -> LoadResult {
    self
      .cache
      .refresh(scope, |scope| {
        let inner = self.inner.clone();
        async move { inner.fetch_by_scope(&scope).await }
      })
      .await
  }

  /// Search products (not cached - results are ephemeral).
  pub async fn search(&self, query: &str) -> Result<Vec<Product>> {
    self.inner.search(query).await
  }

  /// Add to cart. Failures are logged and reported as `false`.
  pub async fn add_to_cart(&self, product_id: &str, quantity: u32, variant: Option<&str>) -> bool {
    match self.inner.add_item(product_id, quantity, variant).await {
      Ok(()) => true,
      Err(e) => {
        warn!(product_id, error = %e, "failed to add to cart");
        false
      }
    }
  }
}
