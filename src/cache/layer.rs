//! Per-scope orchestration of "serve from cache, else fetch, else serve stale".

use chrono::{DateTime, Utc};
use color_eyre::Result;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::key::Scope;
use super::store::CacheStore;
use crate::catalog::{ListingResponse, Product};

/// Indicates where a listing came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Cached snapshot served without touching the network
  Cache,
  /// Network failed, serving the last good snapshot
  Offline,
  /// Network failed and nothing usable was cached
  Unavailable,
}

/// Result of loading a listing.
#[derive(Debug, Clone)]
pub struct LoadResult {
  pub items: Vec<Product>,
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub stored_at: Option<DateTime<Utc>>,
}

impl LoadResult {
  pub fn from_network(items: Vec<Product>) -> Self {
    Self {
      items,
      source: CacheSource::Network,
      stored_at: None,
    }
  }

  pub fn from_cache(items: Vec<Product>, stored_at: DateTime<Utc>) -> Self {
    Self {
      items,
      source: CacheSource::Cache,
      stored_at: Some(stored_at),
    }
  }

  pub fn offline(items: Vec<Product>, stored_at: DateTime<Utc>) -> Self {
    Self {
      items,
      source: CacheSource::Offline,
      stored_at: Some(stored_at),
    }
  }

  pub fn unavailable() -> Self {
    Self {
      items: Vec::new(),
      source: CacheSource::Unavailable,
      stored_at: None,
    }
  }

  /// Whether the items were served from the persisted snapshot.
  pub fn is_cache_sourced(&self) -> bool {
    matches!(self.source, CacheSource::Cache | CacheSource::Offline)
  }

  /// The slice a given layout renders.
  pub fn present(&self, layout: ListingLayout) -> &[Product] {
    match layout {
      ListingLayout::Scroll => &self.items,
      ListingLayout::Grid { max_products } => &self.items[..self.items.len().min(max_products)],
    }
  }
}

/// How a listing is rendered; grids show a bounded number of items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingLayout {
  Scroll,
  Grid { max_products: usize },
}

impl Default for ListingLayout {
  fn default() -> Self {
    Self::Grid { max_products: 8 }
  }
}

/// Orchestrates cache reads and network fetches for product listings.
///
/// A usable (non-empty) snapshot is always served without revalidation.
/// Network failures never escape: they resolve to the last snapshot or to an
/// empty listing.
#[derive(Clone)]
pub struct FetchCoordinator {
  store: CacheStore,
}

impl FetchCoordinator {
  pub fn new(store: CacheStore) -> Self {
    Self { store }
  }

  pub fn store(&self) -> &CacheStore {
    &self.store
  }

  /// Load the listing for `scope`.
  ///
  /// 1. Non-empty snapshot in cache: serve it
  /// 2. Otherwise fetch and store the normalized result, even if empty
  /// 3. On fetch failure serve a non-empty snapshot of any age, else nothing
  pub async fn load<F, Fut>(&self, scope: &Scope, fetcher: F) -> LoadResult
  where
    F: FnOnce(Scope) -> Fut,
    Fut: Future<Output = Result<ListingResponse>>,
  {
    let key = scope.cache_key();

    if let Some(cached) = self.store.get::<Product>(&key) {
      if !cached.payload.is_empty() {
        debug!(%scope, items = cached.payload.len(), "serving listing from cache");
        return LoadResult::from_cache(cached.payload, cached.stored_at);
      }
      debug!(%scope, "cached listing is empty, fetching");
    }

    self.fetch(scope, fetcher).await
  }

  /// Fetch `scope` again without serving the cache first.
  ///
  /// The snapshot is only replaced once the fetch succeeds, so a failed
  /// refresh still falls back to it.
  pub async fn refresh<F, Fut>(&self, scope: &Scope, fetcher: F) -> LoadResult
  where
    F: FnOnce(Scope) -> Fut,
    Fut: Future<Output = Result<ListingResponse>>,
  {
    debug!(%scope, "refreshing listing");
    self.fetch(scope, fetcher).await
  }

  async fn fetch<F, Fut>(&self, scope: &Scope, fetcher: F) -> LoadResult
  where
    F: FnOnce(Scope) -> Fut,
    Fut: Future<Output = Result<ListingResponse>>,
  {
    let key = scope.cache_key();
    match fetcher(scope.clone()).await {
      Ok(response) => {
        let items = response.into_products();
        self.store.set(&key, &items);
        debug!(%scope, items = items.len(), "listing fetched");
        LoadResult::from_network(items)
      }
      Err(e) => {
        warn!(%scope, error = %e, "failed to fetch listing");
        match self.store.get_any_age::<Product>(&key) {
          Some(cached) if !cached.payload.is_empty() => {
            LoadResult::offline(cached.payload, cached.stored_at)
          }
          _ => LoadResult::unavailable(),
        }
      }
    }
  }
}

/// Transient "loaded from cache" affordance.
#[derive(Debug, Clone)]
pub struct CacheNotice {
  shown_at: Option<Instant>,
  duration: Duration,
}

impl CacheNotice {
  pub fn new(duration: Duration) -> Self {
    Self {
      shown_at: None,
      duration,
    }
  }

  /// Show the notice if `result` was cache-sourced, hide it otherwise.
  pub fn observe(&mut self, result: &LoadResult) {
    self.shown_at = result.is_cache_sourced().then(Instant::now);
  }

  pub fn is_visible(&self) -> bool {
    self
      .shown_at
      .is_some_and(|shown_at| shown_at.elapsed() < self.duration)
  }

  /// Forget an expired notice. Returns true if it was just dismissed.
  pub fn tick(&mut self) -> bool {
    if self.shown_at.is_some() && !self.is_visible() {
      self.shown_at = None;
      return true;
    }
    false
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::storage::{MemoryMedium, StorageMedium};
  use color_eyre::eyre::eyre;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;

  fn product(id: &str) -> Product {
    Product {
      object_id: Some(id.to_string()),
      title: Some(format!("Product {}", id)),
      ..Default::default()
    }
  }

  fn coordinator() -> (MemoryMedium, FetchCoordinator) {
    let medium = MemoryMedium::new();
    let coordinator = FetchCoordinator::new(CacheStore::new(Arc::new(medium.clone())));
    (medium, coordinator)
  }

  async fn ok_listing(items: Vec<Product>) -> Result<ListingResponse> {
    Ok(ListingResponse::Bare(items))
  }

  async fn failing() -> Result<ListingResponse> {
    Err(eyre!("connection refused"))
  }

  #[tokio::test]
  async fn test_fetch_then_serve_from_cache() {
    let (_medium, coordinator) = coordinator();
    let scope = Scope::category("shirts");
    let calls = AtomicU32::new(0);

    let first = coordinator
      .load(&scope, |_| {
        calls.fetch_add(1, Ordering::SeqCst);
        ok_listing(vec![product("1"), product("2")])
      })
      .await;
    assert_eq!(first.source, CacheSource::Network);
    assert!(!first.is_cache_sourced());

    let second = coordinator
      .load(&scope, |_| {
        calls.fetch_add(1, Ordering::SeqCst);
        ok_listing(vec![product("3")])
      })
      .await;
    assert!(second.is_cache_sourced());
    assert_eq!(second.items, first.items);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_empty_listing_is_refetched() {
    let (_medium, coordinator) = coordinator();
    let scope = Scope::category("perfumes");
    let calls = AtomicU32::new(0);

    for _ in 0..2 {
      let result = coordinator
        .load(&scope, |_| {
          calls.fetch_add(1, Ordering::SeqCst);
          ok_listing(Vec::new())
        })
        .await;
      assert!(result.items.is_empty());
      assert!(!result.is_cache_sourced());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_failure_serves_stale_snapshot() {
    let (_medium, coordinator) = coordinator();
    let scope = Scope::category("sarees");

    coordinator
      .load(&scope, |_| ok_listing(vec![product("1")]))
      .await;
    let result = coordinator.refresh(&scope, |_| failing()).await;
    assert_eq!(result.source, CacheSource::Offline);
    assert_eq!(result.items, vec![product("1")]);

    let store = coordinator.store().clone().with_max_age(Some(chrono::Duration::zero()));
    let stale = FetchCoordinator::new(store);
    tokio::time::sleep(Duration::from_millis(5)).await;

    let result = stale.load(&scope, |_| failing()).await;
    assert_eq!(result.source, CacheSource::Offline);
    assert!(result.is_cache_sourced());
    assert_eq!(result.items, vec![product("1")]);
  }

  #[tokio::test]
  async fn test_refresh_replaces_snapshot_only_on_success() {
    let (_medium, coordinator) = coordinator();
    let scope = Scope::category("kurtis");
    let key = scope.cache_key();

    coordinator
      .load(&scope, |_| ok_listing(vec![product("1")]))
      .await;
    coordinator.refresh(&scope, |_| failing()).await;
    let kept = coordinator.store().get::<Product>(&key).unwrap();
    assert_eq!(kept.payload, vec![product("1")]);

    // Refresh skips the cache hit and fetches
    let result = coordinator
      .refresh(&scope, |_| ok_listing(vec![product("2")]))
      .await;
    assert_eq!(result.source, CacheSource::Network);
    let replaced = coordinator.store().get::<Product>(&key).unwrap();
    assert_eq!(replaced.payload, vec![product("2")]);
  }

  #[tokio::test]
  async fn test_failure_without_cache_is_empty() {
    let (_medium, coordinator) = coordinator();
    let result = coordinator.load(&Scope::all(), |_| failing()).await;
    assert!(result.items.is_empty());
    assert!(!result.is_cache_sourced());
  }

  #[tokio::test]
  async fn test_failed_fetch_never_overwrites_entry() {
    let (medium, coordinator) = coordinator();
    let scope = Scope::category("shirts");
    coordinator
      .load(&scope, |_| ok_listing(vec![product("1")]))
      .await;
    let before = medium.get_item(&scope.cache_key()).unwrap();

    let store = coordinator.store().clone().with_max_age(Some(chrono::Duration::zero()));
    tokio::time::sleep(Duration::from_millis(5)).await;
    FetchCoordinator::new(store)
      .load(&scope, |_| failing())
      .await;

    assert_eq!(medium.get_item(&scope.cache_key()).unwrap(), before);
  }

  #[tokio::test]
  async fn test_corrupt_entry_triggers_fetch() {
    let (medium, coordinator) = coordinator();
    let scope = Scope::category("shirts");
    medium.set_item(&scope.cache_key(), "garbage").unwrap();

    let result = coordinator
      .load(&scope, |_| ok_listing(vec![product("9")]))
      .await;
    assert_eq!(result.source, CacheSource::Network);
    assert_eq!(result.items, vec![product("9")]);
  }

  #[tokio::test]
  async fn test_fetcher_receives_scope() {
    let (_medium, coordinator) = coordinator();
    let scope = Scope::category("kurtis");
    coordinator
      .load(&scope, |s| {
        assert_eq!(s.as_param(), "kurtis");
        ok_listing(Vec::new())
      })
      .await;
  }

  #[test]
  fn test_present_slices_grid_only() {
    let result = LoadResult::from_network((0..12).map(|i| product(&i.to_string())).collect());
    assert_eq!(result.present(ListingLayout::Scroll).len(), 12);
    assert_eq!(result.present(ListingLayout::Grid { max_products: 8 }).len(), 8);
    assert_eq!(result.present(ListingLayout::Grid { max_products: 20 }).len(), 12);
  }

  #[tokio::test(start_paused = true)]
  async fn test_cache_notice_auto_dismisses() {
    let mut notice = CacheNotice::new(Duration::from_secs(3));
    notice.observe(&LoadResult::from_cache(vec![product("1")], Utc::now()));
    assert!(notice.is_visible());
    assert!(!notice.tick());

    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(!notice.is_visible());
    assert!(notice.tick());
    assert!(!notice.tick());
  }

  #[test]
  fn test_cache_notice_hidden_for_network_results() {
    let mut notice = CacheNotice::new(Duration::from_secs(3));
    notice.observe(&LoadResult::from_network(vec![product("1")]));
    assert!(!notice.is_visible());
  }
}
