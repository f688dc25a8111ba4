//! Offline-first cache for product listings.
//!
//! This module provides the listing snapshot cache that:
//! - Stores one snapshot per scope (category) with its timestamp
//! - Serves a non-empty snapshot without touching the network
//! - Falls back to the last snapshot when the network fails
//! - Never lets a storage or network error escape to the caller

mod key;
mod layer;
mod store;

pub use key::Scope;
pub use layer::{CacheNotice, CacheSource, FetchCoordinator, ListingLayout, LoadResult};
pub use store::{CacheEntry, CacheStore};
