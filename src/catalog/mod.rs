//! Remote catalog API: products, search and cart.

mod cached_client;
mod client;
mod types;

pub use cached_client::CachedCatalog;
pub use client::CatalogClient;
pub use types::{badge_label, ListingResponse, Product};
