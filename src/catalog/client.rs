use color_eyre::{eyre::eyre, Result};
use reqwest::Url;

use crate::cache::Scope;
use crate::catalog::types::{AddCartItem, ListingResponse, Product, SearchResponse};
use crate::config::Config;

/// Catalog HTTP API client
#[derive(Clone)]
pub struct CatalogClient {
  http: reqwest::Client,
  base: Url,
}

impl CatalogClient {
  pub fn new(config: &Config) -> Result<Self> {
    let mut base_url = config.api.base_url.trim().to_string();
    // Url::join drops the last path segment unless it ends with a slash
    if !base_url.ends_with('/') {
      base_url.push('/');
    }

    let base = Url::parse(&base_url)
      .map_err(|e| eyre!("Invalid catalog API URL {}: {}", config.api.base_url, e))?;

    let http = reqwest::Client::builder()
      .user_agent(concat!("shopcache/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, base })
  }

  fn endpoint(&self, path: &str) -> Result<Url> {
    self
      .base
      .join(path)
      .map_err(|e| eyre!("Invalid endpoint {}: {}", path, e))
  }

  /// Get the product listing for a scope
  pub async fn fetch_by_scope(&self, scope: &Scope) -> Result<ListingResponse> {
    let mut url = self.endpoint("products")?;
    if !scope.is_all() {
      url
        .query_pairs_mut()
        .append_pair("category", scope.as_param());
    }

    let response = self
      .http
      .get(url)
      .send()
      .await
      .map_err(|e| eyre!("Failed to fetch products for {}: {}", scope, e))?
      .error_for_status()
      .map_err(|e| eyre!("Failed to fetch products for {}: {}", scope, e))?;

    response
      .json::<ListingResponse>()
      .await
      .map_err(|e| eyre!("Failed to parse products for {}: {}", scope, e))
  }

  /// Search products by free text
  pub async fn search(&self, query: &str) -> Result<Vec<Product>> {
    let mut url = self.endpoint("products/search")?;
    url.query_pairs_mut().append_pair("q", query);

    let response = self
      .http
      .get(url)
      .send()
      .await
      .map_err(|e| eyre!("Failed to search products: {}", e))?
      .error_for_status()
      .map_err(|e| eyre!("Failed to search products: {}", e))?;

    let body: SearchResponse = response
      .json()
      .await
      .map_err(|e| eyre!("Failed to parse search results: {}", e))?;

    Ok(body.into_results())
  }

  /// Add a product to the shopper's cart
  pub async fn add_item(
    &self,
    product_id: &str,
    quantity: u32,
    variant: Option<&str>,
  ) -> Result<()> {
    let url = self.endpoint("cart/items")?;
    let body = AddCartItem {
      product_id: product_id.to_string(),
      quantity,
      variant: variant.map(String::from),
    };

    self
      .http
      .post(url)
      .json(&body)
      .send()
      .await
      .map_err(|e| eyre!("Failed to add {} to cart: {}", product_id, e))?
      .error_for_status()
      .map_err(|e| eyre!("Failed to add {} to cart: {}", product_id, e))?;

    Ok(())
  }
}
