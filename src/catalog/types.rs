//! Catalog types shared by the listing, search and cart endpoints.
//!
//! Products are owned by the remote API. They are kept close to their wire
//! shape: unknown fields are preserved so a cached snapshot round-trips
//! exactly what the API sent.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Accept identifiers sent as strings or numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  let value: Option<Value> = Option::deserialize(deserializer)?;
  Ok(match value {
    Some(Value::String(s)) => Some(s),
    Some(Value::Number(n)) => Some(n.to_string()),
    _ => None,
  })
}

/// A product as returned by the catalog API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
  #[serde(
    rename = "_id",
    default,
    deserialize_with = "string_or_number",
    skip_serializing_if = "Option::is_none"
  )]
  pub object_id: Option<String>,
  #[serde(
    default,
    deserialize_with = "string_or_number",
    skip_serializing_if = "Option::is_none"
  )]
  pub id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub images: Vec<Value>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub price: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub mrp: Option<f64>,
  #[serde(
    rename = "discountPercent",
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub discount_percent: Option<f64>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl Product {
  /// Identifier, preferring `_id` over `id`.
  pub fn product_id(&self) -> Option<&str> {
    self.object_id.as_deref().or(self.id.as_deref())
  }

  pub fn display_title(&self) -> &str {
    self
      .title
      .as_deref()
      .or(self.name.as_deref())
      .unwrap_or("Untitled")
  }

  /// First image URL, whether images are plain strings or `{url}` objects.
  pub fn primary_image(&self) -> Option<&str> {
    match self.images.first()? {
      Value::String(url) => Some(url),
      Value::Object(obj) => obj.get("url").and_then(Value::as_str),
      _ => None,
    }
  }

  /// Price before discount: `price`, else `mrp`, else zero.
  pub fn base_price(&self) -> f64 {
    self.price.or(self.mrp).unwrap_or(0.0)
  }

  pub fn discount(&self) -> f64 {
    self.discount_percent.unwrap_or(0.0)
  }

  /// Price shown to the shopper, rounded to a whole unit.
  pub fn final_price(&self) -> f64 {
    (self.base_price() * (1.0 - self.discount() / 100.0)).round()
  }

  /// Struck-through list price: `mrp`, else `price`, else zero.
  pub fn original_price(&self) -> f64 {
    self.mrp.or(self.price).unwrap_or(0.0)
  }

  pub fn has_discount(&self) -> bool {
    self.discount() > 0.0
  }
}

/// Listing endpoint response. The API has shipped both a bare array and a
/// paginated envelope; anything else is read as the sequence itself.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ListingResponse {
  Bare(Vec<Product>),
  Envelope { products: Vec<Product> },
  Other(Value),
}

impl ListingResponse {
  /// Normalize to the product sequence.
  pub fn into_products(self) -> Vec<Product> {
    match self {
      Self::Bare(products) | Self::Envelope { products } => products,
      Self::Other(value) => serde_json::from_value(value).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "listing response has no product sequence");
        Vec::new()
      }),
    }
  }
}

impl From<Vec<Product>> for ListingResponse {
  fn from(products: Vec<Product>) -> Self {
    Self::Bare(products)
  }
}

/// Search endpoint response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResponse {
  #[serde(default)]
  pub results: Option<Vec<Product>>,
}

impl SearchResponse {
  pub fn into_results(self) -> Vec<Product> {
    self.results.unwrap_or_default()
  }
}

/// Body of an add-to-cart request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCartItem {
  pub product_id: String,
  pub quantity: u32,
  pub variant: Option<String>,
}

/// Label for a count badge: hidden at zero, capped at "9+".
pub fn badge_label(count: usize) -> Option<String> {
  match count {
    0 => None,
    1..=9 => Some(count.to_string()),
    _ => Some("9+".to_string()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_product_accepts_either_identifier() {
    let a: Product = serde_json::from_value(json!({"_id": "abc"})).unwrap();
    let b: Product = serde_json::from_value(json!({"id": 42})).unwrap();
    assert_eq!(a.product_id(), Some("abc"));
    assert_eq!(b.product_id(), Some("42"));
  }

  #[test]
  fn test_product_preserves_unknown_fields() {
    let raw = json!({"_id": "p1", "title": "Silk", "stock": 3, "tags": ["new"]});
    let product: Product = serde_json::from_value(raw.clone()).unwrap();
    assert_eq!(serde_json::to_value(&product).unwrap(), raw);
  }

  #[test]
  fn test_pricing() {
    let product = Product {
      price: Some(1000.0),
      mrp: Some(1200.0),
      discount_percent: Some(15.0),
      ..Default::default()
    };
    assert_eq!(product.final_price(), 850.0);
    assert_eq!(product.original_price(), 1200.0);
    assert!(product.has_discount());

    let mrp_only = Product {
      mrp: Some(499.0),
      ..Default::default()
    };
    assert_eq!(mrp_only.final_price(), 499.0);
    assert!(!mrp_only.has_discount());
  }

  #[test]
  fn test_listing_response_shapes() {
    let bare: ListingResponse = serde_json::from_value(json!([{"_id": "1"}])).unwrap();
    assert_eq!(bare.into_products().len(), 1);

    let envelope: ListingResponse =
      serde_json::from_value(json!({"products": [{"_id": "1"}, {"_id": "2"}], "page": 1}))
        .unwrap();
    assert_eq!(envelope.into_products().len(), 2);

    let other: ListingResponse = serde_json::from_value(json!({"message": "oops"})).unwrap();
    assert!(other.into_products().is_empty());
  }

  #[test]
  fn test_search_response_without_results() {
    let resp: SearchResponse = serde_json::from_value(json!({})).unwrap();
    assert!(resp.into_results().is_empty());
    let resp: SearchResponse = serde_json::from_value(json!({"results": null})).unwrap();
    assert!(resp.into_results().is_empty());
  }

  #[test]
  fn test_badge_label() {
    assert_eq!(badge_label(0), None);
    assert_eq!(badge_label(3).as_deref(), Some("3"));
    assert_eq!(badge_label(9).as_deref(), Some("9"));
    assert_eq!(badge_label(10).as_deref(), Some("9+"));
  }
}
