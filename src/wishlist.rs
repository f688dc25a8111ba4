//! Persisted, ordered set of favorited products.
//!
//! Stored as one JSON array under [`WISHLIST_KEY`]. Items are either a bare
//! product identifier (older clients wrote these) or an enriched record; both
//! shapes are normalized when read, and identity is always the identifier.
//! Elements this client cannot read but that carry an identifier are kept
//! and written back untouched.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::catalog::Product;
use crate::notify::{Notifier, Subscription};
use crate::storage::SharedMedium;

/// Storage key of the wishlist, also the topic its change signal uses.
pub const WISHLIST_KEY: &str = "wishlist";

/// Product details kept alongside a favorite so it renders without a fetch.
///
/// Reading is lenient: other clients write nulls or omit fields, and fields
/// this client does not know are kept in `extra` and written back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WishlistRecord {
  /// Read by [`WishlistItem::from_value`], which accepts `_id` or `id`.
  #[serde(rename = "_id", skip_deserializing)]
  pub id: String,
  #[serde(default)]
  pub title: Option<String>,
  #[serde(default, deserialize_with = "null_as_default")]
  pub images: Vec<Value>,
  #[serde(default, deserialize_with = "null_as_default")]
  pub price: f64,
  #[serde(default)]
  pub mrp: Option<f64>,
  #[serde(rename = "discountPercent", default, deserialize_with = "null_as_default")]
  pub discount_percent: f64,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
  D: Deserializer<'de>,
  T: Default + Deserialize<'de>,
{
  Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Identifier of a stored element, under `_id` or `id`, as a string or number.
fn stored_id(object: &Map<String, Value>) -> Option<String> {
  ["_id", "id"].into_iter().find_map(|field| match object.get(field)? {
    Value::String(id) if !id.is_empty() => Some(id.clone()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  })
}

impl WishlistRecord {
  /// Build the enriched record for `product`, if it has an identifier.
  pub fn from_product(product: &Product) -> Option<Self> {
    Some(Self {
      id: product.product_id()?.to_string(),
      title: product.title.clone().or_else(|| product.name.clone()),
      images: product.images.clone(),
      price: product.base_price(),
      mrp: product.mrp,
      discount_percent: product.discount(),
      extra: Map::new(),
    })
  }
}

/// One favorite.
#[derive(Debug, Clone, PartialEq)]
pub enum WishlistItem {
  Id(String),
  Record(WishlistRecord),
  /// An element with an identifier but a shape this client cannot read.
  /// Written back exactly as it was stored.
  Opaque { id: String, value: Value },
}

impl Serialize for WishlistItem {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match self {
      Self::Id(id) => serializer.serialize_str(id),
      Self::Record(record) => record.serialize(serializer),
      Self::Opaque { value, .. } => value.serialize(serializer),
    }
  }
}

impl WishlistItem {
  pub fn id(&self) -> &str {
    match self {
      Self::Id(id) => id,
      Self::Record(record) => &record.id,
      Self::Opaque { id, .. } => id,
    }
  }

  /// Normalize one stored element. Elements without an identifier are dropped.
  fn from_value(value: Value) -> Option<Self> {
    match value {
      Value::String(id) if !id.is_empty() => Some(Self::Id(id)),
      Value::Number(ref n) => Some(Self::Opaque {
        id: n.to_string(),
        value,
      }),
      Value::Object(ref object) => {
        let id = stored_id(object)?;
        let mut fields = object.clone();
        fields.remove("_id");
        match serde_json::from_value::<WishlistRecord>(Value::Object(fields)) {
          Ok(mut record) => {
            record.id = id;
            Some(Self::Record(record))
          }
          Err(e) => {
            debug!(%id, error = %e, "keeping unreadable wishlist record as stored");
            Some(Self::Opaque { id, value })
          }
        }
      }
      _ => None,
    }
  }
}

/// The wishlist store.
///
/// Holds no copy of the set: every call re-reads the medium, which keeps
/// independently mounted views and other contexts consistent.
#[derive(Clone)]
pub struct Wishlist {
  medium: SharedMedium,
  notifier: Arc<Notifier>,
}

impl Wishlist {
  pub fn new(medium: SharedMedium, notifier: Arc<Notifier>) -> Self {
    Self { medium, notifier }
  }

  /// Current favorites in the order they were added.
  pub fn list(&self) -> Vec<WishlistItem> {
    let raw = match self.medium.get_item(WISHLIST_KEY) {
      Ok(Some(raw)) => raw,
      Ok(None) => return Vec::new(),
      Err(e) => {
        warn!(error = %e, "failed to read wishlist");
        return Vec::new();
      }
    };

    let values: Vec<Value> = match serde_json::from_str(&raw) {
      Ok(values) => values,
      Err(e) => {
        warn!(error = %e, "stored wishlist is unreadable, treating as empty");
        return Vec::new();
      }
    };

    let mut items: Vec<WishlistItem> = Vec::with_capacity(values.len());
    for item in values.into_iter().filter_map(WishlistItem::from_value) {
      if !items.iter().any(|existing| existing.id() == item.id()) {
        items.push(item);
      }
    }
    items
  }

  pub fn ids(&self) -> Vec<String> {
    self
      .list()
      .into_iter()
      .map(|item| item.id().to_string())
      .collect()
  }

  pub fn contains(&self, id: &str) -> bool {
    self.list().iter().any(|item| item.id() == id)
  }

  pub fn count(&self) -> usize {
    self.list().len()
  }

  /// Add or remove `id`. Returns whether `id` is a favorite afterwards.
  ///
  /// A new favorite stores `record` when given, otherwise the bare id.
  pub fn toggle(&self, id: &str, record: Option<WishlistRecord>) -> bool {
    let mut items = self.list();

    let present = if let Some(pos) = items.iter().position(|item| item.id() == id) {
      items.remove(pos);
      false
    } else {
      let item = match record {
        Some(mut record) => {
          record.id = id.to_string();
          WishlistItem::Record(record)
        }
        None => WishlistItem::Id(id.to_string()),
      };
      items.push(item);
      true
    };

    let raw = match serde_json::to_string(&items) {
      Ok(raw) => raw,
      Err(e) => {
        warn!(error = %e, "failed to serialize wishlist");
        return present;
      }
    };

    match self.medium.set_item(WISHLIST_KEY, &raw) {
      Ok(()) => self.notifier.publish(WISHLIST_KEY),
      Err(e) => warn!(id, error = %e, "failed to persist wishlist, change not saved"),
    }

    present
  }

  /// Toggle `product`, storing its enriched record when it becomes a favorite.
  pub fn toggle_product(&self, product: &Product) -> Option<bool> {
    let record = WishlistRecord::from_product(product)?;
    let id = record.id.clone();
    Some(self.toggle(&id, Some(record)))
  }

  /// Call `handler` whenever the wishlist changes, here or in another context.
  pub fn subscribe<F>(&self, handler: F) -> Subscription
  where
    F: Fn() + Send + Sync + 'static,
  {
    self.notifier.subscribe(WISHLIST_KEY, handler)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::storage::{MemoryMedium, StorageMedium};
  use std::sync::atomic::{AtomicUsize, Ordering};

  fn wishlist_on(medium: &MemoryMedium) -> Wishlist {
    let notifier = Arc::new(Notifier::new(medium));
    Wishlist::new(Arc::new(medium.clone()), notifier)
  }

  fn record(id: &str) -> WishlistRecord {
    WishlistRecord {
      id: id.to_string(),
      title: Some(format!("Saree {}", id)),
      images: vec![Value::String("https://img/1.jpg".into())],
      price: 1999.0,
      mrp: Some(2499.0),
      discount_percent: 20.0,
      extra: Map::new(),
    }
  }

  #[test]
  fn test_empty_when_absent() {
    let medium = MemoryMedium::new();
    let wishlist = wishlist_on(&medium);
    assert!(wishlist.list().is_empty());
    assert_eq!(wishlist.count(), 0);
  }

  #[test]
  fn test_toggle_twice_restores_membership() {
    let medium = MemoryMedium::new();
    let wishlist = wishlist_on(&medium);

    assert!(wishlist.toggle("p1", Some(record("p1"))));
    assert!(wishlist.contains("p1"));
    assert!(!wishlist.toggle("p1", None));
    assert!(!wishlist.contains("p1"));
  }

  #[test]
  fn test_readd_without_record_downgrades_shape() {
    let medium = MemoryMedium::new();
    let wishlist = wishlist_on(&medium);

    wishlist.toggle("p1", Some(record("p1")));
    wishlist.toggle("p1", None);
    wishlist.toggle("p1", None);
    assert_eq!(wishlist.list(), vec![WishlistItem::Id("p1".into())]);
  }

  #[test]
  fn test_identity_ignores_shape() {
    let medium = MemoryMedium::new();
    medium
      .set_item(WISHLIST_KEY, r#"["p1", {"_id": "p2", "title": "Kurti"}]"#)
      .unwrap();
    let wishlist = wishlist_on(&medium);

    // Removing works for both shapes
    assert!(!wishlist.toggle("p2", None));
    assert!(!wishlist.toggle("p1", Some(record("p1"))));
    assert!(wishlist.list().is_empty());
  }

  #[test]
  fn test_uniqueness_after_many_toggles() {
    let medium = MemoryMedium::new();
    let wishlist = wishlist_on(&medium);
    let ops = ["a", "b", "a", "c", "a", "b", "b", "c", "a"];
    for (i, id) in ops.iter().enumerate() {
      let rec = (i % 2 == 0).then(|| record(id));
      wishlist.toggle(id, rec);
    }

    let ids = wishlist.ids();
    let mut deduped = ids.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(ids.len(), deduped.len());
  }

  #[test]
  fn test_insertion_order_is_kept() {
    let medium = MemoryMedium::new();
    let wishlist = wishlist_on(&medium);
    wishlist.toggle("c", None);
    wishlist.toggle("a", Some(record("a")));
    wishlist.toggle("b", None);
    assert_eq!(wishlist.ids(), vec!["c", "a", "b"]);
  }

  #[test]
  fn test_corrupt_value_reads_empty() {
    let medium = MemoryMedium::new();
    medium.set_item(WISHLIST_KEY, "{oops").unwrap();
    let wishlist = wishlist_on(&medium);
    assert!(wishlist.list().is_empty());

    // Next toggle replaces the corrupt value
    assert!(wishlist.toggle("p1", None));
    assert_eq!(wishlist.ids(), vec!["p1"]);
  }

  #[test]
  fn test_stored_duplicates_are_collapsed() {
    let medium = MemoryMedium::new();
    medium
      .set_item(WISHLIST_KEY, r#"["p1", {"_id": "p1"}, 7, null, ""]"#)
      .unwrap();
    let wishlist = wishlist_on(&medium);
    assert_eq!(wishlist.ids(), vec!["p1", "7"]);
  }

  #[test]
  fn test_records_from_other_clients_survive_a_toggle() {
    let medium = MemoryMedium::new();
    medium
      .set_item(
        WISHLIST_KEY,
        r#"[
          {"_id": "p1", "title": null, "images": null, "price": null, "discountPercent": null},
          {"_id": 42, "title": "Dupatta", "price": 799},
          {"id": "p3", "price": "on request", "seller": "s1"},
          {"title": "no identifier"}
        ]"#,
      )
      .unwrap();
    let wishlist = wishlist_on(&medium);
    assert_eq!(wishlist.count(), 3);
    assert!(wishlist.contains("42"));

    assert!(wishlist.toggle("p9", None));
    assert_eq!(wishlist.ids(), vec!["p1", "42", "p3", "p9"]);

    let raw = medium.get_item(WISHLIST_KEY).unwrap().unwrap();
    let stored: Vec<Value> = serde_json::from_str(&raw).unwrap();
    assert_eq!(stored.len(), 4);
    assert_eq!(stored[0]["_id"], "p1");
    assert_eq!(stored[1]["_id"], "42");
    assert_eq!(stored[1]["title"], "Dupatta");
    assert_eq!(
      stored[2],
      serde_json::json!({"id": "p3", "price": "on request", "seller": "s1"})
    );
    assert_eq!(stored[3], "p9");
  }

  #[test]
  fn test_unknown_record_fields_are_written_back() {
    let medium = MemoryMedium::new();
    medium
      .set_item(WISHLIST_KEY, r#"[{"_id": "p1", "price": 10, "size": "M"}]"#)
      .unwrap();
    let wishlist = wishlist_on(&medium);
    wishlist.toggle("p2", None);

    let raw = medium.get_item(WISHLIST_KEY).unwrap().unwrap();
    let stored: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(stored[0]["size"], "M");
    assert_eq!(stored[0]["price"], 10.0);
  }

  #[test]
  fn test_records_keep_legacy_field_names() {
    let medium = MemoryMedium::new();
    let wishlist = wishlist_on(&medium);
    wishlist.toggle("p1", Some(record("p1")));

    let raw = medium.get_item(WISHLIST_KEY).unwrap().unwrap();
    let stored: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(stored[0]["_id"], "p1");
    assert_eq!(stored[0]["discountPercent"], 20.0);
  }

  #[test]
  fn test_toggle_publishes_same_document_signal() {
    let medium = MemoryMedium::new();
    let wishlist = wishlist_on(&medium);
    let seen = Arc::new(AtomicUsize::new(usize::MAX));
    let reader = wishlist.clone();
    let sink = Arc::clone(&seen);
    let _sub = wishlist.subscribe(move || sink.store(reader.count(), Ordering::SeqCst));

    wishlist.toggle("p1", None);
    assert_eq!(seen.load(Ordering::SeqCst), 1);
  }

  #[test]
  fn test_toggle_in_one_context_reaches_another() {
    let tab_a = MemoryMedium::new();
    let tab_b = tab_a.new_context();
    let wishlist_a = wishlist_on(&tab_a);
    let notifier_b = Arc::new(Notifier::new(&tab_b));
    let wishlist_b = Wishlist::new(Arc::new(tab_b.clone()), Arc::clone(&notifier_b));

    let seen = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&seen);
    let _sub = wishlist_b.subscribe(move || {
      sink.fetch_add(1, Ordering::SeqCst);
    });

    wishlist_a.toggle("p1", Some(record("p1")));
    assert_eq!(seen.load(Ordering::SeqCst), 0);

    notifier_b.pump();
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert_eq!(wishlist_b.ids(), vec!["p1"]);
  }

  #[test]
  fn test_write_failure_returns_membership_without_signal() {
    let medium = MemoryMedium::with_quota(4);
    let wishlist = wishlist_on(&medium);
    let seen = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&seen);
    let _sub = wishlist.subscribe(move || {
      sink.fetch_add(1, Ordering::SeqCst);
    });

    assert!(wishlist.toggle("p1", Some(record("p1"))));
    assert_eq!(seen.load(Ordering::SeqCst), 0);
    assert!(wishlist.list().is_empty());
  }

  #[test]
  fn test_record_from_product() {
    let product = Product {
      object_id: Some("p9".into()),
      name: Some("Linen Shirt".into()),
      mrp: Some(1500.0),
      ..Default::default()
    };
    let record = WishlistRecord::from_product(&product).unwrap();
    assert_eq!(record.id, "p9");
    assert_eq!(record.title.as_deref(), Some("Linen Shirt"));
    assert_eq!(record.price, 1500.0);
    assert_eq!(record.discount_percent, 0.0);

    assert!(WishlistRecord::from_product(&Product::default()).is_none());
  }
}
