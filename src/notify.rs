//! Change signals across mounted components and across contexts.
//!
//! A context never observes its own writes through the storage medium's
//! native signal, so delivery has two paths:
//! - same-document: `publish` calls local handlers directly
//! - cross-context: foreign writes seen by the medium's watch are dispatched
//!   to handlers subscribed to the written key
//!
//! Topics are storage keys, and handlers take no payload: a signal only means
//! "re-read the store".

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::storage::{StorageMedium, StorageWatch};

/// Callback invoked on a change signal.
pub type Handler = Arc<dyn Fn() + Send + Sync>;

/// Path a signal took; only used for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
  SameDocument,
  CrossContext,
}

#[derive(Default)]
struct Registry {
  next_id: u64,
  handlers: HashMap<String, Vec<(u64, Handler)>>,
}

/// Publish/subscribe over both delivery paths.
pub struct Notifier {
  registry: Arc<Mutex<Registry>>,
  watch: Mutex<Option<StorageWatch>>,
}

impl Notifier {
  /// Create a notifier listening to foreign writes on `medium`.
  pub fn new(medium: &dyn StorageMedium) -> Self {
    Self {
      registry: Arc::new(Mutex::new(Registry::default())),
      watch: Mutex::new(Some(medium.watch())),
    }
  }

  /// Register `handler` for `topic`. Dropping the returned guard unsubscribes.
  pub fn subscribe<F>(&self, topic: &str, handler: F) -> Subscription
  where
    F: Fn() + Send + Sync + 'static,
  {
    let id = match self.registry.lock() {
      Ok(mut registry) => {
        registry.next_id += 1;
        let id = registry.next_id;
        registry
          .handlers
          .entry(topic.to_string())
          .or_default()
          .push((id, Arc::new(handler)));
        id
      }
      Err(e) => {
        warn!(topic, error = %e, "notifier registry poisoned, subscription dropped");
        0
      }
    };

    Subscription {
      registry: Arc::downgrade(&self.registry),
      topic: topic.to_string(),
      id,
    }
  }

  /// Signal subscribers in this context that `topic` changed.
  ///
  /// Other contexts learn about the change from the storage write itself.
  pub fn publish(&self, topic: &str) {
    self.dispatch(topic, Delivery::SameDocument);
  }

  /// Deliver pending cross-context signals. Returns how many were delivered.
  ///
  /// Does nothing once [`Notifier::spawn_listener`] took over the watch.
  pub fn pump(&self) -> usize {
    let events: Vec<String> = {
      let Ok(mut guard) = self.watch.lock() else {
        return 0;
      };
      let Some(watch) = guard.as_mut() else {
        return 0;
      };
      std::iter::from_fn(|| watch.try_next())
        .map(|event| event.key)
        .collect()
    };

    for key in &events {
      self.dispatch(key, Delivery::CrossContext);
    }
    events.len()
  }

  /// Deliver cross-context signals from a background task as they arrive.
  pub fn spawn_listener(notifier: &Arc<Self>) -> Option<JoinHandle<()>> {
    let mut watch = notifier.watch.lock().ok()?.take()?;
    let weak = Arc::downgrade(notifier);

    Some(tokio::spawn(async move {
      while let Some(event) = watch.next().await {
        let Some(notifier) = weak.upgrade() else {
          break;
        };
        notifier.dispatch(&event.key, Delivery::CrossContext);
      }
    }))
  }

  fn dispatch(&self, topic: &str, delivery: Delivery) {
    // Handlers run outside the lock so they may subscribe or publish.
    let handlers: Vec<Handler> = match self.registry.lock() {
      Ok(registry) => registry
        .handlers
        .get(topic)
        .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
        .unwrap_or_default(),
      Err(e) => {
        warn!(topic, error = %e, "notifier registry poisoned, signal dropped");
        return;
      }
    };

    debug!(topic, ?delivery, handlers = handlers.len(), "change signal");
    for handler in handlers {
      handler();
    }
  }
}

/// Live subscription; unsubscribes on drop.
pub struct Subscription {
  registry: Weak<Mutex<Registry>>,
  topic: String,
  id: u64,
}

impl Subscription {
  pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
  fn drop(&mut self) {
    let Some(registry) = self.registry.upgrade() else {
      return;
    };
    let Ok(mut registry) = registry.lock() else {
      return;
    };
    if let Some(list) = registry.handlers.get_mut(&self.topic) {
      list.retain(|(id, _)| *id != self.id);
      if list.is_empty() {
        registry.handlers.remove(&self.topic);
      }
    }
  }
}
