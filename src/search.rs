//! Debounced incremental search.
//!
//! Turns a fast-changing text input into a throttled sequence of remote
//! queries. Every input change gets a new sequence number; only the response
//! carrying the latest number is ever shown ("last request wins").
//!
//! ```ignore
//! let client = catalog.clone();
//! let mut search = SearchDebouncer::new(
//!     move |q| {
//!         let client = client.clone();
//!         async move { client.search(&q).await }
//!     },
//!     SearchSettings::default(),
//! );
//!
//! // On every keystroke
//! search.input("sil");
//!
//! // In event loop tick
//! if search.poll() {
//!     // State changed, trigger re-render
//! }
//! ```
//!
//! Unstarted timers are cancelled outright. Requests already on the wire are
//! never aborted; their responses are dropped when superseded.

use color_eyre::Result;
use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Where the search box is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPhase {
  /// Nothing to show
  Idle,
  /// Waiting for the debounce delay
  Pending,
  /// Request issued, waiting for the response
  Loading,
  /// Latest request answered
  Resolved,
  /// Latest request failed; shown as "no results"
  Failed,
}

/// Tunables for the debouncer.
#[derive(Debug, Clone)]
pub struct SearchSettings {
  /// Shortest trimmed query that triggers a search (in characters)
  pub min_chars: usize,
  /// Quiet time after the last keystroke before searching
  pub delay: Duration,
  /// How many results the panel shows
  pub max_results: usize,
}

impl Default for SearchSettings {
  fn default() -> Self {
    Self {
      min_chars: 2,
      delay: Duration::from_millis(250),
      max_results: 8,
    }
  }
}

type SearchFn<T> = Arc<dyn Fn(String) -> BoxFuture<'static, Result<Vec<T>>> + Send + Sync>;

enum Message<T> {
  /// The debounce timer for `seq` elapsed
  Fire { seq: u64 },
  /// The request for `seq` finished
  Response { seq: u64, result: Result<Vec<T>> },
}

/// Search-as-you-type state machine.
pub struct SearchDebouncer<T> {
  phase: SearchPhase,
  query: String,
  results: Vec<T>,
  seq: u64,
  focused: bool,
  timer: Option<JoinHandle<()>>,
  tx: mpsc::UnboundedSender<Message<T>>,
  rx: mpsc::UnboundedReceiver<Message<T>>,
  searcher: SearchFn<T>,
  settings: SearchSettings,
}

impl<T: Send + 'static> SearchDebouncer<T> {
  /// Create a debouncer around the remote search call.
  pub fn new<F, Fut>(searcher: F, settings: SearchSettings) -> Self
  where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<T>>> + Send + 'static,
  {
    let (tx, rx) = mpsc::unbounded_channel();
    Self {
      phase: SearchPhase::Idle,
      query: String::new(),
      results: Vec::new(),
      seq: 0,
      focused: false,
      timer: None,
      tx,
      rx,
      searcher: Arc::new(move |q| searcher(q).boxed()),
      settings,
    }
  }

  pub fn phase(&self) -> SearchPhase {
    self.phase
  }

  /// Raw input text, untrimmed.
  pub fn query(&self) -> &str {
    &self.query
  }

  /// Latest accepted results.
  pub fn results(&self) -> &[T] {
    &self.results
  }

  /// Sequence number of the latest scheduled query.
  pub fn latest_seq(&self) -> u64 {
    self.seq
  }

  pub fn is_focused(&self) -> bool {
    self.focused
  }

  /// Whether the result panel is shown.
  pub fn is_open(&self) -> bool {
    self.focused
      && match self.phase {
        SearchPhase::Pending | SearchPhase::Loading => true,
        SearchPhase::Resolved => !self.results.is_empty(),
        SearchPhase::Idle | SearchPhase::Failed => false,
      }
  }

  /// Results the panel renders.
  pub fn visible_results(&self) -> &[T] {
    if !self.is_open() {
      return &[];
    }
    &self.results[..self.results.len().min(self.settings.max_results)]
  }

  /// Handle a change of the input text.
  pub fn input(&mut self, text: &str) {
    self.query = text.to_string();
    self.focused = true;
    self.schedule();
  }

  /// The input regained focus; re-run the current query if it qualifies.
  pub fn focus(&mut self) {
    self.focused = true;
    if self.phase == SearchPhase::Idle && self.qualifies() {
      self.schedule();
    }
  }

  /// Outside interaction or cancel key: back to idle, whatever is in flight.
  pub fn dismiss(&mut self) {
    self.cancel_timer();
    // Anything still in flight is now superseded.
    self.seq += 1;
    self.phase = SearchPhase::Idle;
    self.focused = false;
  }

  /// Enter pressed: close the panel and return the full-results page path.
  pub fn submit(&mut self) -> Option<String> {
    let q = self.query.trim();
    if q.is_empty() {
      return None;
    }
    let path = search_page_path(q);
    self.dismiss();
    Some(path)
  }

  /// Drain timer firings and responses.
  ///
  /// Returns `true` if the state changed. Call this in your event loop tick.
  pub fn poll(&mut self) -> bool {
    let mut changed = false;

    while let Ok(message) = self.rx.try_recv() {
      match message {
        Message::Fire { seq } => {
          if seq != self.seq || self.phase != SearchPhase::Pending {
            continue;
          }
          self.timer = None;
          self.phase = SearchPhase::Loading;
          self.issue(seq);
          changed = true;
        }
        Message::Response { seq, result } => {
          if seq != self.seq {
            debug!(seq, latest = self.seq, "discarding superseded search response");
            continue;
          }
          match result {
            Ok(items) => {
              self.results = items;
              self.phase = SearchPhase::Resolved;
            }
            Err(e) => {
              warn!(query = %self.query.trim(), error = %e, "search failed");
              self.results.clear();
              self.phase = SearchPhase::Failed;
            }
          }
          changed = true;
        }
      }
    }

    changed
  }

  fn qualifies(&self) -> bool {
    self.query.trim().chars().count() >= self.settings.min_chars
  }

  fn schedule(&mut self) {
    self.cancel_timer();
    self.seq += 1;

    if !self.qualifies() {
      self.phase = SearchPhase::Idle;
      self.results.clear();
      return;
    }

    self.phase = SearchPhase::Pending;
    let tx = self.tx.clone();
    let seq = self.seq;
    let delay = self.settings.delay;
    self.timer = Some(tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      let _ = tx.send(Message::Fire { seq });
    }));
  }

  fn issue(&self, seq: u64) {
    let query = self.query.trim().to_string();
    debug!(seq, %query, "issuing search");
    let future = (self.searcher)(query);
    let tx = self.tx.clone();
    tokio::spawn(async move {
      let result = future.await;
      // Ignore send errors - the debouncer may be gone
      let _ = tx.send(Message::Response { seq, result });
    });
  }

  fn cancel_timer(&mut self) {
    if let Some(timer) = self.timer.take() {
      timer.abort();
    }
  }
}

impl<T> Drop for SearchDebouncer<T> {
  fn drop(&mut self) {
    if let Some(timer) = self.timer.take() {
      timer.abort();
    }
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for SearchDebouncer<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SearchDebouncer")
      .field("phase", &self.phase)
      .field("query", &self.query)
      .field("seq", &self.seq)
      .field("results", &self.results.len())
      .finish_non_exhaustive()
  }
}

/// Path of the full search results page for `query`.
pub fn search_page_path(query: &str) -> String {
  let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
  format!("/search?q={}", encoded)
}
