use crossterm::event::{self, Event as CrosstermEvent, KeyEvent, KeyEventKind, MouseEvent};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::cache::{LoadResult, Scope};

/// Application events
#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Terminal mouse input
  Mouse(MouseEvent),
  /// Periodic tick for UI refresh and polling
  Tick,
  /// A listing load finished
  ListingLoaded { scope: Scope, result: LoadResult },
  /// An add-to-cart call finished
  CartUpdated { title: String, added: bool },
  /// The wishlist changed here or in another context
  WishlistChanged,
}

/// Event handler that produces events from terminal input and a tick timer
pub struct EventHandler {
  tx: mpsc::UnboundedSender<Event>,
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Create a event handler that produces a tick every `tick_rate`
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    // Terminal reads block, so they get their own thread
    let input_tx = tx.clone();
    tokio::task::spawn_blocking(move || loop {
      let evt = if event::poll(tick_rate).unwrap_or(false) {
        match event::read() {
          Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => Some(Event::Key(key)),
          Ok(CrosstermEvent::Mouse(mouse)) => Some(Event::Mouse(mouse)),
          _ => None,
        }
      } else {
        Some(Event::Tick)
      };

      if let Some(evt) = evt {
        if input_tx.send(evt).is_err() {
          break;
        }
      }
    });

    Self { tx, rx }
  }

  /// Sender for async tasks to report back on
  pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
    self.tx.clone()
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}
