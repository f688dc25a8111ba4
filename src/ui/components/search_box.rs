use super::input::{InputResult, TextInput};
use super::KeyResult;
use crate::catalog::Product;
use crate::search::{SearchDebouncer, SearchPhase};
use crate::ui::renderfns::{format_price, truncate};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, Paragraph};

/// Events emitted by the search box that the app forwards to the debouncer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
  /// Box gained focus
  Focused,
  /// Text changed (emitted on every edit)
  Changed(String),
  /// Enter pressed
  Submitted,
  /// Escape pressed
  Cancelled,
}

/// Search box with activation/deactivation.
///
/// The text survives deactivation so focusing again resumes the last query.
#[derive(Debug, Clone, Default)]
pub struct SearchBox {
  input: TextInput,
  active: bool,
}

impl SearchBox {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  pub fn query(&self) -> &str {
    self.input.value()
  }

  pub fn activate(&mut self) {
    self.active = true;
  }

  pub fn deactivate(&mut self) {
    self.active = false;
  }

  /// Handle a key event.
  /// Call this regardless of active state - it handles activation too
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<SearchEvent> {
    if !self.active {
      if key.code == KeyCode::Char('/') {
        self.activate();
        return KeyResult::Event(SearchEvent::Focused);
      }
      return KeyResult::NotHandled;
    }

    match self.input.handle_key(key) {
      InputResult::Changed => KeyResult::Event(SearchEvent::Changed(self.input.value().to_string())),
      InputResult::Submitted(_) => {
        self.active = false;
        KeyResult::Event(SearchEvent::Submitted)
      }
      InputResult::Cancelled => {
        self.active = false;
        KeyResult::Event(SearchEvent::Cancelled)
      }
      InputResult::Consumed => KeyResult::Handled,
      InputResult::NotHandled => KeyResult::NotHandled,
    }
  }

  /// Render the input line into `area`
  pub fn render(&self, frame: &mut Frame, area: Rect, search: &SearchDebouncer<Product>) {
    let border = if self.active {
      Color::Yellow
    } else {
      Color::DarkGray
    };
    let title = match search.phase() {
      SearchPhase::Pending | SearchPhase::Loading if search.is_focused() => " Search (searching...) ",
      _ => " Search ",
    };
    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(border))
      .title(title);

    let mut spans = vec![
      Span::styled("/", Style::default().fg(Color::Yellow)),
      Span::raw(self.input.value().to_string()),
    ];
    if self.active {
      spans.push(Span::styled("_", Style::default().fg(Color::Yellow)));
    } else if self.input.is_empty() {
      spans.push(Span::styled(
        "press / to search products",
        Style::default().fg(Color::DarkGray),
      ));
    }

    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
  }

  /// Render the result panel below `anchor` when the debouncer says it is open
  pub fn render_panel(&self, frame: &mut Frame, anchor: Rect, search: &SearchDebouncer<Product>) {
    if let Some(area) = panel_area(anchor, frame.area(), search) {
      frame.render_widget(Clear, area);

      let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow));

      if search.phase() != SearchPhase::Resolved {
        let waiting = Paragraph::new("Searching...")
          .block(block)
          .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(waiting, area);
        return;
      }

      let width = area.width.saturating_sub(16) as usize;
      let items: Vec<ListItem> = search
        .visible_results()
        .iter()
        .map(|product| {
          ListItem::new(Line::from(vec![
            Span::raw(format!("{:<width$}", truncate(product.display_title(), width))),
            Span::styled(
              format!(" {:>12}", format_price(product.base_price())),
              Style::default().fg(Color::Green),
            ),
          ]))
        })
        .collect();

      frame.render_widget(List::new(items).block(block), area);
    }
  }
}

/// Where the result panel goes, if it is open
pub fn panel_area(anchor: Rect, screen: Rect, search: &SearchDebouncer<Product>) -> Option<Rect> {
  if !search.is_open() {
    return None;
  }
  let rows = match search.phase() {
    SearchPhase::Resolved => search.visible_results().len() as u16,
    _ => 1,
  };
  let y = anchor.y + anchor.height;
  let height = (rows + 2).min(screen.height.saturating_sub(y));
  if height == 0 {
    return None;
  }
  Some(Rect::new(anchor.x, y, anchor.width, height))
}
