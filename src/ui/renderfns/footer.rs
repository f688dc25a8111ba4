use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

const NORMAL_HINTS: &[(&str, &str)] = &[
  ("/", "search"),
  ("j/k", "move"),
  ("f", "favorite"),
  ("a", "add to cart"),
  ("r", "refresh"),
  ("g", "layout"),
  ("Tab", "category"),
  ("q", "quit"),
];

const SEARCH_HINTS: &[(&str, &str)] = &[("Enter", "all results"), ("Esc", "close")];

/// Draw the status bar: the latest status message, or key hints
pub fn draw_footer(frame: &mut Frame, area: Rect, status: Option<&str>, searching: bool) {
  let line = match status {
    Some(message) => Line::from(Span::styled(
      format!(" {}", message),
      Style::default().fg(Color::White),
    )),
    None => {
      let hints = if searching { SEARCH_HINTS } else { NORMAL_HINTS };
      let mut spans = vec![Span::raw(" ")];
      for (key, label) in hints {
        spans.push(Span::styled(format!("<{}>", key), Style::default().fg(Color::Cyan)));
        spans.push(Span::styled(
          format!(" {}   ", label),
          Style::default().fg(Color::DarkGray),
        ));
      }
      Line::from(spans)
    }
  };

  let paragraph = Paragraph::new(line).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}
