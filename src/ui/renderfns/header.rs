use crate::cache::Scope;
use crate::catalog::badge_label;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the header bar with logo, API host, wishlist badge and category tabs
pub fn draw_header(
  frame: &mut Frame,
  area: Rect,
  api_url: &str,
  wishlist_count: usize,
  categories: &[Scope],
  current: usize,
) {
  let domain = extract_domain(api_url);

  let mut spans = vec![
    Span::styled(" shopcache ", Style::default().fg(Color::Cyan).bold()),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(format!(" {} ", domain), Style::default().fg(Color::White)),
    Span::styled("│", Style::default().fg(Color::DarkGray)),
    Span::styled(" ♥", Style::default().fg(Color::Red)),
  ];
  if let Some(badge) = badge_label(wishlist_count) {
    spans.push(Span::styled(
      format!(" {} ", badge),
      Style::default().fg(Color::Black).bg(Color::Red).bold(),
    ));
  }
  spans.push(Span::raw(" "));
  spans.push(Span::styled("│", Style::default().fg(Color::DarkGray)));

  for (i, scope) in categories.iter().enumerate() {
    let style = if i == current {
      Style::default().fg(Color::Yellow).bold()
    } else {
      Style::default().fg(Color::DarkGray)
    };
    spans.push(Span::styled(format!(" {} ", scope), style));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}

/// Extract host from the API URL
fn extract_domain(url: &str) -> &str {
  url
    .strip_prefix("https://")
    .or_else(|| url.strip_prefix("http://"))
    .unwrap_or(url)
    .split('/')
    .next()
    .unwrap_or(url)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_extract_domain() {
    assert_eq!(extract_domain("https://shop.example.com"), "shop.example.com");
    assert_eq!(extract_domain("https://shop.example.com/api/"), "shop.example.com");
    assert_eq!(extract_domain("http://localhost:5000/api/"), "localhost:5000");
  }
}
