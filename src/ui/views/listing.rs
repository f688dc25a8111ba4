use std::collections::HashSet;

use crate::cache::{CacheSource, ListingLayout, LoadResult, Scope};
use crate::catalog::Product;
use crate::ui::renderfns::{format_price, truncate};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph};

/// What the listing pane needs from the app
pub struct ListingProps<'a> {
  pub scope: &'a Scope,
  pub listing: Option<&'a LoadResult>,
  pub layout: ListingLayout,
  pub selected: usize,
  pub loading: bool,
  pub wishlisted: &'a HashSet<String>,
}

/// Draw the product listing for the current category
pub fn draw_listing(frame: &mut Frame, area: Rect, props: &ListingProps<'_>) {
  let products = props
    .listing
    .map(|result| result.present(props.layout))
    .unwrap_or(&[]);

  let layout_label = match props.layout {
    ListingLayout::Scroll => "all".to_string(),
    ListingLayout::Grid { max_products } => format!("top {}", max_products),
  };
  let title = if props.loading {
    format!(" {} (loading...) ", props.scope)
  } else {
    format!(" {} ({}, {}) ", props.scope, products.len(), layout_label)
  };

  let block = Block::default()
    .title(title)
    .title_alignment(Alignment::Center)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  if products.is_empty() {
    let content = match props.listing.map(|r| r.source) {
      _ if props.loading => "Loading products...",
      Some(CacheSource::Unavailable) => "Could not load products. Press 'r' to retry.",
      _ => "No products found.",
    };
    let paragraph = Paragraph::new(content)
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let title_width = area.width.saturating_sub(34).max(10) as usize;
  let items: Vec<ListItem> = products
    .iter()
    .map(|product| product_row(product, props.wishlisted, title_width))
    .collect();

  let list = List::new(items)
    .block(block)
    .highlight_style(
      Style::default()
        .bg(Color::DarkGray)
        .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("> ");

  let mut state = ListState::default().with_selected(Some(props.selected.min(products.len() - 1)));
  frame.render_stateful_widget(list, area, &mut state);
}

fn product_row<'a>(product: &'a Product, wishlisted: &HashSet<String>, width: usize) -> ListItem<'a> {
  let favorite = product
    .product_id()
    .is_some_and(|id| wishlisted.contains(id));

  let mut spans = vec![
    Span::styled(
      if favorite { "♥ " } else { "  " },
      Style::default().fg(Color::Red),
    ),
    Span::raw(format!("{:<width$}", truncate(product.display_title(), width))),
    Span::styled(
      format!(" {:>10}", format_price(product.final_price())),
      Style::default().fg(Color::Green),
    ),
  ];

  if product.has_discount() {
    spans.push(Span::styled(
      format!(" {:>10}", format_price(product.original_price())),
      Style::default()
        .fg(Color::DarkGray)
        .add_modifier(Modifier::CROSSED_OUT),
    ));
    spans.push(Span::styled(
      format!(" -{}%", product.discount()),
      Style::default().fg(Color::Yellow),
    ));
  }

  ListItem::new(Line::from(spans))
}
