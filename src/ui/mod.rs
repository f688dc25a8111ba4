pub mod components;
pub mod renderfns;
mod views;

use crate::app::App;
use components::panel_area;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;
use views::ListingProps;

/// Screen regions, computed the same way for drawing and for mouse hit tests
pub struct Regions {
  pub header: Rect,
  pub search: Rect,
  pub notice: Rect,
  pub listing: Rect,
  pub footer: Rect,
}

pub fn regions(screen: Rect, notice_visible: bool) -> Regions {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1),                         // Header
      Constraint::Length(3),                         // Search box
      Constraint::Length(u16::from(notice_visible)), // Cache notice
      Constraint::Min(1),                            // Listing
      Constraint::Length(1),                         // Status bar
    ])
    .split(screen);

  Regions {
    header: chunks[0],
    search: chunks[1],
    notice: chunks[2],
    listing: chunks[3],
    footer: chunks[4],
  }
}

/// Area covered by the search box and its open result panel
pub fn search_region(screen: Rect, app: &App) -> Rect {
  let search = regions(screen, app.notice().is_visible()).search;
  match panel_area(search, screen, app.search()) {
    Some(panel) => search.union(panel),
    None => search,
  }
}

/// Main draw function
pub fn draw(frame: &mut Frame, app: &App) {
  let regions = regions(frame.area(), app.notice().is_visible());

  renderfns::draw_header(
    frame,
    regions.header,
    app.api_url(),
    app.wishlisted().len(),
    app.categories(),
    app.category_index(),
  );

  app.search_box().render(frame, regions.search, app.search());

  if app.notice().is_visible() {
    draw_notice(frame, regions.notice, app);
  }

  views::draw_listing(
    frame,
    regions.listing,
    &ListingProps {
      scope: app.current_scope(),
      listing: app.listing(),
      layout: app.layout(),
      selected: app.selected(),
      loading: app.is_loading(),
      wishlisted: app.wishlisted(),
    },
  );

  renderfns::draw_footer(
    frame,
    regions.footer,
    app.status(),
    app.search_box().is_active(),
  );

  // Panel overlays the listing, so it goes last
  app
    .search_box()
    .render_panel(frame, regions.search, app.search());
}

fn draw_notice(frame: &mut Frame, area: Rect, app: &App) {
  let when = app
    .listing()
    .and_then(|result| result.stored_at)
    .map(|at| {
      at.with_timezone(&chrono::Local)
        .format(" (saved %b %e, %H:%M)")
        .to_string()
    })
    .unwrap_or_default();

  let text = format!(" Showing saved products{}", when);
  let notice = Paragraph::new(text).style(Style::default().fg(Color::Black).bg(Color::Yellow));
  frame.render_widget(notice, area);
}
