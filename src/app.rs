use crate::cache::{CacheNotice, CacheSource, CacheStore, ListingLayout, LoadResult, Scope};
use crate::catalog::{CachedCatalog, CatalogClient, Product};
use crate::config::Config;
use crate::event::{Event, EventHandler};
use crate::notify::{Notifier, Subscription};
use crate::search::{SearchDebouncer, SearchSettings};
use crate::storage::{SharedMedium, SqliteMedium};
use crate::ui;
use crate::ui::components::{KeyResult, SearchBox, SearchEvent};
use crate::wishlist::Wishlist;
use color_eyre::Result;
use crossterm::event::{
  DisableMouseCapture, EnableMouseCapture, KeyCode, KeyEvent, KeyModifiers, MouseEvent,
  MouseEventKind,
};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::collections::HashSet;
use std::io::stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const TICK_RATE: Duration = Duration::from_millis(250);

/// How long a status message stays in the footer
const STATUS_TTL: Duration = Duration::from_secs(4);

/// Main application state
pub struct App {
  config: Config,
  catalog: CachedCatalog,
  wishlist: Wishlist,
  notifier: Arc<Notifier>,

  /// Set when storage is the SQLite file, whose foreign writes must be polled
  sqlite: Option<Arc<SqliteMedium>>,

  /// Keeps the header badge live
  wishlist_sub: Option<Subscription>,

  /// Wishlist ids as of the last change signal
  wishlisted: HashSet<String>,

  categories: Vec<Scope>,
  category_index: usize,
  listing: Option<LoadResult>,
  loading: bool,
  selected: usize,
  layout: ListingLayout,
  notice: CacheNotice,

  search: SearchDebouncer<Product>,
  search_box: SearchBox,

  status: Option<(String, Instant)>,

  /// Last drawn screen area, for mouse hit tests
  screen: Rect,

  /// Event sender for async tasks
  event_tx: mpsc::UnboundedSender<Event>,

  should_quit: bool,
}

impl App {
  pub fn new(
    config: Config,
    medium: SharedMedium,
    sqlite: Option<Arc<SqliteMedium>>,
    start_category: Option<String>,
  ) -> Result<Self> {
    let client = CatalogClient::new(&config)?;
    let store = CacheStore::new(medium.clone()).with_max_age(config.cache.max_age());
    let catalog = CachedCatalog::new(client, store);

    let notifier = Arc::new(Notifier::new(medium.as_ref()));
    let wishlist = Wishlist::new(medium, notifier.clone());
    let wishlisted = wishlist.ids().into_iter().collect();

    let searcher = catalog.clone();
    let search = SearchDebouncer::new(
      move |q| {
        let catalog = searcher.clone();
        async move { catalog.search(&q).await }
      },
      SearchSettings::from(&config.search),
    );

    let (categories, category_index) = category_tabs(&config.categories, start_category);

    let layout = match config.cache.grid_size {
      0 => ListingLayout::Scroll,
      n => ListingLayout::Grid { max_products: n },
    };
    let notice = CacheNotice::new(config.cache.notice_duration());

    let (tx, _rx) = mpsc::unbounded_channel();

    Ok(Self {
      config,
      catalog,
      wishlist,
      notifier,
      sqlite,
      wishlist_sub: None,
      wishlisted,
      categories,
      category_index,
      listing: None,
      loading: false,
      selected: 0,
      layout,
      notice,
      search,
      search_box: SearchBox::new(),
      status: None,
      screen: Rect::default(),
      event_tx: tx,
      should_quit: false,
    })
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    stdout().execute(EnableMouseCapture)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut events = EventHandler::new(TICK_RATE);
    self.attach(events.sender());

    // Initial data load
    self.load_listing(false);

    let result = self.event_loop(&mut terminal, &mut events).await;

    // Cleanup terminal
    stdout().execute(DisableMouseCapture)?;
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop(
    &mut self,
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    events: &mut EventHandler,
  ) -> Result<()> {
    while !self.should_quit {
      let completed = terminal.draw(|frame| ui::draw(frame, self))?;
      self.screen = completed.area;

      if let Some(event) = events.next().await {
        self.handle_event(event);
      }
    }
    Ok(())
  }

  /// Route async results and wishlist signals to `tx`.
  fn attach(&mut self, tx: mpsc::UnboundedSender<Event>) {
    let signal_tx = tx.clone();
    self.wishlist_sub = Some(self.wishlist.subscribe(move || {
      let _ = signal_tx.send(Event::WishlistChanged);
    }));
    self.event_tx = tx;
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Mouse(mouse) => self.handle_mouse(mouse),
      Event::Tick => self.tick(),
      Event::ListingLoaded { scope, result } => self.on_listing(scope, result),
      Event::CartUpdated { title, added } => {
        if added {
          self.set_status(format!("Added {} to cart", title));
        } else {
          self.set_status(format!("Could not add {} to cart", title));
        }
      }
      Event::WishlistChanged => {
        self.wishlisted = self.wishlist.ids().into_iter().collect();
      }
    }
  }

  fn tick(&mut self) {
    self.search.poll();

    if let Some(sqlite) = &self.sqlite {
      if let Err(e) = sqlite.poll_changes() {
        warn!(error = %e, "failed to poll storage changes");
      }
    }
    self.notifier.pump();
    self.notice.tick();

    if self
      .status
      .as_ref()
      .is_some_and(|(_, at)| at.elapsed() >= STATUS_TTL)
    {
      self.status = None;
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    // Search box gets first look: it owns all keys while active, and '/' otherwise
    match self.search_box.handle_key(key) {
      KeyResult::Event(event) => {
        self.on_search_event(event);
        return;
      }
      KeyResult::Handled => return,
      KeyResult::NotHandled if self.search_box.is_active() => return,
      KeyResult::NotHandled => {}
    }

    match key.code {
      KeyCode::Char('q') => self.should_quit = true,
      KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
      KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
      KeyCode::Char('f') => self.toggle_favorite(),
      KeyCode::Char('a') => self.add_to_cart(),
      KeyCode::Char('r') => self.load_listing(true),
      KeyCode::Char('g') => self.toggle_layout(),
      KeyCode::Tab => self.switch_category(1),
      KeyCode::BackTab => self.switch_category(-1),
      _ => {}
    }
  }

  fn on_search_event(&mut self, event: SearchEvent) {
    match event {
      SearchEvent::Focused => self.search.focus(),
      SearchEvent::Changed(text) => self.search.input(&text),
      SearchEvent::Submitted => {
        if let Some(path) = self.search.submit() {
          info!(%path, "search submitted");
          self.set_status(format!("All results: {}", path));
        }
      }
      SearchEvent::Cancelled => self.search.dismiss(),
    }
  }

  fn handle_mouse(&mut self, mouse: MouseEvent) {
    if !matches!(mouse.kind, MouseEventKind::Down(_)) {
      return;
    }
    let inside = ui::search_region(self.screen, self).contains(Position::new(mouse.column, mouse.row));

    if inside && !self.search_box.is_active() {
      self.search_box.activate();
      self.search.focus();
    } else if !inside && self.search_box.is_active() {
      // Interaction outside the search area closes the panel
      self.search_box.deactivate();
      self.search.dismiss();
    }
  }

  fn load_listing(&mut self, force: bool) {
    let scope = self.current_scope().clone();
    let catalog = self.catalog.clone();
    let tx = self.event_tx.clone();
    self.loading = true;

    debug!(%scope, force, "loading listing");
    tokio::spawn(async move {
      let result = if force {
        catalog.refresh(&scope).await
      } else {
        catalog.load(&scope).await
      };
      let _ = tx.send(Event::ListingLoaded { scope, result });
    });
  }

  fn on_listing(&mut self, scope: Scope, result: LoadResult) {
    // A slow response for a category we already left
    if &scope != self.current_scope() {
      debug!(%scope, "dropping listing for inactive category");
      return;
    }

    info!(%scope, source = ?result.source, items = result.items.len(), "listing loaded");
    if result.source == CacheSource::Unavailable {
      self.set_status("Could not load products".to_string());
    }

    self.notice.observe(&result);
    self.loading = false;
    self.listing = Some(result);
    self.clamp_selection();
  }

  fn switch_category(&mut self, delta: i32) {
    let len = self.categories.len();
    if len < 2 {
      return;
    }
    self.category_index = (self.category_index as i32 + delta).rem_euclid(len as i32) as usize;
    self.listing = None;
    self.selected = 0;
    self.load_listing(false);
  }

  fn toggle_layout(&mut self) {
    self.layout = match self.layout {
      ListingLayout::Scroll => ListingLayout::Grid {
        max_products: self.config.cache.grid_size.max(1),
      },
      ListingLayout::Grid { .. } => ListingLayout::Scroll,
    };
    self.clamp_selection();
  }

  fn toggle_favorite(&mut self) {
    let Some(product) = self.selected_product().cloned() else {
      return;
    };
    match self.wishlist.toggle_product(&product) {
      Some(true) => self.set_status(format!("Saved {} to wishlist", product.display_title())),
      Some(false) => self.set_status(format!("Removed {} from wishlist", product.display_title())),
      None => self.set_status("This product cannot be saved".to_string()),
    }
  }

  fn add_to_cart(&mut self) {
    let Some(product) = self.selected_product() else {
      return;
    };
    let Some(id) = product.product_id().map(String::from) else {
      self.set_status("This product cannot be added to the cart".to_string());
      return;
    };
    let title = product.display_title().to_string();
    let catalog = self.catalog.clone();
    let tx = self.event_tx.clone();

    tokio::spawn(async move {
      let added = catalog.add_to_cart(&id, 1, None).await;
      let _ = tx.send(Event::CartUpdated { title, added });
    });
  }

  fn move_selection(&mut self, delta: i32) {
    let len = self.visible_products().len();
    if len > 0 {
      self.selected = (self.selected as i32 + delta).rem_euclid(len as i32) as usize;
    }
  }

  fn clamp_selection(&mut self) {
    let len = self.visible_products().len();
    self.selected = self.selected.min(len.saturating_sub(1));
  }

  fn set_status(&mut self, message: String) {
    self.status = Some((message, Instant::now()));
  }

  fn visible_products(&self) -> &[Product] {
    self
      .listing
      .as_ref()
      .map(|result| result.present(self.layout))
      .unwrap_or(&[])
  }

  fn selected_product(&self) -> Option<&Product> {
    self.visible_products().get(self.selected)
  }

  // Accessors for UI rendering
  pub fn api_url(&self) -> &str {
    &self.config.api.base_url
  }

  pub fn categories(&self) -> &[Scope] {
    &self.categories
  }

  pub fn category_index(&self) -> usize {
    self.category_index
  }

  pub fn current_scope(&self) -> &Scope {
    &self.categories[self.category_index]
  }

  pub fn listing(&self) -> Option<&LoadResult> {
    self.listing.as_ref()
  }

  pub fn is_loading(&self) -> bool {
    self.loading
  }

  pub fn layout(&self) -> ListingLayout {
    self.layout
  }

  pub fn selected(&self) -> usize {
    self.selected
  }

  pub fn notice(&self) -> &CacheNotice {
    &self.notice
  }

  pub fn wishlisted(&self) -> &HashSet<String> {
    &self.wishlisted
  }

  pub fn search(&self) -> &SearchDebouncer<Product> {
    &self.search
  }

  pub fn search_box(&self) -> &SearchBox {
    &self.search_box
  }

  pub fn status(&self) -> Option<&str> {
    self.status.as_ref().map(|(message, _)| message.as_str())
  }
}

/// Category tabs from config, with the requested start category selected.
///
/// Never empty: the unscoped listing is used when nothing is configured.
fn category_tabs(configured: &[String], start: Option<String>) -> (Vec<Scope>, usize) {
  let mut tabs: Vec<Scope> = Vec::new();
  for name in configured {
    let scope = Scope::category(name.as_str());
    if !tabs.contains(&scope) {
      tabs.push(scope);
    }
  }
  if tabs.is_empty() {
    tabs.push(Scope::all());
  }

  let index = match start.map(Scope::category) {
    Some(scope) => match tabs.iter().position(|s| *s == scope) {
      Some(i) => i,
      None => {
        tabs.insert(0, scope);
        0
      }
    },
    None => 0,
  };
  (tabs, index)
}
