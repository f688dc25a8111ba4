use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use shopcache::config::Config;
use shopcache::storage::{MemoryMedium, SharedMedium, SqliteMedium};
use shopcache::{app, logging};

#[derive(Parser, Debug)]
#[command(name = "shopcache")]
#[command(about = "Offline-first storefront browser with a persistent wishlist")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/shopcache/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Category to open first
  #[arg(short = 'C', long)]
  category: Option<String>,

  /// Keep everything in memory instead of the storage file
  #[arg(long)]
  memory: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let _log_guard = logging::init()?;

  // Load configuration
  let config = Config::load(args.config.as_deref())?;
  info!(api = %config.api.base_url, "starting");

  let (medium, sqlite) = open_storage(&config, args.memory);

  // Initialize and run the app
  let mut app = app::App::new(config, medium, sqlite, args.category)?;
  app.run().await?;

  Ok(())
}

/// Persistent storage when possible, memory otherwise.
///
/// Losing persistence only costs offline snapshots and the saved wishlist,
/// so a broken storage file is not fatal.
fn open_storage(config: &Config, memory: bool) -> (SharedMedium, Option<Arc<SqliteMedium>>) {
  let quota = config.storage.quota_bytes;
  if memory {
    return (Arc::new(MemoryMedium::with_quota(quota)), None);
  }

  let opened = match &config.storage.path {
    Some(path) => SqliteMedium::open(path, quota),
    None => SqliteMedium::open_default(quota),
  };

  match opened {
    Ok(sqlite) => {
      let sqlite = Arc::new(sqlite);
      (sqlite.clone(), Some(sqlite))
    }
    Err(e) => {
      warn!(error = %e, "storage unavailable, falling back to memory");
      (Arc::new(MemoryMedium::with_quota(quota)), None)
    }
  }
}
