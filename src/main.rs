mod app;
mod cache;
mod commands;
mod config;
mod event;
mod pages;
mod pagination;
mod ui;

#[cfg(test)]
mod testing;

use clap::Parser;
use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use cache::{KeyValueStore, MemoryStore, NoopStore, SessionIdentity, SqliteStore, SystemClock};
use config::Config;

#[derive(Parser, Debug)]
#[command(name = "pageshelf")]
#[command(about = "Browse your saved pages from the terminal")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/pageshelf/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Sign in as this user (overrides PAGESHELF_USER and user_id)
  #[arg(short, long)]
  user: Option<String>,

  /// Always fetch from the API; never read or write the page cache
  #[arg(long)]
  no_cache: bool,

  /// Log file (default: pageshelf.log in the data directory)
  #[arg(long)]
  log_file: Option<PathBuf>,
}

/// Log to a file so output never interleaves with the page list.
/// Level comes from RUST_LOG, defaulting to `pageshelf=info`.
fn init_logging(log_file: Option<PathBuf>) -> Result<WorkerGuard> {
  let path = match log_file {
    Some(path) => path,
    None => Config::data_dir()?.join("pageshelf.log"),
  };
  let dir = path
    .parent()
    .filter(|p| !p.as_os_str().is_empty())
    .map(PathBuf::from)
    .unwrap_or_else(|| PathBuf::from("."));
  std::fs::create_dir_all(&dir)?;
  let file_name = path
    .file_name()
    .map(PathBuf::from)
    .unwrap_or_else(|| PathBuf::from("pageshelf.log"));

  let file_appender = tracing_appender::rolling::never(dir, file_name);
  let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pageshelf=info"));
  tracing_subscriber::registry()
    .with(filter)
    .with(
      tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false),
    )
    .init();

  Ok(guard)
}

/// Pick the cache backend. An unusable database degrades to an in-memory store.
fn open_store(config: &Config, no_cache: bool) -> Arc<dyn KeyValueStore> {
  if no_cache || !config.cache.enabled {
    info!("page cache disabled");
    return Arc::new(NoopStore);
  }

  let opened = match &config.cache.path {
    Some(path) => SqliteStore::open_at(path),
    None => SqliteStore::open(),
  };
  match opened {
    Ok(store) => Arc::new(store),
    Err(e) => {
      warn!(error = %e, "cache database unavailable, caching for this session only");
      Arc::new(MemoryStore::new())
    }
  }
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let _log_guard = init_logging(args.log_file.clone())?;

  // Load configuration
  let config = Config::load(args.config.as_deref())?;

  let user = args
    .user
    .clone()
    .or_else(|| std::env::var("PAGESHELF_USER").ok())
    .or_else(|| config.user_id.clone())
    .filter(|u| !u.is_empty());
  info!(user = user.as_deref().unwrap_or("-"), api = %config.api.url, "starting");

  let fetcher = Arc::new(pages::HttpPageFetcher::new(&config)?);
  let dashboard = app::Dashboard::new(
    &config,
    Arc::new(SessionIdentity::new(user)),
    open_store(&config, args.no_cache),
    fetcher,
    Arc::new(ui::console::ConsoleUi::new()),
    Arc::new(SystemClock),
  );
  dashboard.run().await?;

  Ok(())
}
