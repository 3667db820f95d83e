mod cache;
mod catalog;
mod config;
mod error;
mod sync;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cache::SqliteStore;
use catalog::{StoreClient, SyncDirection};
use sync::{RefreshScheduler, SyncCoordinator};

#[derive(Parser, Debug)]
#[command(name = "storesync")]
#[command(about = "Sync a local product catalog with a remote commerce backend")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/storesync/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Print the merged product catalog
  Products,
  /// Run a directional sync and print the result
  Sync {
    #[arg(long, value_enum, default_value_t = SyncDirection::Both)]
    direction: SyncDirection,
  },
  /// Clear all cached state and sync both directions
  ForceSync,
  /// Print the current sync status
  Status,
  /// Push a post-purchase stock level for one product
  Purchase {
    product_id: String,
    quantity: i64,
  },
  /// Keep the catalog fresh on a background timer until interrupted
  Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;
  let _log_guard = init_tracing()?;

  let args = Args::parse();
  let config = config::Config::load(args.config.as_deref())?;

  let cache = Arc::new(match &config.cache.path {
    Some(path) => SqliteStore::open_at(path)?,
    None => SqliteStore::open()?,
  });
  let client = Arc::new(StoreClient::new(&config)?);
  let local = catalog::local::load(&config)?;
  let coordinator = Arc::new(SyncCoordinator::new(client, cache, local));

  match args.command {
    Command::Products => {
      let products = coordinator.merged_products().await;
      println!("{}", serde_json::to_string_pretty(&products)?);
    }
    Command::Sync { direction } => {
      let result = coordinator.sync_products(direction).await;
      println!("{}", serde_json::to_string_pretty(&result)?);
      if !result.success {
        std::process::exit(1);
      }
    }
    Command::ForceSync => {
      let result = coordinator.force_full_sync().await;
      println!("{}", serde_json::to_string_pretty(&result)?);
      if !result.success {
        std::process::exit(1);
      }
    }
    Command::Status => {
      let status = coordinator.sync_status();
      println!("{}", serde_json::to_string_pretty(&status)?);
    }
    Command::Purchase {
      product_id,
      quantity,
    } => {
      if coordinator.sync_stock_after_purchase(&product_id, quantity).await {
        println!("stock synced for {}", product_id);
      } else {
        return Err(eyre!("stock sync failed for {}", product_id));
      }
    }
    Command::Watch => {
      watch(coordinator).await?;
    }
  }

  Ok(())
}

/// Run the background refresh scheduler until Ctrl-C.
async fn watch(coordinator: Arc<SyncCoordinator<SqliteStore>>) -> Result<()> {
  let (tx, mut rx) = mpsc::unbounded_channel();
  let mut scheduler = RefreshScheduler::new(coordinator);
  scheduler.start(tx);
  info!("background refresh active, press Ctrl-C to stop");

  loop {
    tokio::select! {
      Some(products) = rx.recv() => {
        info!(count = products.len(), "catalog refreshed");
      }
      _ = tokio::signal::ctrl_c() => {
        scheduler.stop();
        info!("background refresh stopped");
        break;
      }
    }
  }

  Ok(())
}

/// File logging under the data directory; level via STORESYNC_LOG.
fn init_tracing() -> Result<tracing_appender::non_blocking::WorkerGuard> {
  let log_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?
    .join("storesync")
    .join("logs");

  let appender = tracing_appender::rolling::daily(log_dir, "storesync.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter = EnvFilter::try_from_env("STORESYNC_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}
