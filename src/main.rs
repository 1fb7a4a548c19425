//! torrent-dl HTTP service
//!
//! Usage: `torrent-dl [config.json]`
//!
//! Settings come from the optional JSON file, then `PORT` and `DOWNLOAD_DIR`
//! from the environment (a `.env` file is honoured). Log verbosity follows
//! `RUST_LOG` and defaults to `info`.

use std::sync::Arc;
use torrent_dl::engine::rqbit::RqbitEngine;
use torrent_dl::{Config, TorrentDownloader, run_with_shutdown};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Engine piece storage, below the downloads directory; the dot keeps it
/// from ever resolving as a session workspace
const ENGINE_DIR: &str = ".engine";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let mut config = match std::env::args_os().nth(1) {
        Some(path) => Config::from_json_file(std::path::Path::new(&path))?,
        None => Config::default(),
    };
    config.apply_env_overrides()?;

    let engine = Arc::new(RqbitEngine::new(
        config.download.download_dir.join(ENGINE_DIR),
    ));
    let downloader = Arc::new(TorrentDownloader::new(config, engine).await?);

    tracing::info!(
        address = %downloader.get_config().server.api.bind_address,
        "torrent-dl ready"
    );

    run_with_shutdown(downloader).await?;
    Ok(())
}
