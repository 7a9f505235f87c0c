use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use playyt::{
    config::{self, FetchBackend, Settings},
    fetch, security,
    resolver::MediaRoot,
    server::{AppState, router},
};
use tokio::signal;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "playyt", about = "Search, download and stream videos from a local library")]
struct Cli {
    /// Env-style config file; missing means defaults.
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    /// Directory holding downloaded videos. Created when missing.
    #[arg(long)]
    download_dir: Option<PathBuf>,
    /// Never call yt-dlp; serve the demo catalog instead.
    #[arg(long)]
    offline: bool,
    #[arg(short, long)]
    verbose: bool,
    #[arg(long)]
    allow_root: bool,
}

impl Cli {
    fn apply(&self, settings: &mut Settings) {
        if let Some(host) = &self.host {
            settings.playyt_host = host.clone();
        }
        if let Some(port) = self.port {
            settings.playyt_port = port;
        }
        if let Some(dir) = &self.download_dir {
            settings.download_dir = dir.clone();
        }
        if self.offline {
            settings.fetch_backend = FetchBackend::Offline;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "playyt=debug".to_string()
        } else {
            "playyt=info".to_string()
        }
    });
    tracing_subscriber::fmt().with_env_filter(&env_filter).init();

    if cli.allow_root {
        warn!("root check disabled by --allow-root");
    } else {
        security::ensure_not_root("playyt")?;
    }

    let mut settings = config::load_settings_from(&cli.config)
        .with_context(|| format!("loading config {}", cli.config.display()))?;
    cli.apply(&mut settings);

    std::fs::create_dir_all(&settings.download_dir).with_context(|| {
        format!("creating download directory {}", settings.download_dir.display())
    })?;
    let library = MediaRoot::new(&settings.download_dir)?;
    info!(root = %library.path().display(), "serving library");

    let fetcher: Arc<dyn fetch::Fetcher> = Arc::from(fetch::select_fetcher(&settings));
    let state = AppState::new(library, fetcher, settings.stream_chunk_size);
    let app = router(state);

    let addr = SocketAddr::new(
        settings
            .playyt_host
            .parse()
            .with_context(|| format!("parsing host {}", settings.playyt_host))?,
        settings.playyt_port,
    );
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding to {}", addr))?;
    info!("API server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("running API server")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = signal::ctrl_c().await {
        warn!(error = %err, "failed to install Ctrl+C handler");
    }
    info!("shutting down");
}
