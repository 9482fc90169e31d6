//! stratusd - the Stratus data-plane daemon
//!
//! Wires configuration, the SQLite namespace store, the S3 gateway and the
//! services together, then serves the HTTP surface until SIGINT.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use stratus_core::config::Config;
use stratus_files::{DownloadService, NamespaceService, UploadService};
use stratus_gateway::{build_client, S3Gateway};
use stratus_server::limit::RequestLimiter;
use stratus_server::AppState;
use stratus_store::{DatabasePool, SqliteFileRepository};

#[derive(Parser, Debug)]
#[command(name = "stratusd", about = "Stratus cloud-storage data plane")]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "stratus.yml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let args = Args::parse();
    let config = Config::load_or_default(&args.config);
    tracing::info!(config = %args.config.display(), bind = %config.server.bind, "starting stratusd");

    let pool = DatabasePool::new(&config.database.path)
        .await
        .context("opening metadata store")?;
    let repo = Arc::new(SqliteFileRepository::new(&pool));

    let gateway = Arc::new(S3Gateway::new(
        build_client(&config.object_store),
        &config.object_store,
    ));

    let put_ttl = Duration::from_secs(config.object_store.presign_put_ttl_secs);
    let link_ttl = Duration::from_secs(config.object_store.download_link_ttl_secs);

    let state = Arc::new(AppState {
        namespace: NamespaceService::new(repo.clone(), gateway.clone()),
        upload: UploadService::new(repo.clone(), gateway.clone(), put_ttl),
        download: DownloadService::new(
            repo,
            gateway,
            link_ttl,
            config.transfer.zip_max_bytes,
            config.transfer.global_bytes_per_sec,
        ),
        limiter: RequestLimiter::new(config.server.requests_per_minute),
    });

    let addr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("invalid bind address {}", config.server.bind))?;

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received");
                shutdown.cancel();
            }
        });
    }

    stratus_server::run(state, addr, shutdown).await
}
