use anyhow::{Context, Result};
use axum::Router;
use std::{fs, io::ErrorKind, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;

use config::{AppConfig, ObjectStoreConfig, RunMode};
use services::{
    backends::{AssetBackend, FilesystemBackend, ObjectStoreBackend, s3_client::S3ObjectClient},
    bucket_import::import_directory,
    database_overlay::OverlayStore,
    record_assembler::RecordAssembler,
};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Environment file (optional) ---
    let _ = dotenvy::dotenv();

    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config + run mode ---
    let (cfg, mode) = AppConfig::from_env_and_args()?;

    match mode {
        RunMode::Migrate => migrate_only(&cfg).await,
        RunMode::Import(source) => {
            let store = cfg
                .object_store
                .as_ref()
                .context("--import-dir requires BUCKET_NAME (or an alias) to be set")?;
            let client = S3ObjectClient::connect(store).await;
            let report = import_directory(&source, &client)
                .await
                .with_context(|| format!("importing {}", source.display()))?;
            tracing::info!(
                "Import complete: total {}, uploaded {}, skipped {}, failed {}",
                report.total,
                report.uploaded,
                report.skipped,
                report.failed
            );
            Ok(())
        }
        RunMode::Serve => serve(cfg).await,
    }
}

/// `--migrate`: apply the overlay schema and exit.
async fn migrate_only(cfg: &AppConfig) -> Result<()> {
    let url = cfg
        .database_url
        .as_deref()
        .context("--migrate requires DATABASE_URL")?;
    let overlay = OverlayStore::connect(url)
        .await
        .with_context(|| format!("connecting to {}", OverlayStore::describe(url)))?;
    overlay.migrate().await.context("running migrations")?;
    tracing::info!("Database migration complete.");
    Ok(())
}

async fn serve(cfg: AppConfig) -> Result<()> {
    let backend = build_backend(&cfg).await?;
    let overlay = match cfg.database_url.as_deref() {
        Some(url) => open_overlay(url).await,
        None => None,
    };
    tracing::info!(
        backend = backend.kind(),
        overlay = overlay.is_some(),
        admin = cfg.admin_token.is_some(),
        "Starting artwork-store"
    );

    // --- Build router ---
    let assembler = RecordAssembler::new(backend, overlay);
    let app: Router = routes::routes::routes(AppState::new(assembler, cfg.admin_token.clone()));

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Object store when a bucket is configured, the artworks directory otherwise.
async fn build_backend(cfg: &AppConfig) -> Result<Arc<dyn AssetBackend>> {
    if let Some(store) = &cfg.object_store {
        log_object_store(store);
        let client = S3ObjectClient::connect(store).await;
        return Ok(Arc::new(ObjectStoreBackend::new(
            Arc::new(client),
            store.url_policy(),
        )));
    }

    // --- Ensure artworks directory exists ---
    if !cfg.artworks_dir.exists() {
        fs::create_dir_all(&cfg.artworks_dir)
            .with_context(|| format!("creating {}", cfg.artworks_dir.display()))?;
        tracing::info!("Created artworks directory at {}", cfg.artworks_dir.display());
    }
    tracing::info!("Artworks directory: {}", cfg.artworks_dir.display());
    Ok(Arc::new(FilesystemBackend::new(cfg.artworks_dir.clone())))
}

fn log_object_store(store: &ObjectStoreConfig) {
    tracing::info!(
        bucket = %store.bucket,
        region = %store.region,
        endpoint = store.endpoint.as_deref().unwrap_or("<aws default>"),
        public_urls = store.public_base_url.is_some(),
        "Object storage enabled"
    );
}

/// Connect and migrate the overlay. Any failure leaves the service running
/// on storage metadata alone.
async fn open_overlay(url: &str) -> Option<OverlayStore> {
    let overlay = match OverlayStore::connect(url).await {
        Ok(overlay) => overlay,
        Err(err) => {
            tracing::warn!(error = %err, "Overlay connect failed (continuing without DB)");
            return None;
        }
    };
    if let Err(err) = overlay.migrate().await {
        tracing::warn!(error = %err, "Overlay migrate failed (continuing without DB)");
        overlay.db.close().await;
        return None;
    }
    tracing::info!("Overlay database enabled at {}", OverlayStore::describe(url));
    Some(overlay)
}
