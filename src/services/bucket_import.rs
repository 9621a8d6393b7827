//! One-shot import of a local artwork tree into the object store.
//!
//! Each subdirectory of the source is one artwork; its files become
//! `{id}/{filename}` objects. Keys that already exist are left untouched, so
//! the import can be re-run after a partial failure.

use crate::errors::CatalogResult;
use crate::services::{backends::ObjectClient, naming::content_type_for};
use bytes::Bytes;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, warn};

/// Tally of one import run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ImportReport {
    pub total: usize,
    pub uploaded: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Upload every file under `source/{id}/` that is not yet in the bucket.
///
/// Per-file failures are logged and counted; only failing to read `source`
/// itself is an error.
pub async fn import_directory(source: &Path, client: &dyn ObjectClient) -> CatalogResult<ImportReport> {
    info!(source = %source.display(), bucket = client.bucket(), "starting import");

    let mut report = ImportReport::default();
    for id in sorted_entries(source, true).await? {
        info!(artwork_id = %id, "processing artwork");
        let artwork_dir = source.join(&id);
        let files = match sorted_entries(&artwork_dir, false).await {
            Ok(files) => files,
            Err(err) => {
                warn!(artwork_id = %id, error = %err, "cannot read artwork directory");
                continue;
            }
        };

        for filename in files {
            report.total += 1;
            let key = format!("{id}/{filename}");
            match import_file(client, &artwork_dir.join(&filename), &key).await {
                Ok(true) => {
                    info!("[OK] {key}");
                    report.uploaded += 1;
                }
                Ok(false) => {
                    info!("[SKIP] {key} (already exists)");
                    report.skipped += 1;
                }
                Err(err) => {
                    error!("[ERROR] {key}: {err}");
                    report.failed += 1;
                }
            }
        }
    }

    info!(
        total = report.total,
        uploaded = report.uploaded,
        skipped = report.skipped,
        failed = report.failed,
        "import complete"
    );
    Ok(report)
}

/// Returns `Ok(false)` when the key was already present.
async fn import_file(client: &dyn ObjectClient, path: &Path, key: &str) -> CatalogResult<bool> {
    if client.head_object(key).await? {
        return Ok(false);
    }
    let body = fs::read(path).await?;
    client
        .put_object(key, Bytes::from(body), content_type_for(key))
        .await?;
    Ok(true)
}

/// Names of the directories (`dirs = true`) or regular files directly inside
/// `dir`, sorted.
async fn sorted_entries(dir: &Path, dirs: bool) -> CatalogResult<Vec<String>> {
    let mut entries = fs::read_dir(dir).await?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() != dirs {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}
