//! Admin write operations: create, edit, upload and delete.
//!
//! Storage writes and overlay writes are independent best-effort steps, not a
//! transaction. Files may be written while the overlay update fails (or the
//! other way round); every operation therefore answers with the artwork
//! re-assembled from what was actually stored.

use crate::errors::{CatalogError, CatalogResult};
use crate::models::{
    artwork::{Artwork, ArtworkMeta, ArtworkUpdate},
    record::ArtworkRecordRow,
};
use crate::services::{
    backends::AssetBackend,
    database_overlay::{OverlayStore, READ_TIMEOUT, WRITE_TIMEOUT, bounded},
    metadata_extractor::{SidecarKind, classify},
    naming::{
        ensure_safe_filename, ensure_safe_id, extension_for_image_type, generate_artwork_id,
        is_image, is_upload_image_type, sanitize_upload_stem, split_extension,
    },
    record_assembler::RecordAssembler,
};
use bytes::Bytes;
use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::{info, warn};

/// Largest accepted image upload.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

const META_FILE: &str = "meta.json";
const DETALLE_FILE: &str = "detalle.txt";
const BITACORA_FILE: &str = "bitacora.txt";
const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Result of an edit whose overlay step may have failed after storage
/// writes went through.
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    /// The artwork as it now reads from storage and overlay.
    pub artwork: Artwork,
    /// Set when the overlay write failed.
    pub overlay_error: Option<String>,
}

#[derive(Clone)]
pub struct AdminService {
    assembler: RecordAssembler,
}

impl AdminService {
    pub fn new(assembler: RecordAssembler) -> Self {
        Self { assembler }
    }

    fn backend(&self) -> &Arc<dyn AssetBackend> {
        self.assembler.backend()
    }

    fn require_overlay(&self) -> CatalogResult<&OverlayStore> {
        self.assembler
            .overlay()
            .ok_or_else(|| CatalogError::Unavailable("Database not configured".into()))
    }

    async fn ensure_exists(&self, id: &str) -> CatalogResult<()> {
        ensure_safe_id(id)?;
        if self.backend().exists(id).await? {
            Ok(())
        } else {
            Err(CatalogError::NotFound("Artwork".into()))
        }
    }

    /// Create an empty artwork with a fresh random identifier.
    ///
    /// Once the namespace exists the artwork is always returned; a failed
    /// overlay insert is reported through [`WriteOutcome::overlay_error`].
    pub async fn create(&self, title: &str) -> CatalogResult<WriteOutcome> {
        let overlay = self.require_overlay()?;
        let title = title.trim();
        if title.is_empty() {
            return Err(CatalogError::validation("Title is required"));
        }
        if !bounded(WRITE_TIMEOUT, overlay.title_is_unique(title, "")).await? {
            return Err(CatalogError::Conflict("Title already exists".into()));
        }

        let id = generate_artwork_id();
        self.backend().create_namespace(&id).await?;
        let mut overlay_error = None;
        match bounded(
            WRITE_TIMEOUT,
            overlay.upsert(&ArtworkRecordRow::titled(id.as_str(), title)),
        )
        .await
        {
            Ok(()) => info!(artwork_id = %id, title, "created artwork"),
            Err(err) => {
                warn!(artwork_id = %id, error = %err, "overlay insert failed after the namespace was created");
                overlay_error = Some(err.to_string());
            }
        }

        let artwork = self.assembler.assemble(&id).await?;
        Ok(WriteOutcome {
            artwork,
            overlay_error,
        })
    }

    /// Replace the editable fields of `id`.
    ///
    /// Everything that can be rejected (dates, primary image name, title
    /// uniqueness) is checked before the first write.
    pub async fn upsert(&self, id: &str, update: ArtworkUpdate) -> CatalogResult<WriteOutcome> {
        self.ensure_exists(id).await?;

        let title = update.title.trim().to_string();
        let painted_location = update.painted_location.trim().to_string();
        let start_date = parse_date("startDate", &update.start_date)?;
        let end_date = parse_date("endDate", &update.end_date)?;
        let primary_image = update.primary_image.trim().to_string();
        if !primary_image.is_empty() {
            ensure_safe_filename(&primary_image)?;
        }
        let detalle = non_blank(update.detalle);
        let bitacora = non_blank(update.bitacora);

        let overlay = self.assembler.overlay();
        if let Some(overlay) = overlay {
            if !title.is_empty() && !bounded(WRITE_TIMEOUT, overlay.title_is_unique(&title, id)).await? {
                return Err(CatalogError::Conflict("Title already exists".into()));
            }
        }

        let meta = ArtworkMeta {
            painted_location: painted_location.clone(),
            start_date: update.start_date.trim().to_string(),
            end_date: update.end_date.trim().to_string(),
            in_progress: update.in_progress,
        };
        let mut meta_bytes = serde_json::to_vec_pretty(&meta).map_err(CatalogError::backend)?;
        meta_bytes.push(b'\n');
        self.backend()
            .write_file(id, META_FILE, Bytes::from(meta_bytes), "application/json")
            .await?;
        self.remove_shadowing_notes(id, detalle.is_empty() && bitacora.is_empty())
            .await?;
        self.write_or_remove_text(id, DETALLE_FILE, &detalle).await?;
        self.write_or_remove_text(id, BITACORA_FILE, &bitacora).await?;

        let mut overlay_error = None;
        if let Some(overlay) = overlay {
            let row = ArtworkRecordRow {
                id: id.to_string(),
                title,
                painted_location,
                start_date,
                end_date,
                in_progress: update.in_progress,
                detalle,
                bitacora,
                primary_image,
            };
            if let Err(err) = bounded(WRITE_TIMEOUT, overlay.upsert(&row)).await {
                warn!(artwork_id = %id, error = %err, "overlay write failed after sidecars were saved");
                overlay_error = Some(err.to_string());
            }
        }

        let artwork = self.assembler.assemble(id).await?;
        Ok(WriteOutcome {
            artwork,
            overlay_error,
        })
    }

    /// Store an uploaded image under `id` and return the updated artwork.
    pub async fn upload_image(
        &self,
        id: &str,
        original_name: &str,
        content_type: &str,
        bytes: Bytes,
    ) -> CatalogResult<Artwork> {
        self.ensure_exists(id).await?;
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(CatalogError::validation("File too large (max 10MB)"));
        }
        if !is_upload_image_type(content_type) {
            return Err(CatalogError::validation(
                "Invalid file type. Allowed: JPEG, PNG, GIF",
            ));
        }

        let filename = upload_filename(original_name, content_type);
        self.backend()
            .write_file(id, &filename, bytes, content_type)
            .await?;
        info!(artwork_id = %id, file = %filename, "stored uploaded image");

        self.assembler.assemble(id).await
    }

    /// Detach `filename` from `id`. A DB primary image pointing at the file is
    /// cleared; with `delete_file` the stored file is removed as well.
    pub async fn delete_image(
        &self,
        id: &str,
        filename: &str,
        delete_file: bool,
    ) -> CatalogResult<WriteOutcome> {
        ensure_safe_id(id)?;
        ensure_safe_filename(filename)?;
        if !is_image(filename) {
            return Err(CatalogError::validation("Only image files can be removed"));
        }
        self.ensure_exists(id).await?;
        let files = self.backend().list_files(id).await?;
        if !files.iter().any(|f| f == filename) {
            return Err(CatalogError::NotFound("Image".into()));
        }

        if delete_file {
            self.backend().delete_file(id, filename).await?;
            info!(artwork_id = %id, file = %filename, "deleted image");
        }

        let mut overlay_error = None;
        if let Some(overlay) = self.assembler.overlay() {
            if let Err(err) = clear_primary_image(overlay, id, filename).await {
                warn!(artwork_id = %id, error = %err, "failed to clear primary image in overlay");
                overlay_error = Some(err.to_string());
            }
        }

        let artwork = self.assembler.assemble(id).await?;
        Ok(WriteOutcome {
            artwork,
            overlay_error,
        })
    }

    /// Whether `title` is free for use by an artwork other than `exclude_id`.
    pub async fn check_title(&self, title: &str, exclude_id: &str) -> CatalogResult<bool> {
        let overlay = self.require_overlay()?;
        let title = title.trim();
        if title.is_empty() {
            return Err(CatalogError::validation("Title parameter is required"));
        }
        bounded(READ_TIMEOUT, overlay.title_is_unique(title, exclude_id.trim())).await
    }

    /// Delete note files other than the canonical pair that the extractor
    /// would read instead of (or in place of) `detalle.txt`/`bitacora.txt`.
    /// Untagged text files only count when both notes are being cleared.
    async fn remove_shadowing_notes(&self, id: &str, clear_untagged: bool) -> CatalogResult<()> {
        let files = self.backend().list_files(id).await?;
        for sidecar in classify(files).sidecars {
            let stale = match sidecar.kind {
                SidecarKind::Detalle => sidecar.filename != DETALLE_FILE,
                SidecarKind::Bitacora => sidecar.filename != BITACORA_FILE,
                SidecarKind::LegacyText => clear_untagged,
                SidecarKind::Meta => false,
            };
            if stale {
                self.remove_if_present(id, &sidecar.filename).await?;
                info!(artwork_id = %id, file = %sidecar.filename, "removed superseded note file");
            }
        }
        Ok(())
    }

    async fn remove_if_present(&self, id: &str, filename: &str) -> CatalogResult<()> {
        match self.backend().delete_file(id, filename).await {
            Ok(()) | Err(CatalogError::NotFound(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }

    async fn write_or_remove_text(&self, id: &str, filename: &str, text: &str) -> CatalogResult<()> {
        if text.is_empty() {
            self.remove_if_present(id, filename).await
        } else {
            self.backend()
                .write_file(
                    id,
                    filename,
                    Bytes::copy_from_slice(text.as_bytes()),
                    TEXT_CONTENT_TYPE,
                )
                .await
        }
    }
}

async fn clear_primary_image(overlay: &OverlayStore, id: &str, filename: &str) -> CatalogResult<()> {
    let Some(mut row) = bounded(WRITE_TIMEOUT, overlay.get(id)).await? else {
        return Ok(());
    };
    if row.primary_image != filename {
        return Ok(());
    }
    row.primary_image.clear();
    bounded(WRITE_TIMEOUT, overlay.upsert(&row)).await
}

/// Parse an optional `YYYY-MM-DD` date; blank means absent.
fn parse_date(field: &str, value: &str) -> CatalogResult<Option<NaiveDate>> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| CatalogError::validation(format!("Invalid {field}, expected YYYY-MM-DD")))
}

fn non_blank(text: String) -> String {
    if text.trim().is_empty() {
        String::new()
    } else {
        text
    }
}

/// `{unix_nanos}_{sanitized stem}{ext}`. A recognised image extension on the
/// original name is kept; otherwise one is derived from the content type.
fn upload_filename(original_name: &str, content_type: &str) -> String {
    let base = original_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_name);
    let ext = if is_image(base) {
        split_extension(base).1
    } else {
        extension_for_image_type(content_type)
    };
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    format!("{nanos}_{}{ext}", sanitize_upload_stem(base))
}
