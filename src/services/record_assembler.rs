//! Builds the `Artwork` view for an identifier from backend listings, sidecar
//! metadata and the optional database overlay.

use crate::errors::{CatalogError, CatalogResult};
use crate::models::{artwork::Artwork, record::ArtworkRecordRow};
use crate::services::{
    backends::AssetBackend,
    database_overlay::{OverlayStore, READ_TIMEOUT, bounded},
    metadata_extractor::{MetadataExtractor, classify},
    naming::{ensure_safe_id, humanize_title},
};
use futures::{StreamExt, stream};
use std::{cmp::Ordering, sync::Arc, time::Duration};
use tracing::{debug, warn};

/// How many artworks are assembled concurrently while listing.
const LIST_CONCURRENCY: usize = 8;

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Clone)]
pub struct RecordAssembler {
    backend: Arc<dyn AssetBackend>,
    overlay: Option<OverlayStore>,
    overlay_timeout: Duration,
}

impl RecordAssembler {
    pub fn new(backend: Arc<dyn AssetBackend>, overlay: Option<OverlayStore>) -> Self {
        Self {
            backend,
            overlay,
            overlay_timeout: READ_TIMEOUT,
        }
    }

    pub fn backend(&self) -> &Arc<dyn AssetBackend> {
        &self.backend
    }

    pub fn overlay(&self) -> Option<&OverlayStore> {
        self.overlay.as_ref()
    }

    /// Assemble the artwork stored under `id`.
    ///
    /// Returns `NotFound` when the backend has no namespace for `id`. Artworks
    /// without media are still returned here.
    pub async fn assemble(&self, id: &str) -> CatalogResult<Artwork> {
        ensure_safe_id(id)?;
        if !self.backend.exists(id).await? {
            return Err(CatalogError::NotFound("Artwork".into()));
        }
        self.assemble_existing(id).await
    }

    /// Every artwork with at least one image or video, in identifier order.
    /// Identifiers that fail to assemble are logged and skipped.
    pub async fn list_all(&self) -> CatalogResult<Vec<Artwork>> {
        let ids = self.backend.list_identifiers().await?;
        let artworks = stream::iter(ids)
            .map(|id| async move {
                match self.assemble_existing(&id).await {
                    Ok(artwork) => Some(artwork),
                    Err(err) => {
                        warn!(artwork_id = %id, error = %err, "skipping artwork that failed to scan");
                        None
                    }
                }
            })
            .buffered(LIST_CONCURRENCY)
            .filter_map(|artwork| async move { artwork.filter(Artwork::has_media) })
            .collect::<Vec<_>>()
            .await;
        Ok(artworks)
    }

    /// [`list_all`](Self::list_all) ordered for the admin view: newest
    /// `startDate` first, undated last, then title (case-insensitive).
    pub async fn list_admin(&self) -> CatalogResult<Vec<Artwork>> {
        let mut artworks = self.list_all().await?;
        sort_for_admin(&mut artworks);
        Ok(artworks)
    }

    async fn assemble_existing(&self, id: &str) -> CatalogResult<Artwork> {
        let files = self.backend.list_files(id).await?;
        let classified = classify(files);

        let mut extractor = MetadataExtractor::new();
        for sidecar in &classified.sidecars {
            if !extractor.wants(sidecar) {
                continue;
            }
            match self.backend.read_file(id, &sidecar.filename).await {
                Ok(content) => extractor.absorb(sidecar, &content),
                Err(err) => {
                    debug!(artwork_id = %id, file = %sidecar.filename, error = %err, "sidecar unreadable");
                }
            }
        }

        let mut artwork = Artwork {
            images: classified.images,
            videos: classified.videos,
            detalle: extractor.detalle,
            painted_location: extractor.painted_location,
            start_date: extractor.start_date,
            end_date: extractor.end_date,
            in_progress: extractor.in_progress,
            bitacora: extractor.bitacora,
            ..Artwork::new(id, humanize_title(id))
        };

        if let Some(row) = self.overlay_row(id).await {
            apply_overlay(&mut artwork, &row);
        }
        if artwork.primary_image.is_empty() {
            if let Some(first) = artwork.images.first() {
                artwork.primary_image = first.clone();
            }
        }
        Ok(artwork)
    }

    /// Overlay row for `id`. Any failure (timeout, connection, decode) is
    /// logged and treated as "no row"; it never fails the assembly.
    async fn overlay_row(&self, id: &str) -> Option<ArtworkRecordRow> {
        let overlay = self.overlay.as_ref()?;
        match bounded(self.overlay_timeout, overlay.get(id)).await {
            Ok(row) => row,
            Err(err) => {
                warn!(artwork_id = %id, error = %err, "overlay read failed; using storage metadata");
                None
            }
        }
    }
}

/// Layer a database row over storage-derived values.
///
/// Non-empty DB values win for title, notes and primary image; DB dates
/// replace the stored strings when present; `paintedLocation` and
/// `inProgress` are always taken from the row.
pub fn apply_overlay(artwork: &mut Artwork, row: &ArtworkRecordRow) {
    if !row.title.is_empty() {
        artwork.title = row.title.clone();
    }
    artwork.painted_location = row.painted_location.clone();
    if let Some(date) = row.start_date {
        artwork.start_date = date.format(DATE_FORMAT).to_string();
    }
    if let Some(date) = row.end_date {
        artwork.end_date = date.format(DATE_FORMAT).to_string();
    }
    artwork.in_progress = row.in_progress;
    if !row.detalle.is_empty() {
        artwork.detalle = row.detalle.clone();
    }
    if !row.bitacora.is_empty() {
        artwork.bitacora = row.bitacora.clone();
    }
    if !row.primary_image.is_empty() {
        artwork.primary_image = row.primary_image.clone();
    }
}

/// Admin ordering: `startDate` descending with undated entries last, then
/// title ascending ignoring case.
pub fn sort_for_admin(artworks: &mut [Artwork]) {
    artworks.sort_by(|a, b| {
        let by_date = match (a.start_date.is_empty(), b.start_date.is_empty()) {
            (false, false) => b.start_date.cmp(&a.start_date),
            (false, true) => Ordering::Less,
            (true, false) => Ordering::Greater,
            (true, true) => Ordering::Equal,
        };
        by_date.then_with(|| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
    });
}
