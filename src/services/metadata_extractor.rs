//! Classifies the files of one artwork namespace and folds sidecar content
//! (`meta.json`, `detalle.*`, `bitacora.*`) into typed fields.
//!
//! Extraction is split in two so sidecars can be loaded lazily:
//! [`classify`] partitions filenames without touching storage, then
//! [`MetadataExtractor::wants`] tells the caller whether a sidecar could still
//! change anything before its bytes are fetched and handed to
//! [`MetadataExtractor::absorb`].

use crate::models::artwork::ArtworkMeta;
use crate::services::naming::{is_image, is_video, split_extension};
use tracing::debug;

/// Upper bound on sidecar bytes considered; longer content is truncated.
pub const MAX_SIDECAR_BYTES: usize = 1 << 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SidecarKind {
    /// `meta.json`
    Meta,
    /// `bitacora*.txt|md`
    Bitacora,
    /// `detalle*` or `detail*` with a `.txt|.md` extension.
    Detalle,
    /// Any other `.txt|.md`; only used when no better text exists.
    LegacyText,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sidecar {
    pub filename: String,
    pub kind: SidecarKind,
}

/// Result of partitioning a namespace listing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Classified {
    pub images: Vec<String>,
    pub videos: Vec<String>,
    /// Sidecars in processing order (ascending filename).
    pub sidecars: Vec<Sidecar>,
}

/// Partition `filenames` by extension. Media lists come back sorted by byte
/// order; unknown extensions are dropped.
pub fn classify<I, S>(filenames: I) -> Classified
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut names: Vec<String> = filenames.into_iter().map(Into::into).collect();
    names.sort();

    let mut out = Classified::default();
    for filename in names {
        let (stem, ext) = split_extension(&filename);
        let ext = ext.to_ascii_lowercase();
        let stem = stem.to_lowercase();

        if is_image(&filename) {
            out.images.push(filename);
        } else if is_video(&filename) {
            out.videos.push(filename);
        } else if ext == ".json" {
            if stem == "meta" {
                out.sidecars.push(Sidecar {
                    filename,
                    kind: SidecarKind::Meta,
                });
            }
        } else if ext == ".txt" || ext == ".md" {
            let kind = if stem.starts_with("bitacora") {
                SidecarKind::Bitacora
            } else if stem.starts_with("detalle") || stem.starts_with("detail") {
                SidecarKind::Detalle
            } else {
                SidecarKind::LegacyText
            };
            out.sidecars.push(Sidecar { filename, kind });
        }
    }
    out
}

/// Scalar fields gathered from sidecars, first match wins per field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MetadataExtractor {
    pub painted_location: String,
    pub start_date: String,
    pub end_date: String,
    pub in_progress: bool,
    pub detalle: String,
    pub bitacora: String,
}

impl MetadataExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether loading `sidecar` could still change a field.
    pub fn wants(&self, sidecar: &Sidecar) -> bool {
        match sidecar.kind {
            SidecarKind::Meta => {
                self.painted_location.is_empty()
                    || self.start_date.is_empty()
                    || self.end_date.is_empty()
                    || !self.in_progress
            }
            SidecarKind::Bitacora => self.bitacora.is_empty(),
            SidecarKind::Detalle => self.detalle.is_empty(),
            SidecarKind::LegacyText => self.bitacora.is_empty() && self.detalle.is_empty(),
        }
    }

    /// Fold the content of `sidecar` into the collected fields.
    ///
    /// A `meta.json` that does not parse is skipped.
    pub fn absorb(&mut self, sidecar: &Sidecar, content: &[u8]) {
        let content = &content[..content.len().min(MAX_SIDECAR_BYTES)];
        match sidecar.kind {
            SidecarKind::Meta => match serde_json::from_slice::<ArtworkMeta>(content) {
                Ok(meta) => self.absorb_meta(meta),
                Err(err) => {
                    debug!(file = %sidecar.filename, error = %err, "ignoring unparsable meta.json");
                }
            },
            SidecarKind::Bitacora => {
                if self.bitacora.is_empty() {
                    self.bitacora = String::from_utf8_lossy(content).into_owned();
                }
            }
            SidecarKind::Detalle => {
                if self.detalle.is_empty() {
                    self.detalle = String::from_utf8_lossy(content).into_owned();
                }
            }
            SidecarKind::LegacyText => {
                if self.bitacora.is_empty() && self.detalle.is_empty() {
                    self.bitacora = String::from_utf8_lossy(content).into_owned();
                }
            }
        }
    }

    fn absorb_meta(&mut self, meta: ArtworkMeta) {
        fill_if_empty(&mut self.painted_location, &meta.painted_location);
        fill_if_empty(&mut self.start_date, &meta.start_date);
        fill_if_empty(&mut self.end_date, &meta.end_date);
        self.in_progress |= meta.in_progress;
    }
}

fn fill_if_empty(slot: &mut String, value: &str) {
    if slot.is_empty() {
        *slot = value.trim().to_string();
    }
}
