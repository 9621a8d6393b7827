//! Storage backends for artwork namespaces.
//!
//! Both variants expose the same [`AssetBackend`] capability set, so the
//! assembler and the HTTP layer never branch on which one is configured. The
//! concrete backend is chosen once at startup from configuration.

pub mod filesystem;
pub mod object_store;
pub mod s3_client;

use crate::errors::CatalogResult;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::PathBuf;

pub use filesystem::FilesystemBackend;
pub use object_store::{ObjectClient, ObjectStoreBackend};

/// How a stored file should be handed to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetRef {
    /// Local file inside the storage root; stream it.
    Path(PathBuf),
    /// Public or pre-signed URL; redirect to it.
    Url(String),
}

/// Read/write access to artwork namespaces.
///
/// Callers validate `id` and `filename` with the predicates in
/// [`crate::services::naming`] before invoking a backend; implementations
/// check them again when building paths or keys.
#[async_trait]
pub trait AssetBackend: Send + Sync {
    /// Short label used in logs and readiness output.
    fn kind(&self) -> &'static str;

    /// Every artwork identifier currently present, sorted ascending.
    async fn list_identifiers(&self) -> CatalogResult<Vec<String>>;

    /// Whether the namespace for `id` exists.
    async fn exists(&self, id: &str) -> CatalogResult<bool>;

    /// Create an empty namespace for a new artwork.
    async fn create_namespace(&self, id: &str) -> CatalogResult<()>;

    /// Filenames directly under `id`. Nested entries are skipped.
    async fn list_files(&self, id: &str) -> CatalogResult<Vec<String>>;

    async fn read_file(&self, id: &str, filename: &str) -> CatalogResult<Bytes>;

    /// Create or overwrite `filename` under `id`.
    async fn write_file(
        &self,
        id: &str,
        filename: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> CatalogResult<()>;

    async fn delete_file(&self, id: &str, filename: &str) -> CatalogResult<()>;

    /// Resolve where a client can fetch `filename` from.
    async fn resolve_ref(&self, id: &str, filename: &str) -> CatalogResult<AssetRef>;
}
