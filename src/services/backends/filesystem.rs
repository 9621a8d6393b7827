//! Filesystem backend: one directory per artwork under a storage root.

use super::{AssetBackend, AssetRef};
use crate::errors::{CatalogError, CatalogResult};
use crate::services::naming::{ensure_safe_filename, ensure_safe_id};
use async_trait::async_trait;
use bytes::Bytes;
use std::{
    io::{self, ErrorKind},
    path::PathBuf,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

/// Stores each artwork as `root/{id}/{filename}`.
#[derive(Clone, Debug)]
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn namespace_path(&self, id: &str) -> CatalogResult<PathBuf> {
        ensure_safe_id(id)?;
        Ok(self.root.join(id))
    }

    fn file_path(&self, id: &str, filename: &str) -> CatalogResult<PathBuf> {
        ensure_safe_filename(filename)?;
        Ok(self.namespace_path(id)?.join(filename))
    }
}

fn not_found_or_io(err: io::Error, what: impl Into<String>) -> CatalogError {
    if err.kind() == ErrorKind::NotFound {
        CatalogError::NotFound(what.into())
    } else {
        CatalogError::Io(err)
    }
}

#[async_trait]
impl AssetBackend for FilesystemBackend {
    fn kind(&self) -> &'static str {
        "filesystem"
    }

    async fn list_identifiers(&self) -> CatalogResult<Vec<String>> {
        let mut entries = fs::read_dir(&self.root).await?;
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                ids.push(name.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    async fn exists(&self, id: &str) -> CatalogResult<bool> {
        let path = self.namespace_path(id)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn create_namespace(&self, id: &str) -> CatalogResult<()> {
        let path = self.namespace_path(id)?;
        fs::create_dir_all(&path).await?;
        debug!("created artwork directory {}", path.display());
        Ok(())
    }

    async fn list_files(&self, id: &str) -> CatalogResult<Vec<String>> {
        let path = self.namespace_path(id)?;
        let mut entries = fs::read_dir(&path)
            .await
            .map_err(|err| not_found_or_io(err, "artwork"))?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                files.push(name.to_string());
            }
        }
        files.sort();
        Ok(files)
    }

    async fn read_file(&self, id: &str, filename: &str) -> CatalogResult<Bytes> {
        let path = self.file_path(id, filename)?;
        let bytes = fs::read(&path)
            .await
            .map_err(|err| not_found_or_io(err, "file"))?;
        Ok(Bytes::from(bytes))
    }

    /// Writes to a temporary sibling and renames it into place, so readers
    /// never observe a half-written file.
    async fn write_file(
        &self,
        id: &str,
        filename: &str,
        bytes: Bytes,
        _content_type: &str,
    ) -> CatalogResult<()> {
        let file_path = self.file_path(id, filename)?;
        let parent = self.namespace_path(id)?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

        let mut file = File::create(&tmp_path).await?;
        if let Err(err) = file.write_all(&bytes).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }
        drop(file);

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }
        debug!(size = bytes.len(), "wrote {}", file_path.display());
        Ok(())
    }

    async fn delete_file(&self, id: &str, filename: &str) -> CatalogResult<()> {
        let path = self.file_path(id, filename)?;
        fs::remove_file(&path)
            .await
            .map_err(|err| not_found_or_io(err, "file"))?;
        debug!("removed {}", path.display());
        Ok(())
    }

    /// Returns the canonical path, which must sit strictly below the root.
    async fn resolve_ref(&self, id: &str, filename: &str) -> CatalogResult<AssetRef> {
        let path = self.file_path(id, filename)?;
        let root = fs::canonicalize(&self.root).await?;
        let resolved = fs::canonicalize(&path)
            .await
            .map_err(|err| not_found_or_io(err, "file"))?;
        if !resolved.starts_with(&root) || resolved == root {
            return Err(CatalogError::validation("Invalid path"));
        }
        if !fs::metadata(&resolved).await?.is_file() {
            return Err(CatalogError::NotFound("file".into()));
        }
        Ok(AssetRef::Path(resolved))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_tmp_backend() -> (FilesystemBackend, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        (FilesystemBackend::new(temp_dir.path()), temp_dir)
    }

    #[tokio::test]
    async fn lists_directories_as_identifiers() {
        let (backend, dir) = create_tmp_backend();
        std::fs::create_dir(dir.path().join("b-work")).unwrap();
        std::fs::create_dir(dir.path().join("a-work")).unwrap();
        std::fs::write(dir.path().join("stray.txt"), b"x").unwrap();

        let ids = backend.list_identifiers().await.unwrap();
        assert_eq!(ids, vec!["a-work", "b-work"]);
    }

    #[tokio::test]
    async fn list_files_skips_subdirectories() {
        let (backend, dir) = create_tmp_backend();
        backend.create_namespace("sunset").await.unwrap();
        std::fs::create_dir(dir.path().join("sunset/nested")).unwrap();
        std::fs::write(dir.path().join("sunset/nested/inner.jpg"), b"x").unwrap();
        std::fs::write(dir.path().join("sunset/b.png"), b"x").unwrap();
        std::fs::write(dir.path().join("sunset/a.jpg"), b"x").unwrap();

        let files = backend.list_files("sunset").await.unwrap();
        assert_eq!(files, vec!["a.jpg", "b.png"]);
    }

    #[tokio::test]
    async fn write_read_delete_cycle() {
        let (backend, _dir) = create_tmp_backend();
        backend.create_namespace("sunset").await.unwrap();
        backend
            .write_file("sunset", "detalle.txt", Bytes::from_static(b"oil"), "text/plain")
            .await
            .unwrap();
        backend
            .write_file("sunset", "detalle.txt", Bytes::from_static(b"oil on canvas"), "text/plain")
            .await
            .unwrap();

        let bytes = backend.read_file("sunset", "detalle.txt").await.unwrap();
        assert_eq!(&bytes[..], b"oil on canvas");
        assert_eq!(backend.list_files("sunset").await.unwrap(), vec!["detalle.txt"]);

        backend.delete_file("sunset", "detalle.txt").await.unwrap();
        assert!(matches!(
            backend.delete_file("sunset", "detalle.txt").await,
            Err(CatalogError::NotFound(_))
        ));
        assert!(matches!(
            backend.read_file("sunset", "detalle.txt").await,
            Err(CatalogError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn exists_checks_directory_presence() {
        let (backend, dir) = create_tmp_backend();
        assert!(!backend.exists("ghost").await.unwrap());
        backend.create_namespace("ghost").await.unwrap();
        assert!(backend.exists("ghost").await.unwrap());
        std::fs::write(dir.path().join("plain"), b"x").unwrap();
        assert!(!backend.exists("plain").await.unwrap());
    }

    #[tokio::test]
    async fn resolve_ref_stays_inside_root() {
        let (backend, dir) = create_tmp_backend();
        backend.create_namespace("sunset").await.unwrap();
        std::fs::write(dir.path().join("sunset/a.jpg"), b"x").unwrap();

        match backend.resolve_ref("sunset", "a.jpg").await.unwrap() {
            AssetRef::Path(path) => assert!(path.ends_with("sunset/a.jpg")),
            other => panic!("unexpected ref {other:?}"),
        }
        assert!(matches!(
            backend.resolve_ref("..", "a.jpg").await,
            Err(CatalogError::Validation(_))
        ));
        assert!(matches!(
            backend.resolve_ref("sunset", "missing.jpg").await,
            Err(CatalogError::NotFound(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn resolve_ref_rejects_symlink_escape() {
        let (backend, dir) = create_tmp_backend();
        let outside = TempDir::new().unwrap();
        std::fs::write(outside.path().join("secret.jpg"), b"x").unwrap();
        backend.create_namespace("sunset").await.unwrap();
        std::os::unix::fs::symlink(
            outside.path().join("secret.jpg"),
            dir.path().join("sunset/link.jpg"),
        )
        .unwrap();

        assert!(matches!(
            backend.resolve_ref("sunset", "link.jpg").await,
            Err(CatalogError::Validation(_))
        ));
    }
}
