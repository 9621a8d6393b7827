//! Object-store backend: one key prefix (`{id}/`) per artwork.
//!
//! The raw bucket operations sit behind [`ObjectClient`] so the listing and
//! key rules here can run against the S3 SDK in production and an in-memory
//! fake in tests.

use super::{AssetBackend, AssetRef};
use crate::errors::{CatalogError, CatalogResult};
use crate::services::naming::{ensure_safe_filename, ensure_safe_id};
use async_trait::async_trait;
use bytes::Bytes;
use std::{collections::BTreeSet, collections::HashSet, sync::Arc, time::Duration};
use tracing::{debug, warn};

/// Default lifetime of pre-signed GET URLs.
pub const DEFAULT_PRESIGN_TTL: Duration = Duration::from_secs(600);

/// Marker object that keeps an otherwise empty prefix alive.
pub const PLACEHOLDER_OBJECT: &str = ".placeholder";

/// Parameters for one ListObjectsV2 page request.
#[derive(Clone, Debug, Default)]
pub struct ListObjectsParams {
    pub prefix: Option<String>,
    pub delimiter: Option<String>,
    pub continuation_token: Option<String>,
    pub max_keys: Option<i32>,
}

/// One page of a ListObjectsV2 response.
#[derive(Clone, Debug, Default)]
pub struct ListObjectsPage {
    pub keys: Vec<String>,
    pub common_prefixes: Vec<String>,
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
}

/// Minimal bucket operations needed by [`ObjectStoreBackend`] and the
/// directory importer.
#[async_trait]
pub trait ObjectClient: Send + Sync {
    fn bucket(&self) -> &str;

    async fn list_objects(&self, params: ListObjectsParams) -> CatalogResult<ListObjectsPage>;

    /// Fetch an object's bytes; `NotFound` when the key is absent.
    async fn get_object(&self, key: &str) -> CatalogResult<Bytes>;

    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> CatalogResult<()>;

    async fn delete_object(&self, key: &str) -> CatalogResult<()>;

    /// Metadata-only existence probe.
    async fn head_object(&self, key: &str) -> CatalogResult<bool>;

    /// Time-limited GET URL for `key`.
    async fn presign_get(&self, key: &str, ttl: Duration) -> CatalogResult<String>;
}

/// How read references are produced for clients.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UrlPolicy {
    /// Plain URLs under a public base (e.g. a CDN in front of the bucket).
    Public { base_url: String },
    /// Pre-signed GET URLs with the given lifetime.
    Presigned { ttl: Duration },
}

impl Default for UrlPolicy {
    fn default() -> Self {
        Self::Presigned {
            ttl: DEFAULT_PRESIGN_TTL,
        }
    }
}

#[derive(Clone)]
pub struct ObjectStoreBackend {
    client: Arc<dyn ObjectClient>,
    url_policy: UrlPolicy,
}

impl ObjectStoreBackend {
    pub fn new(client: Arc<dyn ObjectClient>, url_policy: UrlPolicy) -> Self {
        Self { client, url_policy }
    }

    fn key_for(id: &str, filename: &str) -> CatalogResult<String> {
        ensure_safe_id(id)?;
        ensure_safe_filename(filename)?;
        Ok(format!("{id}/{filename}"))
    }

    fn prefix_for(id: &str) -> CatalogResult<String> {
        ensure_safe_id(id)?;
        Ok(format!("{id}/"))
    }

    /// `base_url/escaped-id/escaped-filename`.
    fn public_url(base_url: &str, key: &str) -> String {
        let escaped = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/{}", base_url.trim_end_matches('/'), escaped)
    }

    /// Drain every page for `params`, handing each one to `visit`.
    ///
    /// Stops when the store reports no further page, or when a continuation
    /// token repeats (a store that never advances would otherwise loop
    /// forever).
    async fn for_each_page<F>(&self, mut params: ListObjectsParams, mut visit: F) -> CatalogResult<()>
    where
        F: FnMut(ListObjectsPage),
    {
        let mut seen_tokens = HashSet::new();
        loop {
            let page = self.client.list_objects(params.clone()).await?;
            let next = if page.is_truncated {
                page.next_continuation_token.clone()
            } else {
                None
            };
            visit(page);

            match next {
                Some(token) if seen_tokens.insert(token.clone()) => {
                    params.continuation_token = Some(token);
                }
                Some(token) => {
                    warn!(
                        bucket = self.client.bucket(),
                        token = %token,
                        "object listing returned a repeated continuation token; stopping"
                    );
                    return Ok(());
                }
                None => return Ok(()),
            }
        }
    }
}

#[async_trait]
impl AssetBackend for ObjectStoreBackend {
    fn kind(&self) -> &'static str {
        "object-store"
    }

    async fn list_identifiers(&self) -> CatalogResult<Vec<String>> {
        let mut ids = BTreeSet::new();
        let params = ListObjectsParams {
            delimiter: Some("/".into()),
            ..ListObjectsParams::default()
        };
        self.for_each_page(params, |page| {
            for prefix in page.common_prefixes {
                let id = prefix.trim_end_matches('/');
                if !id.is_empty() {
                    ids.insert(id.to_string());
                }
            }
        })
        .await?;
        Ok(ids.into_iter().collect())
    }

    /// Any object under the prefix counts; an artwork whose objects were all
    /// deleted looks the same as one that never existed.
    async fn exists(&self, id: &str) -> CatalogResult<bool> {
        let page = self
            .client
            .list_objects(ListObjectsParams {
                prefix: Some(Self::prefix_for(id)?),
                max_keys: Some(1),
                ..ListObjectsParams::default()
            })
            .await?;
        Ok(!page.keys.is_empty())
    }

    async fn create_namespace(&self, id: &str) -> CatalogResult<()> {
        let key = Self::key_for(id, PLACEHOLDER_OBJECT)?;
        self.client
            .put_object(&key, Bytes::new(), "text/plain")
            .await?;
        debug!(bucket = self.client.bucket(), key = %key, "created placeholder");
        Ok(())
    }

    async fn list_files(&self, id: &str) -> CatalogResult<Vec<String>> {
        let prefix = Self::prefix_for(id)?;
        let mut files = Vec::new();
        let params = ListObjectsParams {
            prefix: Some(prefix.clone()),
            ..ListObjectsParams::default()
        };
        self.for_each_page(params, |page| {
            for key in page.keys {
                let Some(rel) = key.strip_prefix(&prefix) else {
                    continue;
                };
                // The namespace is flat; nested keys are ignored.
                if rel.is_empty() || rel.contains('/') {
                    continue;
                }
                files.push(rel.to_string());
            }
        })
        .await?;
        files.sort();
        files.dedup();
        Ok(files)
    }

    async fn read_file(&self, id: &str, filename: &str) -> CatalogResult<Bytes> {
        let key = Self::key_for(id, filename)?;
        self.client.get_object(&key).await
    }

    async fn write_file(
        &self,
        id: &str,
        filename: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> CatalogResult<()> {
        let key = Self::key_for(id, filename)?;
        self.client.put_object(&key, bytes, content_type).await
    }

    async fn delete_file(&self, id: &str, filename: &str) -> CatalogResult<()> {
        let key = Self::key_for(id, filename)?;
        self.client.delete_object(&key).await
    }

    async fn resolve_ref(&self, id: &str, filename: &str) -> CatalogResult<AssetRef> {
        let key = Self::key_for(id, filename)?;
        let url = match &self.url_policy {
            UrlPolicy::Public { base_url } => Self::public_url(base_url, &key),
            UrlPolicy::Presigned { ttl } => self.client.presign_get(&key, *ttl).await?,
        };
        Ok(AssetRef::Url(url))
    }
}
