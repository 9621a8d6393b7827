//! [`ObjectClient`] implementation over the AWS S3 SDK.
//!
//! Path-style addressing is always enabled because most S3-compatible
//! providers (MinIO, R2, Railway buckets) expect it when a custom endpoint is
//! configured.

use super::object_store::{ListObjectsPage, ListObjectsParams, ObjectClient};
use crate::config::ObjectStoreConfig;
use crate::errors::{CatalogError, CatalogResult};
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{Builder as S3ConfigBuilder, Credentials, Region},
    error::{DisplayErrorContext, SdkError},
    presigning::PresigningConfig,
    primitives::ByteStream,
};
use bytes::Bytes;
use std::{fmt::Debug, time::Duration};

pub struct S3ObjectClient {
    client: Client,
    bucket: String,
}

impl S3ObjectClient {
    /// Build a client from the resolved object-store configuration. Static
    /// credentials are used when both halves are configured; otherwise the
    /// default AWS provider chain applies.
    pub async fn connect(cfg: &ObjectStoreConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()));
        if let (Some(access_key), Some(secret_key)) = (&cfg.access_key_id, &cfg.secret_access_key)
        {
            loader = loader.credentials_provider(Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None,
                None,
                "artwork-store",
            ));
        }
        let shared = loader.load().await;

        let mut builder = S3ConfigBuilder::from(&shared).force_path_style(true);
        if let Some(endpoint) = &cfg.endpoint {
            builder = builder.endpoint_url(endpoint.trim_end_matches('/'));
        }

        Self {
            client: Client::from_conf(builder.build()),
            bucket: cfg.bucket.clone(),
        }
    }
}

fn sdk_error<E, R>(err: SdkError<E, R>) -> CatalogError
where
    E: std::error::Error + 'static,
    R: Debug,
{
    CatalogError::Backend(DisplayErrorContext(err).to_string())
}

#[async_trait]
impl ObjectClient for S3ObjectClient {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list_objects(&self, params: ListObjectsParams) -> CatalogResult<ListObjectsPage> {
        let out = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .set_prefix(params.prefix)
            .set_delimiter(params.delimiter)
            .set_continuation_token(params.continuation_token)
            .set_max_keys(params.max_keys)
            .send()
            .await
            .map_err(sdk_error)?;

        Ok(ListObjectsPage {
            keys: out
                .contents()
                .iter()
                .filter_map(|obj| obj.key().map(str::to_string))
                .collect(),
            common_prefixes: out
                .common_prefixes()
                .iter()
                .filter_map(|p| p.prefix().map(str::to_string))
                .collect(),
            is_truncated: out.is_truncated().unwrap_or(false),
            next_continuation_token: out.next_continuation_token().map(str::to_string),
        })
    }

    async fn get_object(&self, key: &str) -> CatalogResult<Bytes> {
        let out = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                if err.as_service_error().is_some_and(|e| e.is_no_such_key()) {
                    CatalogError::NotFound("file".into())
                } else {
                    sdk_error(err)
                }
            })?;
        let data = out.body.collect().await.map_err(CatalogError::backend)?;
        Ok(data.into_bytes())
    }

    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> CatalogResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> CatalogResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(sdk_error)?;
        Ok(())
    }

    async fn head_object(&self, key: &str) -> CatalogResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => Ok(false),
            Err(err) => Err(sdk_error(err)),
        }
    }

    async fn presign_get(&self, key: &str, ttl: Duration) -> CatalogResult<String> {
        let presigning = PresigningConfig::expires_in(ttl).map_err(CatalogError::backend)?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(sdk_error)?;
        Ok(request.uri().to_string())
    }
}
