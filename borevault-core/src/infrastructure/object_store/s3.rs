// borevault-core/src/infrastructure/object_store/s3.rs
//
// S3 backend. Credentials resolve through the standard provider chain;
// bucket and region are injected at construction. A HeadBucket probe runs
// once on first use and only ever logs — an unreachable bucket must not
// fail process startup.

use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::infrastructure::error::ObjectStoreError;
use crate::ports::object_store::{guard_against_overwrite, ObjectStore};

#[derive(Debug)]
pub struct S3Store {
    client: Client,
    bucket: String,
    probe: OnceCell<()>,
}

impl S3Store {
    pub fn new(client: Client, bucket: &str) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
            probe: OnceCell::new(),
        }
    }

    /// Build a client from the ambient credential chain.
    pub async fn from_env(bucket: &str, region: &str) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .load()
            .await;
        Self::new(Client::new(&config), bucket)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// One-shot read-only connectivity check. Logs and never fails.
    async fn verify_connectivity(&self) {
        self.probe
            .get_or_init(|| async {
                match self.client.head_bucket().bucket(&self.bucket).send().await {
                    Ok(_) => info!(bucket = %self.bucket, "bucket reachable"),
                    Err(e) => warn!(
                        bucket = %self.bucket,
                        error = %DisplayErrorContext(&e),
                        "bucket connectivity check failed"
                    ),
                }
            })
            .await;
    }

    fn transport<E: std::fmt::Display>(key: &str, err: E) -> ObjectStoreError {
        ObjectStoreError::Transport(format!("{key}: {err}"))
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        allow_overwrite: bool,
    ) -> Result<(), ObjectStoreError> {
        self.verify_connectivity().await;
        if !allow_overwrite {
            guard_against_overwrite(self, key).await?;
        }

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| Self::transport(key, DisplayErrorContext(&e)))?;
        debug!(key, "wrote s3 object");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, ObjectStoreError> {
        self.verify_connectivity().await;
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service = e.into_service_error();
                if service.is_no_such_key() {
                    ObjectStoreError::NotFound(key.to_string())
                } else {
                    ObjectStoreError::Transport(format!("{key}: {service}"))
                }
            })?;

        let data = response
            .body
            .collect()
            .await
            .map_err(|e| Self::transport(key, e))?;
        Ok(data.into_bytes())
    }

    async fn head(&self, key: &str) -> Result<bool, ObjectStoreError> {
        self.verify_connectivity().await;
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let service = e.into_service_error();
                if service.is_not_found() {
                    Ok(false)
                } else {
                    Err(ObjectStoreError::Transport(format!(
                        "{key}: {} ({:?})",
                        service,
                        service.code()
                    )))
                }
            }
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, ObjectStoreError> {
        self.verify_connectivity().await;
        let mut keys = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| Self::transport(prefix, DisplayErrorContext(&e)))?;
            for object in page.contents() {
                if let Some(key) = object.key() {
                    keys.push(key.to_string());
                }
            }
        }
        Ok(keys)
    }
}
