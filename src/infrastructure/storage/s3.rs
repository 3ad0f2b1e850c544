use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{BehaviorVersion, Builder, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::operation::get_object::GetObjectError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use uuid::Uuid;

use super::{BlobStore, StorageError, StorageResult};
use crate::config::settings::StorageSettings;

/// One bucket of an S3-compatible store (MinIO in deployment).
#[derive(Clone)]
pub struct StorageService {
    pub client: Client,
    pub bucket: String,
}

impl StorageService {
    pub fn client_for(settings: &StorageSettings) -> Client {
        let credentials = Credentials::new(
            &settings.access_key,
            &settings.secret_key,
            None,
            None,
            "static",
        );

        let config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .endpoint_url(&settings.endpoint)
            .credentials_provider(credentials)
            .force_path_style(true) // Required for MinIO
            .timeout_config(
                TimeoutConfig::builder()
                    .connect_timeout(Duration::from_secs(5))
                    .build(),
            )
            .build();

        Client::from_conf(config)
    }

    /// Opens `bucket` and checks that it is reachable.
    pub async fn new(client: Client, bucket: &str) -> StorageResult<Self> {
        client
            .head_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| {
                StorageError::unavailable(format!("bucket {}: {}", bucket, DisplayErrorContext(e)))
            })?;

        info!("✅ Connected to S3 bucket '{}'", bucket);

        Ok(Self {
            client,
            bucket: bucket.to_string(),
        })
    }
}

#[async_trait]
impl BlobStore for StorageService {
    async fn download(&self, id: &str, dest: &Path) -> StorageResult<u64> {
        debug!("Downloading {}/{} to {}", self.bucket, id, dest.display());

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(id)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(GetObjectError::is_no_such_key) {
                    StorageError::not_found(id)
                } else {
                    StorageError::unavailable(DisplayErrorContext(e))
                }
            })?;

        let mut body = response.body;
        let mut file = tokio::fs::File::create(dest).await?;
        let mut written = 0u64;

        while let Some(chunk) = body.try_next().await.map_err(StorageError::unavailable)? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        Ok(written)
    }

    async fn upload(&self, name: &str, src: &Path) -> StorageResult<String> {
        let id = Uuid::new_v4().simple().to_string();
        let content_type = mime_guess::from_path(name).first_or_octet_stream();
        debug!("Uploading {} to {}/{}", src.display(), self.bucket, id);

        let body = ByteStream::from_path(src)
            .await
            .map_err(|e| StorageError::Io(std::io::Error::other(e)))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&id)
            .body(body)
            .content_type(content_type.essence_str())
            .metadata("filename", name)
            .send()
            .await
            .map_err(|e| StorageError::unavailable(DisplayErrorContext(e)))?;

        Ok(id)
    }

    async fn delete(&self, id: &str) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(id)
            .send()
            .await
            .map_err(|e| StorageError::unavailable(DisplayErrorContext(e)))?;

        Ok(())
    }
}
