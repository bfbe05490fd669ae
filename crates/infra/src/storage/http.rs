//! Storage REST client (`/storage/v1/object/{bucket}/{path}`).

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, instrument};

use super::{ObjectStore, StorageError};

/// One bucket on a hosted storage service, addressed over HTTP.
///
/// Requests authenticate with the service key both as a bearer token and as the
/// `apikey` header. Uploads set `x-upsert` so re-running a job overwrites its output.
#[derive(Clone)]
pub struct HttpObjectStore {
    client: reqwest::Client,
    base_url: String,
    bucket: String,
    key: String,
}

impl HttpObjectStore {
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        bucket: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    pub fn object_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            self.bucket,
            path.trim_start_matches('/')
        )
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.bearer_auth(&self.key).header("apikey", &self.key)
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    #[instrument(skip(self), fields(bucket = %self.bucket), err)]
    async fn get(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let resp = self
            .authorize(self.client.get(self.object_url(path)))
            .send()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StorageError::NotFound {
                bucket: self.bucket.clone(),
                path: path.to_string(),
            });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StorageError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;
        debug!(size = bytes.len(), "downloaded object");
        Ok(bytes.to_vec())
    }

    #[instrument(skip(self, bytes), fields(bucket = %self.bucket, size = bytes.len()), err)]
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        let resp = self
            .authorize(self.client.post(self.object_url(path)))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await
            .map_err(|e| StorageError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StorageError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}
