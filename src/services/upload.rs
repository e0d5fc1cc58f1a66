//! Image upload passthrough
//!
//! Two drivers: `local` writes `{uuid}.{ext}` under the upload directory,
//! `remote` forwards the bytes to a CDN-backed image endpoint and returns the
//! URL it answers with. Both enforce the MIME allow-list and size limit.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use crate::config::{UploadConfig, UploadDriver};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No file was uploaded")]
    Empty,

    #[error("File type {0} is not allowed")]
    InvalidType(String),

    #[error("File too large. Maximum size: {max} bytes")]
    TooLarge { max: u64 },

    #[error("Remote image endpoint is not configured")]
    NotConfigured,

    #[error("Failed to store file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image endpoint failed: {0}")]
    Remote(String),
}

impl UploadError {
    /// Whether the client sent something unacceptable (as opposed to a server fault)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            UploadError::Empty | UploadError::InvalidType(_) | UploadError::TooLarge { .. }
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadedImage {
    pub url: String,
    pub filename: String,
    pub size: u64,
    pub content_type: String,
}

#[derive(Debug, Deserialize)]
struct RemoteUploadResponse {
    url: String,
}

pub struct UploadService {
    config: UploadConfig,
    client: reqwest::Client,
}

impl UploadService {
    pub fn new(config: UploadConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    pub async fn store(&self, content_type: &str, data: Vec<u8>) -> Result<UploadedImage, UploadError> {
        if data.is_empty() {
            return Err(UploadError::Empty);
        }
        if !self.config.is_type_allowed(content_type) {
            return Err(UploadError::InvalidType(content_type.to_string()));
        }
        if data.len() as u64 > self.config.max_file_size {
            return Err(UploadError::TooLarge {
                max: self.config.max_file_size,
            });
        }

        let filename = format!("{}.{}", Uuid::new_v4(), self.config.get_extension(content_type));
        let size = data.len() as u64;

        let url = match self.config.driver {
            UploadDriver::Local => self.store_local(&filename, &data).await?,
            UploadDriver::Remote => self.store_remote(&filename, content_type, data).await?,
        };

        tracing::info!(filename = %filename, size, driver = ?self.config.driver, "Image uploaded");
        Ok(UploadedImage {
            url,
            filename,
            size,
            content_type: content_type.to_string(),
        })
    }

    async fn store_local(&self, filename: &str, data: &[u8]) -> Result<String, UploadError> {
        tokio::fs::create_dir_all(&self.config.path).await?;
        tokio::fs::write(self.config.path.join(filename), data).await?;
        Ok(format!("{}/{}", self.config.public_prefix.trim_end_matches('/'), filename))
    }

    async fn store_remote(&self, filename: &str, content_type: &str, data: Vec<u8>) -> Result<String, UploadError> {
        let endpoint = self
            .config
            .remote_endpoint
            .as_deref()
            .filter(|e| !e.is_empty())
            .ok_or(UploadError::NotConfigured)?;

        let part = reqwest::multipart::Part::bytes(data)
            .file_name(filename.to_string())
            .mime_str(content_type)
            .map_err(|e| UploadError::Remote(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let mut request = self.client.post(endpoint).multipart(form);
        if let Some(key) = self.config.remote_api_key.as_deref().filter(|k| !k.is_empty()) {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| UploadError::Remote(e.to_string()))?;
        if !response.status().is_success() {
            return Err(UploadError::Remote(format!("status {}", response.status())));
        }

        let body: RemoteUploadResponse = response
            .json()
            .await
            .map_err(|e| UploadError::Remote(e.to_string()))?;
        Ok(body.url)
    }
}
