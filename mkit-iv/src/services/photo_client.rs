//! Photo search client
//!
//! Read-only lookup of stored voucher photos by serial number or batch.
//! Not on the write path; failures here never affect the pipeline.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use mkit_common::config::EndpointConfig;

const USER_AGENT: &str = concat!("mkit-iv/", env!("CARGO_PKG_VERSION"));

/// Stored photo reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhotoRef {
    pub url: String,
    pub captured_at: Option<String>,
}

#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("photo service unreachable: {0}")]
    Unreachable(String),

    #[error("photo service protocol error: {0}")]
    Protocol(String),
}

#[derive(Debug, Deserialize)]
struct PhotoSearchResponse {
    photos: Vec<PhotoRef>,
}

/// HTTP client for the photo search service
pub struct PhotoClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl PhotoClient {
    pub fn new(config: &EndpointConfig) -> Result<Self, PhotoError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| PhotoError::Unreachable(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn by_serial(&self, serial_number: &str) -> Result<Vec<PhotoRef>, PhotoError> {
        self.search(&format!("{}/photos?serial={}", self.base_url, serial_number))
            .await
    }

    pub async fn by_batch(&self, batch_id: Uuid) -> Result<Vec<PhotoRef>, PhotoError> {
        self.search(&format!("{}/photos?batch={}", self.base_url, batch_id))
            .await
    }

    async fn search(&self, url: &str) -> Result<Vec<PhotoRef>, PhotoError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| PhotoError::Unreachable(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PhotoError::Protocol(format!(
                "HTTP {} from photo service",
                response.status().as_u16()
            )));
        }

        let body: PhotoSearchResponse = response
            .json()
            .await
            .map_err(|e| PhotoError::Protocol(e.to_string()))?;
        Ok(body.photos)
    }
}
