//! Otoplus serial verification client
//!
//! Advisory upstream check: reports whether a serial number was already
//! marked used/redeemed in the reseller platform. Timeout-bounded; a
//! timeout is surfaced as its own error so rejection reasons distinguish
//! transient from permanent failures.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use mkit_common::config::EndpointConfig;

const USER_AGENT: &str = concat!("mkit-iv/", env!("CARGO_PKG_VERSION"));

/// Upstream verdict for a serial number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Used,
    Unused,
    /// Upstream has no opinion; advisory, treated as pass
    Unknown,
}

/// Verification client errors
#[derive(Debug, Error)]
pub enum VerifierError {
    #[error("verification service unreachable: {0}")]
    Unreachable(String),

    #[error("verification request timed out after {0}ms")]
    Timeout(u64),

    #[error("verification protocol error: {0}")]
    Protocol(String),
}

/// Pluggable serial verification capability
#[async_trait]
pub trait SerialVerifier: Send + Sync {
    async fn verify(&self, serial_number: &str) -> Result<VerificationStatus, VerifierError>;
}

/// Otoplus lookup response
#[derive(Debug, Deserialize)]
struct OtoplusResponse {
    status: VerificationStatus,
}

/// HTTP client for the Otoplus verification endpoint
pub struct OtoplusClient {
    http_client: reqwest::Client,
    base_url: String,
    timeout_ms: u64,
}

impl OtoplusClient {
    pub fn new(config: &EndpointConfig) -> Result<Self, VerifierError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| VerifierError::Unreachable(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_ms: config.timeout_ms,
        })
    }
}

#[async_trait]
impl SerialVerifier for OtoplusClient {
    async fn verify(&self, serial_number: &str) -> Result<VerificationStatus, VerifierError> {
        let url = format!("{}/serials/{}", self.base_url, serial_number);
        tracing::debug!(serial = %serial_number, "Otoplus verification lookup");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    VerifierError::Timeout(self.timeout_ms)
                } else {
                    VerifierError::Unreachable(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(VerifierError::Protocol(format!(
                "HTTP {} from verification service",
                response.status().as_u16()
            )));
        }

        let body: OtoplusResponse = response
            .json()
            .await
            .map_err(|e| VerifierError::Protocol(e.to_string()))?;
        Ok(body.status)
    }
}
