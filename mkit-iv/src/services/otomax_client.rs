//! Otomax core system sink
//!
//! The external system of record accepts single-record inserts keyed by
//! serial number and may reject on duplicate or constraint violation.
//! Its rejection taxonomy is interpreted into a small outcome enum here;
//! the committer never sees raw HTTP.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use mkit_common::config::EndpointConfig;

use crate::models::VoucherRecord;

const USER_AGENT: &str = concat!("mkit-iv/", env!("CARGO_PKG_VERSION"));

/// Outcome of a core insert attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreInsertOutcome {
    /// Row accepted by the core
    Inserted,
    /// Core already holds this serial number
    Duplicate,
    /// Core refused the row (constraint violation etc.), reason verbatim
    Rejected(String),
}

/// Core sink transport errors
#[derive(Debug, Error)]
pub enum CoreSinkError {
    #[error("core system unreachable: {0}")]
    Unreachable(String),

    #[error("core write timed out after {0}ms")]
    Timeout(u64),

    #[error("core protocol error: {0}")]
    Protocol(String),
}

/// Pluggable external core capability
///
/// `exists` supports idempotent retries: a commit whose acknowledgment
/// was lost can be detected before writing again.
#[async_trait]
pub trait CoreSink: Send + Sync {
    async fn insert(&self, record: &VoucherRecord) -> Result<CoreInsertOutcome, CoreSinkError>;
    async fn exists(&self, serial_number: &str) -> Result<bool, CoreSinkError>;
}

/// Insert payload for the core endpoint
#[derive(Debug, Serialize)]
struct CoreInsertRequest<'a> {
    serial_number: &'a str,
    voucher_number: Option<&'a str>,
    expiry_date: Option<&'a str>,
    denomination: i64,
    product_code: &'a str,
}

/// HTTP client for the Otomax insert endpoint
pub struct OtomaxClient {
    http_client: reqwest::Client,
    base_url: String,
    timeout_ms: u64,
}

impl OtomaxClient {
    pub fn new(config: &EndpointConfig) -> Result<Self, CoreSinkError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| CoreSinkError::Unreachable(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout_ms: config.timeout_ms,
        })
    }

    fn map_transport_error(&self, e: reqwest::Error) -> CoreSinkError {
        if e.is_timeout() {
            CoreSinkError::Timeout(self.timeout_ms)
        } else {
            CoreSinkError::Unreachable(e.to_string())
        }
    }
}

#[async_trait]
impl CoreSink for OtomaxClient {
    async fn insert(&self, record: &VoucherRecord) -> Result<CoreInsertOutcome, CoreSinkError> {
        let url = format!("{}/vouchers", self.base_url);
        let payload = CoreInsertRequest {
            serial_number: &record.serial_number,
            voucher_number: record.voucher_number.as_deref(),
            expiry_date: record.expiry_date.as_deref(),
            denomination: record.denomination,
            product_code: &record.product_code,
        };

        tracing::debug!(serial = %record.serial_number, "Core insert");

        let response = self
            .http_client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        match response.status().as_u16() {
            200 | 201 => Ok(CoreInsertOutcome::Inserted),
            409 => Ok(CoreInsertOutcome::Duplicate),
            400 | 422 => {
                let reason = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "constraint violation".to_string());
                Ok(CoreInsertOutcome::Rejected(reason))
            }
            other => Err(CoreSinkError::Protocol(format!(
                "unexpected HTTP {} from core insert",
                other
            ))),
        }
    }

    async fn exists(&self, serial_number: &str) -> Result<bool, CoreSinkError> {
        let url = format!("{}/vouchers/{}", self.base_url, serial_number);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        match response.status().as_u16() {
            200 => Ok(true),
            404 => Ok(false),
            other => Err(CoreSinkError::Protocol(format!(
                "unexpected HTTP {} from core lookup",
                other
            ))),
        }
    }
}
