//! Remote optimizer client.
//!
//! Talks to the Kraken-style optimization service: one credential
//! validation call and one multipart upload per candidate file. Service
//! rejections and transport failures are both folded into a failed
//! [`OptimizationResult`] rather than surfaced as errors; the coordinator
//! treats them identically and only reports them differently.

use crate::config::NetworkConfig;
use crate::error::{RekrakeError, Result};
use async_trait::async_trait;
use reqwest::multipart;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

/// Prefix marking transport-level failures in `error_message`, so reports
/// can distinguish network problems from service rejections.
pub const TRANSPORT_ERROR_PREFIX: &str = "network error: ";

/// Outcome of one upload attempt. Never persisted.
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    pub success: bool,
    pub error_message: Option<String>,
    pub original_size: u64,
    pub optimized_size: u64,
    pub saved_bytes: i64,
    pub artifact_url: Option<String>,
}

impl OptimizationResult {
    /// A failed attempt where the service answered and said no.
    pub fn service_failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
            original_size: 0,
            optimized_size: 0,
            saved_bytes: 0,
            artifact_url: None,
        }
    }

    /// A failed attempt that never reached the service.
    pub fn transport_failure(message: impl std::fmt::Display) -> Self {
        Self::service_failure(format!("{}{}", TRANSPORT_ERROR_PREFIX, message))
    }

    /// True if the failure was below the service level.
    pub fn is_transport_failure(&self) -> bool {
        self.error_message
            .as_deref()
            .is_some_and(|m| m.starts_with(TRANSPORT_ERROR_PREFIX))
    }
}

/// Account state returned by credential validation.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountStatus {
    pub active: bool,
    #[serde(default)]
    pub plan_name: Option<String>,
    #[serde(default)]
    pub quota_total: Option<u64>,
    #[serde(default)]
    pub quota_used: Option<u64>,
}

/// Seam for the upload step, implemented by [`KrakenClient`] in
/// production and by stubs in coordinator tests.
#[async_trait]
pub trait Optimizer: Send + Sync {
    /// Upload a file and return the attempt's outcome. Must not touch the
    /// local filesystem and must not return `Err` for ordinary service or
    /// transport failures.
    async fn optimize(&self, path: &Path, lossy: bool) -> OptimizationResult;
}

#[derive(Debug, Serialize)]
struct AuthPayload<'a> {
    api_key: &'a str,
    api_secret: &'a str,
}

#[derive(Debug, Serialize)]
struct UploadRequest<'a> {
    auth: AuthPayload<'a>,
    wait: bool,
    lossy: bool,
}

#[derive(Debug, Serialize)]
struct StatusRequest<'a> {
    auth: AuthPayload<'a>,
}

/// Wire reply of the upload endpoint. Field names are the service's.
#[derive(Debug, Clone, Deserialize)]
struct UploadReply {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    original_size: Option<u64>,
    #[serde(default)]
    kraked_size: Option<u64>,
    #[serde(default)]
    saved_bytes: Option<i64>,
    #[serde(default)]
    kraked_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct StatusReply {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    active: Option<bool>,
    #[serde(default)]
    plan_name: Option<String>,
    #[serde(default)]
    quota_total: Option<u64>,
    #[serde(default)]
    quota_used: Option<u64>,
}

/// HTTP client for the optimization service.
pub struct KrakenClient {
    http: reqwest::Client,
    api_key: String,
    api_secret: String,
    upload_url: String,
    status_url: String,
}

impl KrakenClient {
    /// Create a client against the production endpoints.
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Result<Self> {
        Self::with_endpoints(
            api_key,
            api_secret,
            NetworkConfig::UPLOAD_URL,
            NetworkConfig::USER_STATUS_URL,
        )
    }

    /// Create a client against custom endpoints.
    pub fn with_endpoints(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        upload_url: impl Into<String>,
        status_url: impl Into<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(NetworkConfig::REQUEST_TIMEOUT)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| RekrakeError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(e),
            })?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            upload_url: upload_url.into(),
            status_url: status_url.into(),
        })
    }

    /// Get a reference to the underlying reqwest client.
    pub fn inner(&self) -> &reqwest::Client {
        &self.http
    }

    fn auth(&self) -> AuthPayload<'_> {
        AuthPayload {
            api_key: &self.api_key,
            api_secret: &self.api_secret,
        }
    }

    /// Validate credentials against the user-status endpoint.
    ///
    /// The one fatal call: a run must abort before touching any file if
    /// this fails.
    pub async fn validate_credentials(&self) -> Result<AccountStatus> {
        let body = serde_json::to_string(&StatusRequest { auth: self.auth() })?;

        let response = self
            .http
            .post(&self.status_url)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| RekrakeError::Network {
                message: format!("POST {} failed: {}", self.status_url, e),
                source: Some(e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RekrakeError::Credential {
                message: format!("user status returned HTTP {}", status),
            });
        }

        let reply: StatusReply = response.json().await.map_err(|e| RekrakeError::Network {
            message: format!("Invalid user status reply: {}", e),
            source: Some(e),
        })?;

        if !reply.success {
            return Err(RekrakeError::Credential {
                message: reply
                    .error
                    .unwrap_or_else(|| "credentials rejected".to_string()),
            });
        }

        Ok(AccountStatus {
            active: reply.active.unwrap_or(true),
            plan_name: reply.plan_name,
            quota_total: reply.quota_total,
            quota_used: reply.quota_used,
        })
    }

    async fn upload(&self, path: &Path, lossy: bool) -> Result<UploadReply> {
        let request = UploadRequest {
            auth: self.auth(),
            wait: true,
            lossy,
        };
        let data = serde_json::to_string(&request)?;

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| RekrakeError::io_with_path(e, path))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        debug!("Uploading {} ({} bytes)", path.display(), bytes.len());

        let form = multipart::Form::new()
            .text("data", data)
            .part("upload", multipart::Part::bytes(bytes).file_name(file_name));

        let response = self
            .http
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| RekrakeError::Network {
                message: format!("POST {} failed: {}", self.upload_url, e),
                source: Some(e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RekrakeError::Service {
                message: format!("upload returned HTTP {}", status),
            });
        }

        response.json().await.map_err(|e| RekrakeError::Network {
            message: format!("Invalid upload reply: {}", e),
            source: Some(e),
        })
    }
}

impl UploadReply {
    fn into_result(self) -> OptimizationResult {
        if !self.success {
            return OptimizationResult::service_failure(
                self.error
                    .unwrap_or_else(|| "optimization rejected".to_string()),
            );
        }

        let original_size = self.original_size.unwrap_or(0);
        let optimized_size = self.kraked_size.unwrap_or(original_size);
        let saved_bytes = self
            .saved_bytes
            .unwrap_or(original_size as i64 - optimized_size as i64);

        OptimizationResult {
            success: true,
            error_message: None,
            original_size,
            optimized_size,
            saved_bytes,
            artifact_url: self.kraked_url,
        }
    }
}

#[async_trait]
impl Optimizer for KrakenClient {
    async fn optimize(&self, path: &Path, lossy: bool) -> OptimizationResult {
        match self.upload(path, lossy).await {
            Ok(reply) => reply.into_result(),
            Err(e) if e.is_transport() => {
                warn!("Upload of {} failed in transport: {}", path.display(), e);
                OptimizationResult::transport_failure(e)
            }
            Err(e) => {
                warn!("Upload of {} rejected: {}", path.display(), e);
                OptimizationResult::service_failure(e.to_string())
            }
        }
    }
}
