//! Verification of personal identities through an external service.
//!
//! The service follows an order/collect protocol: `auth` starts an order
//! for a personal number, then `collect` is polled until the order is
//! complete or has failed.

use crate::config::IdentityConfig;
use async_trait::async_trait;
use podium_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// The person behind a completed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedUser {
    pub personal_number: String,
    pub name: String,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub surname: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionData {
    pub user: VerifiedUser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectStatus {
    Pending,
    Complete,
    Failed,
}

/// One answer of the `collect` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectResponse {
    pub order_ref: String,
    pub status: CollectStatus,
    #[serde(default)]
    pub hint_code: Option<String>,
    /// Present once the order is complete.
    #[serde(default)]
    pub completion_data: Option<CompletionData>,
}

/// Confirms that the holder of a personal number is present.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Starts an order and waits until it is no longer pending.
    ///
    /// Returns the final collect response; callers must still check that it
    /// carries completion data.
    async fn authenticate_and_collect(
        &self,
        personal_number: &str,
        end_user_ip: &str,
    ) -> Result<CollectResponse>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AuthRequest<'a> {
    personal_number: &'a str,
    end_user_ip: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthResponse {
    order_ref: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CollectRequest<'a> {
    order_ref: &'a str,
}

/// [`IdentityVerifier`] talking JSON over HTTP.
pub struct HttpIdentityVerifier {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    poll_interval: Duration,
}

impl HttpIdentityVerifier {
    pub fn new(base_url: &str, config: &IdentityConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Internal(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(config.timeout_secs),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        })
    }

    async fn post<B: Serialize + ?Sized, T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T> {
        let url = format!("{}/{}", self.base_url, endpoint);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("{} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!("{} returned {}: {}", url, status, text)));
        }
        response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("invalid response from {}: {}", url, e)))
    }

    async fn run(&self, personal_number: &str, end_user_ip: &str) -> Result<CollectResponse> {
        let order: AuthResponse = self
            .post(
                "auth",
                &AuthRequest {
                    personal_number,
                    end_user_ip,
                },
            )
            .await?;
        info!(order_ref = %order.order_ref, "identity order started");

        loop {
            let collected: CollectResponse = self
                .post(
                    "collect",
                    &CollectRequest {
                        order_ref: &order.order_ref,
                    },
                )
                .await?;
            match collected.status {
                CollectStatus::Pending => {
                    debug!(order_ref = %order.order_ref, hint = ?collected.hint_code, "order pending");
                    tokio::time::sleep(self.poll_interval).await;
                }
                CollectStatus::Complete => return Ok(collected),
                CollectStatus::Failed => {
                    warn!(order_ref = %order.order_ref, hint = ?collected.hint_code, "order failed");
                    return Err(Error::Upstream(format!(
                        "identity verification failed: {}",
                        collected.hint_code.as_deref().unwrap_or("unknown reason")
                    )));
                }
            }
        }
    }
}

#[async_trait]
impl IdentityVerifier for HttpIdentityVerifier {
    async fn authenticate_and_collect(
        &self,
        personal_number: &str,
        end_user_ip: &str,
    ) -> Result<CollectResponse> {
        tokio::time::timeout(self.timeout, self.run(personal_number, end_user_ip))
            .await
            .map_err(|_| {
                Error::Timeout(format!(
                    "identity verification did not complete within {:?}",
                    self.timeout
                ))
            })?
    }
}
