//! Variant generation requests
//!
//! Every publish uses a freshly transformed rendition of the source asset
//! rather than the master file, so repeated posts across accounts never
//! share identical media. The requester invokes the variant collaborator
//! once and propagates success or failure; it never retries and the caller
//! must never substitute the unmodified master on failure.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::SlotError;

/// Number of transformation profiles the variant service cycles through.
pub const TRANSFORM_PROFILES: usize = 5;

/// Map an explicit seed to a transformation profile index.
///
/// The mapping is a stable function of the seed bytes (SHA-256, first eight
/// bytes, big-endian, mod the profile count) so two requests with the same
/// seed select the same profile regardless of process or platform. Omitted
/// seeds are generated fresh per call and make no reproducibility promise.
pub fn transform_profile(seed: &str) -> usize {
    let digest = Sha256::digest(seed.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % TRANSFORM_PROFILES as u64) as usize
}

/// The variant collaborator seam. Possibly slow (it transcodes), possibly
/// failing; the core treats it as opaque.
#[async_trait]
pub trait VariantService: Send + Sync {
    /// Request a platform-tailored rendition of `file_url` and return the
    /// retrievable URL of the result.
    async fn request_variant(
        &self,
        file_url: &str,
        platform: &str,
        seed: Option<&str>,
    ) -> Result<String, SlotError>;
}

#[derive(Deserialize)]
struct VariantResponse {
    cdn_url: String,
}

/// HTTP client for the variant collaborator.
pub struct HttpVariantService {
    base: String,
    http: reqwest::Client,
}

impl HttpVariantService {
    pub fn new(base: &str, timeout: Duration) -> Result<Self, SlotError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SlotError::VariantGenerationFailed(e.to_string()))?;
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            http,
        })
    }
}

#[async_trait]
impl VariantService for HttpVariantService {
    async fn request_variant(
        &self,
        file_url: &str,
        platform: &str,
        seed: Option<&str>,
    ) -> Result<String, SlotError> {
        let seed = seed
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        debug!(
            "Requesting variant for platform {} with profile {}",
            platform,
            transform_profile(&seed)
        );

        let url = format!("{}/variant", self.base);
        let body = json!({
            "file_url": file_url,
            "platform": platform,
            "seed": seed,
        });

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| SlotError::VariantGenerationFailed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SlotError::VariantGenerationFailed(format!(
                "status {}",
                status
            )));
        }

        let parsed: VariantResponse = resp
            .json()
            .await
            .map_err(|e| SlotError::VariantGenerationFailed(e.to_string()))?;
        Ok(parsed.cdn_url)
    }
}
