//! HTTP publish adapter
//!
//! All platform adapters expose the same normalized surface: POST
//! `{base}/publish` with the network-shaped payload, answer with a status
//! and body the core forwards upward untouched.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::SlotError;
use crate::types::Network;

use super::{PublishAdapter, PublishOutcome};

pub struct HttpPublishAdapter {
    network: Network,
    base: String,
    http: reqwest::Client,
}

impl HttpPublishAdapter {
    pub fn new(network: Network, base: &str, timeout: Duration) -> Result<Self, SlotError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SlotError::PublishAdapter {
                network: network.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            network,
            base: base.trim_end_matches('/').to_string(),
            http,
        })
    }
}

#[async_trait]
impl PublishAdapter for HttpPublishAdapter {
    fn network(&self) -> Network {
        self.network
    }

    async fn publish(&self, payload: &Value) -> Result<PublishOutcome, SlotError> {
        let url = format!("{}/publish", self.base);
        let resp = self
            .http
            .post(&url)
            .json(payload)
            .send()
            .await
            .map_err(|e| SlotError::PublishAdapter {
                network: self.network.to_string(),
                reason: e.to_string(),
            })?;

        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Ok(PublishOutcome { status, body })
    }
}
