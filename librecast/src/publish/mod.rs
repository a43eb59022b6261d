//! Publish dispatch
//!
//! Maps an account's network to a normalized publish payload and the
//! adapter that accepts it. The dispatcher never interprets the adapter's
//! answer: status and body are forwarded upward for observability, and a
//! non-2xx response is not a failure here. Best effort, don't block the
//! fleet.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::error::SlotError;
use crate::types::{Account, Network};

pub mod http;

pub use http::HttpPublishAdapter;

/// Opaque adapter response: transport-level status plus raw body.
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    pub status: u16,
    pub body: String,
}

impl PublishOutcome {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// One network's publish collaborator.
#[async_trait]
pub trait PublishAdapter: Send + Sync {
    fn network(&self) -> Network;

    /// Send the normalized payload. `Err` means the call itself failed
    /// (transport, timeout); an unhappy adapter answer is still `Ok`.
    async fn publish(&self, payload: &Value) -> Result<PublishOutcome, SlotError>;
}

/// Build the normalized payload for `network`.
///
/// Field names are the adapters' wire contract. TikTok and YouTube fall
/// back to the item title when the caption is empty; Instagram allows an
/// empty caption as-is.
pub fn build_payload(
    network: Network,
    account: &Account,
    access_token: &str,
    variant_url: &str,
    caption: &str,
    item_title: Option<&str>,
) -> Value {
    let titled = if caption.is_empty() {
        item_title.unwrap_or("")
    } else {
        caption
    };

    match network {
        Network::Instagram => json!({
            "ig_user_id": account.external_user_id,
            "video_url": variant_url,
            "caption": caption,
            "access_token": access_token,
        }),
        Network::Tiktok => json!({
            "user_access_token": access_token,
            "video_url": variant_url,
            "title": titled,
        }),
        Network::Youtube => json!({
            "oauth_access_token": access_token,
            "file_url": variant_url,
            "title": titled,
            "description": titled,
            "privacy": "public",
        }),
    }
}

/// Routes publish requests to the adapter for the account's network.
pub struct Dispatcher {
    adapters: HashMap<Network, Box<dyn PublishAdapter>>,
}

impl Dispatcher {
    pub fn new(adapters: Vec<Box<dyn PublishAdapter>>) -> Self {
        Self {
            adapters: adapters.into_iter().map(|a| (a.network(), a)).collect(),
        }
    }

    /// Build the payload for `account` and execute the publish call.
    ///
    /// Fails with `UnsupportedNetwork` for networks outside the closed set
    /// or without a configured adapter, and `MissingAccessToken` when the
    /// account carries no credentials. The caller logs and skips; neither
    /// condition is allowed to abort the account loop.
    pub async fn dispatch(
        &self,
        account: &Account,
        variant_url: &str,
        caption: &str,
        item_title: Option<&str>,
    ) -> Result<PublishOutcome, SlotError> {
        let network: Network = account.network.parse()?;
        let access_token = account
            .access_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| SlotError::MissingAccessToken(account.id.clone()))?;

        let adapter = self
            .adapters
            .get(&network)
            .ok_or_else(|| SlotError::UnsupportedNetwork(account.network.clone()))?;

        let payload = build_payload(
            network,
            account,
            access_token,
            variant_url,
            caption,
            item_title,
        );
        debug!("Dispatching publish for account {} to {}", account.id, network);
        adapter.publish(&payload).await
    }
}
