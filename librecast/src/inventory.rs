//! Read-only client for the inventory collaborator
//!
//! The inventory contract signals absence by emptiness: every list endpoint
//! returns an ordered sequence or an empty one, and a transport failure is
//! treated as "no data" after being logged. Nothing here ever propagates a
//! hard failure into the scheduling loops.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::SlotError;
use crate::types::{Account, Caption, Library, LibraryItem, Schedule};

/// Read operations the core consumes. Implemented over HTTP in production
/// and by `mock::MockInventory` in tests.
#[async_trait]
pub trait Inventory: Send + Sync {
    async fn accounts(&self) -> Vec<Account>;
    async fn schedules(&self, account_id: &str) -> Vec<Schedule>;
    async fn libraries(&self) -> Vec<Library>;
    async fn items(&self, library_id: &str) -> Vec<LibraryItem>;
    async fn captions(&self, item_id: &str) -> Vec<Caption>;
}

/// HTTP inventory client with a per-call timeout.
pub struct HttpInventory {
    base: String,
    http: reqwest::Client,
}

impl HttpInventory {
    pub fn new(base: &str, timeout: Duration) -> Result<Self, SlotError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SlotError::Fetch {
                url: base.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// Fetch one list endpoint. The typed failure keeps the cause visible
    /// to the caller that absorbs it.
    async fn fetch_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, SlotError> {
        let url = format!("{}{}", self.base, path);
        let fetch_err = |reason: String| SlotError::Fetch {
            url: url.clone(),
            reason,
        };

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| fetch_err(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(fetch_err(format!("status {}", status)));
        }

        resp.json::<Vec<T>>()
            .await
            .map_err(|e| fetch_err(e.to_string()))
    }

    /// Absorb a fetch failure into emptiness, per the inventory contract.
    async fn list_or_empty<T: DeserializeOwned>(&self, path: &str) -> Vec<T> {
        match self.fetch_list(path).await {
            Ok(records) => records,
            Err(e) => {
                warn!("Inventory fetch failed, treating as empty: {}", e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl Inventory for HttpInventory {
    async fn accounts(&self) -> Vec<Account> {
        self.list_or_empty("/accounts").await
    }

    async fn schedules(&self, account_id: &str) -> Vec<Schedule> {
        self.list_or_empty(&format!("/schedules/{}", account_id)).await
    }

    async fn libraries(&self) -> Vec<Library> {
        self.list_or_empty("/libraries").await
    }

    async fn items(&self, library_id: &str) -> Vec<LibraryItem> {
        self.list_or_empty(&format!("/libraries/{}/items", library_id))
            .await
    }

    async fn captions(&self, item_id: &str) -> Vec<Caption> {
        self.list_or_empty(&format!("/captions/{}", item_id)).await
    }
}
