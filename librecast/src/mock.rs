//! Mock collaborators for testing
//!
//! Configurable in-memory stand-ins for the inventory service, the variant
//! service, and the publish adapters, with call counters and recorded
//! payloads. Available for all builds (not just tests) to support
//! integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::SlotError;
use crate::inventory::Inventory;
use crate::publish::{PublishAdapter, PublishOutcome};
use crate::types::{Account, Caption, Library, LibraryItem, Network, Schedule};
use crate::variant::VariantService;

/// In-memory inventory snapshot. The record vectors can be swapped at
/// runtime to simulate accounts appearing and disappearing between
/// discovery passes.
#[derive(Default)]
pub struct MockInventory {
    accounts: Mutex<Vec<Account>>,
    schedules: Mutex<Vec<Schedule>>,
    libraries: Mutex<Vec<Library>>,
    items: Mutex<Vec<LibraryItem>>,
    captions: Mutex<Vec<Caption>>,
    /// Total list calls served, across all endpoints.
    pub calls: AtomicUsize,
}

impl MockInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_accounts(&self, accounts: Vec<Account>) {
        *self.accounts.lock().unwrap() = accounts;
    }

    pub fn set_schedules(&self, schedules: Vec<Schedule>) {
        *self.schedules.lock().unwrap() = schedules;
    }

    pub fn set_libraries(&self, libraries: Vec<Library>) {
        *self.libraries.lock().unwrap() = libraries;
    }

    pub fn set_items(&self, items: Vec<LibraryItem>) {
        *self.items.lock().unwrap() = items;
    }

    pub fn set_captions(&self, captions: Vec<Caption>) {
        *self.captions.lock().unwrap() = captions;
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Inventory for MockInventory {
    async fn accounts(&self) -> Vec<Account> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.accounts.lock().unwrap().clone()
    }

    async fn schedules(&self, account_id: &str) -> Vec<Schedule> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.schedules
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.account_id == account_id)
            .cloned()
            .collect()
    }

    async fn libraries(&self) -> Vec<Library> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.libraries.lock().unwrap().clone()
    }

    async fn items(&self, library_id: &str) -> Vec<LibraryItem> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.items
            .lock()
            .unwrap()
            .iter()
            .filter(|i| i.library_id == library_id)
            .cloned()
            .collect()
    }

    async fn captions(&self, item_id: &str) -> Vec<Caption> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.captions
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.library_item_id == item_id)
            .cloned()
            .collect()
    }
}

/// Mock variant service that records requests.
pub struct MockVariantService {
    succeeds: bool,
    /// (file_url, platform, seed) triples, in call order.
    pub requests: Mutex<Vec<(String, String, Option<String>)>>,
}

impl MockVariantService {
    pub fn success() -> Self {
        Self {
            succeeds: true,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failure() -> Self {
        Self {
            succeeds: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl VariantService for MockVariantService {
    async fn request_variant(
        &self,
        file_url: &str,
        platform: &str,
        seed: Option<&str>,
    ) -> Result<String, SlotError> {
        self.requests.lock().unwrap().push((
            file_url.to_string(),
            platform.to_string(),
            seed.map(str::to_string),
        ));

        if self.succeeds {
            Ok(format!("https://cdn.mock/{}-variant.mp4", platform))
        } else {
            Err(SlotError::VariantGenerationFailed(
                "mock transcode failed".to_string(),
            ))
        }
    }
}

/// Mock publish adapter that records every payload it receives.
pub struct MockPublishAdapter {
    network: Network,
    status: u16,
    body: String,
    payloads: Arc<Mutex<Vec<Value>>>,
}

impl MockPublishAdapter {
    pub fn success(network: Network) -> Self {
        Self::with_status(network, 200, "{\"ok\":true}")
    }

    pub fn with_status(network: Network, status: u16, body: &str) -> Self {
        Self {
            network,
            status,
            body: body.to_string(),
            payloads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Handle to the recorded payloads; stays valid after the adapter is
    /// boxed into a dispatcher.
    pub fn payloads_handle(&self) -> Arc<Mutex<Vec<Value>>> {
        self.payloads.clone()
    }

    pub fn publish_count(&self) -> usize {
        self.payloads.lock().unwrap().len()
    }
}

#[async_trait]
impl PublishAdapter for MockPublishAdapter {
    fn network(&self) -> Network {
        self.network
    }

    async fn publish(&self, payload: &Value) -> Result<PublishOutcome, SlotError> {
        self.payloads.lock().unwrap().push(payload.clone());
        Ok(PublishOutcome {
            status: self.status,
            body: self.body.clone(),
        })
    }
}
