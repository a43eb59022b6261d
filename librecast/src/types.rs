//! Core types for Recast
//!
//! All inventory entities here are read-only views fetched from the
//! inventory collaborator. The core never mutates or persists them; each
//! account cycle re-fetches fresh snapshots and tolerates staleness.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SlotError;

/// The closed set of publishable networks.
///
/// Extending this set is a code change: a new variant, a payload shape in
/// `publish::build_payload`, and an adapter base URL in the config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Instagram,
    Tiktok,
    Youtube,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Instagram => "instagram",
            Network::Tiktok => "tiktok",
            Network::Youtube => "youtube",
        }
    }

    /// All supported networks, in a stable order.
    pub fn all() -> [Network; 3] {
        [Network::Instagram, Network::Tiktok, Network::Youtube]
    }
}

impl FromStr for Network {
    type Err = SlotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "instagram" => Ok(Network::Instagram),
            "tiktok" => Ok(Network::Tiktok),
            "youtube" => Ok(Network::Youtube),
            other => Err(SlotError::UnsupportedNetwork(other.to_string())),
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A network identity eligible to receive scheduled posts.
///
/// `network` stays a plain string here because the inventory may serve
/// values outside the closed set; those surface as `UnsupportedNetwork`
/// when the dispatcher parses them, never as a deserialization failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub network: String,
    pub external_user_id: String,
    pub handle: String,
    pub access_token: Option<String>,
}

impl Account {
    /// An account with no access token is never eligible for publishing.
    pub fn has_credentials(&self) -> bool {
        self.access_token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// An ordered list of daily post times ("HH:MM") for one account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: String,
    pub account_id: String,
    pub post_times: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Library {
    pub id: String,
    pub name: String,
}

/// A source media asset available for posting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryItem {
    pub id: String,
    pub library_id: String,
    pub master_url: String,
    pub title: Option<String>,
}

/// Platform-tagged text associated with one library item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Caption {
    pub id: String,
    pub library_item_id: String,
    pub platform: String,
    pub body: String,
}
