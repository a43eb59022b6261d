//! Recast - posting orchestration for recurring social accounts
//!
//! This library decides when each configured account posts next, selects
//! content, requests a freshly transformed media variant, and dispatches a
//! normalized publish request to the right network adapter. Failures are
//! absorbed per slot so that one account's problem never halts the fleet.

pub mod cadence;
pub mod config;
pub mod error;
pub mod fleet;
pub mod inventory;
pub mod logging;
pub mod mock;
pub mod publish;
pub mod ratelimit;
pub mod scheduler;
pub mod select;
pub mod types;
pub mod variant;

// Re-export commonly used types
pub use config::Config;
pub use error::{ConfigError, RecastError, Result, SlotError};
pub use publish::{Dispatcher, PublishOutcome};
pub use types::{Account, Caption, Library, LibraryItem, Network, Schedule};
