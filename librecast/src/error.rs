//! Error types for Recast

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RecastError>;

#[derive(Error, Debug)]
pub enum RecastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Slot error: {0}")]
    Slot(#[from] SlotError),
}

impl RecastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            RecastError::Config(_) => 2,
            RecastError::Slot(_) => 1,
        }
    }
}

/// Fatal startup errors. Anything here fails fast before any task starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid base URL for {service}: {url}")]
    InvalidBaseUrl { service: String, url: String },

    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Per-step failures inside an account cycle.
///
/// All of these are caught at the account loop boundary: the slot (or the
/// cycle, for `NoItemsAvailable`) is skipped and the loop moves on. None of
/// them ever escape to crash the fleet or a sibling account task.
#[derive(Error, Debug, Clone)]
pub enum SlotError {
    #[error("Malformed post time {0:?}, expected HH:MM")]
    MalformedTime(String),

    #[error("No items available in library {0}")]
    NoItemsAvailable(String),

    #[error("Variant generation failed: {0}")]
    VariantGenerationFailed(String),

    #[error("Unsupported network: {0}")]
    UnsupportedNetwork(String),

    #[error("Publish adapter call failed for {network}: {reason}")]
    PublishAdapter { network: String, reason: String },

    #[error("Fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Account {0} has no access token")]
    MissingAccessToken(String),
}
