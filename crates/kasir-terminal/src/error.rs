//! # Terminal Error Types
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Terminal Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │   Business      │  │  Configuration  │  │    Infrastructure       │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  Core           │  │  InvalidConfig  │  │  Db                     │ │
//! │  │  Commit         │  │  ConfigLoad     │  │  PersistFailed          │ │
//! │  │  CartHolding... │  │  ConfigSave     │  │                         │ │
//! │  │  LoyaltyDisabled│  │                 │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  Business errors leave state untouched. PersistFailed means memory      │
//! │  is ahead of the database until the writer catches up.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use kasir_core::{CommitError, CoreError};
use kasir_db::DbError;

pub type TerminalResult<T> = Result<T, TerminalError>;

#[derive(Debug, Error)]
pub enum TerminalError {
    // =========================================================================
    // Business Errors
    // =========================================================================
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Commit(#[from] CommitError),

    #[error("Cart holding is disabled on this terminal")]
    CartHoldingDisabled,

    #[error("Loyalty is disabled on this terminal")]
    LoyaltyDisabled,

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid terminal configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Infrastructure Errors
    // =========================================================================
    #[error("Database error: {0}")]
    Db(#[from] DbError),

    /// The persistence writer could not store a change. Memory stays the
    /// source of truth; the change is kept for `retry_failed`.
    #[error("Persistence failed: {0}")]
    PersistFailed(String),
}

impl From<std::io::Error> for TerminalError {
    fn from(err: std::io::Error) -> Self {
        TerminalError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for TerminalError {
    fn from(err: toml::de::Error) -> Self {
        TerminalError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for TerminalError {
    fn from(err: toml::ser::Error) -> Self {
        TerminalError::ConfigSaveFailed(err.to_string())
    }
}

impl TerminalError {
    /// True for errors the cashier caused and can fix at the till.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            TerminalError::Core(_)
                | TerminalError::Commit(_)
                | TerminalError::CartHoldingDisabled
                | TerminalError::LoyaltyDisabled
        )
    }

    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            TerminalError::InvalidConfig(_)
                | TerminalError::ConfigLoadFailed(_)
                | TerminalError::ConfigSaveFailed(_)
        )
    }
}
