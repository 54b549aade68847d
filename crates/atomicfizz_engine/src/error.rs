//! # Engine Error Types
//!
//! Failures that abort an operation. Expected gameplay denials (cooldown,
//! level, distance) are not errors; they travel as [`crate::gate::ClaimDenial`]
//! inside a claim result.

use thiserror::Error;

/// Errors that can occur in the claim engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Location name not in the catalog.
    #[error("unknown location: {0}")]
    UnknownLocation(String),

    /// Purchase price exceeds the caps balance.
    #[error("insufficient caps: cost {cost}, balance {balance}")]
    InsufficientCurrency {
        /// Price of the purchase.
        cost: u64,
        /// Caps the player holds.
        balance: u64,
    },

    /// Invalid config, catalog, or loot table. Startup-fatal.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// On-chain mint failed. Logged, never rolls back a reward.
    #[error("chain mint failed: {0}")]
    ChainMint(String),

    /// The player journal could not be read or written.
    #[error("storage failure: {0}")]
    Storage(String),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
