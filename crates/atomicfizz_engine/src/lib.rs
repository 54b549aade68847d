//! # ATOMIC FIZZ Engine
//!
//! The Claim & Progression Engine behind a location-based collection game.
//!
//! ## Architecture
//!
//! ```text
//!                     ┌────────────────────┐
//!   claim request ──▶ │    ClaimEngine     │ ──▶ ClaimResult
//!                     └─────────┬──────────┘
//!            ┌──────────────────┼───────────────────┐
//!            ▼                  ▼                   ▼
//!   ┌────────────────┐  ┌───────────────┐  ┌────────────────┐
//!   │ gate (pure)    │  │ loot + pool   │  │ progression    │
//!   │ cooldown/level │  │ (per-item     │  │ raid           │
//!   │ geofence       │  │  locks)       │  │                │
//!   └────────────────┘  └───────────────┘  └────────────────┘
//!                               │
//!                     ┌─────────▼──────────┐
//!                     │ PlayerStore        │ ──▶ PlayerRepository
//!                     │ (per-wallet gate)  │     (memory / journal)
//!                     └────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use atomicfizz_engine::{ClaimEngine, EngineConfig, JournalRepository, LocationCatalog, MintablePool};
//!
//! let config = EngineConfig::load("data/engine.toml")?;
//! let catalog = LocationCatalog::load("data/locations.json")?;
//! let pool = MintablePool::load(&["data/mintables_batch1.json", "data/mintables_batch2.json"])?;
//! let journal = Arc::new(JournalRepository::open("data/players.afjl")?);
//!
//! let engine = ClaimEngine::new(config, catalog, pool, journal)?;
//! let result = engine.claim_survival(wallet, "Goodsprings Saloon", Some(coords), now_ms)?;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod catalog;
pub mod chain;
pub mod config;
pub mod engine;
pub mod error;
pub mod gate;
pub mod journal;
pub mod loot;
pub mod progression;
pub mod raid;
pub mod rng;
pub mod store;

pub use catalog::LocationCatalog;
pub use chain::{ChainMinter, DevnetMinter, SimulatedMinter, TransactionReference};
pub use config::{ChainNetwork, EngineConfig};
pub use engine::{ClaimEngine, ClaimReceipt, ClaimResult, PurchaseReceipt, QuestOutcome};
pub use error::{EngineError, EngineResult};
pub use gate::{ClaimDenial, GateDecision};
pub use journal::JournalRepository;
pub use loot::{ExclusiveMintable, LootOutcome, LootResolver, MintablePool, WeightedTable};
pub use progression::RewardSummary;
pub use raid::{Encounter, RaidOutcome};
pub use rng::{ChaChaSource, RandomSource, ScriptedSource};
pub use store::{MemoryRepository, PlayerRepository, PlayerStore, Transition};
