//! # ATOMIC FIZZ Shared
//!
//! Common types used by the claim engine and whatever transport sits in
//! front of it.
//!
//! ## CRITICAL RULE
//!
//! This crate holds data and pure functions only. Locks, randomness, and
//! persistence live in `atomicfizz_engine`.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod constants;
pub mod geo;
pub mod model;

pub use constants::{
    DEFAULT_CLAIM_RADIUS_M, DEFAULT_COOLDOWN_MS, DEFAULT_STARTING_HP, EARTH_RADIUS_M, MAX_DURABILITY,
    STARTING_LEVEL,
};
pub use geo::{haversine_m, Coordinates};
pub use model::{
    GearItem, GenericLoot, Location, LootItem, MintableRef, Player, Rarity, Stimpak, StimpakTier,
};
