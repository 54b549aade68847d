//! # Game Constants
//!
//! Values baked into every build. Tunable gameplay numbers live in the
//! engine's TOML config instead; these are the ones that never change per
//! deployment.

// =============================================================================
// GEO
// =============================================================================

/// Mean Earth radius used by the haversine distance (meters).
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Claim radius used when neither the location nor the config names one.
pub const DEFAULT_CLAIM_RADIUS_M: f64 = 250.0;

// =============================================================================
// PROGRESSION
// =============================================================================

/// One hour between successful claims.
pub const DEFAULT_COOLDOWN_MS: u64 = 3_600_000;

/// Hit points of a freshly created player.
pub const DEFAULT_STARTING_HP: u32 = 100;

/// Level every player starts at.
pub const STARTING_LEVEL: u32 = 1;

// =============================================================================
// GEAR
// =============================================================================

/// Durability of brand-new gear, and the ceiling repairs clamp to.
pub const MAX_DURABILITY: u8 = 100;
