//! # Domain Model
//!
//! The canonical shapes of players, gear, loot, and locations. Everything here
//! serializes with serde; field aliases accept the spellings used by the
//! legacy JSON data files so old catalogs load unchanged.

use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_STARTING_HP, MAX_DURABILITY, STARTING_LEVEL};
use crate::geo::Coordinates;

/// Rarity tier for locations, loot, and gear.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Rarity {
    /// Scrap and everyday finds.
    #[default]
    Common = 0,
    /// Worth showing off.
    Rare = 1,
    /// Pre-war tech.
    Epic = 2,
    /// One of a kind.
    Legendary = 3,
}

impl Rarity {
    /// All tiers, lowest first.
    pub const ALL: [Self; 4] = [Self::Common, Self::Rare, Self::Epic, Self::Legendary];

    /// Lowercase name as used in config files and responses.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::Rare => "rare",
            Self::Epic => "epic",
            Self::Legendary => "legendary",
        }
    }
}

impl std::fmt::Display for Rarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A piece of equipped gear.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GearItem {
    /// Display name.
    pub name: String,
    /// Rarity tier.
    pub rarity: Rarity,
    /// Defense at full durability.
    pub defense: u32,
    /// Condition, 0..=100.
    pub durability: u8,
}

impl GearItem {
    /// Creates brand-new gear at full durability.
    #[must_use]
    pub fn new(name: impl Into<String>, rarity: Rarity, defense: u32) -> Self {
        Self {
            name: name.into(),
            rarity,
            defense,
            durability: MAX_DURABILITY,
        }
    }

    /// Defense scaled by current condition.
    #[must_use]
    pub fn effective_defense(&self) -> f64 {
        f64::from(self.defense) * f64::from(self.durability) / f64::from(MAX_DURABILITY)
    }

    /// Lowers durability, stopping at zero.
    pub fn wear(&mut self, amount: u8) {
        self.durability = self.durability.saturating_sub(amount);
    }

    /// Raises durability, stopping at [`MAX_DURABILITY`].
    pub fn repair(&mut self, amount: u8) {
        self.durability = self.durability.saturating_add(amount).min(MAX_DURABILITY);
    }
}

/// Stimpak quality.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StimpakTier {
    /// Plain Stimpak.
    Common,
    /// Super Stimpak.
    Rare,
}

impl StimpakTier {
    /// In-game item name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Common => "Stimpak",
            Self::Rare => "Super Stimpak",
        }
    }
}

/// A stored revival consumable. Revive and repair amounts come from config,
/// keyed by tier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stimpak {
    /// Quality tier.
    pub tier: StimpakTier,
}

impl Stimpak {
    /// Creates a stimpak of the given tier.
    #[must_use]
    pub const fn new(tier: StimpakTier) -> Self {
        Self { tier }
    }
}

/// Ownership reference to an exclusive mintable.
///
/// The authoritative claim record lives in the engine's mintable pool; the
/// player only keeps this pointer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintableRef {
    /// Catalog id of the mintable.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Rarity tier.
    pub rarity: Rarity,
    /// Location it spawned at.
    pub source_location: String,
    /// When it was claimed (epoch ms).
    pub claimed_at: u64,
}

/// A repeatable item drawn from a weighted table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenericLoot {
    /// Table id of the item.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Rarity tier.
    pub rarity: Rarity,
    /// Location it was found at.
    pub source_location: String,
    /// When it was found (epoch ms).
    pub acquired_at: u64,
}

/// An inventory entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LootItem {
    /// One-of-a-kind mintable, owned through the pool's ownership record.
    Exclusive(MintableRef),
    /// Generic table drop.
    Generic(GenericLoot),
}

impl LootItem {
    /// Item id, exclusive or generic.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Exclusive(item) => &item.id,
            Self::Generic(item) => &item.id,
        }
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Exclusive(item) => &item.name,
            Self::Generic(item) => &item.name,
        }
    }

    /// Rarity tier.
    #[must_use]
    pub const fn rarity(&self) -> Rarity {
        match self {
            Self::Exclusive(item) => item.rarity,
            Self::Generic(item) => item.rarity,
        }
    }

    /// True for exclusive mintables.
    #[must_use]
    pub const fn is_exclusive(&self) -> bool {
        matches!(self, Self::Exclusive(_))
    }
}

/// A point of interest from the location catalog. Read-only for the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Unique name, also the lookup key.
    #[serde(alias = "n")]
    pub name: String,
    /// Latitude in decimal degrees.
    #[serde(alias = "lat")]
    pub latitude: f64,
    /// Longitude in decimal degrees.
    #[serde(alias = "lng")]
    pub longitude: f64,
    /// Minimum player level.
    #[serde(alias = "lvl", default = "default_required_level")]
    pub required_level: u32,
    /// Picks the fallback loot table and the caps bonus.
    #[serde(default)]
    pub rarity: Rarity,
    /// Radiation added on every successful claim.
    #[serde(alias = "rads", default)]
    pub radiation_yield: u64,
    /// Geofence radius; the configured default applies when absent.
    #[serde(alias = "radiusM", default)]
    pub claim_radius_m: Option<f64>,
    /// Hazardous spots roll raids at the higher rate.
    #[serde(alias = "hazard", default)]
    pub hazardous: bool,
}

const fn default_required_level() -> u32 {
    STARTING_LEVEL
}

impl Location {
    /// Creates a common, level-1, non-hazardous location.
    #[must_use]
    pub fn new(name: impl Into<String>, latitude: f64, longitude: f64) -> Self {
        Self {
            name: name.into(),
            latitude,
            longitude,
            required_level: STARTING_LEVEL,
            rarity: Rarity::Common,
            radiation_yield: 0,
            claim_radius_m: None,
            hazardous: false,
        }
    }

    /// Position of the location.
    #[must_use]
    pub const fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }
}

/// Per-wallet game state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Wallet address, the primary key.
    pub wallet: String,
    /// Caps balance.
    pub caps: u64,
    /// Current level, starts at 1.
    pub level: u32,
    /// Experience toward the next level.
    pub experience: u64,
    /// Current hit points.
    pub hp: u32,
    /// Hit point ceiling, grows with level.
    pub max_hp: u32,
    /// Accumulated radiation.
    pub radiation: u64,
    /// Gear in acquisition order.
    pub gear: Vec<GearItem>,
    /// Stimpaks, consumed front first.
    pub stimpaks: VecDeque<Stimpak>,
    /// Loot in acquisition order.
    pub inventory: Vec<LootItem>,
    /// Locations this wallet has claimed at least once.
    pub claimed_spots: BTreeSet<String>,
    /// Quest ids whose one-time reward was paid out.
    pub completed_quests: BTreeSet<String>,
    /// Raids survived without needing a stimpak.
    pub raids_won: u32,
    /// Epoch ms of the last successful claim, 0 if never.
    pub last_claim_at: u64,
}

impl Player {
    /// Creates a fresh player with the default starting hit points.
    #[must_use]
    pub fn new(wallet: impl Into<String>) -> Self {
        Self::with_starting_hp(wallet, DEFAULT_STARTING_HP)
    }

    /// Creates a fresh player with custom starting hit points.
    #[must_use]
    pub fn with_starting_hp(wallet: impl Into<String>, starting_hp: u32) -> Self {
        Self {
            wallet: wallet.into(),
            caps: 0,
            level: STARTING_LEVEL,
            experience: 0,
            hp: starting_hp,
            max_hp: starting_hp,
            radiation: 0,
            gear: Vec::new(),
            stimpaks: VecDeque::new(),
            inventory: Vec::new(),
            claimed_spots: BTreeSet::new(),
            completed_quests: BTreeSet::new(),
            raids_won: 0,
            last_claim_at: 0,
        }
    }

    /// True once hit points have run out.
    #[must_use]
    pub const fn is_down(&self) -> bool {
        self.hp == 0
    }
}
