//! # Loot Resolution
//!
//! **Exclusive Mintables First, Weighted Tables Second**
//!
//! A granted claim yields at most one item:
//!
//! ```text
//!  candidates = pool items at this location, unclaimed, level <= player
//!        │
//!        ├─ non-empty and roll < exclusive_chance ──► pick one uniformly
//!        │                                             │
//!        │                                  try_claim (per-item lock)
//!        │                                      │            │
//!        │                                    won          lost race
//!        │                                      │            │
//!        │                                 Exclusive          │
//!        ▼                                                    ▼
//!  weighted fallback table for the location's rarity ◄────────┘
//!        │
//!        ├─ drop_chance miss ──► Nothing
//!        ├─ entry with defense ──► Gear
//!        └─ otherwise ──► Generic
//! ```
//!
//! ## Pool Exclusivity
//!
//! Each mintable sits behind its own `parking_lot::Mutex`. Claiming checks
//! and sets `claimed_by` under that lock, so two wallets racing for the same
//! item see exactly one winner. Different items never contend.

use std::collections::HashMap;
use std::path::Path;

use atomicfizz_shared::{GearItem, GenericLoot, Location, MintableRef, Rarity, STARTING_LEVEL};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::{FallbackEntry, LootRules, TableSpec};
use crate::error::{EngineError, EngineResult};
use crate::rng::RandomSource;

/// One-of-a-kind item from the mintable catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusiveMintable {
    /// Catalog id, unique across all sources.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Rarity tier.
    #[serde(default)]
    pub rarity: Rarity,
    /// Location this item spawns at.
    #[serde(alias = "spawnPOI")]
    pub source_location: String,
    /// Minimum player level to receive it.
    #[serde(alias = "levelRequirement", default = "starting_level")]
    pub level_requirement: u32,
    /// Owning wallet once claimed.
    #[serde(alias = "provenance", default)]
    pub claimed_by: Option<String>,
    /// Claim time (epoch ms).
    #[serde(alias = "mintedAt", default)]
    pub claimed_at: Option<u64>,
}

const fn starting_level() -> u32 {
    STARTING_LEVEL
}

impl ExclusiveMintable {
    /// True once a wallet owns it.
    #[must_use]
    pub const fn is_claimed(&self) -> bool {
        self.claimed_by.is_some()
    }

    fn reference(&self, claimed_at: u64) -> MintableRef {
        MintableRef {
            id: self.id.clone(),
            name: self.name.clone(),
            rarity: self.rarity,
            source_location: self.source_location.clone(),
            claimed_at,
        }
    }
}

/// The shared, finite pool of exclusive mintables.
pub struct MintablePool {
    items: Vec<Mutex<ExclusiveMintable>>,
    by_id: HashMap<String, usize>,
    by_location: HashMap<String, Vec<usize>>,
}

impl MintablePool {
    /// Builds a pool; later duplicates of an id are dropped.
    #[must_use]
    pub fn new(items: impl IntoIterator<Item = ExclusiveMintable>) -> Self {
        let mut pool = Self {
            items: Vec::new(),
            by_id: HashMap::new(),
            by_location: HashMap::new(),
        };
        for item in items {
            if pool.by_id.contains_key(&item.id) {
                tracing::warn!("Duplicate mintable id '{}' skipped", item.id);
                continue;
            }
            let idx = pool.items.len();
            pool.by_id.insert(item.id.clone(), idx);
            pool.by_location
                .entry(item.source_location.clone())
                .or_default()
                .push(idx);
            pool.items.push(Mutex::new(item));
        }
        pool
    }

    /// An empty pool. Every claim falls through to the weighted tables.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Merges JSON array sources in order. Malformed entries are skipped.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if a source is not a JSON array.
    pub fn from_json_sources<'a>(sources: impl IntoIterator<Item = &'a str>) -> EngineResult<Self> {
        let mut items = Vec::new();
        for (n, source) in sources.into_iter().enumerate() {
            let entries: Vec<serde_json::Value> = serde_json::from_str(source).map_err(|e| {
                EngineError::Configuration(format!("mintable source #{n} is not a JSON array: {e}"))
            })?;
            for (i, entry) in entries.into_iter().enumerate() {
                match serde_json::from_value::<ExclusiveMintable>(entry) {
                    Ok(item) => items.push(item),
                    Err(e) => tracing::warn!("Mintable source #{n} entry {i} skipped: {e}"),
                }
            }
        }
        Ok(Self::new(items))
    }

    /// Reads and merges mintable files in order.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if a file cannot be read or is not a JSON array.
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> EngineResult<Self> {
        let mut sources = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            let source = std::fs::read_to_string(path)
                .map_err(|e| EngineError::Configuration(format!("failed to read {}: {e}", path.display())))?;
            sources.push(source);
        }
        let pool = Self::from_json_sources(sources.iter().map(String::as_str))?;
        tracing::info!("Loaded {} mintables from {} sources", pool.len(), paths.len());
        Ok(pool)
    }

    /// Indices of items at `location` that are unclaimed and within level.
    #[must_use]
    pub fn candidates(&self, location: &str, level: u32) -> Vec<usize> {
        self.by_location
            .get(location)
            .map(|indices| {
                indices
                    .iter()
                    .copied()
                    .filter(|&idx| {
                        let item = self.items[idx].lock();
                        !item.is_claimed() && item.level_requirement <= level
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Atomically marks the item as owned by `wallet`.
    ///
    /// Returns `None` if another wallet got there first.
    pub fn try_claim(&self, idx: usize, wallet: &str, now_ms: u64) -> Option<MintableRef> {
        let mut item = self.items.get(idx)?.lock();
        if item.is_claimed() {
            return None;
        }
        item.claimed_by = Some(wallet.to_string());
        item.claimed_at = Some(now_ms);
        Some(item.reference(now_ms))
    }

    /// Re-marks an item as owned by `wallet`, as recorded in a persisted
    /// inventory. Returns false if the id is unknown to this pool or the
    /// sources already name a different owner.
    pub fn restore(&self, id: &str, wallet: &str, claimed_at: u64) -> bool {
        let Some(&idx) = self.by_id.get(id) else {
            return false;
        };
        let mut item = self.items[idx].lock();
        match item.claimed_by.as_deref() {
            None => {
                item.claimed_by = Some(wallet.to_string());
                item.claimed_at = Some(claimed_at);
                true
            }
            Some(owner) => owner == wallet,
        }
    }

    /// Undoes a claim held by `wallet`. Returns false if it held none.
    pub fn release(&self, id: &str, wallet: &str) -> bool {
        let Some(&idx) = self.by_id.get(id) else {
            return false;
        };
        let mut item = self.items[idx].lock();
        if item.claimed_by.as_deref() != Some(wallet) {
            return false;
        }
        item.claimed_by = None;
        item.claimed_at = None;
        true
    }

    /// Copy of one item's current record.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<ExclusiveMintable> {
        self.by_id.get(id).map(|&idx| self.items[idx].lock().clone())
    }

    /// Copy of every record, in load order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ExclusiveMintable> {
        self.items.iter().map(|item| item.lock().clone()).collect()
    }

    /// Number of items in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// True if the pool holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items not yet claimed by anyone.
    #[must_use]
    pub fn unclaimed_count(&self) -> usize {
        self.items.iter().filter(|item| !item.lock().is_claimed()).count()
    }
}

impl std::fmt::Debug for MintablePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MintablePool")
            .field("items", &self.len())
            .field("locations", &self.by_location.len())
            .finish_non_exhaustive()
    }
}

/// A validated weighted table.
#[derive(Clone, Debug)]
pub struct WeightedTable {
    entries: Vec<FallbackEntry>,
    total_weight: u64,
    drop_chance: f64,
}

impl WeightedTable {
    /// Validates a table from config.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the table is empty, has zero total weight,
    /// or a drop chance outside `[0, 1]`.
    pub fn new(spec: &TableSpec) -> EngineResult<Self> {
        let total_weight: u64 = spec.entries.iter().map(|e| u64::from(e.weight)).sum();
        if total_weight == 0 {
            return Err(EngineError::Configuration(
                "loot table is empty or has zero total weight".into(),
            ));
        }
        if !(0.0..=1.0).contains(&spec.drop_chance) {
            return Err(EngineError::Configuration(format!(
                "loot table drop_chance must be in [0, 1], got {}",
                spec.drop_chance
            )));
        }
        Ok(Self {
            entries: spec.entries.clone(),
            total_weight,
            drop_chance: spec.drop_chance,
        })
    }

    /// Sum of all weights.
    #[must_use]
    pub const fn total_weight(&self) -> u64 {
        self.total_weight
    }

    /// Entries in draw order.
    #[must_use]
    pub fn entries(&self) -> &[FallbackEntry] {
        &self.entries
    }

    /// Draws one entry, or `None` when the drop chance misses.
    ///
    /// Walks the entries in order, returning the first whose cumulative weight
    /// reaches a uniform draw in `[0, total)`. A draw landing exactly on a
    /// boundary belongs to the entry that boundary closes. Zero-weight entries
    /// never win.
    pub fn pick(&self, rng: &mut dyn RandomSource) -> Option<&FallbackEntry> {
        if self.drop_chance < 1.0 && rng.next_unit() >= self.drop_chance {
            return None;
        }

        #[allow(clippy::cast_precision_loss)]
        let target = rng.next_unit() * self.total_weight as f64;
        let mut cumulative = 0u64;
        for entry in &self.entries {
            if entry.weight == 0 {
                continue;
            }
            cumulative += u64::from(entry.weight);
            #[allow(clippy::cast_precision_loss)]
            let bound = cumulative as f64;
            if target <= bound {
                return Some(entry);
            }
        }
        // Float rounding at the very top of the range.
        self.entries.iter().rev().find(|e| e.weight > 0)
    }
}

/// What loot resolution produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LootOutcome {
    /// Exclusive mintable, now owned by the claimant.
    Exclusive(MintableRef),
    /// Generic inventory item.
    Generic(GenericLoot),
    /// Wearable gear.
    Gear(GearItem),
    /// The table's drop chance missed.
    Nothing,
}

impl LootOutcome {
    /// Rarity of whatever dropped.
    #[must_use]
    pub const fn rarity(&self) -> Option<Rarity> {
        match self {
            Self::Exclusive(item) => Some(item.rarity),
            Self::Generic(item) => Some(item.rarity),
            Self::Gear(item) => Some(item.rarity),
            Self::Nothing => None,
        }
    }

    /// True if nothing dropped.
    #[must_use]
    pub const fn is_nothing(&self) -> bool {
        matches!(self, Self::Nothing)
    }
}

/// Resolves loot for granted claims.
#[derive(Clone, Debug)]
pub struct LootResolver {
    exclusive_chance: f64,
    /// Indexed by `Rarity as usize`.
    tables: [WeightedTable; 4],
}

impl LootResolver {
    /// Validates every table up front so resolution never fails at request time.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for any invalid table or chance.
    pub fn new(rules: &LootRules) -> EngineResult<Self> {
        if !(0.0..=1.0).contains(&rules.exclusive_chance) {
            return Err(EngineError::Configuration(format!(
                "exclusive_chance must be in [0, 1], got {}",
                rules.exclusive_chance
            )));
        }
        let table = |rarity| WeightedTable::new(rules.tables.for_rarity(rarity));
        Ok(Self {
            exclusive_chance: rules.exclusive_chance,
            tables: [
                table(Rarity::Common)?,
                table(Rarity::Rare)?,
                table(Rarity::Epic)?,
                table(Rarity::Legendary)?,
            ],
        })
    }

    /// Fallback table for a location tier.
    #[must_use]
    pub fn table(&self, rarity: Rarity) -> &WeightedTable {
        &self.tables[rarity as usize]
    }

    /// Resolves one drop for `wallet` claiming `location`.
    pub fn resolve(
        &self,
        pool: &MintablePool,
        location: &Location,
        player_level: u32,
        wallet: &str,
        now_ms: u64,
        rng: &mut dyn RandomSource,
    ) -> LootOutcome {
        let candidates = pool.candidates(&location.name, player_level);
        if !candidates.is_empty() && rng.next_unit() < self.exclusive_chance {
            let idx = candidates[rng.next_index(candidates.len())];
            if let Some(reference) = pool.try_claim(idx, wallet, now_ms) {
                return LootOutcome::Exclusive(reference);
            }
            tracing::debug!("Wallet {wallet} lost the race for a mintable at {}", location.name);
        }

        match self.table(location.rarity).pick(rng) {
            None => LootOutcome::Nothing,
            Some(entry) => match entry.defense {
                Some(defense) => LootOutcome::Gear(GearItem::new(entry.name.clone(), entry.rarity, defense)),
                None => LootOutcome::Generic(GenericLoot {
                    id: entry.id.clone(),
                    name: entry.name.clone(),
                    rarity: entry.rarity,
                    source_location: location.name.clone(),
                    acquired_at: now_ms,
                }),
            },
        }
    }
}
