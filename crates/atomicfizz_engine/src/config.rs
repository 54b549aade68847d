//! # Engine Configuration
//!
//! All balance data lives in one TOML file, loaded once at startup:
//!
//! ```toml
//! [claim]
//! cooldown_ms = 3600000
//! default_radius_m = 250.0
//!
//! [loot]
//! exclusive_chance = 0.35
//!
//! [[loot.tables.common.entries]]
//! id = "scrap"
//! name = "Scrap Metal"
//! rarity = "common"
//! weight = 70
//! ```
//!
//! Every section falls back to the shipped defaults, so a partial file only
//! overrides what it names. Deployment knobs can also come from the
//! environment (`COOLDOWN_MS`, `CLAIM_RADIUS_M`, `SIMULATE_MINT`, `CHAIN`).

use std::path::Path;

use atomicfizz_shared::{Rarity, StimpakTier, DEFAULT_CLAIM_RADIUS_M, DEFAULT_COOLDOWN_MS, DEFAULT_STARTING_HP};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Complete engine configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Eligibility and base rewards.
    pub claim: ClaimRules,
    /// Leveling curve.
    pub progression: ProgressionRules,
    /// Exclusive chance and fallback tables.
    pub loot: LootRules,
    /// Raid triggering and combat.
    pub raid: RaidRules,
    /// Stimpak effects and prices.
    pub stimpaks: StimpakRules,
    /// On-chain minting.
    pub chain: ChainRules,
}

/// Claim gate and base reward settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClaimRules {
    /// Minimum time between successful claims (ms).
    pub cooldown_ms: u64,
    /// Geofence radius for locations that do not set one (m).
    pub default_radius_m: f64,
    /// Caps paid on every claim before the rarity bonus.
    pub base_caps: u64,
    /// Experience paid on every claim.
    pub xp_per_claim: u64,
    /// Extra caps by location rarity.
    pub rarity_bonus: RarityBonus,
}

impl Default for ClaimRules {
    fn default() -> Self {
        Self {
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            default_radius_m: DEFAULT_CLAIM_RADIUS_M,
            base_caps: 25,
            xp_per_claim: 50,
            rarity_bonus: RarityBonus::default(),
        }
    }
}

/// Caps bonus per location rarity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RarityBonus {
    /// Common bonus.
    pub common: u64,
    /// Rare bonus.
    pub rare: u64,
    /// Epic bonus.
    pub epic: u64,
    /// Legendary bonus.
    pub legendary: u64,
}

impl Default for RarityBonus {
    fn default() -> Self {
        Self {
            common: 0,
            rare: 25,
            epic: 100,
            legendary: 500,
        }
    }
}

impl RarityBonus {
    /// Bonus for the given tier.
    #[must_use]
    pub const fn for_rarity(&self, rarity: Rarity) -> u64 {
        match rarity {
            Rarity::Common => self.common,
            Rarity::Rare => self.rare,
            Rarity::Epic => self.epic,
            Rarity::Legendary => self.legendary,
        }
    }
}

/// Leveling curve: level `n` needs `n * xp_per_level` experience to clear.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressionRules {
    /// Hit points of a new player.
    pub starting_hp: u32,
    /// Experience multiplier of the curve.
    pub xp_per_level: u64,
    /// Max hp gained per level.
    pub hp_per_level: u32,
}

impl Default for ProgressionRules {
    fn default() -> Self {
        Self {
            starting_hp: DEFAULT_STARTING_HP,
            xp_per_level: 100,
            hp_per_level: 10,
        }
    }
}

/// Loot resolution settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LootRules {
    /// Chance to award an exclusive mintable when one is available.
    pub exclusive_chance: f64,
    /// Fallback tables by location rarity.
    pub tables: LootTables,
}

impl Default for LootRules {
    fn default() -> Self {
        Self {
            exclusive_chance: 0.35,
            tables: LootTables::default(),
        }
    }
}

/// Fallback tables by rarity. Missing tiers use the common table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LootTables {
    /// Required.
    pub common: TableSpec,
    /// Rare locations.
    pub rare: Option<TableSpec>,
    /// Epic locations.
    pub epic: Option<TableSpec>,
    /// Legendary locations.
    pub legendary: Option<TableSpec>,
}

impl Default for LootTables {
    fn default() -> Self {
        Self {
            common: TableSpec::new(vec![
                FallbackEntry::item("scrap", "Scrap Metal", Rarity::Common, 70),
                FallbackEntry::gear("leather_armor", "Leather Armor", Rarity::Common, 15, 5),
            ]),
            rare: Some(TableSpec::new(vec![
                FallbackEntry::item("ammo", "Ammo Pack", Rarity::Rare, 50),
                FallbackEntry::gear("combat_armor", "Combat Armor", Rarity::Rare, 15, 15),
            ])),
            epic: Some(TableSpec::new(vec![FallbackEntry::item(
                "tech",
                "Rare Tech",
                Rarity::Epic,
                30,
            )])),
            legendary: Some(TableSpec::new(vec![
                FallbackEntry::item("relic", "Legendary Relic", Rarity::Legendary, 10),
                FallbackEntry::gear("power_armor_t51b", "Power Armor T-51b", Rarity::Legendary, 5, 40),
            ])),
        }
    }
}

impl LootTables {
    /// Table for the tier, falling back to common.
    #[must_use]
    pub fn for_rarity(&self, rarity: Rarity) -> &TableSpec {
        let table = match rarity {
            Rarity::Common => None,
            Rarity::Rare => self.rare.as_ref(),
            Rarity::Epic => self.epic.as_ref(),
            Rarity::Legendary => self.legendary.as_ref(),
        };
        table.unwrap_or(&self.common)
    }
}

/// One weighted fallback table as written in config.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableSpec {
    /// Chance that a fallback roll yields anything at all.
    #[serde(default = "always")]
    pub drop_chance: f64,
    /// Weighted entries, in draw order.
    #[serde(default)]
    pub entries: Vec<FallbackEntry>,
}

const fn always() -> f64 {
    1.0
}

impl TableSpec {
    /// A table that always drops.
    #[must_use]
    pub fn new(entries: Vec<FallbackEntry>) -> Self {
        Self {
            drop_chance: 1.0,
            entries,
        }
    }
}

/// One weighted fallback entry. Entries with `defense` drop as gear.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackEntry {
    /// Item id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Rarity tier.
    pub rarity: Rarity,
    /// Relative weight.
    pub weight: u32,
    /// Gear defense, if this entry is wearable.
    #[serde(default)]
    pub defense: Option<u32>,
}

impl FallbackEntry {
    /// Inventory item entry.
    #[must_use]
    pub fn item(id: &str, name: &str, rarity: Rarity, weight: u32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            rarity,
            weight,
            defense: None,
        }
    }

    /// Gear entry.
    #[must_use]
    pub fn gear(id: &str, name: &str, rarity: Rarity, weight: u32, defense: u32) -> Self {
        Self {
            defense: Some(defense),
            ..Self::item(id, name, rarity, weight)
        }
    }
}

/// Raid settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RaidRules {
    /// Trigger chance at hazardous locations.
    pub hazardous_chance: f64,
    /// Trigger chance everywhere else.
    pub baseline_chance: f64,
    /// Defense every player has without gear.
    pub base_defense: f64,
    /// Durability every gear item loses per raid.
    pub wear_per_raid: u8,
    /// Enemy roster, picked uniformly.
    pub enemies: Vec<EnemySpec>,
}

impl Default for RaidRules {
    fn default() -> Self {
        Self {
            hazardous_chance: 0.05,
            baseline_chance: 0.0,
            base_defense: 20.0,
            wear_per_raid: 10,
            enemies: vec![
                EnemySpec::new("Deathclaw", 120),
                EnemySpec::new("Super Mutant Behemoth", 90),
                EnemySpec::new("Raider Gang", 60),
            ],
        }
    }
}

/// A raid enemy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnemySpec {
    /// Display name.
    pub name: String,
    /// Raw attack before defense.
    pub attack: u32,
}

impl EnemySpec {
    /// Creates an enemy.
    #[must_use]
    pub fn new(name: &str, attack: u32) -> Self {
        Self {
            name: name.to_string(),
            attack,
        }
    }
}

/// Stimpak effects and shop prices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StimpakRules {
    /// Plain Stimpak.
    pub common: StimpakSpec,
    /// Super Stimpak.
    pub rare: StimpakSpec,
}

impl Default for StimpakRules {
    fn default() -> Self {
        Self {
            common: StimpakSpec {
                revive_hp: 50,
                gear_repair: 25,
                price: 50,
            },
            rare: StimpakSpec {
                revive_hp: 100,
                gear_repair: 50,
                price: 150,
            },
        }
    }
}

impl StimpakRules {
    /// Spec for the tier.
    #[must_use]
    pub const fn spec(&self, tier: StimpakTier) -> StimpakSpec {
        match tier {
            StimpakTier::Common => self.common,
            StimpakTier::Rare => self.rare,
        }
    }
}

/// What one stimpak does and costs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StimpakSpec {
    /// Hit points restored on revival.
    pub revive_hp: u32,
    /// Durability restored to every gear item.
    pub gear_repair: u8,
    /// Shop price in caps.
    pub price: u64,
}

/// Target network for minting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChainNetwork {
    /// Solana devnet.
    #[default]
    Solana,
    /// Avalanche C-Chain.
    Avalanche,
}

impl std::str::FromStr for ChainNetwork {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "solana" => Ok(Self::Solana),
            "avalanche" | "cchain" | "c-chain" => Ok(Self::Avalanche),
            other => Err(EngineError::Configuration(format!("unknown chain: {other}"))),
        }
    }
}

/// On-chain minting settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainRules {
    /// When true, nothing is ever minted.
    pub simulate: bool,
    /// Target network.
    pub network: ChainNetwork,
    /// Lowest loot rarity that gets minted.
    pub mint_threshold: Rarity,
}

impl Default for ChainRules {
    fn default() -> Self {
        Self {
            simulate: true,
            network: ChainNetwork::Solana,
            mint_threshold: Rarity::Rare,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the document does not parse or fails
    /// validation.
    pub fn from_toml_str(source: &str) -> EngineResult<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|e| EngineError::Configuration(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the file cannot be read or is invalid.
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Configuration(format!("failed to read {}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    /// Applies deployment overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if a variable is set but unparseable.
    pub fn apply_env_overrides(&mut self) -> EngineResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Applies deployment overrides from any key lookup, then revalidates.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if a value is set but unparseable.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> EngineResult<()> {
        if let Some(raw) = lookup("COOLDOWN_MS") {
            self.claim.cooldown_ms = raw
                .trim()
                .parse()
                .map_err(|_| EngineError::Configuration(format!("COOLDOWN_MS is not a number: {raw}")))?;
        }
        if let Some(raw) = lookup("CLAIM_RADIUS_M") {
            self.claim.default_radius_m = raw
                .trim()
                .parse()
                .map_err(|_| EngineError::Configuration(format!("CLAIM_RADIUS_M is not a number: {raw}")))?;
        }
        if let Some(raw) = lookup("SIMULATE_MINT") {
            // Anything but an explicit "false" keeps simulation on.
            self.chain.simulate = raw.trim() != "false";
        }
        if let Some(raw) = lookup("CHAIN") {
            self.chain.network = raw.parse()?;
        }
        self.validate()
    }

    /// Checks every invariant the engine relies on at request time.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` naming the first violated rule.
    pub fn validate(&self) -> EngineResult<()> {
        let fail = |msg: String| Err(EngineError::Configuration(msg));

        if !(self.claim.default_radius_m.is_finite() && self.claim.default_radius_m > 0.0) {
            return fail(format!("claim.default_radius_m must be positive, got {}", self.claim.default_radius_m));
        }
        if self.progression.xp_per_level == 0 {
            return fail("progression.xp_per_level must be positive".into());
        }
        if self.progression.starting_hp == 0 {
            return fail("progression.starting_hp must be positive".into());
        }
        check_probability("loot.exclusive_chance", self.loot.exclusive_chance)?;
        check_probability("raid.hazardous_chance", self.raid.hazardous_chance)?;
        check_probability("raid.baseline_chance", self.raid.baseline_chance)?;
        if !(self.raid.base_defense.is_finite() && self.raid.base_defense >= 0.0) {
            return fail("raid.base_defense must be non-negative".into());
        }
        if self.raid.enemies.is_empty() {
            return fail("raid.enemies must not be empty".into());
        }

        check_table("common", Some(&self.loot.tables.common))?;
        check_table("rare", self.loot.tables.rare.as_ref())?;
        check_table("epic", self.loot.tables.epic.as_ref())?;
        check_table("legendary", self.loot.tables.legendary.as_ref())?;

        Ok(())
    }
}

fn check_probability(name: &str, value: f64) -> EngineResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(EngineError::Configuration(format!("{name} must be in [0, 1], got {value}")))
    }
}

fn check_table(tier: &str, table: Option<&TableSpec>) -> EngineResult<()> {
    let Some(table) = table else {
        return Ok(());
    };
    check_probability(&format!("loot.tables.{tier}.drop_chance"), table.drop_chance)?;
    let total: u64 = table.entries.iter().map(|e| u64::from(e.weight)).sum();
    if total == 0 {
        return Err(EngineError::Configuration(format!(
            "loot table '{tier}' is empty or has zero total weight"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.claim.cooldown_ms, 3_600_000);
        assert_eq!(config.claim.rarity_bonus.for_rarity(Rarity::Legendary), 500);
        assert_eq!(config.stimpaks.spec(StimpakTier::Common).revive_hp, 50);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [claim]
            cooldown_ms = 1000

            [progression]
            xp_per_level = 150
            "#,
        )
        .unwrap();
        assert_eq!(config.claim.cooldown_ms, 1000);
        assert_eq!(config.claim.base_caps, 25);
        assert_eq!(config.progression.xp_per_level, 150);
        assert_eq!(config.progression.hp_per_level, 10);
        assert!((config.loot.exclusive_chance - 0.35).abs() < f64::EPSILON);
    }

    #[test]
    fn test_custom_table_parses() {
        let config = EngineConfig::from_toml_str(
            r#"
            [loot.tables.common]
            drop_chance = 0.5

            [[loot.tables.common.entries]]
            id = "can"
            name = "Tin Can"
            rarity = "common"
            weight = 3

            [[loot.tables.common.entries]]
            id = "vest"
            name = "Vault Vest"
            rarity = "common"
            weight = 1
            defense = 4
            "#,
        )
        .unwrap();
        let table = config.loot.tables.for_rarity(Rarity::Common);
        assert!((table.drop_chance - 0.5).abs() < f64::EPSILON);
        assert_eq!(table.entries.len(), 2);
        assert_eq!(table.entries[1].defense, Some(4));
    }

    #[test]
    fn test_zero_weight_table_rejected() {
        let err = EngineConfig::from_toml_str(
            r#"
            [[loot.tables.common.entries]]
            id = "nothing"
            name = "Nothing"
            rarity = "common"
            weight = 0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn test_empty_table_rejected() {
        let mut config = EngineConfig::default();
        config.loot.tables.epic = Some(TableSpec::new(Vec::new()));
        assert!(matches!(config.validate(), Err(EngineError::Configuration(_))));
    }

    #[test]
    fn test_missing_tier_falls_back_to_common() {
        let mut config = EngineConfig::default();
        config.loot.tables.epic = None;
        let table = config.loot.tables.for_rarity(Rarity::Epic);
        assert_eq!(table.entries[0].id, "scrap");
    }

    #[test]
    fn test_bad_probability_rejected() {
        let mut config = EngineConfig::default();
        config.raid.hazardous_chance = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_roster_rejected() {
        let mut config = EngineConfig::default();
        config.raid.enemies.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_overrides() {
        let mut config = EngineConfig::default();
        config
            .apply_overrides(|key| match key {
                "COOLDOWN_MS" => Some("60000".into()),
                "CLAIM_RADIUS_M" => Some("500".into()),
                "SIMULATE_MINT" => Some("false".into()),
                "CHAIN" => Some("avalanche".into()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.claim.cooldown_ms, 60_000);
        assert!((config.claim.default_radius_m - 500.0).abs() < f64::EPSILON);
        assert!(!config.chain.simulate);
        assert_eq!(config.chain.network, ChainNetwork::Avalanche);
    }

    #[test]
    fn test_bad_override_rejected() {
        let mut config = EngineConfig::default();
        let err = config
            .apply_overrides(|key| (key == "COOLDOWN_MS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }
}
