//! # Claim Engine
//!
//! The single entry point a transport layer talks to.
//!
//! ## Claim Pipeline
//!
//! ```text
//! claim_survival(wallet, location, coords, now)
//!   │
//!   ├─ catalog lookup ─────────────── unknown ──► Err(UnknownLocation)
//!   │
//!   └─ store.transact(wallet) ── wallet write gate held from here ──┐
//!        gate::evaluate ─── deny ──► Abort(Denied)                 │
//!        loot.resolve        (rng lock, per-item pool lock)        │
//!        apply_claim_rewards                                        │
//!        roll_encounter ─► Encounter::resolve                      │
//!        Commit(Granted) ─► persist ─► publish ─────────────────────┘
//!   │
//!   └─ mint (outside the wallet lock, best-effort)
//! ```
//!
//! Lock order is always wallet gate, then rng, then a pool item. No path
//! takes them in another order.
//!
//! ## Thread Safety
//!
//! `ClaimEngine` is `Send + Sync`; share it behind an `Arc`.

use std::sync::Arc;

use atomicfizz_shared::{Coordinates, Location, LootItem, Player, Stimpak, StimpakTier};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::catalog::LocationCatalog;
use crate::chain::{ChainMinter, DevnetMinter, TransactionReference};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::gate::{self, ClaimDenial, GateDecision};
use crate::loot::{ExclusiveMintable, LootOutcome, LootResolver, MintablePool};
use crate::progression;
use crate::raid::{self, RaidOutcome};
use crate::rng::{ChaChaSource, RandomSource};
use crate::store::{PlayerRepository, PlayerStore, Transition};

/// Everything a granted claim produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClaimReceipt {
    /// Location claimed.
    pub location: String,
    /// Caps added.
    pub caps_earned: u64,
    /// Experience added.
    pub xp_earned: u64,
    /// What dropped.
    pub loot: LootOutcome,
    /// Raid fought after the rewards, if one triggered.
    pub raid: Option<RaidOutcome>,
    /// Level after the claim.
    pub new_level: u32,
    /// Levels climbed by this claim.
    pub levels_gained: u32,
    /// Earliest time the next claim is allowed (epoch ms).
    pub cooldown_ends_at: u64,
    /// Radiation after the claim.
    pub radiation: u64,
    /// Hit points after the claim and any raid.
    pub hp: u32,
    /// On-chain mint, when one happened.
    pub chain_tx: Option<TransactionReference>,
}

/// Result of a claim attempt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClaimResult {
    /// Rewards applied.
    Granted(Box<ClaimReceipt>),
    /// Refused; nothing changed.
    Denied(ClaimDenial),
}

impl ClaimResult {
    /// True if the claim went through.
    #[must_use]
    pub const fn is_granted(&self) -> bool {
        matches!(self, Self::Granted(_))
    }

    /// The receipt, if granted.
    #[must_use]
    pub fn receipt(&self) -> Option<&ClaimReceipt> {
        match self {
            Self::Granted(receipt) => Some(receipt.as_ref()),
            Self::Denied(_) => None,
        }
    }

    /// The denial, if refused.
    #[must_use]
    pub const fn denial(&self) -> Option<&ClaimDenial> {
        match self {
            Self::Granted(_) => None,
            Self::Denied(denial) => Some(denial),
        }
    }
}

/// A completed stimpak purchase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    /// Tier bought.
    pub tier: StimpakTier,
    /// Caps paid.
    pub cost: u64,
    /// Caps left.
    pub caps_remaining: u64,
    /// Stimpaks held after the purchase.
    pub stimpaks_owned: usize,
}

/// Result of a quest reward claim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestOutcome {
    /// Quest id.
    pub quest_id: String,
    /// True if this wallet was already paid for the quest; nothing changed.
    pub already_claimed: bool,
    /// Experience granted by this call.
    pub xp_earned: u64,
    /// Levels climbed by this call.
    pub levels_gained: u32,
    /// Level after the call.
    pub new_level: u32,
}

/// The Claim & Progression Engine.
pub struct ClaimEngine {
    config: EngineConfig,
    catalog: LocationCatalog,
    pool: MintablePool,
    loot: LootResolver,
    store: PlayerStore,
    rng: Mutex<Box<dyn RandomSource>>,
    minter: Box<dyn ChainMinter>,
}

impl ClaimEngine {
    /// Builds an engine with an entropy-seeded rng and the devnet minter.
    ///
    /// Exclusive mintables already held in a persisted inventory are marked
    /// claimed before the first request, so a restart cannot hand them out
    /// again.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the config or its loot tables are invalid.
    pub fn new(
        config: EngineConfig,
        catalog: LocationCatalog,
        pool: MintablePool,
        repository: Arc<dyn PlayerRepository>,
    ) -> EngineResult<Self> {
        config.validate()?;
        let loot = LootResolver::new(&config.loot)?;
        restore_ownership(&pool, repository.as_ref());
        let store = PlayerStore::new(repository, config.progression.starting_hp);
        let minter = DevnetMinter::new(config.chain.network);

        tracing::info!(
            "Claim engine ready: {} locations, {} mintables ({} unclaimed), simulate_mint={}",
            catalog.len(),
            pool.len(),
            pool.unclaimed_count(),
            config.chain.simulate
        );

        Ok(Self {
            config,
            catalog,
            pool,
            loot,
            store,
            rng: Mutex::new(Box::new(ChaChaSource::from_entropy())),
            minter: Box::new(minter),
        })
    }

    /// Replaces the random source.
    #[must_use]
    pub fn with_rng(mut self, rng: impl RandomSource + 'static) -> Self {
        self.rng = Mutex::new(Box::new(rng));
        self
    }

    /// Replaces the chain minter.
    #[must_use]
    pub fn with_minter(mut self, minter: impl ChainMinter + 'static) -> Self {
        self.minter = Box::new(minter);
        self
    }

    /// Attempts a claim at `location_name`.
    ///
    /// Gameplay refusals come back as [`ClaimResult::Denied`] with the player
    /// untouched. A failed mint is logged and leaves `chain_tx` empty; the
    /// rewards stand.
    ///
    /// # Errors
    ///
    /// Returns `UnknownLocation` for a name not in the catalog, or `Storage`
    /// if the player could not be persisted. Either way nothing changed.
    pub fn claim_survival(
        &self,
        wallet: &str,
        location_name: &str,
        claimant: Option<Coordinates>,
        now_ms: u64,
    ) -> EngineResult<ClaimResult> {
        let location = self
            .catalog
            .get(location_name)
            .ok_or_else(|| EngineError::UnknownLocation(location_name.to_string()))?;

        let mut won_exclusive: Option<String> = None;
        let committed = self.store.transact(wallet, |draft| {
            if let GateDecision::Deny(denial) = gate::evaluate(draft, location, claimant, now_ms, &self.config.claim) {
                return Transition::Abort(ClaimResult::Denied(denial));
            }

            let mut rng = self.rng.lock();
            let loot = self
                .loot
                .resolve(&self.pool, location, draft.level, wallet, now_ms, &mut **rng);
            if let LootOutcome::Exclusive(reference) = &loot {
                won_exclusive = Some(reference.id.clone());
            }

            let rewards = progression::apply_claim_rewards(
                draft,
                location,
                &loot,
                now_ms,
                &self.config.claim,
                &self.config.progression,
            );
            let raid = raid::roll_encounter(location, &self.config.raid, &mut **rng)
                .map(|encounter| encounter.resolve(draft, &self.config.raid, &self.config.stimpaks));
            drop(rng);

            Transition::Commit(ClaimResult::Granted(Box::new(ClaimReceipt {
                location: location.name.clone(),
                caps_earned: rewards.caps_earned,
                xp_earned: rewards.xp_earned,
                loot,
                raid,
                new_level: draft.level,
                levels_gained: rewards.levels_gained,
                cooldown_ends_at: now_ms.saturating_add(self.config.claim.cooldown_ms),
                radiation: draft.radiation,
                hp: draft.hp,
                chain_tx: None,
            })))
        });

        let mut result = match committed {
            Ok(result) => result,
            Err(e) => {
                if let Some(id) = won_exclusive {
                    self.pool.release(&id, wallet);
                }
                tracing::warn!("Claim by {wallet} at {location_name} not saved: {e}");
                return Err(e);
            }
        };

        match &mut result {
            ClaimResult::Denied(denial) => {
                tracing::debug!("Claim by {wallet} at {location_name} denied: {denial}");
            }
            ClaimResult::Granted(receipt) => {
                receipt.chain_tx = self.mint_if_eligible(wallet, &receipt.loot);
                tracing::info!(
                    "Claim by {wallet} at {location_name}: +{} caps, +{} xp, level {}, raid={}",
                    receipt.caps_earned,
                    receipt.xp_earned,
                    receipt.new_level,
                    receipt.raid.as_ref().map_or("none", |r| r.enemy.as_str())
                );
            }
        }
        Ok(result)
    }

    /// Mints inventory loot at or above the threshold when simulation is off.
    fn mint_if_eligible(&self, wallet: &str, loot: &LootOutcome) -> Option<TransactionReference> {
        if self.config.chain.simulate {
            return None;
        }
        let item = match loot {
            LootOutcome::Exclusive(reference) => LootItem::Exclusive(reference.clone()),
            LootOutcome::Generic(item) => LootItem::Generic(item.clone()),
            LootOutcome::Gear(_) | LootOutcome::Nothing => return None,
        };
        if item.rarity() < self.config.chain.mint_threshold {
            return None;
        }
        match self.minter.mint(wallet, &item) {
            Ok(tx) => {
                tracing::info!("Minted {} to {wallet}: {}", item.id(), tx.signature);
                Some(tx)
            }
            Err(e) => {
                tracing::warn!("Mint of {} to {wallet} failed, reward kept: {e}", item.id());
                None
            }
        }
    }

    /// Buys one stimpak at the configured price.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientCurrency` if the wallet cannot pay (nothing
    /// changes), or `Storage` if the purchase could not be persisted.
    pub fn buy_stimpak(&self, wallet: &str, tier: StimpakTier) -> EngineResult<PurchaseReceipt> {
        let cost = self.config.stimpaks.spec(tier).price;
        let outcome = self.store.transact(wallet, |draft| {
            if draft.caps < cost {
                return Transition::Abort(Err(EngineError::InsufficientCurrency {
                    cost,
                    balance: draft.caps,
                }));
            }
            draft.caps -= cost;
            draft.stimpaks.push_back(Stimpak::new(tier));
            Transition::Commit(Ok(PurchaseReceipt {
                tier,
                cost,
                caps_remaining: draft.caps,
                stimpaks_owned: draft.stimpaks.len(),
            }))
        })?;

        if let Ok(receipt) = &outcome {
            tracing::info!(
                "{wallet} bought a {} for {cost} caps ({} left)",
                tier.display_name(),
                receipt.caps_remaining
            );
        }
        outcome
    }

    /// Pays a one-time quest reward.
    ///
    /// A repeat claim returns `already_claimed = true` and changes nothing.
    ///
    /// # Errors
    ///
    /// Returns `Storage` if the reward could not be persisted.
    pub fn claim_quest(&self, wallet: &str, quest_id: &str, xp: u64) -> EngineResult<QuestOutcome> {
        let outcome = self.store.transact(wallet, |draft| {
            if draft.completed_quests.contains(quest_id) {
                return Transition::Abort(QuestOutcome {
                    quest_id: quest_id.to_string(),
                    already_claimed: true,
                    xp_earned: 0,
                    levels_gained: 0,
                    new_level: draft.level,
                });
            }
            draft.completed_quests.insert(quest_id.to_string());
            let levels_gained = progression::grant_experience(draft, xp, &self.config.progression);
            Transition::Commit(QuestOutcome {
                quest_id: quest_id.to_string(),
                already_claimed: false,
                xp_earned: xp,
                levels_gained,
                new_level: draft.level,
            })
        })?;

        if outcome.already_claimed {
            tracing::debug!("{wallet} already completed quest {quest_id}");
        } else {
            tracing::info!("{wallet} completed quest {quest_id}: +{xp} xp, level {}", outcome.new_level);
        }
        Ok(outcome)
    }

    /// Committed state of a wallet, creating a fresh player if unseen.
    #[must_use]
    pub fn get_player(&self, wallet: &str) -> Player {
        self.store.get(wallet)
    }

    /// The location catalog in source order.
    #[must_use]
    pub fn get_locations(&self) -> &[Location] {
        self.catalog.locations()
    }

    /// Current ownership records of every mintable.
    #[must_use]
    pub fn mintables(&self) -> Vec<ExclusiveMintable> {
        self.pool.snapshot()
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// Marks every exclusive found in a persisted inventory as owned.
fn restore_ownership(pool: &MintablePool, repository: &dyn PlayerRepository) {
    let mut restored = 0usize;
    for player in repository.players() {
        for item in &player.inventory {
            let LootItem::Exclusive(reference) = item else {
                continue;
            };
            if pool.restore(&reference.id, &player.wallet, reference.claimed_at) {
                restored += 1;
            } else {
                tracing::warn!(
                    "{} holds mintable {} but the pool disagrees (unknown id or another owner)",
                    player.wallet,
                    reference.id
                );
            }
        }
    }
    if restored > 0 {
        tracing::info!("Restored ownership of {restored} mintables from persisted players");
    }
}

impl std::fmt::Debug for ClaimEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimEngine")
            .field("locations", &self.catalog.len())
            .field("pool", &self.pool)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::SimulatedMinter;
    use crate::rng::ScriptedSource;
    use crate::store::MemoryRepository;
    use atomicfizz_shared::Rarity;

    const T0: u64 = 1_700_000_000_000;

    fn catalog() -> LocationCatalog {
        let mut vault = Location::new("Vault 22", 36.1527, -115.3170);
        vault.required_level = 3;
        vault.rarity = Rarity::Rare;
        let mut dam = Location::new("Hoover Dam", 36.0161, -114.7377);
        dam.rarity = Rarity::Legendary;
        dam.hazardous = true;
        dam.radiation_yield = 10;
        LocationCatalog::new(vec![Location::new("Goodsprings Saloon", 35.8324, -115.4320), vault, dam]).unwrap()
    }

    fn engine(rng: ScriptedSource) -> ClaimEngine {
        ClaimEngine::new(
            EngineConfig::default(),
            catalog(),
            MintablePool::empty(),
            Arc::new(MemoryRepository),
        )
        .unwrap()
        .with_rng(rng)
    }

    struct FailingRepository;

    impl PlayerRepository for FailingRepository {
        fn load(&self, _wallet: &str) -> Option<Player> {
            None
        }

        fn persist(&self, _player: &Player) -> EngineResult<()> {
            Err(EngineError::Storage("disk full".into()))
        }
    }

    #[test]
    fn test_unknown_location() {
        let engine = engine(ScriptedSource::constant(0.5));
        let err = engine.claim_survival("w", "Atlantis", None, T0).unwrap_err();
        assert_eq!(err, EngineError::UnknownLocation("Atlantis".into()));
        assert_eq!(engine.get_player("w"), Player::new("w"));
    }

    #[test]
    fn test_granted_claim_receipt() {
        let engine = engine(ScriptedSource::constant(0.5));
        let result = engine.claim_survival("w", "Goodsprings Saloon", None, T0).unwrap();
        let receipt = result.receipt().unwrap();
        assert_eq!(receipt.caps_earned, 25);
        assert_eq!(receipt.xp_earned, 50);
        assert_eq!(receipt.cooldown_ends_at, T0 + 3_600_000);
        assert!(receipt.raid.is_none());
        assert!(receipt.chain_tx.is_none());

        let player = engine.get_player("w");
        assert_eq!(player.caps, 25);
        assert_eq!(player.last_claim_at, T0);
    }

    #[test]
    fn test_denied_claim_changes_nothing() {
        let engine = engine(ScriptedSource::constant(0.5));
        let before = engine.get_player("w");
        let result = engine.claim_survival("w", "Vault 22", None, T0).unwrap();
        assert!(matches!(
            result.denial(),
            Some(ClaimDenial::Underleveled { required_level: 3, .. })
        ));
        assert_eq!(engine.get_player("w"), before);
    }

    #[test]
    fn test_raid_after_rewards_at_hazardous_location() {
        // Weight roll 0.0 (relic), raid roll 0.0 (hit), enemy 0.0 (Deathclaw).
        let engine = engine(ScriptedSource::constant(0.0));
        let result = engine.claim_survival("w", "Hoover Dam", None, T0).unwrap();
        let receipt = result.receipt().unwrap();
        let raid = receipt.raid.as_ref().unwrap();
        assert_eq!(raid.enemy, "Deathclaw");
        assert_eq!(raid.damage, 100);
        assert!(!raid.won);
        assert_eq!(receipt.hp, 0);
        // Rewards stand even though the raid was lost.
        assert_eq!(receipt.caps_earned, 525);
        assert_eq!(engine.get_player("w").radiation, 10);
    }

    #[test]
    fn test_mint_only_when_not_simulating() {
        let mut config = EngineConfig::default();
        config.chain.simulate = false;
        let engine = ClaimEngine::new(config, catalog(), MintablePool::empty(), Arc::new(MemoryRepository))
            .unwrap()
            .with_rng(ScriptedSource::new(vec![0.0, 0.99]))
            .with_minter(SimulatedMinter::new(crate::config::ChainNetwork::Solana));

        // Legendary relic, no raid (roll 0.99).
        let result = engine.claim_survival("w", "Hoover Dam", None, T0).unwrap();
        let tx = result.receipt().unwrap().chain_tx.clone().unwrap();
        assert!(tx.signature.starts_with("SIM_"));

        // Common scrap is below the threshold.
        let result = engine.claim_survival("x", "Goodsprings Saloon", None, T0).unwrap();
        assert!(result.receipt().unwrap().chain_tx.is_none());
    }

    #[test]
    fn test_failed_mint_keeps_reward() {
        let mut config = EngineConfig::default();
        config.chain.simulate = false;
        let engine = ClaimEngine::new(config, catalog(), MintablePool::empty(), Arc::new(MemoryRepository))
            .unwrap()
            .with_rng(ScriptedSource::new(vec![0.0, 0.99]))
            .with_minter(SimulatedMinter::failing());

        let result = engine.claim_survival("w", "Hoover Dam", None, T0).unwrap();
        let receipt = result.receipt().unwrap();
        assert!(receipt.chain_tx.is_none());
        assert!(matches!(receipt.loot, LootOutcome::Generic(ref g) if g.id == "relic"));
        assert_eq!(engine.get_player("w").inventory.len(), 1);
    }

    #[test]
    fn test_unsaved_claim_returns_exclusive_to_pool() {
        let pool = MintablePool::new(vec![ExclusiveMintable {
            id: "af-0001".into(),
            name: "Sunset Sarsaparilla Star Cap".into(),
            rarity: Rarity::Rare,
            source_location: "Goodsprings Saloon".into(),
            level_requirement: 1,
            claimed_by: None,
            claimed_at: None,
        }]);
        // Exclusive roll 0.0 always hits.
        let engine = ClaimEngine::new(EngineConfig::default(), catalog(), pool, Arc::new(FailingRepository))
            .unwrap()
            .with_rng(ScriptedSource::constant(0.0));

        let err = engine.claim_survival("w", "Goodsprings Saloon", None, T0).unwrap_err();
        assert!(matches!(err, EngineError::Storage(_)));
        assert_eq!(engine.mintables()[0].claimed_by, None);
        assert_eq!(engine.get_player("w"), Player::new("w"));
    }

    #[test]
    fn test_buy_stimpak() {
        let engine = engine(ScriptedSource::constant(0.5));
        let err = engine.buy_stimpak("w", StimpakTier::Common).unwrap_err();
        assert_eq!(err, EngineError::InsufficientCurrency { cost: 50, balance: 0 });

        engine.claim_survival("w", "Goodsprings Saloon", None, T0).unwrap();
        engine.claim_survival("w", "Goodsprings Saloon", None, T0 + 3_600_000).unwrap();
        let receipt = engine.buy_stimpak("w", StimpakTier::Common).unwrap();
        assert_eq!(receipt.caps_remaining, 0);
        assert_eq!(receipt.stimpaks_owned, 1);
        assert_eq!(engine.get_player("w").stimpaks.len(), 1);
    }

    #[test]
    fn test_quest_is_one_time() {
        let engine = engine(ScriptedSource::constant(0.5));
        let first = engine.claim_quest("w", "ghoul-problem", 350).unwrap();
        assert!(!first.already_claimed);
        assert_eq!(first.new_level, 3);
        assert_eq!(first.levels_gained, 2);

        let before = engine.get_player("w");
        let again = engine.claim_quest("w", "ghoul-problem", 350).unwrap();
        assert!(again.already_claimed);
        assert_eq!(again.xp_earned, 0);
        assert_eq!(engine.get_player("w"), before);
    }
}
