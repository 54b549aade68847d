//! # Raid Resolution
//!
//! A raid is a one-shot combat encounter rolled after a claim's rewards land.
//!
//! ```text
//!   Idle ──roll_encounter──► Encounter ──resolve──► RaidOutcome
//!     │                      (enemy chosen)         (hp, wear, revival applied)
//!     └── roll missed: no raid
//! ```
//!
//! The states are types: an [`Encounter`] can only come from a successful
//! trigger roll, and resolving it consumes it, so a raid cannot be resolved
//! twice or without an enemy.
//!
//! ## Combat
//!
//! ```text
//! defense = base_defense + Σ gear.defense * durability / 100
//! damage  = floor(max(0, attack - defense))
//! ```
//!
//! Every gear item then wears by `wear_per_raid`. A player knocked to 0 hp
//! burns the oldest stimpak, if any, to come back.

use atomicfizz_shared::{GearItem, Location, Player, StimpakTier};
use serde::{Deserialize, Serialize};

use crate::config::{EnemySpec, RaidRules, StimpakRules};
use crate::rng::RandomSource;

/// Rolls the raid trigger for a granted claim.
///
/// Always draws the trigger roll; draws the enemy index only on a hit.
pub fn roll_encounter(location: &Location, rules: &RaidRules, rng: &mut dyn RandomSource) -> Option<Encounter> {
    let chance = if location.hazardous {
        rules.hazardous_chance
    } else {
        rules.baseline_chance
    };
    if rng.next_unit() >= chance {
        return None;
    }
    let enemy = rules.enemies.get(rng.next_index(rules.enemies.len()))?.clone();
    tracing::debug!("{} ambushes the claimant at {}", enemy.name, location.name);
    Some(Encounter { enemy })
}

/// A triggered raid waiting to be fought.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Encounter {
    enemy: EnemySpec,
}

impl Encounter {
    /// Encounter against a specific enemy.
    #[must_use]
    pub const fn new(enemy: EnemySpec) -> Self {
        Self { enemy }
    }

    /// The attacker.
    #[must_use]
    pub const fn enemy(&self) -> &EnemySpec {
        &self.enemy
    }

    /// Fights the encounter, mutating the player's hp, gear and stimpaks.
    pub fn resolve(self, player: &mut Player, rules: &RaidRules, stimpaks: &StimpakRules) -> RaidOutcome {
        let defense = total_defense(&player.gear, rules.base_defense);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let damage = (f64::from(self.enemy.attack) - defense).max(0.0).floor() as u32;

        player.hp = player.hp.saturating_sub(damage);
        for gear in &mut player.gear {
            gear.wear(rules.wear_per_raid);
        }

        let mut stimpak_used = None;
        let (won, revived) = if player.hp > 0 {
            player.raids_won = player.raids_won.saturating_add(1);
            (true, false)
        } else if let Some(stimpak) = player.stimpaks.pop_front() {
            let spec = stimpaks.spec(stimpak.tier);
            player.hp = spec.revive_hp.min(player.max_hp);
            for gear in &mut player.gear {
                gear.repair(spec.gear_repair);
            }
            stimpak_used = Some(stimpak.tier);
            (false, true)
        } else {
            (false, false)
        };

        RaidOutcome {
            enemy: self.enemy.name,
            attack: self.enemy.attack,
            defense,
            damage,
            won,
            revived,
            hp: player.hp,
            gear: player.gear.clone(),
            stimpak_used,
        }
    }
}

/// Base defense plus durability-scaled gear defense.
#[must_use]
pub fn total_defense(gear: &[GearItem], base_defense: f64) -> f64 {
    base_defense + gear.iter().map(GearItem::effective_defense).sum::<f64>()
}

/// How a raid ended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RaidOutcome {
    /// Enemy name.
    pub enemy: String,
    /// Enemy attack.
    pub attack: u32,
    /// Player defense at the start of the fight.
    pub defense: f64,
    /// Damage taken.
    pub damage: u32,
    /// Survived without falling.
    pub won: bool,
    /// Fell and came back on a stimpak.
    pub revived: bool,
    /// Hit points after the raid.
    pub hp: u32,
    /// Gear after wear and any repair.
    pub gear: Vec<GearItem>,
    /// Tier of the stimpak consumed, if any.
    pub stimpak_used: Option<StimpakTier>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::ScriptedSource;
    use atomicfizz_shared::{Rarity, Stimpak};

    fn deathclaw() -> Encounter {
        Encounter::new(EnemySpec::new("Deathclaw", 120))
    }

    #[test]
    fn test_revival_with_common_stimpak() {
        let mut player = Player::new("w");
        player.hp = 10;
        player.stimpaks.push_back(Stimpak::new(StimpakTier::Common));

        let outcome = deathclaw().resolve(&mut player, &RaidRules::default(), &StimpakRules::default());

        assert!(outcome.revived);
        assert!(!outcome.won);
        assert_eq!(outcome.hp, 50);
        assert_eq!(player.hp, 50);
        assert!(player.stimpaks.is_empty());
        assert_eq!(outcome.stimpak_used, Some(StimpakTier::Common));
        assert_eq!(player.raids_won, 0);
    }

    #[test]
    fn test_loss_without_stimpak() {
        let mut player = Player::new("w");
        player.hp = 10;

        let outcome = deathclaw().resolve(&mut player, &RaidRules::default(), &StimpakRules::default());

        assert!(!outcome.revived);
        assert!(!outcome.won);
        assert_eq!(outcome.hp, 0);
        assert_eq!(player.hp, 0);
    }

    #[test]
    fn test_win_counts_and_takes_damage() {
        let mut player = Player::new("w");
        player.gear.push(GearItem::new("Combat Armor", Rarity::Rare, 15));

        // 60 - (20 + 15) = 25 damage.
        let raiders = Encounter::new(EnemySpec::new("Raider Gang", 60));
        let outcome = raiders.resolve(&mut player, &RaidRules::default(), &StimpakRules::default());

        assert!(outcome.won);
        assert_eq!(outcome.damage, 25);
        assert_eq!(player.hp, 75);
        assert_eq!(player.raids_won, 1);
        assert_eq!(player.gear[0].durability, 90);
    }

    #[test]
    fn test_defense_above_attack_deals_nothing() {
        let mut player = Player::new("w");
        player.gear.push(GearItem::new("Power Armor T-51b", Rarity::Legendary, 40));
        let raiders = Encounter::new(EnemySpec::new("Raider Gang", 60));
        let outcome = raiders.resolve(&mut player, &RaidRules::default(), &StimpakRules::default());
        assert_eq!(outcome.damage, 0);
        assert_eq!(player.hp, 100);
    }

    #[test]
    fn test_worn_gear_defends_less() {
        let mut gear = GearItem::new("Combat Armor", Rarity::Rare, 15);
        gear.wear(50);
        assert!((total_defense(&[gear], 20.0) - 27.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_revival_repairs_gear_and_uses_oldest_stimpak() {
        let mut player = Player::new("w");
        player.hp = 1;
        let mut armor = GearItem::new("Leather Armor", Rarity::Common, 5);
        armor.wear(60);
        player.gear.push(armor);
        player.stimpaks.push_back(Stimpak::new(StimpakTier::Rare));
        player.stimpaks.push_back(Stimpak::new(StimpakTier::Common));

        let outcome = deathclaw().resolve(&mut player, &RaidRules::default(), &StimpakRules::default());

        assert_eq!(outcome.stimpak_used, Some(StimpakTier::Rare));
        assert_eq!(player.hp, 100);
        // 40 - 10 wear + 50 repair.
        assert_eq!(player.gear[0].durability, 80);
        assert_eq!(player.stimpaks.len(), 1);
    }

    #[test]
    fn test_revive_clamped_to_max_hp() {
        let mut player = Player::new("w");
        player.hp = 1;
        player.max_hp = 60;
        player.stimpaks.push_back(Stimpak::new(StimpakTier::Rare));
        deathclaw().resolve(&mut player, &RaidRules::default(), &StimpakRules::default());
        assert_eq!(player.hp, 60);
    }

    #[test]
    fn test_trigger_only_at_hazardous_by_default() {
        let rules = RaidRules::default();
        let mut loc = Location::new("Vault 22", 36.0, -115.0);

        let mut rng = ScriptedSource::new(vec![0.01, 0.0]);
        assert!(roll_encounter(&loc, &rules, &mut rng).is_none());
        assert_eq!(rng.draws(), 1);

        loc.hazardous = true;
        let mut rng = ScriptedSource::new(vec![0.01, 0.0]);
        let encounter = roll_encounter(&loc, &rules, &mut rng).unwrap();
        assert_eq!(encounter.enemy().name, "Deathclaw");
        assert_eq!(rng.draws(), 2);

        let mut rng = ScriptedSource::new(vec![0.05]);
        assert!(roll_encounter(&loc, &rules, &mut rng).is_none());
    }

    #[test]
    fn test_enemy_index_picks_roster_entry() {
        let rules = RaidRules {
            baseline_chance: 1.0,
            ..RaidRules::default()
        };
        let loc = Location::new("Primm", 35.6, -115.4);
        let mut rng = ScriptedSource::new(vec![0.0, 0.9]);
        let encounter = roll_encounter(&loc, &rules, &mut rng).unwrap();
        assert_eq!(encounter.enemy().name, "Raider Gang");
    }
}
