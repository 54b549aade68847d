//! # Rewards & Progression
//!
//! Applies what a granted claim pays out: caps, experience, radiation, the
//! resolved loot, and any level-ups the experience triggers.
//!
//! ## Leveling Curve
//!
//! Clearing level `n` costs `n * xp_per_level` experience. The cost is
//! subtracted on each level-up, so one large grant can climb several levels:
//!
//! ```text
//! level 1, xp 250, xp_per_level 100
//!   250 >= 100  -> level 2, xp 150
//!   150 >= 200? no
//! ```

use atomicfizz_shared::{Location, LootItem, Player};
use serde::{Deserialize, Serialize};

use crate::config::{ClaimRules, ProgressionRules};
use crate::loot::LootOutcome;

/// What a claim paid out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardSummary {
    /// Caps added, base plus rarity bonus.
    pub caps_earned: u64,
    /// Experience added.
    pub xp_earned: u64,
    /// Levels climbed by this grant.
    pub levels_gained: u32,
}

/// Adds experience and runs the leveling loop.
///
/// Every level-up raises `max_hp` by `hp_per_level` and refills `hp`.
/// Returns the number of levels gained.
pub fn grant_experience(player: &mut Player, xp: u64, rules: &ProgressionRules) -> u32 {
    player.experience = player.experience.saturating_add(xp);

    // xp_per_level > 0 is a validated config invariant; the max keeps the
    // loop finite even for a hand-built rule set.
    let per_level = rules.xp_per_level.max(1);
    let mut gained = 0;
    loop {
        let threshold = u64::from(player.level).saturating_mul(per_level);
        if player.experience < threshold || player.level == u32::MAX {
            break;
        }
        player.experience -= threshold;
        player.level += 1;
        player.max_hp = player.max_hp.saturating_add(rules.hp_per_level);
        player.hp = player.max_hp;
        gained += 1;
    }
    gained
}

/// Applies every reward of a granted claim to the draft player.
pub fn apply_claim_rewards(
    player: &mut Player,
    location: &Location,
    loot: &LootOutcome,
    now_ms: u64,
    claim: &ClaimRules,
    progression: &ProgressionRules,
) -> RewardSummary {
    let caps_earned = claim
        .base_caps
        .saturating_add(claim.rarity_bonus.for_rarity(location.rarity));
    player.caps = player.caps.saturating_add(caps_earned);

    player.radiation = player.radiation.saturating_add(location.radiation_yield);
    player.last_claim_at = now_ms;
    player.claimed_spots.insert(location.name.clone());

    match loot {
        LootOutcome::Exclusive(reference) => player.inventory.push(LootItem::Exclusive(reference.clone())),
        LootOutcome::Generic(item) => player.inventory.push(LootItem::Generic(item.clone())),
        LootOutcome::Gear(gear) => player.gear.push(gear.clone()),
        LootOutcome::Nothing => {}
    }

    let levels_gained = grant_experience(player, claim.xp_per_claim, progression);

    RewardSummary {
        caps_earned,
        xp_earned: claim.xp_per_claim,
        levels_gained,
    }
}
