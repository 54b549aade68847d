//! # Eligibility Gate
//!
//! Decides whether a claim may proceed. Pure: no locks, no randomness, no
//! mutation. Checks run in a fixed order and the first failure wins:
//!
//! 1. Cooldown since the last successful claim
//! 2. Level requirement of the location
//! 3. Geofence, only when the claimant reported coordinates

use atomicfizz_shared::{haversine_m, Coordinates, Location, Player};
use serde::{Deserialize, Serialize};

use crate::config::ClaimRules;

/// Why a claim was refused. Expected, user-facing, never mutates state.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ClaimDenial {
    /// Claimed too recently.
    CooldownActive {
        /// Time until the next claim is allowed (ms).
        remaining_ms: u64,
    },
    /// Player level below the location's requirement.
    Underleveled {
        /// Level the location needs.
        required_level: u32,
        /// Level the player has.
        current_level: u32,
    },
    /// Claimant too far from the location.
    OutOfRange {
        /// Distance to the location, rounded to whole meters. `u64::MAX` when
        /// the claimant's coordinates give no usable distance.
        distance_m: u64,
        /// Radius that applied.
        radius_m: f64,
    },
}

impl std::fmt::Display for ClaimDenial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CooldownActive { remaining_ms } => write!(f, "cooldown active, {remaining_ms} ms remaining"),
            Self::Underleveled { required_level, .. } => write!(f, "underleveled, need level {required_level}"),
            Self::OutOfRange {
                distance_m: u64::MAX, ..
            } => write!(f, "too far, distance unknown"),
            Self::OutOfRange { distance_m, .. } => write!(f, "too far, {distance_m} m away"),
        }
    }
}

/// Gate verdict.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GateDecision {
    /// Claim may proceed.
    Allow,
    /// Claim refused.
    Deny(ClaimDenial),
}

impl GateDecision {
    /// True for [`GateDecision::Allow`].
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Runs the gate checks in order.
#[must_use]
pub fn evaluate(
    player: &Player,
    location: &Location,
    claimant: Option<Coordinates>,
    now_ms: u64,
    rules: &ClaimRules,
) -> GateDecision {
    // A wallet that never claimed has no cooldown to wait out.
    if player.last_claim_at != 0 {
        let elapsed = now_ms.saturating_sub(player.last_claim_at);
        if elapsed < rules.cooldown_ms {
            return GateDecision::Deny(ClaimDenial::CooldownActive {
                remaining_ms: rules.cooldown_ms - elapsed,
            });
        }
    }

    if player.level < location.required_level {
        return GateDecision::Deny(ClaimDenial::Underleveled {
            required_level: location.required_level,
            current_level: player.level,
        });
    }

    if let Some(claimant) = claimant {
        let radius_m = location.claim_radius_m.unwrap_or(rules.default_radius_m);
        let distance = haversine_m(claimant, location.coordinates());
        // Inclusive: standing exactly on the boundary counts as in range.
        if !distance.is_finite() {
            return GateDecision::Deny(ClaimDenial::OutOfRange {
                distance_m: u64::MAX,
                radius_m,
            });
        }
        if distance > radius_m {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let distance_m = distance.round() as u64;
            return GateDecision::Deny(ClaimDenial::OutOfRange { distance_m, radius_m });
        }
    }

    GateDecision::Allow
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: u64 = 3_600_000;

    fn saloon() -> Location {
        Location::new("Goodsprings Saloon", 35.8324, -115.4320)
    }

    fn rules() -> ClaimRules {
        ClaimRules::default()
    }

    #[test]
    fn test_fresh_player_allowed() {
        let player = Player::new("w");
        let decision = evaluate(&player, &saloon(), None, 1_000, &rules());
        assert!(decision.is_allowed());
    }

    #[test]
    fn test_cooldown_denies_with_remaining() {
        let mut player = Player::new("w");
        player.last_claim_at = 10 * HOUR;
        let decision = evaluate(&player, &saloon(), None, 10 * HOUR + 1_000, &rules());
        assert_eq!(
            decision,
            GateDecision::Deny(ClaimDenial::CooldownActive {
                remaining_ms: HOUR - 1_000
            })
        );
    }

    #[test]
    fn test_cooldown_expires_exactly_at_window() {
        let mut player = Player::new("w");
        player.last_claim_at = 10 * HOUR;
        assert!(evaluate(&player, &saloon(), None, 11 * HOUR, &rules()).is_allowed());
    }

    #[test]
    fn test_cooldown_checked_before_level() {
        let mut player = Player::new("w");
        player.last_claim_at = HOUR;
        let mut vault = saloon();
        vault.required_level = 77;
        let decision = evaluate(&player, &vault, None, HOUR + 1, &rules());
        assert!(matches!(
            decision,
            GateDecision::Deny(ClaimDenial::CooldownActive { .. })
        ));
    }

    #[test]
    fn test_underleveled() {
        let player = Player::new("w");
        let mut vault = saloon();
        vault.required_level = 77;
        let decision = evaluate(&player, &vault, None, HOUR, &rules());
        assert_eq!(
            decision,
            GateDecision::Deny(ClaimDenial::Underleveled {
                required_level: 77,
                current_level: 1
            })
        );
    }

    #[test]
    fn test_level_checked_before_distance() {
        let player = Player::new("w");
        let mut vault = saloon();
        vault.required_level = 2;
        let far_away = Some(Coordinates::new(0.0, 0.0));
        let decision = evaluate(&player, &vault, far_away, HOUR, &rules());
        assert!(matches!(
            decision,
            GateDecision::Deny(ClaimDenial::Underleveled { .. })
        ));
    }

    #[test]
    fn test_geofence_boundary_is_inclusive() {
        let player = Player::new("w");
        let claimant = Coordinates::new(35.8344, -115.4320);
        let mut loc = saloon();
        let distance = haversine_m(claimant, loc.coordinates());

        loc.claim_radius_m = Some(distance);
        assert!(evaluate(&player, &loc, Some(claimant), HOUR, &rules()).is_allowed());

        loc.claim_radius_m = Some(distance - 1.0);
        let decision = evaluate(&player, &loc, Some(claimant), HOUR, &rules());
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let expected = distance.round() as u64;
        assert!(matches!(
            decision,
            GateDecision::Deny(ClaimDenial::OutOfRange { distance_m, .. }) if distance_m == expected
        ));
    }

    #[test]
    fn test_default_radius_applies() {
        let player = Player::new("w");
        let loc = saloon();
        // ~222 m north of the saloon: inside the 250 m default.
        let near = Coordinates::new(35.8344, -115.4320);
        assert!(evaluate(&player, &loc, Some(near), HOUR, &rules()).is_allowed());

        let tight = ClaimRules {
            default_radius_m: 100.0,
            ..ClaimRules::default()
        };
        assert!(!evaluate(&player, &loc, Some(near), HOUR, &tight).is_allowed());
    }

    #[test]
    fn test_no_coordinates_skips_geofence() {
        let player = Player::new("w");
        let mut loc = saloon();
        loc.claim_radius_m = Some(1.0);
        assert!(evaluate(&player, &loc, None, HOUR, &rules()).is_allowed());
    }

    #[test]
    fn test_unusable_coordinates_report_unknown_distance() {
        let player = Player::new("w");
        let loc = saloon();
        let garbage = Coordinates::new(f64::NAN, -115.4320);
        let decision = evaluate(&player, &loc, Some(garbage), HOUR, &rules());
        let GateDecision::Deny(denial) = decision else {
            panic!("NaN coordinates must not pass the geofence");
        };
        assert_eq!(
            denial,
            ClaimDenial::OutOfRange {
                distance_m: u64::MAX,
                radius_m: 250.0
            }
        );
        assert_eq!(denial.to_string(), "too far, distance unknown");
    }

    #[test]
    fn test_denial_display() {
        let d = ClaimDenial::Underleveled {
            required_level: 77,
            current_level: 3,
        };
        assert_eq!(d.to_string(), "underleveled, need level 77");
    }
}
