//! Plan tiers and metered feature entitlements
//!
//! The entitlement table is static: every (feature, plan) pair maps to a
//! per-period allowance, where [`UNLIMITED`] means no cap.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Sentinel allowance meaning "no cap"
pub const UNLIMITED: i64 = -1;

// ========================================
// Plan tiers
// ========================================

/// Subscription tier of an individual account or organization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PlanTier {
    #[default]
    Free,
    Standard,
    Premium,
    Classroom,
}

impl PlanTier {
    pub const ALL: [PlanTier; 4] = [
        PlanTier::Free,
        PlanTier::Standard,
        PlanTier::Premium,
        PlanTier::Classroom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlanTier::Free => "FREE",
            PlanTier::Standard => "STANDARD",
            PlanTier::Premium => "PREMIUM",
            PlanTier::Classroom => "CLASSROOM",
        }
    }

    /// Whether an organization on this tier can take additional teachers
    pub fn allows_multiple_teachers(&self) -> bool {
        matches!(self, PlanTier::Premium | PlanTier::Classroom)
    }

    /// Map a payment product name onto the tier it grants.
    ///
    /// "Premium" and "Standard" are individual products; every other product
    /// is an organization (classroom) subscription.
    pub fn from_product_name(product: &str) -> PlanTier {
        match product.trim() {
            "Premium" => PlanTier::Premium,
            "Standard" | "Basic" => PlanTier::Standard,
            _ => PlanTier::Classroom,
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanTier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FREE" => Ok(PlanTier::Free),
            // BASIC is the legacy name of the standard tier
            "STANDARD" | "BASIC" => Ok(PlanTier::Standard),
            "PREMIUM" => Ok(PlanTier::Premium),
            "CLASSROOM" => Ok(PlanTier::Classroom),
            other => Err(Error::InvalidInput(format!("Unknown plan: {}", other))),
        }
    }
}

// ========================================
// Metered features
// ========================================

/// Feature whose use is counted against a plan allowance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    NaturalTts,
    PremiumStt,
    BasicAudiobooks,
    PremiumAudiobooks,
}

impl Feature {
    pub const ALL: [Feature; 4] = [
        Feature::NaturalTts,
        Feature::PremiumStt,
        Feature::BasicAudiobooks,
        Feature::PremiumAudiobooks,
    ];

    /// Stable identifier stored in the usage ledger
    pub fn id(&self) -> &'static str {
        match self {
            Feature::NaturalTts => "natural_tts",
            Feature::PremiumStt => "premium_stt",
            Feature::BasicAudiobooks => "basic_audiobooks",
            Feature::PremiumAudiobooks => "premium_audiobooks",
        }
    }

    pub fn from_id(id: &str) -> Option<Feature> {
        Feature::ALL.into_iter().find(|f| f.id() == id)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Per-period allowance for a feature on a plan ([`UNLIMITED`] = no cap)
pub fn limit_for(feature: Feature, plan: PlanTier) -> i64 {
    use Feature::*;
    use PlanTier::*;

    match (feature, plan) {
        (NaturalTts, Free) => 20,
        (NaturalTts, Standard | Premium | Classroom) => UNLIMITED,

        (PremiumStt, Free) => 20,
        (PremiumStt, Standard | Premium | Classroom) => UNLIMITED,

        (BasicAudiobooks, Free) => 0,
        (BasicAudiobooks, Standard | Premium | Classroom) => UNLIMITED,

        (PremiumAudiobooks, Free | Standard) => 5,
        (PremiumAudiobooks, Premium) => UNLIMITED,
        (PremiumAudiobooks, Classroom) => 20,
    }
}

// ========================================
// Entitlement evaluation
// ========================================

/// Outcome of comparing current usage against an allowance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entitlement {
    /// Plan has no cap on this feature
    Unlimited,
    /// Requested amount fits within the remaining allowance
    Allowed,
    /// Plan grants zero of this feature
    Restricted,
    /// Allowance already consumed
    LimitReached,
}

impl Entitlement {
    /// Evaluate whether `amount` more units may be consumed.
    ///
    /// The unlimited sentinel short-circuits every comparison; a zero
    /// allowance is reported as restricted rather than exhausted.
    pub fn evaluate(limit: i64, used: i64, amount: i64) -> Entitlement {
        if limit == UNLIMITED {
            Entitlement::Unlimited
        } else if limit == 0 {
            Entitlement::Restricted
        } else if used.saturating_add(amount) > limit {
            Entitlement::LimitReached
        } else {
            Entitlement::Allowed
        }
    }

    /// Unlimited or allowed
    pub fn is_permitted(&self) -> bool {
        matches!(self, Entitlement::Unlimited | Entitlement::Allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_limit_is_unlimited_or_non_negative() {
        for feature in Feature::ALL {
            for plan in PlanTier::ALL {
                let limit = limit_for(feature, plan);
                assert!(
                    limit == UNLIMITED || limit >= 0,
                    "{} on {} has invalid limit {}",
                    feature,
                    plan,
                    limit
                );
            }
        }
    }

    #[test]
    fn test_free_tier_allowances() {
        assert_eq!(limit_for(Feature::NaturalTts, PlanTier::Free), 20);
        assert_eq!(limit_for(Feature::PremiumStt, PlanTier::Free), 20);
        assert_eq!(limit_for(Feature::BasicAudiobooks, PlanTier::Free), 0);
        assert_eq!(limit_for(Feature::PremiumAudiobooks, PlanTier::Free), 5);
    }

    #[test]
    fn test_premium_audiobooks_per_tier() {
        assert_eq!(limit_for(Feature::PremiumAudiobooks, PlanTier::Standard), 5);
        assert_eq!(limit_for(Feature::PremiumAudiobooks, PlanTier::Premium), UNLIMITED);
        assert_eq!(limit_for(Feature::PremiumAudiobooks, PlanTier::Classroom), 20);
    }

    #[test]
    fn test_unlimited_bypasses_comparison() {
        assert_eq!(Entitlement::evaluate(UNLIMITED, 1_000_000, 1), Entitlement::Unlimited);
        assert!(Entitlement::evaluate(UNLIMITED, i64::MAX - 1, 1).is_permitted());
    }

    #[test]
    fn test_zero_limit_is_restricted() {
        assert_eq!(Entitlement::evaluate(0, 0, 1), Entitlement::Restricted);
    }

    #[test]
    fn test_limit_boundary() {
        assert_eq!(Entitlement::evaluate(20, 19, 1), Entitlement::Allowed);
        assert_eq!(Entitlement::evaluate(20, 20, 1), Entitlement::LimitReached);
        assert_eq!(Entitlement::evaluate(5, 3, 3), Entitlement::LimitReached);
    }

    #[test]
    fn test_plan_parsing_accepts_legacy_basic() {
        assert_eq!("BASIC".parse::<PlanTier>().unwrap(), PlanTier::Standard);
        assert_eq!("classroom".parse::<PlanTier>().unwrap(), PlanTier::Classroom);
        assert!("GOLD".parse::<PlanTier>().is_err());
    }

    #[test]
    fn test_product_names() {
        assert_eq!(PlanTier::from_product_name("Premium"), PlanTier::Premium);
        assert_eq!(PlanTier::from_product_name("Standard"), PlanTier::Standard);
        assert_eq!(PlanTier::from_product_name("Classroom Plan"), PlanTier::Classroom);
    }

    #[test]
    fn test_only_premium_and_classroom_take_extra_teachers() {
        assert!(!PlanTier::Free.allows_multiple_teachers());
        assert!(!PlanTier::Standard.allows_multiple_teachers());
        assert!(PlanTier::Premium.allows_multiple_teachers());
        assert!(PlanTier::Classroom.allows_multiple_teachers());
    }

    #[test]
    fn test_feature_ids_round_trip() {
        for feature in Feature::ALL {
            assert_eq!(Feature::from_id(feature.id()), Some(feature));
        }
        assert_eq!(Feature::from_id("holograms"), None);
    }
}
