use serde::{Deserialize, Serialize};
use std::fmt;

/// Exclusive upper bound of the efficient tier
pub const EFFICIENT_BELOW: u64 = 50;
/// Exclusive upper bound of the moderate tier
pub const MODERATE_BELOW: u64 = 150;
/// Exclusive upper bound of the wasteful tier
pub const WASTEFUL_BELOW: u64 = 300;

/// How wasteful a prompt is, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityTier {
    Efficient,
    Moderate,
    Wasteful,
    Excessive,
}

impl SeverityTier {
    pub const ALL: [SeverityTier; 4] = [
        SeverityTier::Efficient,
        SeverityTier::Moderate,
        SeverityTier::Wasteful,
        SeverityTier::Excessive,
    ];

    /// Classify a token count. Each threshold belongs to the next tier up.
    pub fn classify(tokens: u64) -> Self {
        if tokens < EFFICIENT_BELOW {
            SeverityTier::Efficient
        } else if tokens < MODERATE_BELOW {
            SeverityTier::Moderate
        } else if tokens < WASTEFUL_BELOW {
            SeverityTier::Wasteful
        } else {
            SeverityTier::Excessive
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityTier::Efficient => "efficient",
            SeverityTier::Moderate => "moderate",
            SeverityTier::Wasteful => "wasteful",
            SeverityTier::Excessive => "excessive",
        }
    }
}

impl fmt::Display for SeverityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(SeverityTier::classify(0), SeverityTier::Efficient);
        assert_eq!(SeverityTier::classify(49), SeverityTier::Efficient);
        assert_eq!(SeverityTier::classify(50), SeverityTier::Moderate);
        assert_eq!(SeverityTier::classify(149), SeverityTier::Moderate);
        assert_eq!(SeverityTier::classify(150), SeverityTier::Wasteful);
        assert_eq!(SeverityTier::classify(299), SeverityTier::Wasteful);
        assert_eq!(SeverityTier::classify(300), SeverityTier::Excessive);
        assert_eq!(SeverityTier::classify(u64::MAX), SeverityTier::Excessive);
    }

    #[test]
    fn test_tier_serialization() {
        assert_eq!(serde_json::to_string(&SeverityTier::Wasteful).unwrap(), "\"wasteful\"");
        assert_eq!(SeverityTier::Excessive.to_string(), "excessive");
    }

    #[test]
    fn test_tiers_are_ordered() {
        assert!(SeverityTier::Efficient < SeverityTier::Moderate);
        assert!(SeverityTier::Moderate < SeverityTier::Wasteful);
        assert!(SeverityTier::Wasteful < SeverityTier::Excessive);
    }

    proptest! {
        #[test]
        fn prop_classify_is_monotonic(a in any::<u64>(), b in any::<u64>()) {
            let (low, high) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(SeverityTier::classify(low) <= SeverityTier::classify(high));
        }
    }
}
