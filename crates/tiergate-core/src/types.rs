use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// Execution complexity level
///
/// Totally ordered: escalation only ever moves from `Quick` towards
/// `Comprehensive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Fast pass with a small token ceiling
    Quick,
    /// Thorough pass with moderate token usage
    Detailed,
    /// Full solution with the largest token ceiling
    Comprehensive,
}

impl Tier {
    /// All tiers in escalation order
    pub const ALL: [Self; 3] = [Self::Quick, Self::Detailed, Self::Comprehensive];

    /// The tier escalation moves to, if any
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Quick => Some(Self::Detailed),
            Self::Detailed => Some(Self::Comprehensive),
            Self::Comprehensive => None,
        }
    }

    /// Position in escalation order, starting at 0
    pub const fn index(self) -> usize {
        match self {
            Self::Quick => 0,
            Self::Detailed => 1,
            Self::Comprehensive => 2,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Quick => "quick",
            Self::Detailed => "detailed",
            Self::Comprehensive => "comprehensive",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which kind of backend a tier leans towards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierPreference {
    /// Favor cheap, fast backends
    Fast,
    /// Balance cost against quality
    Balanced,
    /// Favor the strongest backends
    Quality,
}

impl TierPreference {
    /// Complexity estimate and quality requirement handed to the selector
    pub const fn selection_targets(self) -> (f64, f64) {
        match self {
            Self::Fast => (0.3, 0.6),
            Self::Balanced => (0.6, 0.8),
            Self::Quality => (0.9, 0.95),
        }
    }

    /// Whether input compression should keep full code bodies
    pub const fn preserves_structure(self) -> bool {
        !matches!(self, Self::Fast)
    }
}

/// Pricing class of a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendClass {
    /// Local model, no per-token charge
    LocalFree,
    /// Lowest paid tier
    Cheap,
    /// Mid-priced paid tier
    Balanced,
    /// High-priced paid tier
    Premium,
    /// Most expensive paid tier
    Max,
}

impl BackendClass {
    /// Whether calls against this class are billed
    pub const fn requires_payment(self) -> bool {
        !matches!(self, Self::LocalFree)
    }
}

/// How quickly the caller needs an answer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    #[default]
    Normal,
    High,
}

impl Urgency {
    pub const fn is_high(self) -> bool {
        matches!(self, Self::High)
    }
}

/// Task parameters as passed by the caller
pub type Params = serde_json::Map<String, serde_json::Value>;

/// Named string outputs produced by an executor
pub type Outputs = BTreeMap<String, String>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_escalate_forward_only() {
        assert_eq!(Tier::Quick.next(), Some(Tier::Detailed));
        assert_eq!(Tier::Detailed.next(), Some(Tier::Comprehensive));
        assert_eq!(Tier::Comprehensive.next(), None);
        assert!(Tier::Quick < Tier::Detailed && Tier::Detailed < Tier::Comprehensive);
    }

    #[test]
    fn tier_round_trips_through_snake_case() {
        let tier: Tier = serde_json::from_str("\"comprehensive\"").unwrap();
        assert_eq!(tier, Tier::Comprehensive);
        assert_eq!(serde_json::to_string(&Tier::Quick).unwrap(), "\"quick\"");
    }

    #[test]
    fn only_local_backends_are_free() {
        assert!(!BackendClass::LocalFree.requires_payment());
        assert!(BackendClass::Cheap.requires_payment());
        assert!(BackendClass::Max.requires_payment());
    }
}
