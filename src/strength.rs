//! Reference strengths and the per-slot strength configuration.

use core::fmt;

/// How a cache slot holds its key or its value.
///
/// - `Strong`: never reclaimed while the slot holds it.
/// - `Soft`: reclaimed by a full collection (memory pressure) once nothing
///   outside the collector holds the referent.
/// - `Weak`: reclaimed by any collection once nothing outside the collector
///   holds the referent.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum ReferenceStrength {
    #[default]
    Strong,
    Soft,
    Weak,
}

impl ReferenceStrength {
    /// Resolve an optional strength; absence means `Strong`.
    #[inline]
    pub fn resolve(strength: Option<ReferenceStrength>) -> Self {
        strength.unwrap_or(ReferenceStrength::Strong)
    }

    /// True for strengths whose referents live in a `Collector`.
    #[inline]
    pub fn is_collectible(self) -> bool {
        !matches!(self, ReferenceStrength::Strong)
    }
}

impl fmt::Display for ReferenceStrength {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReferenceStrength::Strong => "strong",
            ReferenceStrength::Soft => "soft",
            ReferenceStrength::Weak => "weak",
        })
    }
}

/// Key and value strengths for a family of slots. Fixed once a pair is built.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct EntryConfig {
    key_strength: ReferenceStrength,
    value_strength: ReferenceStrength,
}

impl EntryConfig {
    pub fn new(key: Option<ReferenceStrength>, value: Option<ReferenceStrength>) -> Self {
        Self {
            key_strength: ReferenceStrength::resolve(key),
            value_strength: ReferenceStrength::resolve(value),
        }
    }

    /// Strong keys and strong values.
    pub const fn strong() -> Self {
        Self {
            key_strength: ReferenceStrength::Strong,
            value_strength: ReferenceStrength::Strong,
        }
    }

    #[inline]
    pub fn key_strength(&self) -> ReferenceStrength {
        self.key_strength
    }

    #[inline]
    pub fn value_strength(&self) -> ReferenceStrength {
        self.value_strength
    }

    #[inline]
    pub fn has_collectible_keys(&self) -> bool {
        self.key_strength.is_collectible()
    }

    #[inline]
    pub fn has_collectible_values(&self) -> bool {
        self.value_strength.is_collectible()
    }
}
