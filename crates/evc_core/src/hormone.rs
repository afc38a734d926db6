//! Hormone channels
//!
//! Eight simulated biochemical drivers. Hormones are the only directly
//! evolved state; emotions are derived from them.

use crate::channel::{Channel, ChannelVector, CHANNELS};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hormone {
    /// Reward, motivation
    Dopamine,
    /// Calm, stability
    Serotonin,
    /// Bonding, closeness
    Oxytocin,
    /// Comfort, relief
    Endorphin,
    /// Stress
    Cortisol,
    /// Fight/flight
    Adrenaline,
    /// Inhibition, relaxation
    #[serde(rename = "GABA")]
    Gaba,
    /// Focus, vigilance
    Norepinephrine,
}

impl Channel for Hormone {
    const ALL: [Self; CHANNELS] = [
        Hormone::Dopamine,
        Hormone::Serotonin,
        Hormone::Oxytocin,
        Hormone::Endorphin,
        Hormone::Cortisol,
        Hormone::Adrenaline,
        Hormone::Gaba,
        Hormone::Norepinephrine,
    ];

    fn name(self) -> &'static str {
        match self {
            Hormone::Dopamine => "Dopamine",
            Hormone::Serotonin => "Serotonin",
            Hormone::Oxytocin => "Oxytocin",
            Hormone::Endorphin => "Endorphin",
            Hormone::Cortisol => "Cortisol",
            Hormone::Adrenaline => "Adrenaline",
            Hormone::Gaba => "GABA",
            Hormone::Norepinephrine => "Norepinephrine",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Hormone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Hormone levels, each in [0, 1].
pub type HormoneVector = ChannelVector<Hormone>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_matches_canonical_order() {
        for (i, h) in Hormone::ALL.into_iter().enumerate() {
            assert_eq!(h.index(), i);
        }
    }

    #[test]
    fn test_gaba_serde_name() {
        assert_eq!(serde_json::to_string(&Hormone::Gaba).unwrap(), "\"GABA\"");
        let h: Hormone = serde_json::from_str("\"GABA\"").unwrap();
        assert_eq!(h, Hormone::Gaba);
        assert_eq!(Hormone::Gaba.to_string(), "GABA");
    }
}
