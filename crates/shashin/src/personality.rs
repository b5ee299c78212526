//! Engine personality options tied to Shashin ranges.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::range::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Personality {
    HighPetrosian,
    MiddlePetrosian,
    LowPetrosian,
    Capablanca,
    LowTal,
    LowMiddleTal,
    MiddleTal,
    HighTal,
}

impl Personality {
    pub const ALL: [Personality; 8] = [
        Personality::HighPetrosian,
        Personality::MiddlePetrosian,
        Personality::LowPetrosian,
        Personality::Capablanca,
        Personality::LowTal,
        Personality::LowMiddleTal,
        Personality::MiddleTal,
        Personality::HighTal,
    ];

    /// Name of the boolean UCI option that switches this personality on.
    pub fn option_name(self) -> &'static str {
        match self {
            Personality::HighPetrosian => "High Petrosian",
            Personality::MiddlePetrosian => "Middle Petrosian",
            Personality::LowPetrosian => "Low Petrosian",
            Personality::Capablanca => "Capablanca",
            Personality::LowTal => "Low Tal",
            Personality::LowMiddleTal => "Low Middle Tal",
            Personality::MiddleTal => "Middle Tal",
            Personality::HighTal => "High Tal",
        }
    }
}

/// Personalities to enable for a range. Transitional ranges blend the two
/// neighbouring pure ranges; chaos enables everything.
pub fn options_for(range: Range) -> BTreeSet<Personality> {
    use Personality::*;

    let enabled: &[Personality] = match range {
        Range::HighPetrosian => &[HighPetrosian],
        Range::MiddleHighPetrosian => &[HighPetrosian, MiddlePetrosian],
        Range::MiddlePetrosian => &[MiddlePetrosian],
        Range::MiddleLowPetrosian => &[MiddlePetrosian, LowPetrosian],
        Range::LowPetrosian => &[LowPetrosian],
        Range::ChaosPetrosianCapablanca => &[LowPetrosian, Capablanca],
        Range::Capablanca => &[Capablanca],
        Range::ChaosCapablancaTal => &[Capablanca, LowTal],
        Range::LowTal => &[LowTal],
        Range::LowMiddleTal => &[LowTal, MiddleTal],
        Range::MiddleTal => &[MiddleTal],
        Range::MiddleHighTal => &[MiddleTal, HighTal],
        Range::HighTal => &[HighTal],
        Range::Chaos => &Personality::ALL,
    };
    enabled.iter().copied().collect()
}
