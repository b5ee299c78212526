//! Shashin range classification: win probability to playing style.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Upper bounds (inclusive) of the defensive ranges and lower bounds of the
/// aggressive ones, in win probability percent.
const HIGH_PETROSIAN: u8 = 4;
const MIDDLE_HIGH_PETROSIAN: u8 = 9;
const MIDDLE_PETROSIAN: u8 = 12;
const MIDDLE_LOW_PETROSIAN: u8 = 19;
const LOW_PETROSIAN: u8 = 24;
const CAPABLANCA: u8 = 51;
const LOW_TAL: u8 = 76;
const LOW_MIDDLE_TAL: u8 = 81;
const MIDDLE_TAL: u8 = 88;
const MIDDLE_HIGH_TAL: u8 = 91;
const HIGH_TAL: u8 = 96;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Range {
    HighPetrosian,
    MiddleHighPetrosian,
    MiddlePetrosian,
    MiddleLowPetrosian,
    LowPetrosian,
    ChaosPetrosianCapablanca,
    Capablanca,
    ChaosCapablancaTal,
    LowTal,
    LowMiddleTal,
    MiddleTal,
    MiddleHighTal,
    HighTal,
    /// Only produced when no band matches.
    Chaos,
}

/// Closed probability bands tested in order; the first match wins.
const BANDS: [(u8, u8, Range); 13] = [
    (0, HIGH_PETROSIAN, Range::HighPetrosian),
    (HIGH_PETROSIAN + 1, MIDDLE_HIGH_PETROSIAN, Range::MiddleHighPetrosian),
    (MIDDLE_HIGH_PETROSIAN + 1, MIDDLE_PETROSIAN, Range::MiddlePetrosian),
    (MIDDLE_PETROSIAN + 1, MIDDLE_LOW_PETROSIAN, Range::MiddleLowPetrosian),
    (MIDDLE_LOW_PETROSIAN + 1, LOW_PETROSIAN, Range::LowPetrosian),
    (LOW_PETROSIAN + 1, CAPABLANCA - 2, Range::ChaosPetrosianCapablanca),
    (CAPABLANCA - 1, CAPABLANCA - 1, Range::Capablanca),
    (CAPABLANCA, LOW_TAL - 1, Range::ChaosCapablancaTal),
    (LOW_TAL, LOW_MIDDLE_TAL - 1, Range::LowTal),
    (LOW_MIDDLE_TAL, MIDDLE_TAL - 1, Range::LowMiddleTal),
    (MIDDLE_TAL, MIDDLE_HIGH_TAL - 1, Range::MiddleTal),
    (MIDDLE_HIGH_TAL, HIGH_TAL - 1, Range::MiddleHighTal),
    (HIGH_TAL, 100, Range::HighTal),
];

impl Range {
    pub const ALL: [Range; 14] = [
        Range::HighPetrosian,
        Range::MiddleHighPetrosian,
        Range::MiddlePetrosian,
        Range::MiddleLowPetrosian,
        Range::LowPetrosian,
        Range::ChaosPetrosianCapablanca,
        Range::Capablanca,
        Range::ChaosCapablancaTal,
        Range::LowTal,
        Range::LowMiddleTal,
        Range::MiddleTal,
        Range::MiddleHighTal,
        Range::HighTal,
        Range::Chaos,
    ];

    /// Signed level: -6 (High Petrosian) .. 0 (Capablanca) .. 6 (High Tal), 7 for chaos.
    pub fn value(self) -> i8 {
        match self {
            Range::HighPetrosian => -6,
            Range::MiddleHighPetrosian => -5,
            Range::MiddlePetrosian => -4,
            Range::MiddleLowPetrosian => -3,
            Range::LowPetrosian => -2,
            Range::ChaosPetrosianCapablanca => -1,
            Range::Capablanca => 0,
            Range::ChaosCapablancaTal => 1,
            Range::LowTal => 2,
            Range::LowMiddleTal => 3,
            Range::MiddleTal => 4,
            Range::MiddleHighTal => 5,
            Range::HighTal => 6,
            Range::Chaos => 7,
        }
    }

    pub fn from_value(value: i8) -> Option<Range> {
        Range::ALL.into_iter().find(|range| range.value() == value)
    }

    pub fn label(self) -> &'static str {
        match self {
            Range::HighPetrosian => "High Petrosian",
            Range::MiddleHighPetrosian => "Middle High Petrosian",
            Range::MiddlePetrosian => "Middle Petrosian",
            Range::MiddleLowPetrosian => "Middle Low Petrosian",
            Range::LowPetrosian => "Low Petrosian",
            Range::ChaosPetrosianCapablanca => "Caos Petrosian-Capablanca",
            Range::Capablanca => "Capablanca",
            Range::ChaosCapablancaTal => "Caos Capablanca-Tal",
            Range::LowTal => "Low Tal",
            Range::LowMiddleTal => "Low Middle Tal",
            Range::MiddleTal => "Middle Tal",
            Range::MiddleHighTal => "Middle High Tal",
            Range::HighTal => "High Tal",
            Range::Chaos => "Caos Tal-Capablanca-Petrosian",
        }
    }

    pub fn abbreviation(self) -> &'static str {
        match self {
            Range::HighPetrosian => "HP",
            Range::MiddleHighPetrosian => "MHP",
            Range::MiddlePetrosian => "MP",
            Range::MiddleLowPetrosian => "MLP",
            Range::LowPetrosian => "LP",
            Range::ChaosPetrosianCapablanca => "CCP",
            Range::Capablanca => "C",
            Range::ChaosCapablancaTal => "CCT",
            Range::LowTal => "LT",
            Range::LowMiddleTal => "LMT",
            Range::MiddleTal => "MT",
            Range::MiddleHighTal => "MHT",
            Range::HighTal => "HT",
            Range::Chaos => "CTCP",
        }
    }

    /// Pure ranges map to a single engine personality.
    pub fn is_pure(self) -> bool {
        matches!(
            self,
            Range::HighPetrosian
                | Range::MiddlePetrosian
                | Range::LowPetrosian
                | Range::Capablanca
                | Range::LowTal
                | Range::MiddleTal
                | Range::HighTal
        )
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub fn classify(win_probability: u8) -> Range {
    BANDS
        .iter()
        .find(|(low, high, _)| (*low..=*high).contains(&win_probability))
        .map(|(_, _, range)| *range)
        .unwrap_or(Range::Chaos)
}

/// Abbreviation for a human-readable label; `None` for unknown labels.
pub fn label_abbreviation(label: &str) -> Option<&'static str> {
    Range::ALL
        .iter()
        .find(|range| range.label() == label)
        .map(|range| range.abbreviation())
}

/// Distance between the ranges of two consecutive win probabilities.
pub fn complexity_gap(current: u8, previous: u8) -> u8 {
    classify(current).value().abs_diff(classify(previous).value())
}
