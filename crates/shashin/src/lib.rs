//! Shashin position classification.
//!
//! Turns an engine score into a win probability, maps the probability onto the
//! fourteen ordered Shashin ranges (Petrosian ... Capablanca ... Tal) and tells
//! which engine personality options belong to each range. Everything here is a
//! pure function; the engine plumbing lives in the `self-play` crate.

pub mod personality;
pub mod range;
pub mod result;
pub mod win_probability;

pub use personality::{options_for, Personality};
pub use range::{classify, complexity_gap, label_abbreviation, Range};
pub use result::{resolve, GameOutcome, MATE_THRESHOLD};
pub use win_probability::WinProbabilityModel;
