//! Shashin-guided self-play
//!
//! Drives a UCI engine through self-play games, reclassifying every position
//! into a Shashin range and switching the engine's personality options to
//! match before the next move.

pub mod analyzer;
pub mod board;
pub mod config;
pub mod engine;
pub mod error;
pub mod metadata;
pub mod options;
pub mod player;
pub mod selfplay;

pub use config::{Mode, PlayerConfig, Properties};
pub use engine::{Analysis, EngineError, EngineMetadata, EngineSession, Evaluation, PvLine, UciEngine};
pub use error::PlayerError;
pub use options::{EngineConfiguration, OptionOverride};
pub use player::{run, run_with_engine, RunSummary};
pub use selfplay::{GameSession, MoveRecord, SelfPlay, SelfPlaySettings, State, Termination};
