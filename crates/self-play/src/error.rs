//! Player error types

use thiserror::Error;

use crate::board::BoardError;
use crate::engine::EngineError;

#[derive(Error, Debug)]
pub enum PlayerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Engine returned no move for {fen}")]
    NoBestMove { fen: String },

    #[error("Board error: {0}")]
    Board(#[from] BoardError),

    #[error("Invalid position: {0}")]
    Fen(#[from] chess_core::FenError),

    #[error("PGN error: {0}")]
    Pgn(#[from] chess_core::PgnError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PlayerError {
    /// Errors that end only the game being played. Everything else leaves the
    /// engine or the output in an unknown state and ends the run.
    pub fn is_game_fatal_only(&self) -> bool {
        matches!(self, PlayerError::Board(_))
    }
}
