//! Final game result from the last classified position.

use serde::{Deserialize, Serialize};
use shakmaty::Color;

use crate::range::Range;

/// Scores beyond this are mate scores.
pub const MATE_THRESHOLD: i32 = 9000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameOutcome {
    WhiteWin,
    BlackWin,
    Draw,
    Undecided,
}

impl GameOutcome {
    pub fn win_for(color: Color) -> Self {
        match color {
            Color::White => GameOutcome::WhiteWin,
            Color::Black => GameOutcome::BlackWin,
        }
    }

    /// Value of the PGN `Result` tag.
    pub fn as_pgn(self) -> &'static str {
        match self {
            GameOutcome::WhiteWin => "1-0",
            GameOutcome::BlackWin => "0-1",
            GameOutcome::Draw => "1/2-1/2",
            GameOutcome::Undecided => "*",
        }
    }
}

/// `side_to_move` is the side the score and range were computed for.
pub fn resolve(final_score: i32, final_range: Range, side_to_move: Color) -> GameOutcome {
    if final_score.abs() >= MATE_THRESHOLD {
        return if final_score > 0 {
            GameOutcome::win_for(side_to_move)
        } else {
            GameOutcome::win_for(!side_to_move)
        };
    }

    match final_range.value() {
        0 => GameOutcome::Draw,
        7 => GameOutcome::Undecided,
        v if v > 0 => GameOutcome::win_for(side_to_move),
        _ => GameOutcome::win_for(!side_to_move),
    }
}
