//! Derived position attributes used by the classification model.

use shakmaty::{fen::Fen, Board, CastlingMode, Chess, Color, EnPassantMode, Position, Role};
use thiserror::Error;

pub const STANDARD_START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

// Piece values for material calculation
pub const PAWN_VALUE: u32 = 1;
pub const KNIGHT_VALUE: u32 = 3;
pub const BISHOP_VALUE: u32 = 3;
pub const ROOK_VALUE: u32 = 5;
pub const QUEEN_VALUE: u32 = 9;

#[derive(Error, Debug)]
#[error("invalid FEN {fen}: {reason}")]
pub struct FenError {
    pub fen: String,
    pub reason: String,
}

/// Piece value (no king)
pub fn piece_value(role: Role) -> u32 {
    match role {
        Role::Pawn => PAWN_VALUE,
        Role::Knight => KNIGHT_VALUE,
        Role::Bishop => BISHOP_VALUE,
        Role::Rook => ROOK_VALUE,
        Role::Queen => QUEEN_VALUE,
        Role::King => 0,
    }
}

/// Material of both sides together; 78 in the starting position.
pub fn total_material(board: &Board) -> u32 {
    Role::ALL
        .into_iter()
        .map(|role| board.by_role(role).count() as u32 * piece_value(role))
        .sum()
}

/// Plies played since move one, derived from the move counters. Saturates
/// at `u32::MAX` for absurd move numbers.
pub fn ply_number(pos: &Chess) -> u32 {
    let black_to_move = u32::from(pos.turn() == Color::Black);
    (pos.fullmoves().get() - 1)
        .saturating_mul(2)
        .saturating_add(black_to_move)
}

pub fn to_fen(pos: &Chess) -> String {
    Fen::from_position(pos, EnPassantMode::Legal).to_string()
}

pub fn parse_fen(fen: &str) -> Result<Chess, FenError> {
    let invalid = |reason: String| FenError {
        fen: fen.to_string(),
        reason,
    };
    let parsed: Fen = fen.trim().parse().map_err(|e| invalid(format!("{}", e)))?;
    parsed
        .into_position(CastlingMode::Standard)
        .map_err(|e| invalid(format!("{}", e)))
}
