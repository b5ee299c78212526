//! Engine move notation to board moves, plus castling bookkeeping.

use std::fmt;
use std::str::FromStr;

use shakmaty::{CastlingSide, Chess, Color, File, Move, Piece, Position, Role, Square};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BoardError {
    #[error("Malformed move notation: {0}")]
    Notation(String),

    #[error("No piece on {square} for move {notation}")]
    EmptyOrigin { square: Square, notation: String },

    #[error("Illegal move {notation} in {fen}")]
    Illegal { notation: String, fen: String },
}

/// Long algebraic move as engines print it: `e2e4`, `e7e8q`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveNotation {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<Role>,
}

impl FromStr for MoveNotation {
    type Err = BoardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || BoardError::Notation(s.to_string());
        let s = s.trim();
        if !s.is_ascii() || !(4..=5).contains(&s.len()) {
            return Err(malformed());
        }

        let from: Square = s[0..2].parse().map_err(|_| malformed())?;
        let to: Square = s[2..4].parse().map_err(|_| malformed())?;
        let promotion = match s.as_bytes().get(4).map(u8::to_ascii_lowercase) {
            None => None,
            Some(b'q') => Some(Role::Queen),
            Some(b'r') => Some(Role::Rook),
            Some(b'b') => Some(Role::Bishop),
            Some(b'n') => Some(Role::Knight),
            Some(_) => return Err(malformed()),
        };

        Ok(Self { from, to, promotion })
    }
}

impl fmt::Display for MoveNotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(role) = self.promotion {
            write!(f, "{}", role.char())?;
        }
        Ok(())
    }
}

/// Build the board move an engine meant by `notation`, checked for legality.
pub fn build_move(pos: &Chess, notation: &MoveNotation) -> Result<Move, BoardError> {
    let board = pos.board();
    let piece = board
        .piece_at(notation.from)
        .ok_or_else(|| BoardError::EmptyOrigin {
            square: notation.from,
            notation: notation.to_string(),
        })?;
    let capture = board.piece_at(notation.to).map(|p| p.role);

    let mv = if let Some(promotion) = notation.promotion {
        Move::Normal {
            role: Role::Pawn,
            from: notation.from,
            capture,
            to: notation.to,
            promotion: Some(promotion),
        }
    } else if let Some((color, side)) = castling(pos, notation) {
        Move::Castle {
            king: notation.from,
            rook: rook_home(color, side),
        }
    } else if piece.role == Role::Pawn && notation.from.file() != notation.to.file() && capture.is_none() {
        Move::EnPassant {
            from: notation.from,
            to: notation.to,
        }
    } else {
        Move::Normal {
            role: piece.role,
            from: notation.from,
            capture,
            to: notation.to,
            promotion: None,
        }
    };

    if !pos.legal_moves().contains(&mv) {
        return Err(BoardError::Illegal {
            notation: notation.to_string(),
            fen: chess_core::to_fen(pos),
        });
    }
    Ok(mv)
}

/// King two files away from its home square, with that side's king
/// actually standing there.
fn castling(pos: &Chess, notation: &MoveNotation) -> Option<(Color, CastlingSide)> {
    let color = match notation.from {
        Square::E1 => Color::White,
        Square::E8 => Color::Black,
        _ => return None,
    };
    let king = Piece {
        color,
        role: Role::King,
    };
    if pos.board().piece_at(notation.from) != Some(king) || notation.to.rank() != notation.from.rank() {
        return None;
    }
    match notation.to.file() {
        File::G => Some((color, CastlingSide::KingSide)),
        File::C => Some((color, CastlingSide::QueenSide)),
        _ => None,
    }
}

fn rook_home(color: Color, side: CastlingSide) -> Square {
    match (color, side) {
        (Color::White, CastlingSide::KingSide) => Square::H1,
        (Color::White, CastlingSide::QueenSide) => Square::A1,
        (Color::Black, CastlingSide::KingSide) => Square::H8,
        (Color::Black, CastlingSide::QueenSide) => Square::A8,
    }
}

/// Per-side castling flags. Rights only ever go from true to false.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CastlingRights {
    pub white_king_side: bool,
    pub white_queen_side: bool,
    pub black_king_side: bool,
    pub black_queen_side: bool,
}

impl Default for CastlingRights {
    fn default() -> Self {
        Self {
            white_king_side: true,
            white_queen_side: true,
            black_king_side: true,
            black_queen_side: true,
        }
    }
}

impl CastlingRights {
    pub fn from_position(pos: &Chess) -> Self {
        let castles = pos.castles();
        Self {
            white_king_side: castles.has(Color::White, CastlingSide::KingSide),
            white_queen_side: castles.has(Color::White, CastlingSide::QueenSide),
            black_king_side: castles.has(Color::Black, CastlingSide::KingSide),
            black_queen_side: castles.has(Color::Black, CastlingSide::QueenSide),
        }
    }

    pub fn has(&self, color: Color, side: CastlingSide) -> bool {
        match (color, side) {
            (Color::White, CastlingSide::KingSide) => self.white_king_side,
            (Color::White, CastlingSide::QueenSide) => self.white_queen_side,
            (Color::Black, CastlingSide::KingSide) => self.black_king_side,
            (Color::Black, CastlingSide::QueenSide) => self.black_queen_side,
        }
    }

    fn clear(&mut self, color: Color, side: CastlingSide) {
        let flag = match (color, side) {
            (Color::White, CastlingSide::KingSide) => &mut self.white_king_side,
            (Color::White, CastlingSide::QueenSide) => &mut self.white_queen_side,
            (Color::Black, CastlingSide::KingSide) => &mut self.black_king_side,
            (Color::Black, CastlingSide::QueenSide) => &mut self.black_queen_side,
        };
        *flag = false;
    }

    /// Update after `color` plays `mv`.
    pub fn record(&mut self, color: Color, mv: &Move) {
        match *mv {
            Move::Castle { .. } | Move::Normal { role: Role::King, .. } => {
                self.clear(color, CastlingSide::KingSide);
                self.clear(color, CastlingSide::QueenSide);
            }
            Move::Normal {
                role: Role::Rook,
                from,
                ..
            } => {
                for side in [CastlingSide::KingSide, CastlingSide::QueenSide] {
                    if from == rook_home(color, side) {
                        self.clear(color, side);
                    }
                }
            }
            _ => {}
        }
    }

    /// Drop any right the board no longer grants (a captured corner rook).
    pub fn restrict_to(&mut self, board_rights: CastlingRights) {
        self.white_king_side &= board_rights.white_king_side;
        self.white_queen_side &= board_rights.white_queen_side;
        self.black_king_side &= board_rights.black_king_side;
        self.black_queen_side &= board_rights.black_queen_side;
    }

    /// FEN castling field, `-` when nothing is left.
    pub fn fen_field(&self) -> String {
        let field: String = [
            (self.white_king_side, 'K'),
            (self.white_queen_side, 'Q'),
            (self.black_king_side, 'k'),
            (self.black_queen_side, 'q'),
        ]
        .into_iter()
        .filter(|(allowed, _)| *allowed)
        .map(|(_, c)| c)
        .collect();
        if field.is_empty() {
            "-".to_string()
        } else {
            field
        }
    }
}
