pub mod game_data;
pub mod pgn;
pub mod position;

pub use game_data::{AnnotatedMove, GameData, GameMetadata, GameRecord};
pub use pgn::{format_game, GameWriter, PgnBatch, PgnError, PgnWriter, SkippedGame};
pub use position::{parse_fen, ply_number, to_fen, total_material, FenError, STANDARD_START_FEN};
