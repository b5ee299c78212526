use serde::{Deserialize, Serialize};
use shakmaty::Chess;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameMetadata {
    pub event: String,
    pub site: String,
    pub date: String,
    pub round: String,
    pub white: String,
    pub black: String,
    pub result: String, // "1-0", "0-1", "1/2-1/2", "*"
    pub white_elo: Option<u32>,
    pub black_elo: Option<u32>,
    pub eco: Option<String>,
    pub time_control: Option<String>,
}

impl GameMetadata {
    /// Tag pairs in export order: the seven tag roster first, then the rest.
    pub fn tag_pairs(&self) -> Vec<(&'static str, String)> {
        let mut tags = vec![
            ("Event", self.event.clone()),
            ("Site", self.site.clone()),
            ("Date", self.date.clone()),
            ("Round", self.round.clone()),
            ("White", self.white.clone()),
            ("Black", self.black.clone()),
            ("Result", self.result.clone()),
        ];
        if let Some(elo) = self.white_elo {
            tags.push(("WhiteElo", elo.to_string()));
        }
        if let Some(elo) = self.black_elo {
            tags.push(("BlackElo", elo.to_string()));
        }
        if let Some(eco) = &self.eco {
            tags.push(("ECO", eco.clone()));
        }
        if let Some(tc) = &self.time_control {
            tags.push(("TimeControl", tc.clone()));
        }
        tags
    }
}

/// A game loaded from a PGN collection, replayed to its final position.
#[derive(Debug, Clone)]
pub struct GameData {
    pub metadata: GameMetadata,
    pub start_fen: Option<String>,
    pub start: Chess,
    pub moves: Vec<String>, // SAN notation
    pub position: Chess,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedMove {
    pub san: String,
    pub comment: Option<String>,
}

impl AnnotatedMove {
    pub fn plain(san: impl Into<String>) -> Self {
        Self { san: san.into(), comment: None }
    }
}

/// A finished game ready for export.
#[derive(Debug, Clone)]
pub struct GameRecord {
    pub metadata: GameMetadata,
    pub start: Chess,
    pub moves: Vec<AnnotatedMove>,
}
