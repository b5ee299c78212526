//! PGN header assembly for played games.

use std::env;

use chess_core::{GameData, GameMetadata};

pub const ENGINE_ELO: u32 = 3500;
pub const EVENT_FROM_PGN: &str = "Games from pgn";
pub const EVENT_FROM_FEN: &str = "Game from fen";

const UNKNOWN_SITE: &str = "Unknown Computer";

/// Machine name from the environment.
pub fn site() -> String {
    ["COMPUTERNAME", "HOSTNAME"]
        .iter()
        .filter_map(|key| env::var(key).ok())
        .find(|name| !name.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_SITE.to_string())
}

pub fn today() -> String {
    chrono::Local::now().format("%Y.%m.%d").to_string()
}

fn engine_game(event: &str, engine: &str, eco: Option<String>, time_control: &str) -> GameMetadata {
    GameMetadata {
        event: event.to_string(),
        site: site(),
        date: today(),
        round: "1".to_string(),
        white: engine.to_string(),
        black: engine.to_string(),
        result: "*".to_string(),
        white_elo: Some(ENGINE_ELO),
        black_elo: Some(ENGINE_ELO),
        eco,
        time_control: Some(time_control.to_string()),
    }
}

/// Header for a game started from a configured position.
pub fn for_fen_game(engine: &str, eco: Option<&str>, time_control: &str) -> GameMetadata {
    engine_game(EVENT_FROM_FEN, engine, eco.map(str::to_string), time_control)
}

/// Header for a game continuing an input game. The ECO code comes from the
/// input, falling back to its `Site` tag.
pub fn for_continued_game(engine: &str, input: &GameData, time_control: &str) -> GameMetadata {
    let eco = input
        .metadata
        .eco
        .clone()
        .or_else(|| Some(input.metadata.site.clone()).filter(|s| !s.is_empty()));
    engine_game(EVENT_FROM_PGN, engine, eco, time_control)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shakmaty::Chess;

    #[test]
    fn test_fen_game_header() {
        let meta = for_fen_game("ShashChess", Some("B90"), "20+0");
        assert_eq!(meta.event, EVENT_FROM_FEN);
        assert_eq!(meta.round, "1");
        assert_eq!(meta.white, "ShashChess");
        assert_eq!(meta.black, "ShashChess");
        assert_eq!(meta.white_elo, Some(3500));
        assert_eq!(meta.eco.as_deref(), Some("B90"));
        assert_eq!(meta.result, "*");
        assert_eq!(meta.date.len(), 10);
        assert!(!meta.site.is_empty());
    }

    #[test]
    fn test_continued_game_takes_eco_or_site() {
        let mut input = GameData {
            metadata: GameMetadata {
                site: "Linares".to_string(),
                ..GameMetadata::default()
            },
            start_fen: None,
            start: Chess::default(),
            moves: Vec::new(),
            position: Chess::default(),
        };
        let meta = for_continued_game("E", &input, "2+0");
        assert_eq!(meta.event, EVENT_FROM_PGN);
        assert_eq!(meta.eco.as_deref(), Some("Linares"));

        input.metadata.eco = Some("E97".to_string());
        assert_eq!(for_continued_game("E", &input, "2+0").eco.as_deref(), Some("E97"));
    }
}
