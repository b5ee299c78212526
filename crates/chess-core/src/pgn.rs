//! PGN reading and writing.
//!
//! Reading streams a collection through `pgn-reader`, replaying every game
//! with shakmaty. Games with a bad FEN tag or an illegal move are skipped and
//! counted instead of failing the whole collection. Writing produces one
//! annotated game at a time and flushes it, so a game is either complete in
//! the output file or absent.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Write};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use pgn_reader::{RawTag, Reader, SanPlus, Visitor};
use shakmaty::{Chess, Color, Position};
use thiserror::Error;

use crate::game_data::{GameData, GameMetadata, GameRecord};
use crate::position::{parse_fen, to_fen, STANDARD_START_FEN};

const MAX_LINE_LENGTH: usize = 80;

#[derive(Error, Debug)]
pub enum PgnError {
    #[error("PGN I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A game dropped from a collection and why.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedGame {
    pub index: usize,
    pub reason: String,
}

// -- Reading ---------------------------------------------------------------

/// Tags collected during header parsing.
#[derive(Default)]
struct GameTags {
    metadata: GameMetadata,
    fen: Option<String>,
}

/// State during movetext parsing.
struct GameState {
    tags: GameTags,
    start: Chess,
    position: Chess,
    moves: Vec<String>,
}

/// Replays each game; `Err` carries the reason a game was rejected.
struct GameCollector;

impl Visitor for GameCollector {
    type Tags = GameTags;
    type Movetext = GameState;
    type Output = Result<GameData, String>;

    fn begin_tags(&mut self) -> ControlFlow<Self::Output, GameTags> {
        ControlFlow::Continue(GameTags::default())
    }

    fn tag(
        &mut self,
        tags: &mut GameTags,
        name: &[u8],
        value: RawTag<'_>,
    ) -> ControlFlow<Self::Output> {
        let value = value.decode_utf8_lossy().into_owned();
        let meta = &mut tags.metadata;
        match name {
            b"Event" => meta.event = value,
            b"Site" => meta.site = value,
            b"Date" => meta.date = value,
            b"Round" => meta.round = value,
            b"White" => meta.white = value,
            b"Black" => meta.black = value,
            b"Result" => meta.result = value,
            b"WhiteElo" => meta.white_elo = value.parse().ok(),
            b"BlackElo" => meta.black_elo = value.parse().ok(),
            b"ECO" => meta.eco = Some(value).filter(|v| !v.is_empty()),
            b"TimeControl" => meta.time_control = Some(value),
            b"FEN" => tags.fen = Some(value),
            _ => {}
        }
        ControlFlow::Continue(())
    }

    fn begin_movetext(&mut self, tags: GameTags) -> ControlFlow<Self::Output, GameState> {
        let start = match tags.fen.as_deref() {
            Some(fen) => match parse_fen(fen) {
                Ok(pos) => pos,
                Err(e) => return ControlFlow::Break(Err(e.to_string())),
            },
            None => Chess::default(),
        };

        ControlFlow::Continue(GameState {
            tags,
            position: start.clone(),
            start,
            moves: Vec::new(),
        })
    }

    fn san(&mut self, state: &mut GameState, san_plus: SanPlus) -> ControlFlow<Self::Output> {
        match san_plus.san.to_move(&state.position) {
            Ok(mv) => {
                state.moves.push(san_plus.san.to_string());
                state.position.play_unchecked(mv);
                ControlFlow::Continue(())
            }
            Err(e) => ControlFlow::Break(Err(format!(
                "illegal move {} after {} plies: {}",
                san_plus,
                state.moves.len(),
                e
            ))),
        }
    }

    fn end_game(&mut self, state: GameState) -> Self::Output {
        Ok(GameData {
            metadata: state.tags.metadata,
            start_fen: state.tags.fen,
            start: state.start,
            moves: state.moves,
            position: state.position,
        })
    }
}

/// Streaming reader over a PGN collection.
pub struct PgnBatch<R> {
    reader: Reader<R>,
    loaded: usize,
    skipped: Vec<SkippedGame>,
}

impl PgnBatch<File> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PgnError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| PgnError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(file))
    }
}

impl<R: Read> PgnBatch<R> {
    pub fn new(input: R) -> Self {
        Self {
            reader: Reader::new(input),
            loaded: 0,
            skipped: Vec::new(),
        }
    }

    /// Next well-formed game, or `None` at the end of the collection.
    pub fn next_game(&mut self) -> Result<Option<GameData>, PgnError> {
        loop {
            let index = self.loaded + self.skipped.len() + 1;
            match self.reader.read_game(&mut GameCollector)? {
                None => return Ok(None),
                Some(Ok(game)) => {
                    self.loaded += 1;
                    return Ok(Some(game));
                }
                Some(Err(reason)) => self.skipped.push(SkippedGame { index, reason }),
            }
        }
    }

    pub fn loaded(&self) -> usize {
        self.loaded
    }

    pub fn skipped(&self) -> &[SkippedGame] {
        &self.skipped
    }
}

// -- Writing ---------------------------------------------------------------

/// Destination for finished games.
pub trait GameWriter {
    fn write_game(&mut self, game: &GameRecord) -> Result<(), PgnError>;
}

impl GameWriter for Vec<GameRecord> {
    fn write_game(&mut self, game: &GameRecord) -> Result<(), PgnError> {
        self.push(game.clone());
        Ok(())
    }
}

/// Appends or overwrites a PGN file, one flushed game at a time.
pub struct PgnWriter {
    path: PathBuf,
    out: BufWriter<File>,
}

impl PgnWriter {
    pub fn create(path: impl AsRef<Path>, append: bool) -> Result<Self, PgnError> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .append(append)
            .truncate(!append)
            .open(&path)
            .map_err(|source| PgnError::Open {
                path: path.clone(),
                source,
            })?;
        Ok(Self {
            path,
            out: BufWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn flush(&mut self) -> Result<(), PgnError> {
        self.out.flush()?;
        Ok(())
    }
}

impl GameWriter for PgnWriter {
    fn write_game(&mut self, game: &GameRecord) -> Result<(), PgnError> {
        self.out.write_all(format_game(game).as_bytes())?;
        self.flush()
    }
}

fn escape_tag(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Export-format text of one game, terminated by a blank line.
pub fn format_game(game: &GameRecord) -> String {
    let mut out = String::new();
    for (name, value) in game.metadata.tag_pairs() {
        out.push_str(&format!("[{} \"{}\"]\n", name, escape_tag(&value)));
    }
    let fen = to_fen(&game.start);
    if fen != STANDARD_START_FEN {
        out.push_str("[SetUp \"1\"]\n");
        out.push_str(&format!("[FEN \"{}\"]\n", fen));
    }
    out.push('\n');

    let mut tokens = Vec::with_capacity(game.moves.len() * 2 + 1);
    let mut number = game.start.fullmoves().get();
    let mut turn = game.start.turn();
    let mut needs_number = true;
    for mv in &game.moves {
        match turn {
            Color::White => tokens.push(format!("{}.", number)),
            Color::Black if needs_number => tokens.push(format!("{}...", number)),
            Color::Black => {}
        }
        tokens.push(mv.san.clone());
        needs_number = false;

        if let Some(comment) = &mv.comment {
            tokens.push(format!("{{{}}}", comment.replace('}', "")));
            needs_number = true;
        }

        if turn == Color::Black {
            number += 1;
        }
        turn = !turn;
    }
    let result = if game.metadata.result.is_empty() {
        "*"
    } else {
        game.metadata.result.as_str()
    };
    tokens.push(result.to_string());

    let mut line = String::new();
    for token in tokens {
        if !line.is_empty() && line.len() + 1 + token.len() > MAX_LINE_LENGTH {
            out.push_str(&line);
            out.push('\n');
            line.clear();
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(&token);
    }
    out.push_str(&line);
    out.push_str("\n\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_data::AnnotatedMove;
    use std::io::Cursor;

    const COLLECTION: &str = r#"[Event "Club"]
[White "Player1"]
[Black "Player2"]
[Result "1-0"]
[ECO "C20"]

1. e4 e5 2. Nf3 Nc6 1-0

[Event "Broken"]
[White "A"]
[Black "B"]
[Result "*"]

1. e4 e5 2. Ke3 *

[Event "From position"]
[White "C"]
[Black "D"]
[Result "*"]
[SetUp "1"]
[FEN "4k3/8/8/8/8/8/4P3/4K3 w - - 0 1"]

1. e3 Kd7 *
"#;

    #[test]
    fn test_batch_skips_and_counts_malformed_games() {
        let mut batch = PgnBatch::new(Cursor::new(COLLECTION));

        let first = batch.next_game().unwrap().unwrap();
        assert_eq!(first.metadata.white, "Player1");
        assert_eq!(first.metadata.eco.as_deref(), Some("C20"));
        assert_eq!(first.moves, vec!["e4", "e5", "Nf3", "Nc6"]);
        assert_eq!(
            to_fen(&first.position),
            "r1bqkbnr/pppp1ppp/2n5/4p3/4P3/5N2/PPPP1PPP/RNBQKB1R w KQkq - 2 3"
        );

        let second = batch.next_game().unwrap().unwrap();
        assert_eq!(second.metadata.event, "From position");
        assert_eq!(second.start_fen.as_deref(), Some("4k3/8/8/8/8/8/4P3/4K3 w - - 0 1"));
        assert_eq!(second.moves.len(), 2);

        assert!(batch.next_game().unwrap().is_none());
        assert_eq!(batch.loaded(), 2);
        assert_eq!(batch.skipped().len(), 1);
        assert_eq!(batch.skipped()[0].index, 2);
        assert!(batch.skipped()[0].reason.contains("Ke3"));
    }

    #[test]
    fn test_bad_fen_tag_is_skipped() {
        let pgn = "[FEN \"garbage\"]\n\n1. e4 *\n\n[White \"ok\"]\n\n1. d4 *\n";
        let mut batch = PgnBatch::new(Cursor::new(pgn));
        let game = batch.next_game().unwrap().unwrap();
        assert_eq!(game.metadata.white, "ok");
        assert_eq!(batch.skipped().len(), 1);
    }

    fn sample_record() -> GameRecord {
        GameRecord {
            metadata: GameMetadata {
                event: "Game from fen".to_string(),
                site: "lab".to_string(),
                date: "2026.10.18".to_string(),
                round: "1".to_string(),
                white: "ShashChess".to_string(),
                black: "ShashChess".to_string(),
                result: "1/2-1/2".to_string(),
                white_elo: Some(3500),
                black_elo: Some(3500),
                eco: None,
                time_control: Some("40+0".to_string()),
            },
            start: Chess::default(),
            moves: vec![
                AnnotatedMove {
                    san: "e4".to_string(),
                    comment: Some("35;20;52;CCT".to_string()),
                },
                AnnotatedMove {
                    san: "e5".to_string(),
                    comment: Some("-10;18;50;C".to_string()),
                },
            ],
        }
    }

    #[test]
    fn test_format_game_numbers_moves_after_comments() {
        let text = format_game(&sample_record());
        assert!(text.starts_with("[Event \"Game from fen\"]\n[Site \"lab\"]\n"));
        assert!(text.contains("[WhiteElo \"3500\"]\n"));
        assert!(text.contains("[TimeControl \"40+0\"]\n"));
        assert!(!text.contains("[FEN"));
        assert!(text.ends_with("1. e4 {35;20;52;CCT} 1... e5 {-10;18;50;C} 1/2-1/2\n\n"));
    }

    #[test]
    fn test_format_game_from_position_with_black_to_move() {
        let mut record = sample_record();
        record.start = parse_fen("4k3/8/8/8/8/8/4P3/4K3 b - - 0 30").unwrap();
        record.metadata.result = "*".to_string();
        record.moves = vec![AnnotatedMove::plain("Kd7"), AnnotatedMove::plain("e4")];
        let text = format_game(&record);
        assert!(text.contains("[SetUp \"1\"]\n[FEN \"4k3/8/8/8/8/8/4P3/4K3 b - - 0 30\"]\n"));
        assert!(text.ends_with("30... Kd7 31. e4 *\n\n"));
    }

    #[test]
    fn test_long_movetext_is_wrapped() {
        let mut record = sample_record();
        record.moves = (0..40)
            .map(|_| AnnotatedMove {
                san: "Nf3".to_string(),
                comment: Some("12;30;51;CCT".to_string()),
            })
            .collect();
        let text = format_game(&record);
        assert!(text.lines().all(|line| line.len() <= MAX_LINE_LENGTH));
    }

    #[test]
    fn test_writer_appends_or_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("games.pgn");

        let mut writer = PgnWriter::create(&path, false).unwrap();
        writer.write_game(&sample_record()).unwrap();
        drop(writer);

        let mut writer = PgnWriter::create(&path, true).unwrap();
        writer.write_game(&sample_record()).unwrap();
        drop(writer);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("[Event ").count(), 2);

        let mut writer = PgnWriter::create(&path, false).unwrap();
        writer.write_game(&sample_record()).unwrap();
        drop(writer);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.matches("[Event ").count(), 1);

        let mut batch = PgnBatch::open(&path).unwrap();
        let game = batch.next_game().unwrap().unwrap();
        assert_eq!(game.moves, vec!["e4", "e5"]);
        assert_eq!(game.metadata.result, "1/2-1/2");
    }
}
