//! Self-play orchestration.
//!
//! One [`SelfPlay`] owns the engine and its option state and plays games one
//! at a time. Each ply runs through the same states:
//!
//! ```text
//! Idle -> Stepping -> Classifying -> Reconfiguring -> Applying -> Stepping ...
//!                                                   \-> Finalizing -> Done
//! ```
//!
//! Any engine, board or writer failure moves the machine to `Aborted` and is
//! returned to the caller; an aborted game is never written.

use std::time::Duration;

use chess_core::{ply_number, to_fen, total_material, AnnotatedMove, GameData, GameMetadata, GameRecord, GameWriter};
use serde::Serialize;
use shakmaty::{san::SanPlus, Chess, Color, Position};
use shashin::{classify, complexity_gap, resolve, GameOutcome, Range, WinProbabilityModel};
use tracing::{debug, info, warn};

use crate::board::{build_move, CastlingRights, MoveNotation};
use crate::engine::{EngineSession, Evaluation};
use crate::error::PlayerError;
use crate::options::{EngineConfiguration, OptionOverride};

#[derive(Debug, Clone)]
pub struct SelfPlaySettings {
    /// Search time per move
    pub time_budget: Duration,
    /// Grace period on top of the search time before a request is abandoned
    pub request_timeout: Duration,
    pub model: WinProbabilityModel,
    /// Restricts the first engine move of each game when non-empty
    pub search_moves: Vec<String>,
    /// Options switched off around the best-move fallback
    pub fallback_overrides: Vec<OptionOverride>,
}

impl SelfPlaySettings {
    fn analysis_timeout(&self) -> Duration {
        self.time_budget + self.request_timeout
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Stepping,
    Classifying,
    Reconfiguring,
    Applying,
    Finalizing,
    Done,
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Termination {
    Checkmate,
    Stalemate,
    InsufficientMaterial,
    FiftyMoveRule,
    PlyLimit,
}

/// One engine move with its classification.
#[derive(Debug, Clone)]
pub struct MoveRecord {
    /// Ply of the position the move was played from
    pub ply: u32,
    pub color: Color,
    /// Engine notation, e.g. `e7e8q`
    pub notation: String,
    pub san: String,
    pub evaluation: Evaluation,
    pub win_probability: u8,
    pub range: Range,
}

impl MoveRecord {
    pub fn abbreviation(&self) -> &'static str {
        self.range.abbreviation()
    }

    /// `score;depth;winProbability;abbreviation`
    pub fn comment(&self) -> String {
        format!(
            "{};{};{};{}",
            self.evaluation.score,
            self.evaluation.depth,
            self.win_probability,
            self.abbreviation()
        )
    }

    /// Log form: `12. e2e4 35;24;52;CCT`, black moves as `12.... e7e5 ...`
    pub fn display_line(&self) -> String {
        let number = self.ply / 2 + 1;
        let dots = match self.color {
            Color::White => ".",
            Color::Black => "....",
        };
        format!("{}{} {} {}", number, dots, self.notation, self.comment())
    }
}

/// State of one game.
#[derive(Debug, Clone)]
pub struct GameSession {
    pub metadata: GameMetadata,
    start: Chess,
    prelude: Vec<String>,
    position: Chess,
    castling: CastlingRights,
    history: Vec<MoveRecord>,
    ply_limit: u32,
    termination: Option<Termination>,
    outcome: Option<GameOutcome>,
}

impl GameSession {
    /// Fresh game from `start`; the engine plays at most `ply_limit` plies.
    pub fn from_position(metadata: GameMetadata, start: Chess, ply_limit: u32) -> Self {
        Self {
            metadata,
            castling: CastlingRights::from_position(&start),
            position: start.clone(),
            start,
            prelude: Vec::new(),
            history: Vec::new(),
            ply_limit,
            termination: None,
            outcome: None,
        }
    }

    /// Continue an input game from its final position. Its moves are kept
    /// unannotated ahead of the engine's moves.
    pub fn continuing(metadata: GameMetadata, game: GameData, extra_plies: u32) -> Self {
        Self {
            metadata,
            castling: CastlingRights::from_position(&game.position),
            position: game.position,
            start: game.start,
            prelude: game.moves,
            history: Vec::new(),
            ply_limit: extra_plies,
            termination: None,
            outcome: None,
        }
    }

    pub fn position(&self) -> &Chess {
        &self.position
    }

    pub fn castling(&self) -> CastlingRights {
        self.castling
    }

    pub fn history(&self) -> &[MoveRecord] {
        &self.history
    }

    pub fn termination(&self) -> Option<Termination> {
        self.termination
    }

    pub fn outcome(&self) -> Option<GameOutcome> {
        self.outcome
    }

    pub fn plies_played(&self) -> u32 {
        self.history.len() as u32
    }

    pub fn check_termination(&self) -> Option<Termination> {
        let pos = &self.position;
        if pos.is_checkmate() {
            Some(Termination::Checkmate)
        } else if pos.is_stalemate() {
            Some(Termination::Stalemate)
        } else if pos.is_insufficient_material() {
            Some(Termination::InsufficientMaterial)
        } else if pos.halfmoves() >= 100 {
            Some(Termination::FiftyMoveRule)
        } else if self.plies_played() >= self.ply_limit {
            Some(Termination::PlyLimit)
        } else {
            None
        }
    }

    /// Phase signal for the probability model.
    fn phase(&self, model: WinProbabilityModel) -> u32 {
        match model {
            WinProbabilityModel::Ply => ply_number(&self.position),
            WinProbabilityModel::Material => total_material(self.position.board()),
        }
    }

    fn apply(&mut self, evaluation: Evaluation, win_probability: u8, range: Range) -> Result<(), PlayerError> {
        let notation: MoveNotation = evaluation.best_move.parse()?;
        let mv = build_move(&self.position, &notation)?;
        let color = self.position.turn();
        let ply = ply_number(&self.position);

        self.castling.record(color, &mv);
        let san = SanPlus::from_move_and_play_unchecked(&mut self.position, mv).to_string();
        self.castling.restrict_to(CastlingRights::from_position(&self.position));

        self.history.push(MoveRecord {
            ply,
            color,
            notation: notation.to_string(),
            san,
            evaluation,
            win_probability,
            range,
        });
        Ok(())
    }

    fn finalize(&mut self, termination: Termination) -> GameOutcome {
        let outcome = match termination {
            Termination::Checkmate => GameOutcome::win_for(!self.position.turn()),
            Termination::Stalemate | Termination::InsufficientMaterial => GameOutcome::Draw,
            Termination::FiftyMoveRule | Termination::PlyLimit => match self.history.last() {
                Some(last) => resolve(last.evaluation.score, last.range, last.color),
                None => GameOutcome::Undecided,
            },
        };
        self.termination = Some(termination);
        self.outcome = Some(outcome);
        self.metadata.result = outcome.as_pgn().to_string();
        outcome
    }

    /// Export form: input moves first, then the annotated engine moves.
    pub fn record(&self) -> GameRecord {
        let prelude = self.prelude.iter().map(AnnotatedMove::plain);
        let played = self.history.iter().map(|m| AnnotatedMove {
            san: m.san.clone(),
            comment: Some(m.comment()),
        });
        GameRecord {
            metadata: self.metadata.clone(),
            start: self.start.clone(),
            moves: prelude.chain(played).collect(),
        }
    }
}

/// Plays games with one engine.
pub struct SelfPlay<E> {
    engine: E,
    settings: SelfPlaySettings,
    options: EngineConfiguration,
    state: State,
}

impl<E: EngineSession> SelfPlay<E> {
    pub fn new(engine: E, settings: SelfPlaySettings, options: EngineConfiguration) -> Self {
        Self {
            engine,
            settings,
            options,
            state: State::Idle,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn options(&self) -> &EngineConfiguration {
        &self.options
    }

    pub fn into_engine(self) -> E {
        self.engine
    }

    /// Engine and option state together, for queries outside a game.
    pub fn parts_mut(&mut self) -> (&mut E, &mut EngineConfiguration) {
        (&mut self.engine, &mut self.options)
    }

    /// Push the fixed startup options.
    pub async fn configure(&mut self, initial: &[(String, String)]) -> Result<(), PlayerError> {
        let timeout = self.settings.request_timeout;
        self.options.apply_all(&mut self.engine, initial, timeout).await?;
        Ok(())
    }

    /// Play `session` to the end and hand it to `writer`.
    pub async fn play<W: GameWriter>(
        &mut self,
        session: &mut GameSession,
        writer: &mut W,
    ) -> Result<GameOutcome, PlayerError> {
        self.transition(State::Idle);
        match self.run(session, writer).await {
            Ok(outcome) => {
                self.transition(State::Done);
                Ok(outcome)
            }
            Err(e) => {
                self.transition(State::Aborted);
                Err(e)
            }
        }
    }

    /// Close the engine; failures are only logged.
    pub async fn shutdown(&mut self) {
        if let Err(e) = self.engine.close().await {
            warn!(error = %e, "Engine did not shut down cleanly");
        }
    }

    fn transition(&mut self, next: State) {
        debug!(from = ?self.state, to = ?next, "State");
        self.state = next;
    }

    async fn run<W: GameWriter>(
        &mut self,
        session: &mut GameSession,
        writer: &mut W,
    ) -> Result<GameOutcome, PlayerError> {
        self.engine.new_game().await?;

        let termination = loop {
            if let Some(termination) = session.check_termination() {
                break termination;
            }

            self.transition(State::Stepping);
            let evaluation = self.step(session).await?;

            self.transition(State::Classifying);
            let phase = session.phase(self.settings.model);
            let win_probability = self.settings.model.win_probability(evaluation.score, phase);
            let range = classify(win_probability);

            self.transition(State::Reconfiguring);
            if self.options.active_range() != Some(range) {
                let timeout = self.settings.request_timeout;
                self.options.apply_personality(&mut self.engine, range, timeout).await?;
            }

            self.transition(State::Applying);
            let previous = session.history.last().map(|m| m.win_probability);
            session.apply(evaluation, win_probability, range)?;

            if let Some(record) = session.history.last() {
                let gap = previous.map(|p| complexity_gap(win_probability, p));
                info!(gap = ?gap, "{}", record.display_line());
            }
        };

        self.transition(State::Finalizing);
        let outcome = session.finalize(termination);
        writer.write_game(&session.record())?;
        info!(
            termination = ?termination,
            result = outcome.as_pgn(),
            plies = session.plies_played(),
            "Game finished"
        );
        Ok(outcome)
    }

    /// One engine query for the current position, with the best-move fallback.
    async fn step(&mut self, session: &GameSession) -> Result<Evaluation, PlayerError> {
        let fen = to_fen(&session.position);
        let budget = self.settings.time_budget;
        let timeout = self.settings.analysis_timeout();

        self.engine.set_position(&fen).await?;
        let analysis = if session.history.is_empty() && !self.settings.search_moves.is_empty() {
            self.engine
                .analyze_restricted(budget, &self.settings.search_moves, timeout)
                .await?
        } else {
            self.engine.analyze(budget, timeout).await?
        };
        if let Some(evaluation) = analysis.evaluation() {
            return Ok(evaluation);
        }

        warn!(fen = %fen, "Analysis returned no move, asking for a bare best move");
        let option_timeout = self.settings.request_timeout;
        let overrides = self.settings.fallback_overrides.clone();
        self.options.suspend(&mut self.engine, &overrides, option_timeout).await?;

        let best_move = self.engine.best_move_only(budget).await?;
        let subset: Vec<String> = best_move.into_iter().collect();
        let retry = self.engine.analyze_restricted(budget, &subset, timeout).await?;

        self.options.restore(&mut self.engine, &overrides, option_timeout).await?;

        retry.evaluation().ok_or(PlayerError::NoBestMove { fen })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess_core::parse_fen;

    fn record(color: Color, ply: u32, score: i32, range: Range) -> MoveRecord {
        MoveRecord {
            ply,
            color,
            notation: "e2e4".to_string(),
            san: "e4".to_string(),
            evaluation: Evaluation {
                best_move: "e2e4".to_string(),
                score,
                depth: 24,
            },
            win_probability: 52,
            range,
        }
    }

    #[test]
    fn test_move_record_comment_and_log_line() {
        let white = record(Color::White, 22, 35, Range::ChaosCapablancaTal);
        assert_eq!(white.comment(), "35;24;52;CCT");
        assert_eq!(white.display_line(), "12. e2e4 35;24;52;CCT");
        let black = record(Color::Black, 23, -10, Range::Capablanca);
        assert_eq!(black.display_line(), "12.... e2e4 -10;24;52;C");
    }

    #[test]
    fn test_termination_predicates() {
        let meta = GameMetadata::default();
        let mate = parse_fen("rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3").unwrap();
        assert_eq!(
            GameSession::from_position(meta.clone(), mate, 10).check_termination(),
            Some(Termination::Checkmate)
        );

        let stalemate = parse_fen("7k/5Q2/6K1/8/8/8/8/8 b - - 0 1").unwrap();
        assert_eq!(
            GameSession::from_position(meta.clone(), stalemate, 10).check_termination(),
            Some(Termination::Stalemate)
        );

        let bare_kings = parse_fen("8/8/4k3/8/8/4K3/8/8 w - - 0 1").unwrap();
        assert_eq!(
            GameSession::from_position(meta.clone(), bare_kings, 10).check_termination(),
            Some(Termination::InsufficientMaterial)
        );

        let fifty = parse_fen("8/8/4k3/8/8/4K3/8/7R w - - 100 80").unwrap();
        assert_eq!(
            GameSession::from_position(meta.clone(), fifty, 10).check_termination(),
            Some(Termination::FiftyMoveRule)
        );

        let session = GameSession::from_position(meta, Chess::default(), 0);
        assert_eq!(session.check_termination(), Some(Termination::PlyLimit));
    }

    #[test]
    fn test_checkmate_decides_result() {
        let mate = parse_fen("rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3").unwrap();
        let mut session = GameSession::from_position(GameMetadata::default(), mate, 10);
        assert_eq!(session.finalize(Termination::Checkmate), GameOutcome::BlackWin);
        assert_eq!(session.metadata.result, "0-1");
    }

    #[test]
    fn test_ply_limit_result_comes_from_last_range() {
        let mut session = GameSession::from_position(GameMetadata::default(), Chess::default(), 1);
        session.history.push(record(Color::White, 0, 300, Range::LowTal));
        assert_eq!(session.finalize(Termination::PlyLimit), GameOutcome::WhiteWin);
        assert_eq!(session.outcome(), Some(GameOutcome::WhiteWin));

        let mut empty = GameSession::from_position(GameMetadata::default(), Chess::default(), 0);
        assert_eq!(empty.finalize(Termination::PlyLimit), GameOutcome::Undecided);
        assert_eq!(empty.metadata.result, "*");
    }

    #[test]
    fn test_apply_tracks_castling_and_history() {
        let start = parse_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let mut session = GameSession::from_position(GameMetadata::default(), start, 10);
        let evaluation = Evaluation {
            best_move: "e1c1".to_string(),
            score: 15,
            depth: 10,
        };
        session.apply(evaluation, 51, Range::ChaosCapablancaTal).unwrap();
        assert_eq!(session.castling().fen_field(), "kq");
        assert_eq!(session.history()[0].san, "O-O-O");
        assert_eq!(session.history()[0].comment(), "15;10;51;CCT");
        assert_eq!(to_fen(session.position()), "r3k2r/8/8/8/8/8/8/2KR3R b kq - 1 1");
    }

    #[test]
    fn test_apply_rejects_illegal_engine_move() {
        let mut session = GameSession::from_position(GameMetadata::default(), Chess::default(), 10);
        let evaluation = Evaluation {
            best_move: "e2e5".to_string(),
            score: 0,
            depth: 1,
        };
        assert!(matches!(
            session.apply(evaluation, 50, Range::Capablanca),
            Err(PlayerError::Board(_))
        ));
        assert!(session.history().is_empty());
    }
}
