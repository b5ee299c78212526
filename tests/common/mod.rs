//! Scripted in-memory engine for driving the player without a process.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::time::Duration;

use self_play::engine::{Analysis, EngineError, EngineMetadata, EngineSession};

/// Everything the player asked the engine to do, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SetOption(String, String),
    NewGame,
    Position(String),
    Analyze,
    AnalyzeRestricted(Vec<String>),
    BestMoveOnly,
    Close,
}

/// Replies are consumed in order; an empty queue behaves like a hung engine.
pub struct ScriptedEngine {
    pub metadata: EngineMetadata,
    pub calls: Vec<Call>,
    pub budgets: Vec<Duration>,
    analyses: VecDeque<Analysis>,
    best_moves: VecDeque<Option<String>>,
}

impl ScriptedEngine {
    pub fn new(name: &str, options: &[&str]) -> Self {
        let metadata = EngineMetadata {
            name: name.to_string(),
            author: "Test".to_string(),
            options: options
                .iter()
                .map(|o| (o.to_string(), "type string default".to_string()))
                .collect(),
        };
        Self {
            metadata,
            calls: Vec::new(),
            budgets: Vec::new(),
            analyses: VecDeque::new(),
            best_moves: VecDeque::new(),
        }
    }

    /// Engine that advertises the usual setup options plus all personalities.
    pub fn shashchess() -> Self {
        Self::new(
            "ShashChess Test",
            &[
                "Threads",
                "Hash",
                "MultiPV",
                "LiveBook Proxy Url",
                "ChessDB Tablebase",
                "High Tal",
                "Middle High Tal",
                "Middle Tal",
                "Low Middle Tal",
                "Low Tal",
                "Capablanca",
                "Low Petrosian",
                "Middle Low Petrosian",
                "Middle Petrosian",
                "Middle High Petrosian",
                "High Petrosian",
            ],
        )
    }

    pub fn push_analysis(&mut self, analysis: Analysis) -> &mut Self {
        self.analyses.push_back(analysis);
        self
    }

    pub fn push_move(&mut self, best_move: &str, cp: i32, depth: u32) -> &mut Self {
        self.push_analysis(Analysis::single(best_move, cp, depth))
    }

    pub fn push_empty(&mut self) -> &mut Self {
        self.push_analysis(Analysis::default())
    }

    pub fn push_best_move(&mut self, best_move: Option<&str>) -> &mut Self {
        self.best_moves.push_back(best_move.map(str::to_string));
        self
    }

    pub fn option_calls(&self) -> Vec<(String, String)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::SetOption(name, value) => Some((name.clone(), value.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, wanted: &Call) -> usize {
        self.calls.iter().filter(|c| *c == wanted).count()
    }

    fn next_analysis(&mut self, command: &str, timeout: Duration) -> Result<Analysis, EngineError> {
        self.analyses.pop_front().ok_or(EngineError::Timeout {
            command: command.to_string(),
            timeout,
        })
    }
}

impl EngineSession for ScriptedEngine {
    fn metadata(&self) -> &EngineMetadata {
        &self.metadata
    }

    async fn set_option(&mut self, name: &str, value: &str, _timeout: Duration) -> Result<(), EngineError> {
        if !self.metadata.supports(name) {
            return Err(EngineError::OptionRejected(name.to_string()));
        }
        self.calls.push(Call::SetOption(name.to_string(), value.to_string()));
        Ok(())
    }

    async fn new_game(&mut self) -> Result<(), EngineError> {
        self.calls.push(Call::NewGame);
        Ok(())
    }

    async fn set_position(&mut self, fen: &str) -> Result<(), EngineError> {
        self.calls.push(Call::Position(fen.to_string()));
        Ok(())
    }

    async fn analyze(&mut self, budget: Duration, timeout: Duration) -> Result<Analysis, EngineError> {
        self.calls.push(Call::Analyze);
        self.budgets.push(budget);
        self.next_analysis("go", timeout)
    }

    async fn analyze_restricted(
        &mut self,
        budget: Duration,
        moves: &[String],
        timeout: Duration,
    ) -> Result<Analysis, EngineError> {
        self.calls.push(Call::AnalyzeRestricted(moves.to_vec()));
        self.budgets.push(budget);
        self.next_analysis("go searchmoves", timeout)
    }

    async fn best_move_only(&mut self, budget: Duration) -> Result<Option<String>, EngineError> {
        self.calls.push(Call::BestMoveOnly);
        self.budgets.push(budget);
        self.best_moves.pop_front().ok_or(EngineError::Timeout {
            command: "go".to_string(),
            timeout: budget,
        })
    }

    async fn close(&mut self) -> Result<(), EngineError> {
        self.calls.push(Call::Close);
        Ok(())
    }
}
