//! UCI engine session (async I/O)

use std::collections::BTreeMap;
use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time;
use tracing::{debug, warn};

/// Centipawn value of "mate now"; mate in N maps to this minus N.
pub const MATE_SCORE: i32 = 10_000;

const QUIT_GRACE: Duration = Duration::from_secs(2);

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to spawn engine {path}: {source}")]
    Spawn {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Engine I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Engine closed its output")]
    Disconnected,

    #[error("No reply to `{command}` within {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("Option not supported by the engine: {0}")]
    OptionRejected(String),
}

/// What the engine announced during the `uci` handshake.
#[derive(Debug, Clone, Default)]
pub struct EngineMetadata {
    pub name: String,
    pub author: String,
    /// Option name to its declaration (`type check default false`, ...)
    pub options: BTreeMap<String, String>,
}

impl EngineMetadata {
    /// UCI option names are case-insensitive.
    pub fn supports(&self, option: &str) -> bool {
        self.options.keys().any(|name| name.eq_ignore_ascii_case(option))
    }
}

/// A single PV line from an analysis
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PvLine {
    /// 1-based multipv index
    pub multipv: u32,
    pub depth: u32,
    /// Centipawn score
    pub cp: Option<i32>,
    /// Mate in N
    pub mate: Option<i32>,
    /// Principal variation moves
    pub pv: Vec<String>,
}

impl PvLine {
    /// Score in centipawns for the side to move, mates folded in.
    pub fn score(&self) -> i32 {
        match (self.mate, self.cp) {
            (Some(mate), _) => mate_to_cp(mate),
            (None, Some(cp)) => cp,
            (None, None) => 0,
        }
    }

    pub fn best_move(&self) -> Option<&str> {
        self.pv.first().map(String::as_str).filter(|mv| is_move(mv))
    }
}

/// Best move with its score, taken from the principal line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Evaluation {
    pub best_move: String,
    pub score: i32,
    pub depth: u32,
}

/// Everything the engine reported for one `go`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Analysis {
    /// Last info line per multipv index, ordered by index
    pub lines: Vec<PvLine>,
    /// Move from the closing `bestmove`
    pub best_move: Option<String>,
}

impl Analysis {
    /// Single-line analysis, as most engines report with MultiPV 1.
    pub fn single(best_move: &str, cp: i32, depth: u32) -> Self {
        Self {
            lines: vec![PvLine {
                multipv: 1,
                depth,
                cp: Some(cp),
                mate: None,
                pv: vec![best_move.to_string()],
            }],
            best_move: Some(best_move.to_string()),
        }
    }

    pub fn principal(&self) -> Option<&PvLine> {
        self.lines
            .iter()
            .find(|line| line.multipv == 1)
            .or_else(|| self.lines.first())
    }

    /// `None` when the reply carries no usable move.
    pub fn evaluation(&self) -> Option<Evaluation> {
        let line = self.principal()?;
        Some(Evaluation {
            best_move: line.best_move()?.to_string(),
            score: line.score(),
            depth: line.depth,
        })
    }
}

/// The request/response subset of UCI the player needs.
#[allow(async_fn_in_trait)]
pub trait EngineSession {
    fn metadata(&self) -> &EngineMetadata;

    async fn set_option(&mut self, name: &str, value: &str, timeout: Duration)
        -> Result<(), EngineError>;

    async fn new_game(&mut self) -> Result<(), EngineError>;

    async fn set_position(&mut self, fen: &str) -> Result<(), EngineError>;

    async fn analyze(&mut self, budget: Duration, timeout: Duration)
        -> Result<Analysis, EngineError>;

    async fn analyze_restricted(
        &mut self,
        budget: Duration,
        moves: &[String],
        timeout: Duration,
    ) -> Result<Analysis, EngineError>;

    async fn best_move_only(&mut self, budget: Duration) -> Result<Option<String>, EngineError>;

    async fn close(&mut self) -> Result<(), EngineError>;
}

/// Engine child process speaking UCI over stdin/stdout
pub struct UciEngine {
    process: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    metadata: EngineMetadata,
    request_timeout: Duration,
}

impl UciEngine {
    /// Spawn the engine and complete the `uci` handshake.
    pub async fn start(path: &str, request_timeout: Duration) -> Result<Self, EngineError> {
        let mut process = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EngineError::Spawn {
                path: path.to_string(),
                source,
            })?;

        let stdin = process.stdin.take().ok_or(EngineError::Disconnected)?;
        let stdout = BufReader::new(process.stdout.take().ok_or(EngineError::Disconnected)?);

        let mut engine = Self {
            process,
            stdin,
            stdout,
            metadata: EngineMetadata::default(),
            request_timeout,
        };

        engine.send("uci").await?;
        let metadata = with_timeout("uci", request_timeout, engine.read_metadata()).await?;
        engine.metadata = metadata;
        engine.sync(request_timeout).await?;

        Ok(engine)
    }

    /// Send a command to the engine
    async fn send(&mut self, cmd: &str) -> Result<(), EngineError> {
        debug!(cmd, "UCI <");
        self.stdin.write_all(format!("{cmd}\n").as_bytes()).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn read_line(&mut self) -> Result<String, EngineError> {
        let mut line = String::new();
        if self.stdout.read_line(&mut line).await? == 0 {
            return Err(EngineError::Disconnected);
        }
        let trimmed = line.trim().to_string();
        debug!(line = %trimmed, "UCI >");
        Ok(trimmed)
    }

    /// Wait for a specific response line
    async fn wait_for(&mut self, expected: &str) -> Result<(), EngineError> {
        loop {
            if self.read_line().await? == expected {
                return Ok(());
            }
        }
    }

    async fn sync(&mut self, timeout: Duration) -> Result<(), EngineError> {
        self.send("isready").await?;
        with_timeout("isready", timeout, self.wait_for("readyok")).await
    }

    async fn read_metadata(&mut self) -> Result<EngineMetadata, EngineError> {
        let mut metadata = EngineMetadata::default();
        loop {
            let line = self.read_line().await?;
            if line == "uciok" {
                return Ok(metadata);
            }
            if let Some(name) = line.strip_prefix("id name ") {
                metadata.name = name.trim().to_string();
            } else if let Some(author) = line.strip_prefix("id author ") {
                metadata.author = author.trim().to_string();
            } else if let Some((name, declaration)) = parse_option(&line) {
                metadata.options.insert(name, declaration);
            }
        }
    }

    async fn search(
        &mut self,
        budget: Duration,
        moves: &[String],
        timeout: Duration,
    ) -> Result<Analysis, EngineError> {
        let command = go_command(budget, moves);
        self.send(&command).await?;
        with_timeout(&command, timeout, self.read_analysis()).await
    }

    async fn read_analysis(&mut self) -> Result<Analysis, EngineError> {
        let mut analysis = Analysis::default();
        loop {
            let line = self.read_line().await?;
            if line.starts_with("info") && line.contains(" pv ") {
                let info = parse_info(&line);
                match analysis.lines.iter_mut().find(|l| l.multipv == info.multipv) {
                    Some(existing) => *existing = info,
                    None => analysis.lines.push(info),
                }
            } else if line.starts_with("bestmove") {
                analysis.best_move = parse_bestmove(&line);
                analysis.lines.sort_by_key(|l| l.multipv);
                return Ok(analysis);
            }
        }
    }

    async fn read_bestmove(&mut self) -> Result<Option<String>, EngineError> {
        loop {
            let line = self.read_line().await?;
            if line.starts_with("bestmove") {
                return Ok(parse_bestmove(&line));
            }
        }
    }
}

impl EngineSession for UciEngine {
    fn metadata(&self) -> &EngineMetadata {
        &self.metadata
    }

    async fn set_option(
        &mut self,
        name: &str,
        value: &str,
        timeout: Duration,
    ) -> Result<(), EngineError> {
        if !self.metadata.options.is_empty() && !self.metadata.supports(name) {
            return Err(EngineError::OptionRejected(name.to_string()));
        }
        let value = if value.is_empty() { "<empty>" } else { value };
        self.send(&format!("setoption name {name} value {value}")).await?;
        self.sync(timeout).await
    }

    async fn new_game(&mut self) -> Result<(), EngineError> {
        self.send("ucinewgame").await?;
        self.sync(self.request_timeout).await
    }

    async fn set_position(&mut self, fen: &str) -> Result<(), EngineError> {
        self.send(&format!("position fen {fen}")).await
    }

    async fn analyze(&mut self, budget: Duration, timeout: Duration) -> Result<Analysis, EngineError> {
        self.search(budget, &[], timeout).await
    }

    async fn analyze_restricted(
        &mut self,
        budget: Duration,
        moves: &[String],
        timeout: Duration,
    ) -> Result<Analysis, EngineError> {
        self.search(budget, moves, timeout).await
    }

    async fn best_move_only(&mut self, budget: Duration) -> Result<Option<String>, EngineError> {
        let command = go_command(budget, &[]);
        self.send(&command).await?;
        let timeout = budget + self.request_timeout;
        with_timeout(&command, timeout, self.read_bestmove()).await
    }

    async fn close(&mut self) -> Result<(), EngineError> {
        let _ = self.send("quit").await;
        match time::timeout(QUIT_GRACE, self.process.wait()).await {
            Ok(status) => {
                status?;
            }
            Err(_) => {
                warn!("Engine ignored quit, killing it");
                self.process.start_kill()?;
            }
        }
        Ok(())
    }
}

impl Drop for UciEngine {
    fn drop(&mut self) {
        // Best-effort synchronous kill in drop
        let _ = self.process.start_kill();
    }
}

async fn with_timeout<T>(
    command: &str,
    timeout: Duration,
    request: impl Future<Output = Result<T, EngineError>>,
) -> Result<T, EngineError> {
    time::timeout(timeout, request)
        .await
        .map_err(|_| EngineError::Timeout {
            command: command.to_string(),
            timeout,
        })?
}

fn go_command(budget: Duration, moves: &[String]) -> String {
    let mut command = format!("go movetime {}", budget.as_millis());
    if !moves.is_empty() {
        command.push_str(" searchmoves ");
        command.push_str(&moves.join(" "));
    }
    command
}

pub fn mate_to_cp(mate: i32) -> i32 {
    if mate > 0 {
        MATE_SCORE - mate
    } else {
        -MATE_SCORE - mate
    }
}

fn is_move(token: &str) -> bool {
    !token.is_empty() && token != "(none)" && token != "0000"
}

/// Parse `option name <name> type <...>` into name and declaration
fn parse_option(line: &str) -> Option<(String, String)> {
    let rest = line.strip_prefix("option name ")?;
    let (name, declaration) = rest.split_once(" type ")?;
    Some((name.trim().to_string(), format!("type {}", declaration.trim())))
}

fn parse_bestmove(line: &str) -> Option<String> {
    line.split_whitespace()
        .nth(1)
        .filter(|mv| is_move(mv))
        .map(str::to_string)
}

fn parse_info(line: &str) -> PvLine {
    PvLine {
        multipv: parse_multipv_index(line).unwrap_or(1),
        depth: parse_depth(line).unwrap_or(0),
        cp: parse_cp(line),
        mate: parse_mate(line),
        pv: parse_pv(line),
    }
}

/// Value following the first occurrence of `key`
fn token_after<T: std::str::FromStr>(line: &str, key: &str) -> Option<T> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    for (i, part) in parts.iter().enumerate() {
        if *part == key && i + 1 < parts.len() {
            return parts[i + 1].parse().ok();
        }
    }
    None
}

/// Parse centipawn score from info line
fn parse_cp(line: &str) -> Option<i32> {
    token_after(line, "cp")
}

/// Parse mate score from info line
fn parse_mate(line: &str) -> Option<i32> {
    token_after(line, "mate")
}

fn parse_depth(line: &str) -> Option<u32> {
    token_after(line, "depth")
}

/// Parse multipv index from info line
fn parse_multipv_index(line: &str) -> Option<u32> {
    token_after(line, "multipv")
}

/// Parse PV moves from info line
fn parse_pv(line: &str) -> Vec<String> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let mut in_pv = false;
    let mut moves = Vec::new();

    for part in parts {
        if part == "pv" {
            in_pv = true;
            continue;
        }
        if in_pv {
            // PV ends at next keyword or end of line
            if part.starts_with("bmc") || part == "string" {
                break;
            }
            moves.push(part.to_string());
        }
    }

    moves
}
