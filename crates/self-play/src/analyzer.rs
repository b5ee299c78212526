//! Single-position analysis mode.
//!
//! Analyses one position for a number of rounds with a growing budget. After
//! each round the engine is switched to the personality of the best line.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Duration;

use chess_core::{parse_fen, ply_number, total_material};
use serde::Serialize;
use shakmaty::Position;
use shashin::{classify, Range, WinProbabilityModel};
use tracing::info;

use crate::engine::{Analysis, EngineSession};
use crate::error::PlayerError;
use crate::options::EngineConfiguration;

#[derive(Debug, Clone)]
pub struct AnalysisSettings {
    /// Base search time, multiplied by round and line count
    pub time_budget: Duration,
    pub request_timeout: Duration,
    pub model: WinProbabilityModel,
    pub multi_pv: u32,
    pub search_moves: Vec<String>,
    pub rounds: u32,
}

impl AnalysisSettings {
    fn round_budget(&self, round: u32) -> Duration {
        self.time_budget * round * self.multi_pv
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LineReport {
    pub multipv: u32,
    pub depth: u32,
    pub score: i32,
    pub win_probability: u8,
    pub range: Range,
    pub pv: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RoundReport {
    pub round: u32,
    pub budget_ms: u64,
    pub lines: Vec<LineReport>,
    /// Range applied to the engine after this round
    pub applied_range: Option<Range>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub fen: String,
    pub model: WinProbabilityModel,
    pub rounds: Vec<RoundReport>,
}

/// Run every round against `fen`.
pub async fn analyze_position<E: EngineSession>(
    engine: &mut E,
    options: &mut EngineConfiguration,
    fen: &str,
    settings: &AnalysisSettings,
) -> Result<AnalysisReport, PlayerError> {
    let position = parse_fen(fen)?;
    let phase = match settings.model {
        WinProbabilityModel::Ply => ply_number(&position),
        WinProbabilityModel::Material => total_material(position.board()),
    };

    engine.new_game().await?;
    let mut rounds = Vec::with_capacity(settings.rounds as usize);

    for round in 1..=settings.rounds {
        let budget = settings.round_budget(round);
        let timeout = budget + settings.request_timeout;

        engine.set_position(fen).await?;
        let analysis = if settings.search_moves.is_empty() {
            engine.analyze(budget, timeout).await?
        } else {
            engine
                .analyze_restricted(budget, &settings.search_moves, timeout)
                .await?
        };

        let lines = classify_lines(&analysis, settings.model, phase);
        for line in &lines {
            info!(
                round,
                multipv = line.multipv,
                depth = line.depth,
                score = line.score,
                win_probability = line.win_probability,
                range = %line.range,
                pv = %line.pv.join(" "),
                "Analysis line"
            );
        }

        let best = lines
            .iter()
            .find(|line| line.multipv == 1)
            .or_else(|| lines.first());
        let applied_range = match best {
            Some(line) => {
                options
                    .apply_personality(engine, line.range, settings.request_timeout)
                    .await?;
                Some(line.range)
            }
            None => None,
        };

        rounds.push(RoundReport {
            round,
            budget_ms: budget.as_millis() as u64,
            lines,
            applied_range,
        });
    }

    Ok(AnalysisReport {
        fen: fen.to_string(),
        model: settings.model,
        rounds,
    })
}

fn classify_lines(analysis: &Analysis, model: WinProbabilityModel, phase: u32) -> Vec<LineReport> {
    analysis
        .lines
        .iter()
        .map(|line| {
            let score = line.score();
            let win_probability = model.win_probability(score, phase);
            LineReport {
                multipv: line.multipv,
                depth: line.depth,
                score,
                win_probability,
                range: classify(win_probability),
                pv: line.pv.clone(),
            }
        })
        .collect()
}

/// Write the report as pretty JSON.
pub fn write_report(path: &Path, report: &AnalysisReport) -> Result<(), PlayerError> {
    let out = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(out, report)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::PvLine;

    #[test]
    fn test_round_budget_grows_with_round_and_lines() {
        let settings = AnalysisSettings {
            time_budget: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
            model: WinProbabilityModel::Ply,
            multi_pv: 3,
            search_moves: Vec::new(),
            rounds: 2,
        };
        assert_eq!(settings.round_budget(1), Duration::from_secs(6));
        assert_eq!(settings.round_budget(2), Duration::from_secs(12));
    }

    #[test]
    fn test_lines_are_classified_individually() {
        let analysis = Analysis {
            lines: vec![
                PvLine {
                    multipv: 1,
                    depth: 20,
                    cp: Some(950),
                    mate: None,
                    pv: vec!["e2e4".into(), "e7e5".into()],
                },
                PvLine {
                    multipv: 2,
                    depth: 20,
                    cp: Some(-10),
                    mate: None,
                    pv: vec!["d2d4".into()],
                },
            ],
            best_move: Some("e2e4".into()),
        };
        let lines = classify_lines(&analysis, WinProbabilityModel::Ply, 1);
        assert_eq!(lines[0].range, Range::HighTal);
        assert_eq!(lines[1].win_probability, 50);
        assert_eq!(lines[1].range, Range::Capablanca);
    }
}
