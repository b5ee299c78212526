//! Top-level run: one engine, one writer, every configured game.

use std::io::Read;

use chess_core::{parse_fen, GameWriter, PgnBatch, PgnWriter, STANDARD_START_FEN};
use tracing::{error, info, warn};

use crate::analyzer::{analyze_position, write_report, AnalysisReport, AnalysisSettings};
use crate::config::{Mode, PlayerConfig};
use crate::engine::{EngineSession, UciEngine};
use crate::error::PlayerError;
use crate::metadata;
use crate::options::EngineConfiguration;
use crate::selfplay::{GameSession, SelfPlay, SelfPlaySettings};

/// What a run produced.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub games_played: usize,
    pub games_skipped: usize,
    /// Games abandoned mid-play on a board error. Nothing is written for them.
    pub games_failed: usize,
    pub analysis: Option<AnalysisReport>,
}

/// Start the configured engine and run.
pub async fn run(config: &PlayerConfig) -> Result<RunSummary, PlayerError> {
    let path = config.engine_path();
    info!(engine = %path, mode = ?config.mode, "Starting engine");
    let engine = UciEngine::start(&path, config.timeout).await?;
    run_with_engine(engine, config).await
}

/// Run against an already started engine. The engine is always closed
/// before returning.
pub async fn run_with_engine<E: EngineSession>(
    engine: E,
    config: &PlayerConfig,
) -> Result<RunSummary, PlayerError> {
    let settings = SelfPlaySettings {
        time_budget: config.time_budget(),
        request_timeout: config.timeout,
        model: config.model,
        search_moves: config.search_moves.clone(),
        fallback_overrides: config.fallback_overrides(),
    };
    let mut player = SelfPlay::new(engine, settings, EngineConfiguration::new());

    let result = drive(&mut player, config).await;
    if let Err(e) = &result {
        error!(error = %e, "Run aborted");
    }
    player.shutdown().await;
    result
}

async fn drive<E: EngineSession>(
    player: &mut SelfPlay<E>,
    config: &PlayerConfig,
) -> Result<RunSummary, PlayerError> {
    player.configure(&config.initial_options()).await?;
    if config.show_engine_infos {
        log_engine_infos(player.engine());
    }

    match config.mode {
        Mode::Play => {
            let mut writer = PgnWriter::create(&config.pgn_output, config.append_game)?;
            let result = play_games(player, config, &mut writer).await;
            writer.flush()?;
            info!(output = %writer.path().display(), "Games written");
            result
        }
        Mode::Analyze => analyze(player, config).await,
    }
}

/// Dispatch to the configured game source.
pub async fn play_games<E: EngineSession, W: GameWriter>(
    player: &mut SelfPlay<E>,
    config: &PlayerConfig,
    writer: &mut W,
) -> Result<RunSummary, PlayerError> {
    match &config.input_pgn {
        Some(path) => {
            let batch = PgnBatch::open(path)?;
            play_batch(player, config, batch, writer).await
        }
        None => play_from_fen(player, config, writer).await,
    }
}

async fn play_from_fen<E: EngineSession, W: GameWriter>(
    player: &mut SelfPlay<E>,
    config: &PlayerConfig,
    writer: &mut W,
) -> Result<RunSummary, PlayerError> {
    let fen = config.fen.as_deref().unwrap_or(STANDARD_START_FEN);
    let start = parse_fen(fen)?;
    let meta = metadata::for_fen_game(
        &engine_name(player.engine().metadata().name.as_str(), config),
        config.eco_code.as_deref(),
        &config.time_control_tag(),
    );

    let mut session = GameSession::from_position(meta, start, config.max_moves * 2);
    let mut summary = RunSummary::default();
    match player.play(&mut session, writer).await {
        Ok(_) => summary.games_played = 1,
        Err(e) if e.is_game_fatal_only() => {
            warn!(game = 1, error = %e, "Game failed");
            summary.games_failed = 1;
        }
        Err(e) => return Err(e),
    }
    Ok(summary)
}

/// Continue every game of `batch`. Malformed input games are skipped and a
/// game that hits a board error is dropped; engine and I/O errors end the run.
pub async fn play_batch<E: EngineSession, W: GameWriter, R: Read>(
    player: &mut SelfPlay<E>,
    config: &PlayerConfig,
    mut batch: PgnBatch<R>,
    writer: &mut W,
) -> Result<RunSummary, PlayerError> {
    let name = engine_name(player.engine().metadata().name.as_str(), config);
    let time_control = config.time_control_tag();
    let mut played = 0;
    let mut failed = 0;

    while let Some(game) = batch.next_game()? {
        let meta = metadata::for_continued_game(&name, &game, &time_control);
        info!(
            game = batch.loaded(),
            input_plies = game.moves.len(),
            "Continuing input game"
        );
        let mut session = GameSession::continuing(meta, game, config.games_move_from_eco * 2);
        match player.play(&mut session, writer).await {
            Ok(_) => played += 1,
            Err(e) if e.is_game_fatal_only() => {
                warn!(game = batch.loaded(), error = %e, "Game failed");
                failed += 1;
            }
            Err(e) => return Err(e),
        }
    }

    for skipped in batch.skipped() {
        warn!(game = skipped.index, reason = %skipped.reason, "Input game skipped");
    }
    info!(
        loaded = batch.loaded(),
        skipped = batch.skipped().len(),
        failed,
        "Input games processed"
    );

    Ok(RunSummary {
        games_played: played,
        games_skipped: batch.skipped().len(),
        games_failed: failed,
        analysis: None,
    })
}

async fn analyze<E: EngineSession>(
    player: &mut SelfPlay<E>,
    config: &PlayerConfig,
) -> Result<RunSummary, PlayerError> {
    let fen = config.fen.as_deref().unwrap_or(STANDARD_START_FEN);
    let settings = AnalysisSettings {
        time_budget: config.time_budget(),
        request_timeout: config.timeout,
        model: config.model,
        multi_pv: config.multi_pv,
        search_moves: config.search_moves.clone(),
        rounds: config.analysis_rounds,
    };

    let (engine, options) = player.parts_mut();
    let report = analyze_position(engine, options, fen, &settings).await?;
    if let Some(path) = &config.analysis_output {
        write_report(path, &report)?;
        info!(output = %path.display(), "Analysis written");
    }

    Ok(RunSummary {
        analysis: Some(report),
        ..RunSummary::default()
    })
}

fn engine_name(reported: &str, config: &PlayerConfig) -> String {
    if reported.trim().is_empty() {
        config.engine_name.clone()
    } else {
        reported.to_string()
    }
}

fn log_engine_infos<E: EngineSession>(engine: &E) {
    let meta = engine.metadata();
    info!(name = %meta.name, author = %meta.author, "Engine");
    for (name, declaration) in &meta.options {
        info!(option = %name, "{declaration}");
    }
}
