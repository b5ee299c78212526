//! Player configuration from a properties file, with environment overrides

use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use shashin::WinProbabilityModel;

use crate::error::PlayerError;
use crate::options::OptionOverride;

const ENV_PREFIX: &str = "SHASHIN_";

/// Every key the loader understands; used to look up environment overrides.
const KEYS: &[&str] = &[
    "mode",
    "engineName",
    "timeoutSeconds",
    "threadsNumber",
    "cpuMhz",
    "hashSizeMB",
    "syzygyPath",
    "syzygyProbeDepth",
    "fen",
    "inputGamesPgn",
    "maxMovesNumber",
    "gamesMoveFromEco",
    "ecoCode",
    "pgnOutputFileName",
    "appendGame",
    "showEngineInfos",
    "fullDepthThreads",
    "variety",
    "persistedLearning",
    "readOnlyLearning",
    "livebookProxyUrl",
    "chessDBTablebase",
    "mcts",
    "mCTSThreads",
    "winProbabilityModel",
    "multiPV",
    "searchMoves",
    "analysisRounds",
    "analysisOutput",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Engine plays both sides from a FEN or from each game of a PGN file
    #[default]
    Play,
    /// Multi-PV analysis of a single position
    Analyze,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "play" => Ok(Mode::Play),
            "analyze" | "analyse" => Ok(Mode::Analyze),
            other => Err(format!("unknown mode: {other}")),
        }
    }
}

/// `key=value` properties with `#` and `!` comment lines.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    values: HashMap<String, String>,
}

impl Properties {
    pub fn parse(text: &str) -> Self {
        let values = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('!'))
            .filter_map(|line| {
                let split = line.find(['=', ':'])?;
                let (key, value) = line.split_at(split);
                Some((key.trim().to_string(), value[1..].trim().to_string()))
            })
            .collect();
        Self { values }
    }

    /// Replace values with `SHASHIN_<UPPER_SNAKE_KEY>` variables where set.
    pub fn apply_env_overrides(&mut self) {
        for key in KEYS {
            if let Ok(value) = env::var(env_key(key)) {
                self.values.insert(key.to_string(), value);
            }
        }
    }

    /// Non-empty value for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|v| v.as_str())
            .filter(|v| !v.is_empty())
    }

    fn parse_or<T: FromStr>(&self, key: &str, default: T) -> Result<T, PlayerError> {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw
                .parse()
                .map_err(|_| PlayerError::Config(format!("{key}: cannot parse {raw:?}"))),
        }
    }

    fn flag(&self, key: &str, default: bool) -> Result<bool, PlayerError> {
        match self.get(key).map(str::to_ascii_lowercase).as_deref() {
            None => Ok(default),
            Some("yes" | "true" | "on" | "1") => Ok(true),
            Some("no" | "false" | "off" | "0") => Ok(false),
            Some(other) => Err(PlayerError::Config(format!("{key}: expected yes/no, got {other:?}"))),
        }
    }

    fn text(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_string)
    }
}

/// `hashSizeMB` -> `SHASHIN_HASH_SIZE_MB`, `chessDBTablebase` -> `SHASHIN_CHESS_DB_TABLEBASE`
pub fn env_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let mut out = String::from(ENV_PREFIX);
    for (i, c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() && i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            if prev.is_ascii_lowercase() || prev.is_ascii_digit() || (prev.is_ascii_uppercase() && next_is_lower) {
                out.push('_');
            }
        }
        out.push(c.to_ascii_uppercase());
    }
    out
}

#[derive(Clone, Debug)]
pub struct PlayerConfig {
    pub mode: Mode,

    /// Engine executable name or path
    pub engine_name: String,

    /// Grace period on top of the search budget before a request times out
    pub timeout: Duration,

    pub threads: u32,
    pub cpu_mhz: u32,
    pub hash_mb: u32,
    pub syzygy_path: Option<String>,
    pub syzygy_probe_depth: Option<String>,

    /// Starting position; the standard one when neither this nor a PGN is set
    pub fen: Option<String>,
    pub input_pgn: Option<PathBuf>,

    /// Moves (not plies) per side when playing from a FEN
    pub max_moves: u32,
    /// Moves per side added after each game loaded from a PGN
    pub games_move_from_eco: u32,
    pub eco_code: Option<String>,

    pub pgn_output: PathBuf,
    pub append_game: bool,
    pub show_engine_infos: bool,

    pub full_depth_threads: Option<String>,
    pub variety: Option<String>,
    pub persisted_learning: Option<String>,
    pub read_only_learning: Option<String>,
    pub livebook_proxy_url: Option<String>,
    pub chessdb_tablebase: Option<String>,
    pub mcts: Option<String>,
    pub mcts_threads: Option<String>,

    pub model: WinProbabilityModel,

    pub multi_pv: u32,
    pub search_moves: Vec<String>,
    pub analysis_rounds: u32,
    pub analysis_output: Option<PathBuf>,
}

impl PlayerConfig {
    /// Load from a properties file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PlayerError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| PlayerError::Config(format!("cannot read {}: {e}", path.display())))?;
        let mut properties = Properties::parse(&text);
        properties.apply_env_overrides();
        Self::from_properties(&properties)
    }

    pub fn from_properties(p: &Properties) -> Result<Self, PlayerError> {
        let engine_name = p
            .text("engineName")
            .ok_or_else(|| PlayerError::Config("engineName not set".into()))?;

        let model = match p.get("winProbabilityModel") {
            Some(raw) => raw.parse().map_err(PlayerError::Config)?,
            None => WinProbabilityModel::default(),
        };
        let mode = match p.get("mode") {
            Some(raw) => raw.parse().map_err(PlayerError::Config)?,
            None => Mode::default(),
        };

        let search_moves = p
            .get("searchMoves")
            .map(|raw| {
                raw.split([' ', ','])
                    .filter(|mv| !mv.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let config = Self {
            mode,
            engine_name,
            timeout: Duration::from_secs(p.parse_or("timeoutSeconds", 60)?),
            threads: p.parse_or("threadsNumber", num_cpus::get() as u32)?,
            cpu_mhz: p.parse_or("cpuMhz", 3000)?,
            hash_mb: p.parse_or("hashSizeMB", 256)?,
            syzygy_path: p.text("syzygyPath"),
            syzygy_probe_depth: p.text("syzygyProbeDepth"),
            fen: p.text("fen"),
            input_pgn: p.text("inputGamesPgn").map(PathBuf::from),
            max_moves: p.parse_or("maxMovesNumber", 100)?,
            games_move_from_eco: p.parse_or("gamesMoveFromEco", 10)?,
            eco_code: p.text("ecoCode"),
            pgn_output: PathBuf::from(p.text("pgnOutputFileName").unwrap_or_else(|| "games.pgn".into())),
            append_game: p.flag("appendGame", false)?,
            show_engine_infos: p.flag("showEngineInfos", false)?,
            full_depth_threads: p.text("fullDepthThreads"),
            variety: p.text("variety"),
            persisted_learning: p.text("persistedLearning"),
            read_only_learning: p.text("readOnlyLearning"),
            livebook_proxy_url: p.text("livebookProxyUrl"),
            chessdb_tablebase: p.text("chessDBTablebase"),
            mcts: p.text("mcts"),
            mcts_threads: p.text("mCTSThreads"),
            model,
            multi_pv: p.parse_or("multiPV", 1)?,
            search_moves,
            analysis_rounds: p.parse_or("analysisRounds", 1)?,
            analysis_output: p.text("analysisOutput").map(PathBuf::from),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), PlayerError> {
        if self.threads == 0 || self.cpu_mhz == 0 || self.hash_mb == 0 {
            return Err(PlayerError::Config(
                "threadsNumber, cpuMhz and hashSizeMB must be positive".into(),
            ));
        }
        if self.fen.is_some() && self.input_pgn.is_some() {
            return Err(PlayerError::Config("set either fen or inputGamesPgn, not both".into()));
        }
        if self.mode == Mode::Analyze && (self.multi_pv == 0 || self.analysis_rounds == 0) {
            return Err(PlayerError::Config("multiPV and analysisRounds must be positive".into()));
        }
        Ok(())
    }

    /// Per-move search time: hash·512 / (threads·MHz) seconds, at least one.
    pub fn time_budget(&self) -> Duration {
        let secs = u64::from(self.hash_mb) * 512 / (u64::from(self.threads) * u64::from(self.cpu_mhz));
        Duration::from_secs(secs.max(1))
    }

    /// `TimeControl` tag: twice the per-move budget, no increment.
    pub fn time_control_tag(&self) -> String {
        format!("{}+0", self.time_budget().as_secs() * 2)
    }

    /// Executable to spawn. Bare names resolve in the working directory.
    pub fn engine_path(&self) -> String {
        let name = &self.engine_name;
        if name.contains('/') || name.contains('\\') {
            name.clone()
        } else if cfg!(windows) {
            format!("{name}.exe")
        } else {
            format!("./{name}")
        }
    }

    /// Options pushed once after the handshake, in this order.
    pub fn initial_options(&self) -> Vec<(String, String)> {
        let mut options = vec![
            ("Threads".to_string(), self.threads.to_string()),
            ("Hash".to_string(), self.hash_mb.to_string()),
        ];
        let optional = [
            ("SyzygyPath", &self.syzygy_path),
            ("SyzygyProbeDepth", &self.syzygy_probe_depth),
            ("Full depth threads", &self.full_depth_threads),
            ("Variety", &self.variety),
            ("Persisted learning", &self.persisted_learning),
            ("Read only learning", &self.read_only_learning),
            ("LiveBook Proxy Url", &self.livebook_proxy_url),
            ("ChessDB Tablebase", &self.chessdb_tablebase),
            ("MCTS", &self.mcts),
            ("MCTSThreads", &self.mcts_threads),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                options.push((name.to_string(), value.clone()));
            }
        }
        if self.mode == Mode::Analyze {
            options.push(("MultiPV".to_string(), self.multi_pv.to_string()));
        }
        options
    }

    /// Online sources switched off while the engine is asked for a bare best move.
    pub fn fallback_overrides(&self) -> Vec<OptionOverride> {
        let mut overrides = Vec::new();
        if let Some(url) = &self.livebook_proxy_url {
            overrides.push(OptionOverride::new("LiveBook Proxy Url", "", url));
        }
        if let Some(value) = &self.chessdb_tablebase {
            overrides.push(OptionOverride::new("ChessDB Tablebase", "false", value));
        }
        overrides
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
# engine
engineName=ShashChess
threadsNumber=4
cpuMhz=2000
hashSizeMB=1024
fen=rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1
maxMovesNumber = 40
appendGame=yes
livebookProxyUrl=http://localhost:8080
chessDBTablebase=true
winProbabilityModel=material
searchMoves=e2e4, d2d4
! trailing comment
"#;

    fn sample() -> PlayerConfig {
        PlayerConfig::from_properties(&Properties::parse(SAMPLE)).unwrap()
    }

    #[test]
    fn test_properties_parsing() {
        let props = Properties::parse("a=1\n# b=2\nc : three\nempty=\n");
        assert_eq!(props.get("a"), Some("1"));
        assert_eq!(props.get("b"), None);
        assert_eq!(props.get("c"), Some("three"));
        assert_eq!(props.get("empty"), None);
    }

    #[test]
    fn test_sample_config() {
        let config = sample();
        assert_eq!(config.engine_name, "ShashChess");
        assert_eq!(config.max_moves, 40);
        assert!(config.append_game);
        assert_eq!(config.model, WinProbabilityModel::Material);
        assert_eq!(config.search_moves, vec!["e2e4", "d2d4"]);
        assert_eq!(config.mode, Mode::Play);
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_time_budget() {
        let config = sample();
        // 1024 * 512 / (4 * 2000) = 65.5
        assert_eq!(config.time_budget(), Duration::from_secs(65));
        assert_eq!(config.time_control_tag(), "130+0");

        let mut fast = sample();
        fast.hash_mb = 1;
        assert_eq!(fast.time_budget(), Duration::from_secs(1));
    }

    #[test]
    fn test_initial_options_order() {
        let names: Vec<String> = sample().initial_options().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Threads", "Hash", "LiveBook Proxy Url", "ChessDB Tablebase"]);
    }

    #[test]
    fn test_fallback_overrides() {
        let overrides = sample().fallback_overrides();
        assert_eq!(overrides.len(), 2);
        assert_eq!(overrides[0].name, "LiveBook Proxy Url");
        assert_eq!(overrides[0].suspended, "");
        assert_eq!(overrides[0].restored, "http://localhost:8080");
        assert_eq!(overrides[1].suspended, "false");
    }

    #[test]
    fn test_validation_errors() {
        assert!(PlayerConfig::from_properties(&Properties::parse("threadsNumber=2")).is_err());
        let both = "engineName=e\nfen=8/8/8/8/8/8/8/8 w - - 0 1\ninputGamesPgn=a.pgn";
        assert!(PlayerConfig::from_properties(&Properties::parse(both)).is_err());
        let bad = "engineName=e\ncpuMhz=fast";
        assert!(matches!(
            PlayerConfig::from_properties(&Properties::parse(bad)),
            Err(PlayerError::Config(_))
        ));
        let bad_flag = "engineName=e\nappendGame=maybe";
        assert!(PlayerConfig::from_properties(&Properties::parse(bad_flag)).is_err());
    }

    #[test]
    fn test_env_key() {
        assert_eq!(env_key("hashSizeMB"), "SHASHIN_HASH_SIZE_MB");
        assert_eq!(env_key("chessDBTablebase"), "SHASHIN_CHESS_DB_TABLEBASE");
        assert_eq!(env_key("multiPV"), "SHASHIN_MULTI_PV");
        assert_eq!(env_key("fen"), "SHASHIN_FEN");
    }

    #[test]
    fn test_engine_path() {
        let mut config = sample();
        if !cfg!(windows) {
            assert_eq!(config.engine_path(), "./ShashChess");
        }
        config.engine_name = "/opt/engines/shashchess".into();
        assert_eq!(config.engine_path(), "/opt/engines/shashchess");
    }
}
