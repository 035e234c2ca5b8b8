use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Invalid scoring config: {0}")]
    Invalid(String),
}

/// Application configuration loaded from TOML config file.
/// All fields have defaults; the config file is optional.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Snapshot file used when `--snapshot` is not given.
    pub snapshot: Option<PathBuf>,
    /// Number of parallel workers for batch similarity. 0 = auto-detect (cores / 2, min 1).
    pub workers: usize,
    /// Result count for `similar` when `-n` is not given. 0 = built-in default.
    pub default_limit: usize,
    /// Scoring weights for both the sequencer and the similarity search.
    pub scoring: ScoringConfig,
}

/// Both scorers' tunables. Passed explicitly into every scoring call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub edge: EdgeWeights,
    pub similarity: SimilarityWeights,
}

/// Sequencer edge scoring. Signed, roughly -10..12; not comparable with the
/// similarity scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeWeights {
    /// Tempo term at zero BPM distance.
    pub tempo_base: f64,
    /// Points lost per BPM of distance.
    pub tempo_slope: f64,
    /// Tempo term when either side has no tempo.
    pub unknown_tempo: f64,
    /// Subtracted when the distance exceeds `max_bpm_step`.
    pub bpm_step_penalty: f64,
    pub key: SignedKeyScores,
    /// Multiplier applied to negative key terms when key jumps are allowed.
    /// Must be in (0, 1] so a clash is softened but stays a penalty.
    pub key_jump_softening: f64,
    /// Energy term at zero distance.
    pub energy_base: f64,
    /// Points lost per energy level of distance.
    pub energy_slope: f64,
    pub warm_up_bonus: f64,
    pub peak_time_bonus: f64,
    /// Bonus when both tracks have at least one transition window.
    pub window_bonus: f64,
}

impl Default for EdgeWeights {
    fn default() -> Self {
        Self {
            tempo_base: 4.0,
            tempo_slope: 0.5,
            unknown_tempo: 0.0,
            bpm_step_penalty: 4.0,
            key: SignedKeyScores::default(),
            key_jump_softening: 0.5,
            energy_base: 2.0,
            energy_slope: 0.5,
            warm_up_bonus: 0.5,
            peak_time_bonus: 0.5,
            window_bonus: 1.0,
        }
    }
}

/// Key term per relation tier for the sequencer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignedKeyScores {
    pub same: f64,
    pub relative: f64,
    pub adjacent: f64,
    pub cross_mode_adjacent: f64,
    pub energy_boost: f64,
    pub clash: f64,
    pub unparseable: f64,
    pub missing: f64,
}

impl Default for SignedKeyScores {
    fn default() -> Self {
        Self {
            same: 3.0,
            relative: 2.5,
            adjacent: 2.0,
            cross_mode_adjacent: 1.0,
            energy_boost: 1.0,
            clash: -8.0,
            unparseable: -8.0,
            missing: -2.0,
        }
    }
}

/// Similarity scoring on a 0-1 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimilarityWeights {
    pub embedding: f64,
    pub tempo: f64,
    pub key: f64,
    pub energy: f64,
    pub key_tiers: KeyTierScores,
    /// Distance at or below which tempo matches fully.
    pub full_match_bpm: f64,
    /// Distance at or above which tempo does not match at all.
    pub zero_match_bpm: f64,
    /// Tempo term when either side has no tempo.
    pub unknown_tempo: f64,
    /// Energy distance at which the energy term reaches zero.
    pub energy_zero_distance: f64,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            embedding: 0.50,
            tempo: 0.20,
            key: 0.20,
            energy: 0.10,
            key_tiers: KeyTierScores::default(),
            full_match_bpm: 1.0,
            zero_match_bpm: 10.0,
            unknown_tempo: 0.5,
            energy_zero_distance: 5.0,
        }
    }
}

impl SimilarityWeights {
    pub fn total(&self) -> f64 {
        self.embedding + self.tempo + self.key + self.energy
    }
}

/// Key term per relation tier for the similarity search, each in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyTierScores {
    pub same: f64,
    pub relative: f64,
    pub adjacent: f64,
    pub energy_boost: f64,
    pub cross_mode_adjacent: f64,
    pub clash: f64,
    pub unparseable: f64,
    pub missing: f64,
}

impl Default for KeyTierScores {
    fn default() -> Self {
        Self {
            same: 1.0,
            relative: 0.9,
            adjacent: 0.85,
            energy_boost: 0.7,
            cross_mode_adjacent: 0.75,
            clash: 0.2,
            unparseable: 0.3,
            missing: 0.5,
        }
    }
}

impl ScoringConfig {
    /// Reject values that would make a scorer produce non-finite or out-of-range output.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let e = &self.edge;
        let edge_values = [
            ("edge.tempo_base", e.tempo_base),
            ("edge.tempo_slope", e.tempo_slope),
            ("edge.unknown_tempo", e.unknown_tempo),
            ("edge.bpm_step_penalty", e.bpm_step_penalty),
            ("edge.key.same", e.key.same),
            ("edge.key.relative", e.key.relative),
            ("edge.key.adjacent", e.key.adjacent),
            ("edge.key.cross_mode_adjacent", e.key.cross_mode_adjacent),
            ("edge.key.energy_boost", e.key.energy_boost),
            ("edge.key.clash", e.key.clash),
            ("edge.key.unparseable", e.key.unparseable),
            ("edge.key.missing", e.key.missing),
            ("edge.energy_base", e.energy_base),
            ("edge.energy_slope", e.energy_slope),
            ("edge.warm_up_bonus", e.warm_up_bonus),
            ("edge.peak_time_bonus", e.peak_time_bonus),
            ("edge.window_bonus", e.window_bonus),
        ];
        for (name, value) in edge_values {
            if !value.is_finite() {
                return Err(ConfigError::Invalid(format!("{name} must be finite, got {value}")));
            }
        }
        if !(e.key_jump_softening > 0.0 && e.key_jump_softening <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "edge.key_jump_softening must be in (0, 1], got {}",
                e.key_jump_softening
            )));
        }

        let s = &self.similarity;
        let t = &s.key_tiers;
        let unit_values = [
            ("similarity.unknown_tempo", s.unknown_tempo),
            ("similarity.key_tiers.same", t.same),
            ("similarity.key_tiers.relative", t.relative),
            ("similarity.key_tiers.adjacent", t.adjacent),
            ("similarity.key_tiers.energy_boost", t.energy_boost),
            ("similarity.key_tiers.cross_mode_adjacent", t.cross_mode_adjacent),
            ("similarity.key_tiers.clash", t.clash),
            ("similarity.key_tiers.unparseable", t.unparseable),
            ("similarity.key_tiers.missing", t.missing),
        ];
        for (name, value) in unit_values {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!("{name} must be in [0, 1], got {value}")));
            }
        }
        for (name, value) in [
            ("similarity.embedding", s.embedding),
            ("similarity.tempo", s.tempo),
            ("similarity.key", s.key),
            ("similarity.energy", s.energy),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!("{name} must be >= 0, got {value}")));
            }
        }
        if s.total() <= 0.0 {
            return Err(ConfigError::Invalid("similarity weights sum to zero".to_string()));
        }
        if !(s.full_match_bpm >= 0.0 && s.zero_match_bpm > s.full_match_bpm && s.zero_match_bpm.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "similarity tempo ramp must satisfy 0 <= full_match_bpm < zero_match_bpm, got {}..{}",
                s.full_match_bpm, s.zero_match_bpm
            )));
        }
        if !(s.energy_zero_distance > 0.0 && s.energy_zero_distance.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "similarity.energy_zero_distance must be > 0, got {}",
                s.energy_zero_distance
            )));
        }
        Ok(())
    }
}

impl AppConfig {
    /// Load config from `~/.config/segue/config.toml`.
    /// Returns default config if file doesn't exist.
    /// Logs a warning if the file exists but can't be parsed or fails validation.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => match Self::load_from(&path) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    log::warn!("{e}. Using defaults.");
                    Self::default()
                }
            },
            _ => {
                log::debug!("No config file found, using defaults");
                Self::default()
            }
        }
    }

    /// Load and validate a specific config file. Errors are returned, not swallowed.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.scoring.validate()?;
        Ok(config)
    }

    fn from_toml(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str::<AppConfig>(contents)
    }

    /// Resolve worker count: 0 → auto-detect (cores / 2, min 1).
    pub fn resolve_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            let cores = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(2);
            (cores / 2).max(1)
        }
    }

    /// Get the config file path.
    fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", crate::APP_NAME)
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
