//! NFL point-spread and point-total prediction
//!
//! Rates (team, starting quarterback) pairs with a margin-dependent Elo model
//! and calibrates its hyperparameters against historical results.

pub mod data;
pub mod features;
pub mod model;
pub mod predict;
pub mod training;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use model::MeloNfl;

/// Quantity being predicted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Home score minus away score
    Spread,
    /// Home score plus away score
    Total,
}

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::Spread, Mode::Total];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Spread => "spread",
            Mode::Total => "total",
        }
    }

    /// How the two sides of a game are combined into the outcome variable
    pub fn comparator(&self) -> Comparator {
        match self {
            Mode::Spread => Comparator::Difference,
            Mode::Total => Comparator::Sum,
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = MeloError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "spread" => Ok(Mode::Spread),
            "total" => Ok(Mode::Total),
            other => Err(MeloError::UnknownMode(other.to_string())),
        }
    }
}

/// Binary operator applied to (home, away) quantities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    /// `home - away`, order-sensitive
    Difference,
    /// `home + away`, order-insensitive
    Sum,
}

impl Comparator {
    pub fn apply(&self, home: f64, away: f64) -> f64 {
        match self {
            Comparator::Difference => home - away,
            Comparator::Sum => home + away,
        }
    }

    /// True if swapping the operands leaves the result unchanged
    pub fn commutes(&self) -> bool {
        matches!(self, Comparator::Sum)
    }
}

/// A game as it arrives from the data source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawGame {
    pub datetime: NaiveDateTime,
    pub team_home: String,
    pub team_away: String,
    pub qb_home: String,
    pub qb_away: String,
    pub score_home: u16,
    pub score_away: u16,
}

/// A game augmented with entity labels and rest/experience covariates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRecord {
    pub datetime: NaiveDateTime,
    /// Home team joined to home quarterback
    pub home: String,
    /// Away team joined to away quarterback
    pub away: String,
    pub team_home: String,
    pub team_away: String,
    pub qb_home: String,
    pub qb_away: String,
    pub score_home: u16,
    pub score_away: u16,
    /// Home team coming off more than ten days of rest
    pub rested_home: bool,
    pub rested_away: bool,
    /// Prior games started by the home quarterback
    pub exp_home: u32,
    pub exp_away: u32,
}

impl GameRecord {
    /// Realised value of the outcome variable for this game
    pub fn outcome(&self, comparator: Comparator) -> f64 {
        comparator.apply(f64::from(self.score_home), f64::from(self.score_away))
    }

    pub fn covariates(&self) -> Covariates {
        Covariates {
            rested_home: self.rested_home,
            rested_away: self.rested_away,
            exp_home: self.exp_home,
            exp_away: self.exp_away,
        }
    }
}

/// Circumstantial inputs to the bias correction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Covariates {
    pub rested_home: bool,
    pub rested_away: bool,
    pub exp_home: u32,
    pub exp_away: u32,
}

impl Covariates {
    /// Same covariates with the home and away sides exchanged
    pub fn swapped(&self) -> Self {
        Covariates {
            rested_home: self.rested_away,
            rested_away: self.rested_home,
            exp_home: self.exp_away,
            exp_away: self.exp_home,
        }
    }
}

/// Join a team and quarterback into the composite entity label
pub fn entity_label(team: &str, qb: &str) -> String {
    format!("{}-{}", team, qb)
}

/// Application-wide errors
#[derive(Debug, Error)]
pub enum MeloError {
    #[error("Unknown mode {0:?}; valid options are 'spread' and 'total'")]
    UnknownMode(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Corrupt cache artifact for {key}: {message}")]
    CorruptCache { key: String, message: String },

    #[error("No games available - run `melo data sync` or `melo data import` first")]
    NoGames,

    #[error("Unknown entity: {0}")]
    UnknownEntity(String),
}

pub type Result<T> = std::result::Result<T, MeloError>;

/// Application configuration loaded from config.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data: DataConfig,
    pub calibration: CalibrationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub database_path: String,
    pub cache_dir: String,
    /// CSV game log fetched on refresh; refresh is skipped when unset
    #[serde(default)]
    pub source_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Total number of objective evaluations
    pub steps: usize,
    /// Trials drawn uniformly before the Parzen model takes over
    pub startup_trials: usize,
    /// Fraction of trials treated as "good" when splitting the history
    pub gamma: f64,
    /// Candidates sampled per proposal
    pub candidates: usize,
    /// Trials evaluated concurrently per proposal round
    pub batch_size: usize,
    pub seed: u64,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        CalibrationConfig {
            steps: 100,
            startup_trials: 20,
            gamma: 0.25,
            candidates: 24,
            batch_size: 1,
            seed: 42,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            data: DataConfig {
                database_path: "data/nfl.db".to_string(),
                cache_dir: "cache".to_string(),
                source_url: None,
            },
            calibration: CalibrationConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MeloError::Config(format!("Failed to read config file {}: {}", path, e))
        })?;
        toml::from_str(&content)
            .map_err(|e| MeloError::Config(format!("Failed to parse config: {}", e)))
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| MeloError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
