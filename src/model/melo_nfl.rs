//! Trained NFL spread/total model

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::distribution::{LineDistribution, Statistic};
use super::engine::{EngineConfig, RatingEngine, Side};
use super::lines::LineGrid;
use crate::features::{canonical_team, BiasModel, GameFeaturizer};
use crate::training::metrics;
use crate::{entity_label, GameRecord, MeloError, Mode, RawGame, Result};

/// Free parameters of the model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hyperparams {
    pub kfactor: f64,
    pub regress_coeff: f64,
    pub rest_bonus: f64,
    pub exp_bonus: f64,
    pub weight_qb: f64,
}

impl Hyperparams {
    pub const NAMES: [&'static str; 5] = [
        "kfactor",
        "regress_coeff",
        "rest_bonus",
        "exp_bonus",
        "weight_qb",
    ];

    pub fn to_array(&self) -> [f64; 5] {
        [
            self.kfactor,
            self.regress_coeff,
            self.rest_bonus,
            self.exp_bonus,
            self.weight_qb,
        ]
    }

    pub fn from_array(values: [f64; 5]) -> Self {
        Hyperparams {
            kfactor: values[0],
            regress_coeff: values[1],
            rest_bonus: values[2],
            exp_bonus: values[3],
            weight_qb: values[4],
        }
    }
}

/// Margin-dependent Elo model trained on the full game log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeloNfl {
    mode: Mode,
    params: Hyperparams,
    bias: BiasModel,
    featurizer: GameFeaturizer,
    games: Vec<GameRecord>,
    teams: BTreeSet<String>,
    engine: RatingEngine,
    /// Root-mean-square residual after burn-in
    pub rms_error: Option<f64>,
}

impl MeloNfl {
    /// Train a model for the named mode. Unknown modes fail before the game
    /// log is touched.
    pub fn new(mode: &str, params: Hyperparams, raw_games: &[RawGame]) -> Result<Self> {
        let mode: Mode = mode.parse()?;
        Self::train(mode, params, raw_games)
    }

    pub fn train(mode: Mode, params: Hyperparams, raw_games: &[RawGame]) -> Result<Self> {
        if raw_games.is_empty() {
            return Err(MeloError::NoGames);
        }

        let featurizer = GameFeaturizer::new(raw_games);
        let games = featurizer.featurize(raw_games);

        let teams = games
            .iter()
            .flat_map(|g| [g.team_home.clone(), g.team_away.clone()])
            .collect();

        let (engine, bias) = fit_engine(mode, &params, &games);
        let rms_error = metrics::rms_error(engine.residuals());

        Ok(MeloNfl {
            mode,
            params,
            bias,
            featurizer,
            games,
            teams,
            engine,
            rms_error,
        })
    }

    /// RMS error of a fresh engine over an already featurized log. Nothing
    /// is shared between calls.
    pub fn evaluate(mode: Mode, params: &Hyperparams, games: &[GameRecord]) -> Option<f64> {
        let (engine, _) = fit_engine(mode, params, games);
        metrics::rms_error(engine.residuals())
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn params(&self) -> &Hyperparams {
        &self.params
    }

    pub fn games(&self) -> &[GameRecord] {
        &self.games
    }

    pub fn teams(&self) -> impl Iterator<Item = &str> {
        self.teams.iter().map(String::as_str)
    }

    /// Observed minus predicted median, one value per game in training order
    pub fn residuals(&self) -> impl Iterator<Item = f64> + '_ {
        self.engine.residuals()
    }

    /// Date of the latest game in the log
    pub fn last_game(&self) -> Option<NaiveDateTime> {
        self.games.last().map(|g| g.datetime)
    }

    /// Team rankings at `time`; quarterback composites are not ranked
    pub fn rank(&self, time: NaiveDateTime, statistic: Statistic) -> Vec<(String, f64)> {
        self.engine.rank(time, self.teams(), statistic)
    }

    /// Outcome distribution for a game at `time`, with rest and experience
    /// taken from the games before it
    pub fn predict(
        &self,
        time: NaiveDateTime,
        home_team: &str,
        home_qb: &str,
        away_team: &str,
        away_qb: &str,
    ) -> LineDistribution {
        let home_team = canonical_team(home_team);
        let away_team = canonical_team(away_team);
        let cov = self
            .featurizer
            .covariates_at(time, home_team, away_team, home_qb, away_qb);

        let home_label = entity_label(home_team, home_qb);
        let away_label = entity_label(away_team, away_qb);
        self.engine.predict(
            time,
            Side {
                team: home_team,
                qb: &home_label,
            },
            Side {
                team: away_team,
                qb: &away_label,
            },
            self.bias.bias(&cov),
        )
    }

    /// True if the team appears in the training log
    pub fn knows_team(&self, team: &str) -> bool {
        self.teams.contains(canonical_team(team))
    }
}

fn fit_engine(mode: Mode, params: &Hyperparams, games: &[GameRecord]) -> (RatingEngine, BiasModel) {
    let comparator = mode.comparator();
    let bias = BiasModel::new(comparator, params.rest_bonus, params.exp_bonus);
    let mut engine = RatingEngine::new(EngineConfig {
        kfactor: params.kfactor,
        regress_coeff: params.regress_coeff,
        weight_qb: params.weight_qb,
        comparator,
        grid: LineGrid::for_mode(mode),
    });
    engine.train(games, &bias);
    (engine, bias)
}
