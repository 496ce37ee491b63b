//! Queries against a calibrated model

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::features::canonical_team;
use crate::model::{LineDistribution, Statistic};
use crate::{MeloError, MeloNfl, Mode, Result};

/// One side of a prospective game
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Matchup {
    pub team: String,
    pub qb: String,
}

impl Matchup {
    pub fn new(team: &str, qb: &str) -> Self {
        Matchup {
            team: canonical_team(team).to_string(),
            qb: qb.to_string(),
        }
    }
}

/// Summary of a predicted outcome distribution
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub mode: Mode,
    pub datetime: NaiveDateTime,
    pub home: Matchup,
    pub away: Matchup,
    pub median: f64,
    pub mean: f64,
    /// Line the probability is quoted against
    pub line: f64,
    /// Probability the outcome exceeds `line`
    pub probability: f64,
    /// 10th and 90th percentiles
    pub interval: (f64, f64),
}

impl Prediction {
    fn from_distribution(
        mode: Mode,
        datetime: NaiveDateTime,
        home: Matchup,
        away: Matchup,
        line: f64,
        dist: &LineDistribution,
    ) -> Self {
        Prediction {
            mode,
            datetime,
            home,
            away,
            median: dist.median(),
            mean: dist.mean(),
            line,
            probability: dist.probability(line),
            interval: (dist.quantile(0.1), dist.quantile(0.9)),
        }
    }
}

/// A ranked team
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ranking {
    pub rank: usize,
    pub team: String,
    pub value: f64,
}

/// Predictor for prospective games
pub struct Predictor {
    model: MeloNfl,
}

impl Predictor {
    pub fn new(model: MeloNfl) -> Self {
        Predictor { model }
    }

    pub fn model(&self) -> &MeloNfl {
        &self.model
    }

    /// Predict a game at `datetime`. Teams must appear in the training log;
    /// unseen quarterbacks start from a neutral rating.
    pub fn predict(
        &self,
        datetime: NaiveDateTime,
        home: Matchup,
        away: Matchup,
        line: f64,
    ) -> Result<Prediction> {
        for side in [&home, &away] {
            if !self.model.knows_team(&side.team) {
                return Err(MeloError::UnknownEntity(side.team.clone()));
            }
        }

        let dist = self
            .model
            .predict(datetime, &home.team, &home.qb, &away.team, &away.qb);
        Ok(Prediction::from_distribution(
            self.model.mode(),
            datetime,
            home,
            away,
            line,
            &dist,
        ))
    }

    /// Team rankings at `datetime`, best first
    pub fn rank(&self, datetime: NaiveDateTime, statistic: Statistic) -> Vec<Ranking> {
        self.model
            .rank(datetime, statistic)
            .into_iter()
            .enumerate()
            .map(|(i, (team, value))| Ranking {
                rank: i + 1,
                team,
                value,
            })
            .collect()
    }
}

/// Format a prediction for display
pub fn format_prediction(pred: &Prediction) -> String {
    let (quantity, over) = match pred.mode {
        Mode::Spread => ("Spread", format!("{} covers", pred.home.team)),
        Mode::Total => ("Total", "Over".to_string()),
    };

    format!(
        r#"
┌─────────────────────────────────────────────────┐
│  {} ({}) vs {} ({})
│  {}
├─────────────────────────────────────────────────┤
│  {} median:   {:+.1}
│  {} mean:     {:+.1}
│  80% interval:    {:+.1} to {:+.1}
│  {} {:+.1}:  {:.1}%
└─────────────────────────────────────────────────┘
"#,
        pred.home.team,
        pred.home.qb,
        pred.away.team,
        pred.away.qb,
        pred.datetime.format("%Y-%m-%d %H:%M"),
        quantity,
        pred.median,
        quantity,
        pred.mean,
        pred.interval.0,
        pred.interval.1,
        over,
        pred.line,
        pred.probability * 100.0
    )
}
