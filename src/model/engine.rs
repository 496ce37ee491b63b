//! Margin-dependent Elo rating engine
//!
//! Every line of the grid is an independent binary Elo market: "did the
//! outcome exceed this line?". Ratings are log-odds deviations from a
//! league-wide prior and are stored as append-only timelines, one per
//! entity. Each game reads the latest entries dated strictly before it,
//! predicts, observes, and appends one new entry per participating entity.
//!
//! The league prior is itself a timeline. It starts flat and takes the
//! same per-line update as the home side after every game, so it only
//! ever reflects games already played.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::distribution::{LineDistribution, Statistic};
use super::lines::LineGrid;
use super::timeline::RatingTimeline;
use crate::features::BiasModel;
use crate::{Comparator, GameRecord};

/// Regression is applied when a rating is idle longer than this many months
pub const REGRESS_AFTER_MONTHS: f64 = 3.0;

/// Mean Gregorian month in days
const DAYS_PER_MONTH: f64 = 30.436875;

pub fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn months_between(from: NaiveDateTime, to: NaiveDateTime) -> f64 {
    (to - from).num_seconds() as f64 / (86_400.0 * DAYS_PER_MONTH)
}

/// Rating engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Learning rate applied to `result - probability`
    pub kfactor: f64,
    /// Fraction of a rating removed after a long idle stretch
    pub regress_coeff: f64,
    /// Weight of the quarterback rating when blending with the team rating
    pub weight_qb: f64,
    pub comparator: Comparator,
    pub grid: LineGrid,
}

/// Entity labels for one side of a game
#[derive(Debug, Clone, Copy)]
pub struct Side<'a> {
    /// Team-level entity
    pub team: &'a str,
    /// Team-quarterback composite entity
    pub qb: &'a str,
}

impl<'a> Side<'a> {
    pub fn home(game: &'a GameRecord) -> Self {
        Side {
            team: &game.team_home,
            qb: &game.home,
        }
    }

    pub fn away(game: &'a GameRecord) -> Self {
        Side {
            team: &game.team_away,
            qb: &game.away,
        }
    }
}

/// Regressed ratings of one side, as read before a game
#[derive(Debug, Clone)]
struct SideRatings {
    team: Vec<f64>,
    qb: Vec<f64>,
}

/// Prediction made for a processed game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub datetime: NaiveDateTime,
    /// Realised outcome value
    pub value: f64,
    /// Median of the predicted distribution
    pub estimate: f64,
}

impl Observation {
    pub fn residual(&self) -> f64 {
        self.value - self.estimate
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingEngine {
    config: EngineConfig,
    /// League log-odds of exceeding each line, as of each processed game
    league: RatingTimeline,
    ratings: HashMap<String, RatingTimeline>,
    observations: Vec<Observation>,
}

impl RatingEngine {
    pub fn new(config: EngineConfig) -> Self {
        RatingEngine {
            config,
            league: RatingTimeline::new(),
            ratings: HashMap::new(),
            observations: Vec::new(),
        }
    }

    /// Fraction of a rating regressed toward neutral after `months` idle
    pub fn regress_fraction(&self, months: f64) -> f64 {
        if months > REGRESS_AFTER_MONTHS {
            self.config.regress_coeff
        } else {
            0.0
        }
    }

    /// Blend team and quarterback ratings
    pub fn combine(&self, team_rating: f64, qb_rating: f64) -> f64 {
        (1.0 - self.config.weight_qb) * team_rating + self.config.weight_qb * qb_rating
    }

    /// Process games in chronological order, appending to the rating history
    pub fn train(&mut self, games: &[GameRecord], bias: &BiasModel) {
        let mut order: Vec<&GameRecord> = games.iter().collect();
        order.sort_by_key(|g| g.datetime);

        for game in order {
            self.process(game, bias.bias(&game.covariates()));
        }

        log::debug!(
            "Trained on {} games, {} rated entities",
            self.observations.len(),
            self.ratings.len()
        );
    }

    fn process(&mut self, game: &GameRecord, bias: f64) {
        let time = game.datetime;
        let mut home = self.side_ratings(Side::home(game), time);
        let mut away = self.side_ratings(Side::away(game), time);

        let prior = self.prior_before(time);
        let dist = self.distribution(&prior, &self.blend(&home), &self.blend(&away), bias);

        let value = game.outcome(self.config.comparator);
        let delta: Vec<f64> = self
            .config
            .grid
            .outcomes(value)
            .zip(dist.survival())
            .map(|(result, p)| self.config.kfactor * (result - p))
            .collect();

        for (i, d) in delta.iter().enumerate() {
            home.team[i] += d;
            home.qb[i] += d;
            match self.config.comparator {
                Comparator::Difference => {
                    let m = self.config.grid.mirror(i);
                    away.team[m] -= d;
                    away.qb[m] -= d;
                }
                Comparator::Sum => {
                    away.team[i] += d;
                    away.qb[i] += d;
                }
            }
        }

        self.observations.push(Observation {
            datetime: time,
            value,
            estimate: dist.median(),
        });

        let league = self.prior_at(time).iter().zip(&delta).map(|(p, d)| p + d).collect();
        self.league.push(time, league);

        self.append(&game.team_home, time, home.team);
        self.append(&game.home, time, home.qb);
        self.append(&game.team_away, time, away.team);
        self.append(&game.away, time, away.qb);
    }

    fn append(&mut self, label: &str, time: NaiveDateTime, ratings: Vec<f64>) {
        self.ratings
            .entry(label.to_string())
            .or_default()
            .push(time, ratings);
    }

    /// Latest rating strictly before `time`, regressed for idle time.
    /// Unseen entities are neutral.
    pub fn rating_before(&self, label: &str, time: NaiveDateTime) -> Vec<f64> {
        match self.ratings.get(label).and_then(|t| t.before(time)) {
            Some((last, ratings)) => self.regressed(ratings, last, time),
            None => vec![0.0; self.config.grid.len()],
        }
    }

    /// League prior from games strictly before `time`, flat before the first game
    fn prior_before(&self, time: NaiveDateTime) -> Vec<f64> {
        match self.league.before(time) {
            Some((_, prior)) => prior.to_vec(),
            None => vec![0.0; self.config.grid.len()],
        }
    }

    /// League prior including games at `time`
    fn prior_at(&self, time: NaiveDateTime) -> Vec<f64> {
        match self.league.at_or_before(time) {
            Some((_, prior)) => prior.to_vec(),
            None => vec![0.0; self.config.grid.len()],
        }
    }

    fn regressed(&self, ratings: &[f64], last: NaiveDateTime, time: NaiveDateTime) -> Vec<f64> {
        let keep = 1.0 - self.regress_fraction(months_between(last, time));
        ratings.iter().map(|r| r * keep).collect()
    }

    fn side_ratings(&self, side: Side<'_>, time: NaiveDateTime) -> SideRatings {
        SideRatings {
            team: self.rating_before(side.team, time),
            qb: self.rating_before(side.qb, time),
        }
    }

    fn blend(&self, side: &SideRatings) -> Vec<f64> {
        side.team
            .iter()
            .zip(&side.qb)
            .map(|(&t, &q)| self.combine(t, q))
            .collect()
    }

    /// Outcome distribution for combined home/away ratings plus bias
    fn distribution(
        &self,
        prior: &[f64],
        home: &[f64],
        away: &[f64],
        bias: f64,
    ) -> LineDistribution {
        let grid = &self.config.grid;
        let survival = (0..grid.len())
            .map(|i| {
                let away_term = match self.config.comparator {
                    Comparator::Difference => -away[grid.mirror(i)],
                    Comparator::Sum => away[i],
                };
                logistic(prior[i] + home[i] + away_term + bias)
            })
            .collect();
        LineDistribution::new(grid.lines().to_vec(), survival)
    }

    /// Predict a game at `time` using only ratings from before it
    pub fn predict(
        &self,
        time: NaiveDateTime,
        home: Side<'_>,
        away: Side<'_>,
        bias: f64,
    ) -> LineDistribution {
        let home = self.blend(&self.side_ratings(home, time));
        let away = self.blend(&self.side_ratings(away, time));
        self.distribution(&self.prior_before(time), &home, &away, bias)
    }

    /// Signed `observed - predicted median` per processed game, in order
    pub fn residuals(&self) -> impl Iterator<Item = f64> + '_ {
        self.observations.iter().map(Observation::residual)
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn timeline(&self, label: &str) -> Option<&RatingTimeline> {
        self.ratings.get(label)
    }

    /// Rank entities by a statistic of their outcome distribution against
    /// a neutral opponent at `time`. Entities without history up to `time`
    /// are left out. Sorted best first.
    pub fn rank<'a, I>(
        &self,
        time: NaiveDateTime,
        labels: I,
        statistic: Statistic,
    ) -> Vec<(String, f64)>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let neutral = vec![0.0; self.config.grid.len()];
        let prior = self.prior_at(time);
        let mut ranked: Vec<(String, f64)> = labels
            .into_iter()
            .filter_map(|label| {
                let (last, ratings) = self.ratings.get(label)?.at_or_before(time)?;
                let ratings = self.regressed(ratings, last, time);
                let dist = self.distribution(&prior, &ratings, &neutral, 0.0);
                Some((label.to_string(), dist.statistic(statistic)))
            })
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }
}
