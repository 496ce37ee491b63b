//! Temporal feature extraction
//!
//! Rest and quarterback-experience covariates computed with as-of lookups
//! against per-team and per-quarterback game-date indices. Every lookup only
//! sees games dated strictly before the game being featurized.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{entity_label, Covariates, GameRecord, RawGame};

/// A team is rested when its previous game is more than this many days back
pub const REST_DAYS: i64 = 10;

/// Historical abbreviations mapped onto the current franchise name
const TEAM_ALIASES: [(&str, &str); 3] = [
    // Jacksonville has appeared under both codes
    ("JAC", "JAX"),
    // relocations
    ("SD", "LAC"),
    ("STL", "LA"),
];

/// Current name for a team abbreviation
pub fn canonical_team(name: &str) -> &str {
    TEAM_ALIASES
        .iter()
        .find(|(old, _)| *old == name)
        .map_or(name, |(_, new)| new)
}

/// Date-ordered appearance index for teams and quarterbacks
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GameFeaturizer {
    /// Sorted game datetimes per team
    team_dates: HashMap<String, Vec<NaiveDateTime>>,
    /// Sorted game datetimes per quarterback
    qb_dates: HashMap<String, Vec<NaiveDateTime>>,
}

impl GameFeaturizer {
    /// Build the index from a raw log. Team names are canonicalized first.
    pub fn new(games: &[RawGame]) -> Self {
        // one event per side of every game
        let mut events: Vec<(NaiveDateTime, &str, &str)> = games
            .iter()
            .flat_map(|g| {
                [
                    (g.datetime, canonical_team(&g.team_home), g.qb_home.as_str()),
                    (g.datetime, canonical_team(&g.team_away), g.qb_away.as_str()),
                ]
            })
            .collect();
        events.sort_by_key(|(dt, _, _)| *dt);

        let mut featurizer = GameFeaturizer::default();
        for (datetime, team, qb) in events {
            featurizer
                .team_dates
                .entry(team.to_string())
                .or_default()
                .push(datetime);
            featurizer
                .qb_dates
                .entry(qb.to_string())
                .or_default()
                .push(datetime);
        }
        featurizer
    }

    /// Canonicalize, sort and augment a raw log into model input, using the
    /// date indices built by [`GameFeaturizer::new`]
    pub fn featurize(&self, games: &[RawGame]) -> Vec<GameRecord> {
        let mut sorted: Vec<&RawGame> = games.iter().collect();
        sorted.sort_by_key(|g| g.datetime);

        sorted
            .into_iter()
            .map(|g| {
                let team_home = canonical_team(&g.team_home).to_string();
                let team_away = canonical_team(&g.team_away).to_string();
                let cov = self.covariates_at(
                    g.datetime,
                    &team_home,
                    &team_away,
                    &g.qb_home,
                    &g.qb_away,
                );
                GameRecord {
                    datetime: g.datetime,
                    home: entity_label(&team_home, &g.qb_home),
                    away: entity_label(&team_away, &g.qb_away),
                    team_home,
                    team_away,
                    qb_home: g.qb_home.clone(),
                    qb_away: g.qb_away.clone(),
                    score_home: g.score_home,
                    score_away: g.score_away,
                    rested_home: cov.rested_home,
                    rested_away: cov.rested_away,
                    exp_home: cov.exp_home,
                    exp_away: cov.exp_away,
                }
            })
            .collect()
    }

    /// Covariates for a (possibly prospective) game at `datetime`
    pub fn covariates_at(
        &self,
        datetime: NaiveDateTime,
        team_home: &str,
        team_away: &str,
        qb_home: &str,
        qb_away: &str,
    ) -> Covariates {
        Covariates {
            rested_home: self.rested(canonical_team(team_home), datetime),
            rested_away: self.rested(canonical_team(team_away), datetime),
            exp_home: self.experience(qb_home, datetime),
            exp_away: self.experience(qb_away, datetime),
        }
    }

    /// Most recent game for `team` strictly before `datetime`
    pub fn previous_game(&self, team: &str, datetime: NaiveDateTime) -> Option<NaiveDateTime> {
        let dates = self.team_dates.get(team)?;
        let idx = dates.partition_point(|d| *d < datetime);
        idx.checked_sub(1).map(|i| dates[i])
    }

    /// True if the team's previous game was more than [`REST_DAYS`] ago.
    /// Teams with no previous game are not rested.
    pub fn rested(&self, team: &str, datetime: NaiveDateTime) -> bool {
        self.previous_game(team, datetime)
            .is_some_and(|prev| datetime - prev > Duration::days(REST_DAYS))
    }

    /// Games the quarterback appeared in strictly before `datetime`
    pub fn experience(&self, qb: &str, datetime: NaiveDateTime) -> u32 {
        self.qb_dates
            .get(qb)
            .map_or(0, |dates| dates.partition_point(|d| *d < datetime) as u32)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn at(month: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2016, month, day)
            .unwrap()
            .and_hms_opt(13, 0, 0)
            .unwrap()
    }

    fn make_game(dt: NaiveDateTime, home: (&str, &str), away: (&str, &str)) -> RawGame {
        RawGame {
            datetime: dt,
            team_home: home.0.to_string(),
            team_away: away.0.to_string(),
            qb_home: home.1.to_string(),
            qb_away: away.1.to_string(),
            score_home: 24,
            score_away: 20,
        }
    }

    #[test]
    fn test_canonical_team() {
        assert_eq!(canonical_team("JAC"), "JAX");
        assert_eq!(canonical_team("SD"), "LAC");
        assert_eq!(canonical_team("STL"), "LA");
        assert_eq!(canonical_team("NE"), "NE");
    }

    #[test]
    fn test_aliases_share_history() {
        let games = vec![
            make_game(at(9, 11), ("SD", "Rivers"), ("KC", "Smith")),
            make_game(at(9, 25), ("LAC", "Rivers"), ("NO", "Brees")),
        ];
        let records = GameFeaturizer::new(&games).featurize(&games);
        assert_eq!(records[0].team_home, "LAC");
        assert_eq!(records[0].home, "LAC-Rivers");
        // 14 days since the game played under the old name
        assert!(records[1].rested_home);
    }

    #[test]
    fn test_rest_boundary() {
        let games = vec![
            make_game(at(9, 1), ("NE", "Brady"), ("MIA", "Tannehill")),
            make_game(at(9, 1), ("BUF", "Taylor"), ("NYJ", "Fitzpatrick")),
            // NE: exactly 10 days, BUF: 11 days
            make_game(at(9, 11), ("NE", "Brady"), ("ARI", "Palmer")),
            make_game(at(9, 12), ("BUF", "Taylor"), ("BAL", "Flacco")),
        ];
        let records = GameFeaturizer::new(&games).featurize(&games);

        let ne = records.iter().find(|r| r.datetime == at(9, 11)).unwrap();
        assert!(!ne.rested_home);
        // first appearance
        assert!(!ne.rested_away);

        let buf = records.iter().find(|r| r.datetime == at(9, 12)).unwrap();
        assert!(buf.rested_home);
    }

    #[test]
    fn test_no_history_is_not_rested() {
        let featurizer = GameFeaturizer::new(&[]);
        assert!(!featurizer.rested("NE", at(9, 11)));
        assert_eq!(featurizer.experience("Brady", at(9, 11)), 0);
    }

    #[test]
    fn test_qb_experience() {
        let games = vec![
            make_game(at(9, 11), ("NE", "Garoppolo"), ("ARI", "Palmer")),
            // second appearance months later, now on the road
            make_game(at(12, 24), ("NYJ", "Petty"), ("NE", "Garoppolo")),
            make_game(at(12, 31), ("ARI", "Palmer"), ("LA", "Goff")),
        ];
        let records = GameFeaturizer::new(&games).featurize(&games);

        assert_eq!(records[0].exp_home, 0);
        assert_eq!(records[0].exp_away, 0);
        assert_eq!(records[1].exp_away, 1);
        assert_eq!(records[1].exp_home, 0);
        assert_eq!(records[2].exp_home, 1);
        assert_eq!(records[2].exp_away, 0);
    }

    #[test]
    fn test_lookups_ignore_same_day_and_later_games() {
        let games = vec![
            make_game(at(9, 11), ("NE", "Brady"), ("ARI", "Palmer")),
            make_game(at(10, 2), ("NE", "Brady"), ("BUF", "Taylor")),
        ];
        let featurizer = GameFeaturizer::new(&games);

        assert_eq!(featurizer.previous_game("NE", at(9, 11)), None);
        assert_eq!(featurizer.previous_game("NE", at(10, 2)), Some(at(9, 11)));
        assert_eq!(featurizer.experience("Brady", at(9, 11)), 0);
        assert_eq!(featurizer.experience("Brady", at(10, 3)), 2);
    }

    #[test]
    fn test_featurize_reuses_lookups() {
        let games = vec![
            make_game(at(9, 11), ("NE", "Brady"), ("ARI", "Palmer")),
            make_game(at(9, 25), ("NE", "Brady"), ("SD", "Rivers")),
            make_game(at(10, 2), ("LAC", "Rivers"), ("NE", "Garoppolo")),
        ];
        let featurizer = GameFeaturizer::new(&games);
        let records = featurizer.featurize(&games);

        for r in &records {
            let cov = featurizer.covariates_at(
                r.datetime,
                &r.team_home,
                &r.team_away,
                &r.qb_home,
                &r.qb_away,
            );
            assert_eq!(r.covariates(), cov);
        }
        assert_eq!(records[1].exp_home, 1);
        assert!(records[1].rested_home);
    }

    #[test]
    fn test_featurize_sorts_input() {
        let games = vec![
            make_game(at(10, 2), ("NE", "Brady"), ("BUF", "Taylor")),
            make_game(at(9, 11), ("NE", "Brady"), ("ARI", "Palmer")),
        ];
        let records = GameFeaturizer::new(&games).featurize(&games);
        assert_eq!(records[0].team_away, "ARI");
        assert_eq!(records[1].exp_home, 1);
        assert!(records[1].rested_home);
    }
}
