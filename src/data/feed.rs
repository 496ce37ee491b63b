//! CSV game feed
//!
//! Reads a game log from an HTTP endpoint or a local file. One row per game
//! with columns `datetime, team_home, team_away, qb_home, qb_away,
//! score_home, score_away`.

use crate::{MeloError, RawGame, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct FeedRow {
    datetime: String,
    team_home: String,
    team_away: String,
    qb_home: String,
    qb_away: String,
    score_home: u16,
    score_away: u16,
}

/// Fetches game logs in CSV form
pub struct CsvFeed {
    client: reqwest::blocking::Client,
    location: String,
}

impl CsvFeed {
    /// Feed reading from a URL or filesystem path
    pub fn new(location: impl Into<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent("nfl-melo/0.1")
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(CsvFeed {
            client,
            location: location.into(),
        })
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    /// Fetch and parse the whole log
    pub fn fetch(&self) -> Result<Vec<RawGame>> {
        let text = if self.location.starts_with("http://") || self.location.starts_with("https://")
        {
            log::info!("Fetching game log from {}", self.location);
            self.client
                .get(&self.location)
                .send()?
                .error_for_status()?
                .text()?
        } else {
            log::info!("Reading game log from {}", self.location);
            std::fs::read_to_string(&self.location)?
        };

        let games = parse_csv(&text)?;
        log::info!("Parsed {} games", games.len());
        Ok(games)
    }
}

/// Parse a CSV game log
pub fn parse_csv(text: &str) -> Result<Vec<RawGame>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut games = Vec::new();
    for row in reader.deserialize::<FeedRow>() {
        let row = row?;
        games.push(RawGame {
            datetime: parse_datetime(&row.datetime)?,
            team_home: row.team_home,
            team_away: row.team_away,
            qb_home: row.qb_home,
            qb_away: row.qb_away,
            score_home: row.score_home,
            score_away: row.score_away,
        });
    }
    Ok(games)
}

/// Accepts full timestamps or bare dates (midnight)
pub fn parse_datetime(s: &str) -> Result<NaiveDateTime> {
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| MeloError::Parse(format!("Invalid datetime: {}", s)))
}
