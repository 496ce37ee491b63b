//! Game log providers

use super::{CsvFeed, Database};
use crate::{RawGame, Result};

/// Supplies the chronological game log
pub trait GameSource {
    /// Return all known games; refresh from upstream first when `update` is set
    fn load_games(&mut self, update: bool) -> Result<Vec<RawGame>>;
}

/// Fixed in-memory log; refresh is a no-op
impl GameSource for Vec<RawGame> {
    fn load_games(&mut self, _update: bool) -> Result<Vec<RawGame>> {
        let mut games = self.clone();
        games.sort_by_key(|g| g.datetime);
        Ok(games)
    }
}

/// Games held in the SQLite store, optionally refreshed from a CSV feed
pub struct StoredGames {
    db: Database,
    feed: Option<CsvFeed>,
}

impl StoredGames {
    pub fn new(db: Database, feed: Option<CsvFeed>) -> Self {
        StoredGames { db, feed }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Pull the feed into the database, returning the number of rows written
    pub fn refresh(&mut self) -> Result<usize> {
        match &self.feed {
            Some(feed) => {
                let games = feed.fetch()?;
                let count = self.db.upsert_games(&games)?;
                log::info!("Stored {} games from {}", count, feed.location());
                Ok(count)
            }
            None => {
                log::warn!("No game feed configured; skipping refresh");
                Ok(0)
            }
        }
    }
}

impl GameSource for StoredGames {
    fn load_games(&mut self, update: bool) -> Result<Vec<RawGame>> {
        if update {
            self.refresh()?;
        }
        self.db.get_all_games()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn game(day: u32, home: &str, away: &str) -> RawGame {
        RawGame {
            datetime: NaiveDate::from_ymd_opt(2017, 10, day)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            team_home: home.to_string(),
            team_away: away.to_string(),
            qb_home: "A".to_string(),
            qb_away: "B".to_string(),
            score_home: 20,
            score_away: 10,
        }
    }

    #[test]
    fn test_vec_source_sorts() {
        let mut games = vec![game(8, "NE", "TB"), game(1, "NYJ", "JAX")];
        let loaded = games.load_games(true).unwrap();
        assert_eq!(loaded[0].team_home, "NYJ");
        assert_eq!(loaded[1].team_home, "NE");
    }

    #[test]
    fn test_stored_games_without_feed() {
        let db = Database::in_memory().unwrap();
        db.upsert_game(&game(1, "NE", "TB")).unwrap();

        let mut source = StoredGames::new(db, None);
        assert_eq!(source.refresh().unwrap(), 0);
        assert_eq!(source.load_games(true).unwrap().len(), 1);
    }
}
