//! SQLite storage for the raw game log

use crate::{RawGame, Result};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

pub(crate) const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const UPSERT_GAME: &str = r#"
    INSERT INTO games (datetime, team_home, team_away, qb_home, qb_away,
                       score_home, score_away)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
    ON CONFLICT(datetime, team_home, team_away) DO UPDATE SET
        qb_home = excluded.qb_home,
        qb_away = excluded.qb_away,
        score_home = excluded.score_home,
        score_away = excluded.score_away
"#;

/// Database connection and operations
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS games (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                datetime TEXT NOT NULL,
                team_home TEXT NOT NULL,
                team_away TEXT NOT NULL,
                qb_home TEXT NOT NULL,
                qb_away TEXT NOT NULL,
                score_home INTEGER NOT NULL,
                score_away INTEGER NOT NULL,
                UNIQUE(datetime, team_home, team_away)
            );

            CREATE INDEX IF NOT EXISTS idx_games_datetime ON games(datetime);
            "#,
        )?;
        Ok(())
    }

    /// Insert or update a game
    pub fn upsert_game(&self, game: &RawGame) -> Result<()> {
        self.conn.execute(
            UPSERT_GAME,
            params![
                game.datetime.format(DATETIME_FORMAT).to_string(),
                game.team_home,
                game.team_away,
                game.qb_home,
                game.qb_away,
                game.score_home,
                game.score_away,
            ],
        )?;
        Ok(())
    }

    /// Insert multiple games in one transaction
    pub fn upsert_games(&mut self, games: &[RawGame]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(UPSERT_GAME)?;
            for game in games {
                stmt.execute(params![
                    game.datetime.format(DATETIME_FORMAT).to_string(),
                    game.team_home,
                    game.team_away,
                    game.qb_home,
                    game.qb_away,
                    game.score_home,
                    game.score_away,
                ])?;
            }
        }
        tx.commit()?;
        Ok(games.len())
    }

    /// Get all games in chronological order
    pub fn get_all_games(&self) -> Result<Vec<RawGame>> {
        let mut stmt = self.conn.prepare(
            "SELECT datetime, team_home, team_away, qb_home, qb_away, score_home, score_away
             FROM games
             ORDER BY datetime, id",
        )?;

        let games = stmt
            .query_map([], Self::row_to_game)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(games)
    }

    fn row_to_game(row: &rusqlite::Row) -> rusqlite::Result<RawGame> {
        let datetime_str: String = row.get(0)?;
        let datetime =
            NaiveDateTime::parse_from_str(&datetime_str, DATETIME_FORMAT).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    0,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;

        Ok(RawGame {
            datetime,
            team_home: row.get(1)?,
            team_away: row.get(2)?,
            qb_home: row.get(3)?,
            qb_away: row.get(4)?,
            score_home: row.get(5)?,
            score_away: row.get(6)?,
        })
    }

    /// Get database statistics
    pub fn get_stats(&self) -> Result<DatabaseStats> {
        let game_count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM games", [], |row| row.get(0))?;

        let team_count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM (SELECT team_home FROM games UNION SELECT team_away FROM games)",
            [],
            |row| row.get(0),
        )?;

        let qb_count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM (SELECT qb_home FROM games UNION SELECT qb_away FROM games)",
            [],
            |row| row.get(0),
        )?;

        let min_date: Option<String> = self
            .conn
            .query_row("SELECT MIN(datetime) FROM games", [], |row| row.get(0))
            .optional()?
            .flatten();

        let max_date: Option<String> = self
            .conn
            .query_row("SELECT MAX(datetime) FROM games", [], |row| row.get(0))
            .optional()?
            .flatten();

        Ok(DatabaseStats {
            game_count: game_count as usize,
            team_count: team_count as usize,
            qb_count: qb_count as usize,
            earliest_game: min_date
                .and_then(|s| NaiveDateTime::parse_from_str(&s, DATETIME_FORMAT).ok()),
            latest_game: max_date
                .and_then(|s| NaiveDateTime::parse_from_str(&s, DATETIME_FORMAT).ok()),
        })
    }
}

/// Database statistics
#[derive(Debug, Clone)]
pub struct DatabaseStats {
    pub game_count: usize,
    pub team_count: usize,
    pub qb_count: usize,
    pub earliest_game: Option<NaiveDateTime>,
    pub latest_game: Option<NaiveDateTime>,
}
