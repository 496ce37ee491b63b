//! NFL spread and total prediction CLI
//!
//! Margin-dependent Elo ratings for team and quarterback pairs, calibrated
//! against the historical game log.

use clap::{Parser, Subcommand};
use melo::{Config, Result};

#[derive(Parser)]
#[command(name = "melo")]
#[command(about = "NFL point spread and total predictions using margin-dependent Elo", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Data management commands
    Data {
        #[command(subcommand)]
        action: DataCommands,
    },
    /// Calibrate model hyperparameters and cache the result
    Calibrate {
        /// spread or total
        #[arg(long, default_value = "spread")]
        mode: String,
        /// Override number of search steps
        #[arg(long)]
        steps: Option<usize>,
        /// Recalibrate even if a cached model exists
        #[arg(long)]
        force: bool,
        /// Skip refreshing the game log before calibrating
        #[arg(long)]
        offline: bool,
    },
    /// Rank teams at a point in time
    Rank {
        /// spread or total
        #[arg(long, default_value = "spread")]
        mode: String,
        /// Date of the ranking (defaults to the last game in the log)
        #[arg(long)]
        date: Option<String>,
        /// Distribution summary to rank by: mean or median
        #[arg(long, default_value = "mean")]
        statistic: String,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Predict a game
    Predict {
        /// Home team abbreviation
        home: String,
        /// Home starting quarterback
        home_qb: String,
        /// Away team abbreviation
        away: String,
        /// Away starting quarterback
        away_qb: String,
        /// spread or total
        #[arg(long, default_value = "spread")]
        mode: String,
        /// Game date (defaults to one week after the last game in the log)
        #[arg(long)]
        date: Option<String>,
        /// Line to quote: home margin for spread, combined points for total
        #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
        line: f64,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Initialize a new project with default config
    Init,
}

#[derive(Subcommand)]
enum DataCommands {
    /// Import games from a CSV file
    Import {
        /// Path to the CSV game log
        path: String,
    },
    /// Sync games from the configured feed
    Sync,
    /// Show database status
    Status,
}

#[derive(Clone, Debug)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("Unknown format: {}. Use table, json, or csv.", s)),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    // Run command
    let result = match cli.command {
        Commands::Data { action } => match action {
            DataCommands::Import { path } => commands::data_import(&config, &path),
            DataCommands::Sync => commands::data_sync(&config),
            DataCommands::Status => commands::data_status(&config),
        },
        Commands::Calibrate {
            mode,
            steps,
            force,
            offline,
        } => commands::calibrate(&config, &mode, steps, force, offline),
        Commands::Rank {
            mode,
            date,
            statistic,
            format,
        } => commands::rank(&config, &mode, date, &statistic, format),
        Commands::Predict {
            home,
            home_qb,
            away,
            away_qb,
            mode,
            date,
            line,
            format,
        } => commands::predict(
            &config,
            &mode,
            (home.as_str(), home_qb.as_str()),
            (away.as_str(), away_qb.as_str()),
            date,
            line,
            format,
        ),
        Commands::Init => commands::init(&cli.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use chrono::{Duration, NaiveDateTime};
    use melo::data::feed::{parse_csv, parse_datetime};
    use melo::data::{CsvFeed, Database, FileCache, StoredGames};
    use melo::model::Statistic;
    use melo::predict::{format_prediction, Matchup, Predictor};
    use melo::training::{Calibrator, TrialTable};
    use melo::MeloNfl;

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        // Create data and cache directories
        if let Some(parent) = std::path::Path::new(&config.data.database_path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::create_dir_all(&config.data.cache_dir)?;
        println!("Created data and cache directories");

        println!("\nNext steps:");
        println!("  1. Edit {} to set data.source_url", config_path);
        println!("  2. Run 'melo data sync' (or 'melo data import games.csv')");
        println!("  3. Run 'melo calibrate --mode spread' to fit the model");
        println!("  4. Run 'melo predict KC \"Patrick Mahomes\" DEN \"Bo Nix\"'");

        Ok(())
    }

    pub fn data_import(config: &Config, path: &str) -> Result<()> {
        let mut db = Database::open(&config.data.database_path)?;

        println!("Importing games from {}...", path);
        let text = std::fs::read_to_string(path)?;
        let games = parse_csv(&text)?;
        println!("Parsed {} games", games.len());

        let count = db.upsert_games(&games)?;
        println!("Stored {} games in database", count);

        Ok(())
    }

    pub fn data_sync(config: &Config) -> Result<()> {
        let mut source = open_source(config)?;
        let count = source.refresh()?;
        println!("Stored {} games in database", count);
        Ok(())
    }

    pub fn data_status(config: &Config) -> Result<()> {
        let source = open_source(config)?;
        let stats = source.database().get_stats()?;

        println!("Database Status");
        println!("───────────────────────────────");
        println!("  Path:     {}", config.data.database_path);
        println!("  Teams:    {}", stats.team_count);
        println!("  QBs:      {}", stats.qb_count);
        println!("  Games:    {}", stats.game_count);
        if let (Some(earliest), Some(latest)) = (stats.earliest_game, stats.latest_game) {
            println!("  Range:    {} to {}", earliest.date(), latest.date());
        }
        match &config.data.source_url {
            Some(url) => println!("  Feed:     {}", url),
            None => println!("  Feed:     (none)"),
        }

        Ok(())
    }

    pub fn calibrate(
        config: &Config,
        mode: &str,
        steps: Option<usize>,
        force: bool,
        offline: bool,
    ) -> Result<()> {
        let steps = steps.unwrap_or(config.calibration.steps);
        let model = load_model(config, mode, steps, force, !offline)?;

        println!("Calibrated {} model", model.mode());
        println!("───────────────────────────────");
        let params = model.params().to_array();
        for (name, value) in melo::model::Hyperparams::NAMES.iter().zip(params) {
            println!("  {:<14} {:.4}", name, value);
        }
        match model.rms_error {
            Some(rms) => println!("  {:<14} {:.3}", "rms_error", rms),
            None => println!("  {:<14} n/a (log shorter than burn-in)", "rms_error"),
        }

        Ok(())
    }

    pub fn rank(
        config: &Config,
        mode: &str,
        date: Option<String>,
        statistic: &str,
        format: OutputFormat,
    ) -> Result<()> {
        let statistic: Statistic = statistic.parse()?;
        let model = load_model(config, mode, config.calibration.steps, false, true)?;
        let time = match date {
            Some(d) => parse_datetime(&d)?,
            None => last_game(&model)?,
        };

        let predictor = Predictor::new(model);
        let rankings = predictor.rank(time, statistic);

        match format {
            OutputFormat::Table => {
                println!("{} rankings ({}) as of {}", mode, statistic, time.date());
                println!("───────────────────────────────");
                for r in &rankings {
                    println!("  {:>2}. {:<5} {:+7.2}", r.rank, r.team, r.value);
                }
            }
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(&rankings)
                    .map_err(|e| melo::MeloError::Parse(e.to_string()))?;
                println!("{}", json);
            }
            OutputFormat::Csv => {
                println!("rank,team,{}", statistic);
                for r in &rankings {
                    println!("{},{},{:.3}", r.rank, r.team, r.value);
                }
            }
        }

        Ok(())
    }

    pub fn predict(
        config: &Config,
        mode: &str,
        home: (&str, &str),
        away: (&str, &str),
        date: Option<String>,
        line: f64,
        format: OutputFormat,
    ) -> Result<()> {
        let model = load_model(config, mode, config.calibration.steps, false, true)?;
        let time = match date {
            Some(d) => parse_datetime(&d)?,
            None => last_game(&model)? + Duration::days(7),
        };

        let predictor = Predictor::new(model);
        let prediction = predictor.predict(
            time,
            Matchup::new(home.0, home.1),
            Matchup::new(away.0, away.1),
            line,
        )?;

        match format {
            OutputFormat::Table => {
                print!("{}", format_prediction(&prediction));
            }
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(&prediction)
                    .map_err(|e| melo::MeloError::Parse(e.to_string()))?;
                println!("{}", json);
            }
            OutputFormat::Csv => {
                println!("home,home_qb,away,away_qb,median,mean,line,probability,q10,q90");
                println!(
                    "{},{},{},{},{:.2},{:.2},{},{:.3},{:.2},{:.2}",
                    prediction.home.team,
                    prediction.home.qb,
                    prediction.away.team,
                    prediction.away.qb,
                    prediction.median,
                    prediction.mean,
                    prediction.line,
                    prediction.probability,
                    prediction.interval.0,
                    prediction.interval.1
                );
            }
        }

        Ok(())
    }

    fn open_source(config: &Config) -> Result<StoredGames> {
        let db = Database::open(&config.data.database_path)?;
        let feed = match &config.data.source_url {
            Some(url) => Some(CsvFeed::new(url.as_str())?),
            None => None,
        };
        Ok(StoredGames::new(db, feed))
    }

    /// Cached model for `mode`, calibrating first if needed
    fn load_model(
        config: &Config,
        mode: &str,
        steps: usize,
        calibrate: bool,
        refresh: bool,
    ) -> Result<MeloNfl> {
        let mut source = open_source(config)?;
        let cache = FileCache::new(&config.data.cache_dir);
        let diagnostics = TrialTable::new(&config.data.cache_dir);

        Calibrator::new(&mut source, &cache, &diagnostics, config.calibration.clone())
            .with_refresh(refresh)
            .from_cache(mode, steps, calibrate)
    }

    fn last_game(model: &MeloNfl) -> Result<NaiveDateTime> {
        model.last_game().ok_or(melo::MeloError::NoGames)
    }
}
