//! Hyperparameter calibration
//!
//! Minimises the post-burn-in RMS residual over the five model parameters
//! with a Parzen-estimator search, then retrains at the best point and
//! caches the result per mode.

use std::thread;

use super::diagnostics::Diagnostics;
use super::metrics;
use super::tpe::{Bounds, ParzenConfig, ParzenSearch, Trial};
use crate::data::{GameSource, ModelCache};
use crate::features::GameFeaturizer;
use crate::model::Hyperparams;
use crate::{CalibrationConfig, GameRecord, MeloError, MeloNfl, Mode, RawGame, Result};

/// Search box for each mode, in [`Hyperparams::NAMES`] order
pub fn search_space(mode: Mode) -> Vec<Bounds> {
    let kfactor = match mode {
        Mode::Spread => Bounds::new("kfactor", 0.1, 0.4),
        Mode::Total => Bounds::new("kfactor", 0.0, 0.3),
    };
    vec![
        kfactor,
        Bounds::new("regress_coeff", 0.1, 0.5),
        Bounds::new("rest_bonus", 0.0, 0.2),
        Bounds::new("exp_bonus", 0.0, 0.5),
        Bounds::new("weight_qb", 0.0, 1.0),
    ]
}

fn params_at(point: &[f64]) -> Hyperparams {
    Hyperparams::from_array(std::array::from_fn(|i| point[i]))
}

/// Outcome of a search
#[derive(Debug, Clone)]
pub struct Calibration {
    /// Model retrained at the best point
    pub model: MeloNfl,
    /// Every evaluation in order
    pub trials: Vec<Trial>,
    pub best: Hyperparams,
}

/// Fixed-budget search for one mode
pub struct CalibrationSearch {
    mode: Mode,
    config: CalibrationConfig,
}

impl CalibrationSearch {
    pub fn new(mode: Mode, config: CalibrationConfig) -> Self {
        CalibrationSearch { mode, config }
    }

    /// Run `config.steps` evaluations and return the best of them. There is
    /// no quality gate: a poor best point is still returned.
    pub fn run(&self, raw_games: &[RawGame]) -> Result<Calibration> {
        if raw_games.is_empty() {
            return Err(MeloError::NoGames);
        }

        let records = GameFeaturizer::new(raw_games).featurize(raw_games);
        let space = search_space(self.mode);
        let mut search = ParzenSearch::new(
            space,
            ParzenConfig {
                startup_trials: self.config.startup_trials,
                gamma: self.config.gamma,
                candidates: self.config.candidates,
            },
            self.config.seed,
        );

        log::info!(
            "Calibrating {} hyperparameters over {} games ({} trials)",
            self.mode,
            records.len(),
            self.config.steps
        );

        let batch_size = self.config.batch_size.max(1);
        let mut trials: Vec<Trial> = Vec::with_capacity(self.config.steps);
        while trials.len() < self.config.steps {
            let count = batch_size.min(self.config.steps - trials.len());
            let points = search.suggest_batch(&trials, count);
            let losses = self.evaluate_batch(&points, &records);

            for (point, loss) in points.into_iter().zip(losses) {
                log::debug!(
                    "trial {:>3}: {} -> {:.4}",
                    trials.len(),
                    format_point(&point),
                    loss
                );
                trials.push(Trial { point, loss });
            }
        }

        let best_trial = trials
            .iter()
            .min_by(|a, b| a.loss.total_cmp(&b.loss))
            .ok_or_else(|| MeloError::Config("calibration needs at least one step".to_string()))?;
        let best = params_at(&best_trial.point);
        log::info!(
            "Best {} point: {} (loss {:.4})",
            self.mode,
            format_point(&best_trial.point),
            best_trial.loss
        );

        let model = MeloNfl::train(self.mode, best, raw_games)?;
        Ok(Calibration {
            model,
            trials,
            best,
        })
    }

    /// Score a batch of points concurrently; each trial trains fresh state
    fn evaluate_batch(&self, points: &[Vec<f64>], records: &[GameRecord]) -> Vec<f64> {
        let mode = self.mode;
        let mut losses = vec![f64::INFINITY; points.len()];
        thread::scope(|s| {
            for (point, loss) in points.iter().zip(&mut losses) {
                s.spawn(move || {
                    let params = params_at(point);
                    *loss = metrics::loss(MeloNfl::evaluate(mode, &params, records));
                });
            }
        });
        losses
    }
}

fn format_point(point: &[f64]) -> String {
    Hyperparams::NAMES
        .iter()
        .zip(point)
        .map(|(name, x)| format!("{}={:.4}", name, x))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Cache-aware entry point wiring the search to its collaborators
pub struct Calibrator<'a> {
    source: &'a mut dyn GameSource,
    cache: &'a dyn ModelCache,
    diagnostics: &'a dyn Diagnostics,
    config: CalibrationConfig,
    refresh: bool,
}

impl<'a> Calibrator<'a> {
    pub fn new(
        source: &'a mut dyn GameSource,
        cache: &'a dyn ModelCache,
        diagnostics: &'a dyn Diagnostics,
        config: CalibrationConfig,
    ) -> Self {
        Calibrator {
            source,
            cache,
            diagnostics,
            config,
            refresh: true,
        }
    }

    /// Whether the source is asked to refresh before a search
    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    /// Cached model for `mode`, or a freshly calibrated one when
    /// `calibrate` is set or nothing usable is cached
    pub fn from_cache(&mut self, mode: &str, steps: usize, calibrate: bool) -> Result<MeloNfl> {
        let mode: Mode = mode.parse()?;

        if !calibrate {
            match self.cache.get(mode.as_str()) {
                Ok(Some(model)) => {
                    log::info!("Using cached {} model", mode);
                    return Ok(model);
                }
                Ok(None) => log::info!("No cached {} model", mode),
                Err(e @ MeloError::CorruptCache { .. }) => {
                    log::warn!("{}; recalibrating", e);
                }
                Err(e) => return Err(e),
            }
        }

        let games = self.source.load_games(self.refresh)?;
        let config = CalibrationConfig {
            steps,
            ..self.config.clone()
        };
        let calibration = CalibrationSearch::new(mode, config).run(&games)?;

        self.diagnostics
            .render(mode, &calibration.trials, &calibration.best)?;

        log::info!("Caching {} model", mode);
        self.cache.put(mode.as_str(), &calibration.model)?;

        Ok(calibration.model)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    use chrono::{Duration, NaiveDate};

    use super::*;
    use crate::data::FileCache;
    use crate::training::diagnostics::NoDiagnostics;
    use crate::training::metrics::BURN_IN;

    /// Counts loads and remembers the refresh flag
    struct CountingSource {
        games: Vec<RawGame>,
        loads: usize,
        last_update: Option<bool>,
    }

    impl GameSource for CountingSource {
        fn load_games(&mut self, update: bool) -> Result<Vec<RawGame>> {
            self.loads += 1;
            self.last_update = Some(update);
            self.games.load_games(update)
        }
    }

    #[derive(Default)]
    struct MemoryCache {
        models: RefCell<HashMap<String, MeloNfl>>,
        puts: Cell<usize>,
    }

    impl ModelCache for MemoryCache {
        fn get(&self, key: &str) -> Result<Option<MeloNfl>> {
            Ok(self.models.borrow().get(key).cloned())
        }

        fn put(&self, key: &str, model: &MeloNfl) -> Result<()> {
            self.puts.set(self.puts.get() + 1);
            self.models.borrow_mut().insert(key.to_string(), model.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingDiagnostics {
        rendered: RefCell<Vec<(Mode, usize)>>,
    }

    impl Diagnostics for RecordingDiagnostics {
        fn render(&self, mode: Mode, trials: &[Trial], _chosen: &Hyperparams) -> Result<()> {
            self.rendered.borrow_mut().push((mode, trials.len()));
            Ok(())
        }
    }

    /// Six teams with fixed relative strengths over a few seasons
    fn league() -> Vec<RawGame> {
        let teams = ["NE", "BUF", "MIA", "NYJ", "KC", "DEN"];
        let strength = [10, 4, 0, -2, 6, -6];
        let start = NaiveDate::from_ymd_opt(2014, 9, 7)
            .unwrap()
            .and_hms_opt(13, 0, 0)
            .unwrap();
        let mut games = Vec::new();
        for week in 0..100usize {
            let dt = start + Duration::days(7 * week as i64);
            for slot in 0..3 {
                let h = (slot + week) % 6;
                let a = (5 - slot + week) % 6;
                let margin = strength[h] - strength[a] + 3;
                games.push(RawGame {
                    datetime: dt,
                    team_home: teams[h].to_string(),
                    team_away: teams[a].to_string(),
                    qb_home: format!("{} qb", teams[h]),
                    qb_away: format!("{} qb", teams[a]),
                    score_home: (24 + margin.max(0)) as u16,
                    score_away: (24 - margin.min(0)) as u16,
                });
            }
        }
        games
    }

    fn config(steps: usize) -> CalibrationConfig {
        CalibrationConfig {
            steps,
            startup_trials: 4,
            batch_size: 2,
            ..CalibrationConfig::default()
        }
    }

    #[test]
    fn test_search_space_matches_names() {
        for mode in Mode::ALL {
            let space = search_space(mode);
            let names: Vec<&str> = space.iter().map(|b| b.name).collect();
            assert_eq!(names, Hyperparams::NAMES);
        }
        assert_eq!(search_space(Mode::Spread)[0], Bounds::new("kfactor", 0.1, 0.4));
        assert_eq!(search_space(Mode::Total)[0], Bounds::new("kfactor", 0.0, 0.3));
    }

    #[test]
    fn test_run_returns_best_trial() {
        let games = league();
        assert!(games.len() > BURN_IN);

        let calibration = CalibrationSearch::new(Mode::Spread, config(7))
            .run(&games)
            .unwrap();
        assert_eq!(calibration.trials.len(), 7);

        let best_loss = calibration
            .trials
            .iter()
            .map(|t| t.loss)
            .fold(f64::INFINITY, f64::min);
        assert!(best_loss.is_finite());
        let rms = calibration.model.rms_error.unwrap();
        assert!((rms - best_loss).abs() < 1e-9);
        assert_eq!(calibration.model.params(), &calibration.best);

        let space = search_space(Mode::Spread);
        for (x, b) in calibration.best.to_array().iter().zip(&space) {
            assert!(b.contains(*x));
        }
    }

    #[test]
    fn test_short_log_still_returns_a_model() {
        // every trial has infinite loss; the search still completes
        let games: Vec<RawGame> = league().into_iter().take(60).collect();
        let calibration = CalibrationSearch::new(Mode::Total, config(3))
            .run(&games)
            .unwrap();
        assert!(calibration.trials.iter().all(|t| t.loss.is_infinite()));
        assert_eq!(calibration.model.rms_error, None);
    }

    #[test]
    fn test_from_cache_calibrates_once() {
        let mut source = CountingSource {
            games: league(),
            loads: 0,
            last_update: None,
        };
        let cache = MemoryCache::default();
        let diagnostics = RecordingDiagnostics::default();

        {
            let mut calibrator =
                Calibrator::new(&mut source, &cache, &diagnostics, config(4)).with_refresh(false);
            let first = calibrator.from_cache("spread", 4, false).unwrap();
            let second = calibrator.from_cache("spread", 4, false).unwrap();
            assert_eq!(first.params(), second.params());
        }

        assert_eq!(source.loads, 1);
        assert_eq!(source.last_update, Some(false));
        assert_eq!(cache.puts.get(), 1);
        assert_eq!(*diagnostics.rendered.borrow(), vec![(Mode::Spread, 4)]);
    }

    #[test]
    fn test_from_cache_forced_recalibration() {
        let mut source = CountingSource {
            games: league(),
            loads: 0,
            last_update: None,
        };
        let cache = MemoryCache::default();

        {
            let mut calibrator = Calibrator::new(&mut source, &cache, &NoDiagnostics, config(3));
            calibrator.from_cache("total", 3, false).unwrap();
            calibrator.from_cache("total", 3, true).unwrap();
        }

        assert_eq!(source.loads, 2);
        assert_eq!(source.last_update, Some(true));
        assert_eq!(cache.puts.get(), 2);
    }

    #[test]
    fn test_from_cache_rejects_unknown_mode() {
        let mut source = CountingSource {
            games: league(),
            loads: 0,
            last_update: None,
        };
        let cache = MemoryCache::default();
        let result = Calibrator::new(&mut source, &cache, &NoDiagnostics, config(2))
            .from_cache("moneyline", 2, false);

        assert!(matches!(result, Err(MeloError::UnknownMode(_))));
        assert_eq!(source.loads, 0);
    }

    #[test]
    fn test_from_cache_recovers_from_corrupt_file() {
        let dir = std::env::temp_dir().join(format!("melo_calib_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let cache = FileCache::new(&dir);
        std::fs::write(cache.path("spread"), "garbage").unwrap();

        let mut games = league();
        let model = Calibrator::new(&mut games, &cache, &NoDiagnostics, config(2))
            .from_cache("spread", 2, false)
            .unwrap();

        let reloaded = cache.get("spread").unwrap().unwrap();
        assert_eq!(reloaded.params(), model.params());

        std::fs::remove_dir_all(&dir).ok();
    }
}
