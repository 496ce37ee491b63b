//! Calibration diagnostics
//!
//! After a search the trial history is written out so the loss surface can
//! be inspected per hyperparameter.

use std::path::{Path, PathBuf};

use super::tpe::Trial;
use crate::model::Hyperparams;
use crate::{Mode, Result};

/// Receives the finished trial history of a calibration run
pub trait Diagnostics {
    fn render(&self, mode: Mode, trials: &[Trial], chosen: &Hyperparams) -> Result<()>;
}

/// Writes `<dir>/plots/<mode>_params.csv`: one row per trial in evaluation
/// order with each hyperparameter, the loss, and whether the row is the
/// chosen point
#[derive(Debug, Clone)]
pub struct TrialTable {
    dir: PathBuf,
}

impl TrialTable {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        TrialTable {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self, mode: Mode) -> PathBuf {
        self.dir.join("plots").join(format!("{}_params.csv", mode))
    }
}

impl Diagnostics for TrialTable {
    fn render(&self, mode: Mode, trials: &[Trial], chosen: &Hyperparams) -> Result<()> {
        let path = self.path(mode);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let chosen = chosen.to_array();
        let mut writer = csv::Writer::from_path(&path)?;

        let mut header = vec!["trial"];
        header.extend(Hyperparams::NAMES);
        header.extend(["loss", "chosen"]);
        writer.write_record(&header)?;

        for (i, trial) in trials.iter().enumerate() {
            let mut row = vec![i.to_string()];
            row.extend(trial.point.iter().map(|x| format!("{:.6}", x)));
            row.push(format!("{:.6}", trial.loss));
            row.push((trial.point.as_slice() == chosen.as_slice()).to_string());
            writer.write_record(&row)?;
        }
        writer.flush()?;

        log::info!("Wrote {} trials to {}", trials.len(), path.display());
        Ok(())
    }
}

/// Discards the history
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDiagnostics;

impl Diagnostics for NoDiagnostics {
    fn render(&self, _mode: Mode, _trials: &[Trial], _chosen: &Hyperparams) -> Result<()> {
        Ok(())
    }
}
