//! Model calibration
//!
//! Hyperparameter search, its objective metric, and trial diagnostics.

pub mod calibration;
pub mod diagnostics;
pub mod metrics;
pub mod tpe;

pub use calibration::{search_space, Calibration, CalibrationSearch, Calibrator};
pub use diagnostics::{Diagnostics, NoDiagnostics, TrialTable};
pub use tpe::{Bounds, ParzenConfig, ParzenSearch, Trial};
