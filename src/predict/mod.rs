//! Prediction and rankings
//!
//! Summaries of calibrated model output for display.

pub mod inference;

pub use inference::{format_prediction, Matchup, Prediction, Predictor, Ranking};
