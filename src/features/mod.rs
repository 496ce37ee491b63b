//! Feature extraction
//!
//! Causal per-game covariates and the bias correction built from them.

pub mod bias;
pub mod temporal;

pub use bias::BiasModel;
pub use temporal::{canonical_team, GameFeaturizer};
