//! Rating model
//!
//! Line grid, append-only rating timelines, the margin-dependent Elo engine
//! and the trained NFL model built on top of it.

pub mod distribution;
pub mod engine;
pub mod lines;
pub mod melo_nfl;
pub mod timeline;

pub use distribution::{LineDistribution, Statistic};
pub use engine::{EngineConfig, RatingEngine};
pub use lines::LineGrid;
pub use melo_nfl::{Hyperparams, MeloNfl};
pub use timeline::RatingTimeline;
