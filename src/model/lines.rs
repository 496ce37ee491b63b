//! Discretized outcome lines

use serde::{Deserialize, Serialize};

use crate::Mode;

/// Ascending half-integer thresholds over the outcome variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineGrid {
    lines: Vec<f64>,
}

impl LineGrid {
    /// Grid for a mode: spreads in [-59.5, 59.5], totals in [-0.5, 100.5]
    pub fn for_mode(mode: Mode) -> Self {
        match mode {
            Mode::Spread => Self::half_integers(-59.5, 59.5),
            Mode::Total => Self::half_integers(-0.5, 100.5),
        }
    }

    /// Unit-spaced lines from `first` to `last` inclusive
    pub fn half_integers(first: f64, last: f64) -> Self {
        let count = (last - first).round() as usize + 1;
        LineGrid {
            lines: (0..count).map(|i| first + i as f64).collect(),
        }
    }

    pub fn lines(&self) -> &[f64] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Index of `-lines[i]`. Only meaningful on grids symmetric about zero.
    pub fn mirror(&self, i: usize) -> usize {
        self.lines.len() - 1 - i
    }

    pub fn is_symmetric(&self) -> bool {
        self.lines
            .iter()
            .zip(self.lines.iter().rev())
            .all(|(a, b)| (a + b).abs() < 1e-9)
    }

    /// Win/loss of the outcome against every line
    pub fn outcomes(&self, value: f64) -> impl Iterator<Item = f64> + '_ {
        self.lines
            .iter()
            .map(move |&line| if value > line { 1.0 } else { 0.0 })
    }
}
