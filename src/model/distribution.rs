//! Predicted outcome distributions
//!
//! A prediction is the survival function `P(y > line)` sampled on the line
//! grid. Point estimates interpolate linearly between neighbouring lines.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::MeloError;

/// Distribution over the outcome variable on a fixed line grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineDistribution {
    lines: Vec<f64>,
    survival: Vec<f64>,
}

impl LineDistribution {
    /// `survival[i]` is the probability the outcome exceeds `lines[i]`
    pub fn new(lines: Vec<f64>, survival: Vec<f64>) -> Self {
        debug_assert_eq!(lines.len(), survival.len());
        LineDistribution { lines, survival }
    }

    pub fn lines(&self) -> &[f64] {
        &self.lines
    }

    pub fn survival(&self) -> &[f64] {
        &self.survival
    }

    /// (line, P(y <= line)) pairs
    pub fn cdf(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.lines
            .iter()
            .zip(&self.survival)
            .map(|(&line, &sf)| (line, 1.0 - sf))
    }

    /// Probability the outcome exceeds `line`
    pub fn probability(&self, line: f64) -> f64 {
        let n = self.lines.len();
        if n == 0 {
            return 0.5;
        }
        if line <= self.lines[0] {
            return self.survival[0];
        }
        if line >= self.lines[n - 1] {
            return self.survival[n - 1];
        }
        let i = self.lines.partition_point(|l| *l <= line);
        let (l0, l1) = (self.lines[i - 1], self.lines[i]);
        let (s0, s1) = (self.survival[i - 1], self.survival[i]);
        s0 + (line - l0) / (l1 - l0) * (s1 - s0)
    }

    /// Value `x` with `P(y <= x) = q`, read at the first line where the
    /// survival function drops to `1 - q`
    pub fn quantile(&self, q: f64) -> f64 {
        let target = 1.0 - q;
        let n = self.lines.len();
        if n == 0 {
            return 0.0;
        }
        if self.survival[0] <= target {
            return self.lines[0];
        }
        for i in 1..n {
            let s1 = self.survival[i];
            if s1 <= target {
                let s0 = self.survival[i - 1];
                let (l0, l1) = (self.lines[i - 1], self.lines[i]);
                return l0 + (s0 - target) / (s0 - s1) * (l1 - l0);
            }
        }
        self.lines[n - 1]
    }

    /// Line where the survival function crosses one half
    pub fn median(&self) -> f64 {
        self.quantile(0.5)
    }

    /// Expected value, placing the mass between adjacent lines at their
    /// midpoint and each tail half a unit outside the grid
    pub fn mean(&self) -> f64 {
        let n = self.lines.len();
        if n == 0 {
            return 0.0;
        }
        let mut mean = (1.0 - self.survival[0]) * (self.lines[0] - 0.5);
        for i in 0..n - 1 {
            let mass = self.survival[i] - self.survival[i + 1];
            mean += mass * 0.5 * (self.lines[i] + self.lines[i + 1]);
        }
        mean + self.survival[n - 1] * (self.lines[n - 1] + 0.5)
    }

    pub fn statistic(&self, statistic: Statistic) -> f64 {
        match statistic {
            Statistic::Mean => self.mean(),
            Statistic::Median => self.median(),
        }
    }
}

/// Summary of a distribution used for rankings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Statistic {
    #[default]
    Mean,
    Median,
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statistic::Mean => write!(f, "mean"),
            Statistic::Median => write!(f, "median"),
        }
    }
}

impl FromStr for Statistic {
    type Err = MeloError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mean" => Ok(Statistic::Mean),
            "median" => Ok(Statistic::Median),
            _ => Err(MeloError::Parse(format!(
                "Unknown statistic: {}. Use mean or median.",
                s
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Outcome uniform on the integers -2..=2
    fn uniform() -> LineDistribution {
        LineDistribution::new(
            vec![-2.5, -1.5, -0.5, 0.5, 1.5, 2.5],
            vec![1.0, 0.8, 0.6, 0.4, 0.2, 0.0],
        )
    }

    #[test]
    fn test_probability() {
        let dist = uniform();
        assert!((dist.probability(-0.5) - 0.6).abs() < 1e-12);
        assert!((dist.probability(0.0) - 0.5).abs() < 1e-12);
        assert_eq!(dist.probability(-10.0), 1.0);
        assert_eq!(dist.probability(10.0), 0.0);
    }

    #[test]
    fn test_median_and_mean() {
        let dist = uniform();
        assert!(dist.median().abs() < 1e-12);
        assert!(dist.mean().abs() < 1e-12);
    }

    #[test]
    fn test_quantiles() {
        let dist = uniform();
        assert!((dist.quantile(0.2) - (-1.5)).abs() < 1e-12);
        assert!((dist.quantile(0.9) - 2.0).abs() < 1e-12);
        assert!(dist.quantile(0.1) < dist.quantile(0.5));
    }

    #[test]
    fn test_point_mass() {
        let lines: Vec<f64> = (0..10).map(|i| i as f64 - 4.5).collect();
        let survival = lines.iter().map(|l| if *l < 3.0 { 1.0 } else { 0.0 }).collect();
        let dist = LineDistribution::new(lines, survival);
        assert!((dist.median() - 3.0).abs() < 1e-12);
        assert!((dist.mean() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_cdf_complements_survival() {
        let dist = uniform();
        let cdf: Vec<f64> = dist.cdf().map(|(_, p)| p).collect();
        assert!((cdf[1] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_statistic_parse() {
        assert_eq!("Mean".parse::<Statistic>().unwrap(), Statistic::Mean);
        assert_eq!("median".parse::<Statistic>().unwrap(), Statistic::Median);
        assert!("mode".parse::<Statistic>().is_err());
    }
}
