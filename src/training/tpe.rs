//! Tree-structured Parzen estimator search
//!
//! Sequential model-based minimisation over a box. After a number of
//! uniformly drawn startup trials, past trials are split into a "good" set
//! (the lowest-loss `gamma` fraction) and the rest. Each dimension gets two
//! truncated-Gaussian mixtures, `l(x)` over good points and `g(x)` over the
//! rest, and the next point maximises `l(x) / g(x)` among candidates drawn
//! from `l`.
//!
//! Dimensions are modelled independently.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Upper limit on the size of the good set
const MAX_GOOD: usize = 25;

/// Rejection attempts before a sample is clamped into bounds
const MAX_REJECTIONS: usize = 100;

/// Closed interval searched for one parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub name: &'static str,
    pub low: f64,
    pub high: f64,
}

impl Bounds {
    pub const fn new(name: &'static str, low: f64, high: f64) -> Self {
        Bounds { name, low, high }
    }

    pub fn width(&self) -> f64 {
        self.high - self.low
    }

    pub fn contains(&self, x: f64) -> bool {
        x >= self.low && x <= self.high
    }
}

/// A completed objective evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    pub point: Vec<f64>,
    pub loss: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParzenConfig {
    /// Uniform random trials before the estimator is used
    pub startup_trials: usize,
    /// Fraction of trials (scaled by sqrt(n)) considered good
    pub gamma: f64,
    /// Candidates drawn from `l(x)` per dimension
    pub candidates: usize,
}

impl Default for ParzenConfig {
    fn default() -> Self {
        ParzenConfig {
            startup_trials: 20,
            gamma: 0.25,
            candidates: 24,
        }
    }
}

/// Proposes points given the trial history
pub struct ParzenSearch {
    space: Vec<Bounds>,
    config: ParzenConfig,
    rng: StdRng,
}

impl ParzenSearch {
    pub fn new(space: Vec<Bounds>, config: ParzenConfig, seed: u64) -> Self {
        ParzenSearch {
            space,
            config,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn space(&self) -> &[Bounds] {
        &self.space
    }

    /// Next point to evaluate
    pub fn suggest(&mut self, history: &[Trial]) -> Vec<f64> {
        if history.len() < self.config.startup_trials.max(1) {
            return self.random_point();
        }

        let mut sorted: Vec<&Trial> = history.iter().collect();
        sorted.sort_by(|a, b| a.loss.total_cmp(&b.loss));
        let n_good = split_point(history.len(), self.config.gamma);
        let (good, bad) = sorted.split_at(n_good);

        self.space
            .iter()
            .enumerate()
            .map(|(d, bounds)| {
                let below: Vec<f64> = good.iter().map(|t| t.point[d]).collect();
                let above: Vec<f64> = bad.iter().map(|t| t.point[d]).collect();
                let l = Parzen::fit(&below, *bounds);
                let g = Parzen::fit(&above, *bounds);

                let mut best = (f64::NEG_INFINITY, l.sample(&mut self.rng));
                for _ in 0..self.config.candidates.max(1) {
                    let x = l.sample(&mut self.rng);
                    let score = l.log_pdf(x) - g.log_pdf(x);
                    if score > best.0 {
                        best = (score, x);
                    }
                }
                best.1
            })
            .collect()
    }

    /// Several proposals from the same history, for concurrent evaluation
    pub fn suggest_batch(&mut self, history: &[Trial], count: usize) -> Vec<Vec<f64>> {
        (0..count).map(|_| self.suggest(history)).collect()
    }

    fn random_point(&mut self) -> Vec<f64> {
        self.space
            .iter()
            .map(|b| self.rng.gen_range(b.low..=b.high))
            .collect()
    }
}

/// Size of the good set for `n` trials
fn split_point(n: usize, gamma: f64) -> usize {
    let n_good = (gamma * (n as f64).sqrt()).ceil() as usize;
    n_good.clamp(1, MAX_GOOD).min(n)
}

/// Standard normal CDF (Abramowitz and Stegun 7.1.26)
fn normal_cdf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let z = x.abs() / std::f64::consts::SQRT_2;

    let t = 1.0 / (1.0 + p * z);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-z * z).exp();

    0.5 * (1.0 + sign * y)
}

/// Mixture of Gaussians truncated to the search bounds
#[derive(Debug, Clone)]
struct Parzen {
    bounds: Bounds,
    mus: Vec<f64>,
    sigmas: Vec<f64>,
}

impl Parzen {
    /// One component per observation plus a broad prior component at the
    /// centre of the box. Bandwidths come from the distance to neighbours.
    fn fit(observations: &[f64], bounds: Bounds) -> Self {
        let prior_mu = 0.5 * (bounds.low + bounds.high);
        let prior_sigma = bounds.width().max(f64::EPSILON);

        let mut mus: Vec<f64> = observations.to_vec();
        mus.push(prior_mu);
        mus.sort_by(f64::total_cmp);

        let n = mus.len();
        let min_sigma = prior_sigma / (n as f64 + 1.0).min(100.0);
        let mut sigmas: Vec<f64> = (0..n)
            .map(|i| {
                let left = if i > 0 { mus[i] - mus[i - 1] } else { 0.0 };
                let right = if i + 1 < n { mus[i + 1] - mus[i] } else { 0.0 };
                left.max(right).clamp(min_sigma, prior_sigma)
            })
            .collect();

        // the prior keeps its full width
        if let Some(i) = mus.iter().position(|&m| m == prior_mu) {
            sigmas[i] = prior_sigma;
        }

        Parzen {
            bounds,
            mus,
            sigmas,
        }
    }

    fn sample(&self, rng: &mut StdRng) -> f64 {
        let k = rng.gen_range(0..self.mus.len());
        let normal = match Normal::new(self.mus[k], self.sigmas[k]) {
            Ok(normal) => normal,
            Err(_) => return self.mus[k].clamp(self.bounds.low, self.bounds.high),
        };
        for _ in 0..MAX_REJECTIONS {
            let x = normal.sample(rng);
            if self.bounds.contains(x) {
                return x;
            }
        }
        normal
            .sample(rng)
            .clamp(self.bounds.low, self.bounds.high)
    }

    fn log_pdf(&self, x: f64) -> f64 {
        let weight = 1.0 / self.mus.len() as f64;
        let density: f64 = self
            .mus
            .iter()
            .zip(&self.sigmas)
            .map(|(&mu, &sigma)| {
                let z = (x - mu) / sigma;
                let mass = normal_cdf((self.bounds.high - mu) / sigma)
                    - normal_cdf((self.bounds.low - mu) / sigma);
                let pdf = (-0.5 * z * z).exp() / (sigma * (2.0 * std::f64::consts::PI).sqrt());
                weight * pdf / mass.max(1e-12)
            })
            .sum();
        density.max(f64::MIN_POSITIVE).ln()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space() -> Vec<Bounds> {
        vec![Bounds::new("x", -5.0, 5.0), Bounds::new("y", 0.0, 1.0)]
    }

    fn objective(p: &[f64]) -> f64 {
        (p[0] - 2.0).powi(2) + (p[1] - 0.3).powi(2)
    }

    #[test]
    fn test_normal_cdf() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-6);
        assert!((normal_cdf(1.96) - 0.975).abs() < 1e-3);
        assert!((normal_cdf(-1.96) - 0.025).abs() < 1e-3);
    }

    #[test]
    fn test_split_point() {
        assert_eq!(split_point(1, 0.25), 1);
        assert_eq!(split_point(16, 0.25), 1);
        assert_eq!(split_point(100, 0.25), 3);
        assert_eq!(split_point(100_000, 0.25), MAX_GOOD);
    }

    #[test]
    fn test_suggestions_stay_in_bounds() {
        let mut search = ParzenSearch::new(space(), ParzenConfig::default(), 7);
        let mut history = Vec::new();
        for _ in 0..60 {
            let point = search.suggest(&history);
            assert!(point.iter().zip(search.space()).all(|(x, b)| b.contains(*x)));
            history.push(Trial {
                loss: objective(&point),
                point,
            });
        }
    }

    #[test]
    fn test_seeded_search_is_reproducible() {
        let run = || {
            let mut search = ParzenSearch::new(space(), ParzenConfig::default(), 11);
            let mut history = Vec::new();
            for _ in 0..30 {
                let point = search.suggest(&history);
                history.push(Trial {
                    loss: objective(&point),
                    point,
                });
            }
            history
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_search_beats_random_start() {
        let config = ParzenConfig {
            startup_trials: 10,
            ..ParzenConfig::default()
        };
        let mut search = ParzenSearch::new(space(), config, 3);
        let mut history: Vec<Trial> = Vec::new();
        for _ in 0..120 {
            let point = search.suggest(&history);
            history.push(Trial {
                loss: objective(&point),
                point,
            });
        }

        let best_startup = history[..10]
            .iter()
            .map(|t| t.loss)
            .fold(f64::INFINITY, f64::min);
        let best = history.iter().map(|t| t.loss).fold(f64::INFINITY, f64::min);
        assert!(best <= best_startup);
        assert!(best < 0.5, "best loss {}", best);
    }

    #[test]
    fn test_parzen_prefers_good_region() {
        let bounds = Bounds::new("x", 0.0, 10.0);
        let l = Parzen::fit(&[1.0, 1.2, 0.9], bounds);
        let g = Parzen::fit(&[7.0, 8.0, 9.0, 6.5], bounds);
        assert!(l.log_pdf(1.0) - g.log_pdf(1.0) > l.log_pdf(8.0) - g.log_pdf(8.0));
    }
}
