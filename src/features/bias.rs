//! Circumstantial bias correction
//!
//! Adds a rest term and a quarterback-experience term to the rating
//! differential of a game. Both terms use the mode's comparator, so spread
//! bias flips sign when the sides are swapped while total bias does not.

use serde::{Deserialize, Serialize};

use crate::{Comparator, Covariates};

/// Scale of the experience saturation, in games
pub const EXPERIENCE_SCALE: f64 = 7.0;

/// Saturating experience transform, -1 for a debut rising toward 0
pub fn experience_value(games: u32) -> f64 {
    -(-f64::from(games) / EXPERIENCE_SCALE).exp()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiasModel {
    pub comparator: Comparator,
    pub rest_bonus: f64,
    pub exp_bonus: f64,
}

impl BiasModel {
    pub fn new(comparator: Comparator, rest_bonus: f64, exp_bonus: f64) -> Self {
        BiasModel {
            comparator,
            rest_bonus,
            exp_bonus,
        }
    }

    pub fn bias(&self, cov: &Covariates) -> f64 {
        let rest = self.rest_bonus
            * self.comparator.apply(
                f64::from(u8::from(cov.rested_home)),
                f64::from(u8::from(cov.rested_away)),
            );

        let exp = self.exp_bonus
            * self.comparator.apply(
                experience_value(cov.exp_home),
                experience_value(cov.exp_away),
            );

        rest + exp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn covariates() -> Covariates {
        Covariates {
            rested_home: true,
            rested_away: false,
            exp_home: 40,
            exp_away: 2,
        }
    }

    #[test]
    fn test_experience_value() {
        assert_eq!(experience_value(0), -1.0);
        assert!((experience_value(7) + (-1.0f64).exp()).abs() < 1e-12);
        // marginal value shrinks with experience
        let early = experience_value(1) - experience_value(0);
        let late = experience_value(51) - experience_value(50);
        assert!(early > late);
    }

    #[test]
    fn test_spread_bias() {
        let model = BiasModel::new(Comparator::Difference, 0.1, 0.3);
        let expected = 0.1 + 0.3 * (experience_value(40) - experience_value(2));
        assert!((model.bias(&covariates()) - expected).abs() < 1e-12);
        assert!(model.bias(&covariates()) > 0.0);
    }

    #[test]
    fn test_spread_bias_antisymmetric() {
        let model = BiasModel::new(Comparator::Difference, 0.15, 0.4);
        let cov = covariates();
        assert!((model.bias(&cov) + model.bias(&cov.swapped())).abs() < 1e-12);
    }

    #[test]
    fn test_total_bias_symmetric() {
        let model = BiasModel::new(Comparator::Sum, 0.15, 0.4);
        let cov = covariates();
        assert!((model.bias(&cov) - model.bias(&cov.swapped())).abs() < 1e-12);

        let expected = 0.15 + 0.4 * (experience_value(40) + experience_value(2));
        assert!((model.bias(&cov) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_zero_bonuses() {
        let model = BiasModel::new(Comparator::Sum, 0.0, 0.0);
        assert_eq!(model.bias(&covariates()), 0.0);
    }
}
