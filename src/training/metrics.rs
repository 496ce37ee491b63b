//! Calibration metrics

/// Games excluded from the error metric while ratings are still settling
pub const BURN_IN: usize = 256;

/// Residuals after the burn-in window
pub fn post_burn_in<I>(residuals: I) -> impl Iterator<Item = f64>
where
    I: IntoIterator<Item = f64>,
{
    residuals.into_iter().skip(BURN_IN)
}

/// Root-mean-square of the residuals after burn-in, or `None` when the
/// burn-in window consumes every game
pub fn rms_error<I>(residuals: I) -> Option<f64>
where
    I: IntoIterator<Item = f64>,
{
    let (count, sum_sq) =
        post_burn_in(residuals).fold((0usize, 0.0f64), |(n, s), r| (n + 1, s + r * r));
    if count == 0 {
        None
    } else {
        Some((sum_sq / count as f64).sqrt())
    }
}

/// Objective value for the search; a run with no scored games is worst
pub fn loss(rms: Option<f64>) -> f64 {
    match rms {
        Some(v) if v.is_finite() => v,
        _ => f64::INFINITY,
    }
}
