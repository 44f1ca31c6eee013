//! Small descriptive statistics shared by the trainer and the classifier.

use std::f64::consts::PI;

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance (divides by `n`).
pub fn variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// `(min, max)` of the values; `(0, 0)` for an empty slice.
pub fn range(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(*v), hi.max(*v))
        })
}

/// Share of values strictly above `threshold`.
pub fn fraction_above(values: &[f64], threshold: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let hits = values.iter().filter(|v| **v > threshold).count();
    hits as f64 / values.len() as f64
}

#[cfg(test)]
pub(crate) fn gaussian_pdf(x: f64, mean: f64, variance: f64) -> f64 {
    gaussian_log_pdf(x, mean, variance).exp()
}

pub fn gaussian_log_pdf(x: f64, mean: f64, variance: f64) -> f64 {
    -0.5 * (2.0 * PI * variance).ln() - (x - mean).powi(2) / (2.0 * variance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variance_is_population_variance() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&v) - 5.0).abs() < 1e-12);
        assert!((variance(&v) - 4.0).abs() < 1e-12);
    }

    #[test]
    fn range_and_fraction_above() {
        let v = [3.0, -1.0, 8.0, 0.5];
        assert_eq!(range(&v), (-1.0, 8.0));
        assert!((fraction_above(&v, 0.5) - 0.5).abs() < 1e-12);
        assert_eq!(fraction_above(&[], 1.0), 0.0);
    }

    #[test]
    fn standard_normal_density_at_zero() {
        let p = gaussian_pdf(0.0, 0.0, 1.0);
        assert!((p - 1.0 / (2.0 * PI).sqrt()).abs() < 1e-12);
    }
}
