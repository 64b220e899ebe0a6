//! Descriptive statistics shared by the relevance ranking and the offline
//! statistics table.
//!
//! Z-scores are taken over fact *rows*: a (property, value) pair seen `n` times
//! contributes `n` observations of its measure. Standard deviations are sample
//! deviations (n − 1). A group with no spread yields z = 0, never NaN.

pub mod global;

pub use global::{GlobalStatEntry, GlobalStatistics};

/// Shannon entropy in bits of the distribution given by occurrence counts.
///
/// A single observed value has entropy exactly 0.
pub fn entropy(counts: impl IntoIterator<Item = usize>) -> f64 {
    let counts: Vec<usize> = counts.into_iter().filter(|&c| c > 0).collect();
    let total: usize = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;
    counts
        .into_iter()
        .map(|c| {
            let p = c as f64 / total;
            p * (1.0 / p).log2()
        })
        .sum()
}

/// Mean and sample standard deviation of a row-weighted sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Moments {
    pub mean: f64,
    /// `None` when fewer than two rows make the deviation undefined.
    pub std_dev: Option<f64>,
}

impl Moments {
    /// Moments of `(value, rows)` observations, each value repeated `rows` times.
    pub fn weighted(observations: impl IntoIterator<Item = (f64, usize)>) -> Self {
        let observations: Vec<(f64, usize)> = observations.into_iter().collect();
        let n: usize = observations.iter().map(|&(_, w)| w).sum();
        if n == 0 {
            return Self {
                mean: 0.0,
                std_dev: None,
            };
        }
        let mean = observations.iter().map(|&(x, w)| x * w as f64).sum::<f64>() / n as f64;
        let std_dev = (n > 1).then(|| {
            let ss: f64 = observations
                .iter()
                .map(|&(x, w)| (x - mean).powi(2) * w as f64)
                .sum();
            (ss / (n - 1) as f64).sqrt()
        });
        Self { mean, std_dev }
    }

    /// Moments of unweighted observations.
    pub fn of(values: impl IntoIterator<Item = f64>) -> Self {
        Self::weighted(values.into_iter().map(|x| (x, 1)))
    }

    /// Standard score of `x`; 0 when the deviation is zero or undefined.
    pub fn zscore(&self, x: f64) -> f64 {
        zscore(x, self.mean, self.std_dev.unwrap_or(0.0))
    }
}

/// `(x − mean) / std_dev`, defined as 0 when `std_dev` is zero or not finite.
pub fn zscore(x: f64, mean: f64, std_dev: f64) -> f64 {
    // Float noise around a constant group must still count as zero variance.
    if !std_dev.is_finite() || std_dev <= f64::EPSILON * mean.abs().max(1.0) {
        return 0.0;
    }
    let z = (x - mean) / std_dev;
    if z.is_finite() { z } else { 0.0 }
}
