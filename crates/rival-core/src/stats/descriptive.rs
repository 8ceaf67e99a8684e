//! Summary statistics and per-user pairing.

use crate::data::Id;
use crate::error::StatsError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Size, mean and sample standard deviation of a distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleStats {
    pub n: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1 denominator); 0 for a single value
    pub std: f64,
}

impl SampleStats {
    /// Summarizes the non-NaN values.
    pub fn from_values(values: &[f64]) -> Result<Self, StatsError> {
        let defined: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        if defined.is_empty() {
            return Err(StatsError::InsufficientData(
                "no defined values to summarize".to_string(),
            ));
        }
        let n = defined.len();
        let mean = defined.iter().sum::<f64>() / n as f64;
        let std = if n > 1 {
            let var = defined.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
            var.sqrt()
        } else {
            0.0
        };
        Ok(Self { n, mean, std })
    }

    /// Sample variance.
    pub fn variance(&self) -> f64 {
        self.std * self.std
    }
}

/// Non-NaN values of a per-user map, in user order.
pub fn defined_values<U: Id>(values: &BTreeMap<U, f64>) -> Vec<f64> {
    values.values().copied().filter(|v| !v.is_nan()).collect()
}

/// Values of the users present (and defined) in both maps, in user order.
pub fn paired_values<U: Id>(
    baseline: &BTreeMap<U, f64>,
    other: &BTreeMap<U, f64>,
) -> (Vec<f64>, Vec<f64>) {
    baseline
        .iter()
        .filter_map(|(user, &b)| {
            let o = *other.get(user)?;
            (!b.is_nan() && !o.is_nan()).then_some((b, o))
        })
        .unzip()
}

/// Element-wise differences `other - baseline`.
pub(crate) fn differences(baseline: &[f64], other: &[f64]) -> Vec<f64> {
    baseline.iter().zip(other).map(|(b, o)| o - b).collect()
}

/// Standard deviation of the paired differences divided by `sqrt(n)`.
pub fn standard_error<U: Id>(
    baseline: &BTreeMap<U, f64>,
    other: &BTreeMap<U, f64>,
) -> Result<f64, StatsError> {
    let (b, o) = paired_values(baseline, other);
    if b.len() < 2 {
        return Err(StatsError::InsufficientData(format!(
            "standard error needs at least 2 paired users, got {}",
            b.len()
        )));
    }
    let stats = SampleStats::from_values(&differences(&b, &o))?;
    Ok(stats.std / (stats.n as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(values: &[(u32, f64)]) -> BTreeMap<u32, f64> {
        values.iter().copied().collect()
    }

    #[test]
    fn test_sample_stats() {
        let stats = SampleStats::from_values(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(stats.n, 8);
        assert!((stats.mean - 5.0).abs() < 1e-9);
        assert!((stats.variance() - 32.0 / 7.0).abs() < 1e-9);
        assert!(SampleStats::from_values(&[f64::NAN]).is_err());
    }

    #[test]
    fn test_paired_values_intersects_and_skips_nan() {
        let a = map(&[(1, 0.1), (2, 0.2), (3, f64::NAN), (4, 0.4)]);
        let b = map(&[(2, 0.3), (3, 0.5), (4, 0.6), (5, 0.9)]);
        let (x, y) = paired_values(&a, &b);
        assert_eq!(x, vec![0.2, 0.4]);
        assert_eq!(y, vec![0.3, 0.6]);
    }

    #[test]
    fn test_standard_error() {
        let a = map(&[(1, 1.0), (2, 2.0), (3, 3.0)]);
        let b = map(&[(1, 2.0), (2, 4.0), (3, 6.0)]);
        // differences 1, 2, 3: sd 1
        let se = standard_error(&a, &b).unwrap();
        assert!((se - 1.0 / 3f64.sqrt()).abs() < 1e-9);

        let single = map(&[(1, 1.0)]);
        assert!(standard_error(&single, &single).is_err());
    }
}
