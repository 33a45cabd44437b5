//! Running mean and variance with Welford's algorithm.
use serde::{Deserialize, Serialize};

/// Per-dimension running mean and variance.
///
/// Statistics are updated incrementally and never reset.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct RunningNormalizer {
    count: u64,
    mean: Vec<f64>,
    // sum of squared deviations from the mean
    m2: Vec<f64>,
    min_std: f64,
}

impl RunningNormalizer {
    /// Creates statistics for `dim`-dimensional vectors.
    pub fn new(dim: usize, min_std: f64) -> Self {
        Self {
            count: 0,
            mean: vec![0.0; dim],
            m2: vec![0.0; dim],
            min_std,
        }
    }

    /// Number of samples seen so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Running mean.
    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    /// Population variance of the samples seen so far.
    pub fn var(&self) -> Vec<f64> {
        match self.count {
            0 => vec![0.0; self.m2.len()],
            n => self.m2.iter().map(|m2| m2 / n as f64).collect(),
        }
    }

    /// Folds a sample into the statistics.
    pub fn update(&mut self, x: &[f32]) {
        self.count += 1;
        let n = self.count as f64;
        for ((mean, m2), x) in self.mean.iter_mut().zip(self.m2.iter_mut()).zip(x.iter()) {
            let x = *x as f64;
            let delta = x - *mean;
            *mean += delta / n;
            *m2 += delta * (x - *mean);
        }
    }

    /// Standard deviation used for normalization, bounded below by `min_std`.
    ///
    /// It is 1 until two samples have been seen.
    pub fn std(&self) -> Vec<f64> {
        if self.count < 2 {
            return vec![1.0; self.mean.len()];
        }
        self.var()
            .into_iter()
            .map(|v| v.sqrt().max(self.min_std))
            .collect()
    }

    /// Returns `(x - mean) / std`.
    pub fn normalize(&self, x: &[f32]) -> Vec<f32> {
        x.iter()
            .zip(self.mean.iter().zip(self.std()))
            .map(|(x, (m, s))| ((*x as f64 - m) / s) as f32)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welford_matches_batch_statistics() {
        let xs: Vec<[f32; 2]> = (0..100)
            .map(|i| [i as f32 * 0.37 - 5.0, ((i * 7) % 13) as f32])
            .collect();
        let mut norm = RunningNormalizer::new(2, 1e-2);
        for x in xs.iter() {
            norm.update(x);
        }

        for d in 0..2 {
            let n = xs.len() as f64;
            let mean = xs.iter().map(|x| x[d] as f64).sum::<f64>() / n;
            let var = xs.iter().map(|x| (x[d] as f64 - mean).powi(2)).sum::<f64>() / n;
            assert!((norm.mean()[d] - mean).abs() < 1e-9);
            assert!((norm.var()[d] - var).abs() < 1e-9);
        }
        assert_eq!(norm.count(), 100);
    }

    #[test]
    fn test_identity_before_two_samples() {
        let norm = RunningNormalizer::new(2, 1e-2);
        assert_eq!(norm.normalize(&[1.5, -2.0]), vec![1.5, -2.0]);
    }
}
