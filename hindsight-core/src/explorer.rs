//! Exploration for continuous actions.
use crate::{base::BoxSpace, error::HerError};
use anyhow::Result;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

/// Configuration of [`HerExplorer`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct ExplorerConfig {
    /// Probability of taking a uniformly random action.
    pub epsilon: f64,

    /// Standard deviation of the Gaussian noise, relative to the maximum action.
    pub noise_std: f64,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.2,
            noise_std: 0.05,
        }
    }
}

impl ExplorerConfig {
    /// Sets the probability of random actions.
    pub fn epsilon(mut self, v: f64) -> Self {
        self.epsilon = v;
        self
    }

    /// Sets the relative standard deviation of the Gaussian noise.
    pub fn noise_std(mut self, v: f64) -> Self {
        self.noise_std = v;
        self
    }
}

/// Epsilon-greedy random actions combined with additive Gaussian noise.
///
/// With probability `epsilon` a uniformly random action is taken. Otherwise the
/// greedy action is perturbed with `N(0, (noise_std * max_action)^2)` noise on each
/// dimension. In both cases the result is clipped into `[-max_action, max_action]`,
/// where `max_action` is the largest absolute bound of the action space.
///
/// The schedule is flat: `epsilon` and `noise_std` do not change over time.
#[derive(Debug, Clone)]
pub struct HerExplorer {
    epsilon: f64,
    noise_std: f64,
    max_action: f32,
    action_space: BoxSpace,
}

impl HerExplorer {
    /// Constructs [`HerExplorer`].
    pub fn new(config: &ExplorerConfig, action_space: BoxSpace) -> Result<Self> {
        if !(0.0..=1.0).contains(&config.epsilon) {
            return Err(HerError::Precondition(format!(
                "epsilon must be in [0, 1], got {}",
                config.epsilon
            ))
            .into());
        }
        if !(config.noise_std >= 0.0) {
            return Err(HerError::Precondition(format!(
                "noise_std must be non-negative, got {}",
                config.noise_std
            ))
            .into());
        }

        Ok(Self {
            epsilon: config.epsilon,
            noise_std: config.noise_std,
            max_action: action_space.max_abs(),
            action_space,
        })
    }

    /// Standard deviation of the noise in action units.
    pub fn std(&self) -> f64 {
        self.noise_std * self.max_action as f64
    }

    /// Returns an exploratory action.
    ///
    /// `greedy_action_func` is called only when the random branch is not taken.
    /// The time step `_t` does not affect the result.
    pub fn select_action<F, R>(
        &self,
        _t: usize,
        greedy_action_func: F,
        rng: &mut R,
    ) -> Result<Vec<f32>>
    where
        F: FnOnce() -> Result<Vec<f32>>,
        R: Rng,
    {
        let a = if rng.gen_bool(self.epsilon) {
            self.action_space.sample(rng)
        } else {
            let mut a = greedy_action_func()?;
            if self.std() > 0.0 {
                let normal = Normal::new(0.0, self.std())?;
                for v in a.iter_mut() {
                    *v += normal.sample(rng) as f32;
                }
            }
            a
        };

        Ok(a.into_iter()
            .map(|v| v.clamp(-self.max_action, self.max_action))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};
    use std::cell::Cell;

    fn space() -> BoxSpace {
        BoxSpace::symmetric(2, 1.0)
    }

    #[test]
    fn test_random_actions_ignore_greedy() -> Result<()> {
        let explorer = HerExplorer::new(&ExplorerConfig::default().epsilon(1.0), space())?;
        let mut rng = StdRng::seed_from_u64(0);
        let n_calls = Cell::new(0);
        let mut sum = [0f32; 2];

        for t in 0..1000 {
            let a = explorer.select_action(
                t,
                || {
                    n_calls.set(n_calls.get() + 1);
                    Ok(vec![0.9, 0.9])
                },
                &mut rng,
            )?;
            assert!(a.iter().all(|v| (-1.0..=1.0).contains(v)));
            sum[0] += a[0];
            sum[1] += a[1];
        }

        assert_eq!(n_calls.get(), 0);
        // uniform on [-1, 1] has mean 0, far from the greedy action 0.9
        assert!((sum[0] / 1000.0).abs() < 0.1);
        assert!((sum[1] / 1000.0).abs() < 0.1);
        Ok(())
    }

    #[test]
    fn test_no_exploration_returns_clipped_greedy() -> Result<()> {
        let config = ExplorerConfig::default().epsilon(0.0).noise_std(0.0);
        let explorer = HerExplorer::new(&config, space())?;
        let mut rng = StdRng::seed_from_u64(0);

        for t in 0..10 {
            let a = explorer.select_action(t, || Ok(vec![2.0, -0.25]), &mut rng)?;
            assert_eq!(a, vec![1.0, -0.25]);
        }
        Ok(())
    }

    #[test]
    fn test_noise_scaled_by_max_action() -> Result<()> {
        let config = ExplorerConfig::default().epsilon(0.0).noise_std(0.1);
        let explorer = HerExplorer::new(&config, BoxSpace::symmetric(1, 2.0))?;
        let mut rng = StdRng::seed_from_u64(1);
        let mut xs = vec![];
        for t in 0..4000 {
            xs.push(explorer.select_action(t, || Ok(vec![0.0]), &mut rng)?[0]);
        }

        let n = xs.len() as f32;
        let mean = xs.iter().sum::<f32>() / n;
        let std = (xs.iter().map(|x| (x - mean).powi(2)).sum::<f32>() / n).sqrt();
        assert!(mean.abs() < 0.02);
        assert!((std - 0.2).abs() < 0.02);
        Ok(())
    }

    #[test]
    fn test_invalid_config() {
        assert!(HerExplorer::new(&ExplorerConfig::default().epsilon(1.5), space()).is_err());
        assert!(HerExplorer::new(&ExplorerConfig::default().noise_std(-0.1), space()).is_err());
    }

    #[test]
    fn test_deterministic_given_seed() -> Result<()> {
        let explorer = HerExplorer::new(&ExplorerConfig::default(), space())?;
        let run = |seed| -> Result<Vec<Vec<f32>>> {
            let mut rng = StdRng::seed_from_u64(seed);
            (0..20)
                .map(|t| explorer.select_action(t, || Ok(vec![0.1, 0.2]), &mut rng))
                .collect()
        };
        assert_eq!(run(7)?, run(7)?);
        Ok(())
    }
}
