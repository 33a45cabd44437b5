//! Feature encoding of goal-conditioned observations.
//!
//! [`FeatureEncoder`] concatenates the observation and a (possibly relabeled)
//! goal into a single vector and standardizes it with running statistics.
mod normalizer;
use crate::{base::GoalObs, error::HerError};
use anyhow::{Context, Result};
pub use normalizer::RunningNormalizer;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`FeatureEncoder`].
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct FeatureEncoderConfig {
    /// Dimension of the observation without goals.
    pub obs_dim: usize,

    /// Dimension of the goal.
    pub goal_dim: usize,

    /// Normalized features are clipped into `[-clip_threshold, clip_threshold]`.
    pub clip_threshold: f32,

    /// Lower bound of the standard deviation used in normalization.
    pub min_std: f64,
}

impl Default for FeatureEncoderConfig {
    fn default() -> Self {
        Self {
            obs_dim: 0,
            goal_dim: 0,
            clip_threshold: 5.0,
            min_std: 1e-2,
        }
    }
}

impl FeatureEncoderConfig {
    /// Sets the dimensions of the observation and the goal.
    pub fn dims(mut self, obs_dim: usize, goal_dim: usize) -> Self {
        self.obs_dim = obs_dim;
        self.goal_dim = goal_dim;
        self
    }

    /// Sets the clipping threshold of normalized features.
    pub fn clip_threshold(mut self, v: f32) -> Self {
        self.clip_threshold = v;
        self
    }

    /// Sets the lower bound of the standard deviation.
    pub fn min_std(mut self, v: f64) -> Self {
        self.min_std = v;
        self
    }
}

/// Flattens goal-conditioned observations into normalized feature vectors.
///
/// The layout of a feature vector is `[observation, goal]`.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct FeatureEncoder {
    obs_dim: usize,
    goal_dim: usize,
    clip_threshold: f32,
    normalizer: RunningNormalizer,
}

impl FeatureEncoder {
    /// Constructs [`FeatureEncoder`] with empty statistics.
    pub fn new(config: &FeatureEncoderConfig) -> Self {
        Self {
            obs_dim: config.obs_dim,
            goal_dim: config.goal_dim,
            clip_threshold: config.clip_threshold,
            normalizer: RunningNormalizer::new(config.obs_dim + config.goal_dim, config.min_std),
        }
    }

    /// Dimension of feature vectors.
    pub fn dim(&self) -> usize {
        self.obs_dim + self.goal_dim
    }

    /// Concatenates `observation` and `goal`.
    pub fn encode(&self, observation: &[f32], goal: &[f32]) -> Result<Vec<f32>> {
        if observation.len() != self.obs_dim {
            return Err(HerError::Precondition(format!(
                "observation has {} elements, expected {}",
                observation.len(),
                self.obs_dim
            ))
            .into());
        }
        if goal.len() != self.goal_dim {
            return Err(HerError::Precondition(format!(
                "goal has {} elements, expected {}",
                goal.len(),
                self.goal_dim
            ))
            .into());
        }
        Ok(observation.iter().chain(goal.iter()).copied().collect())
    }

    /// Concatenates the observation and the desired goal of `obs`.
    pub fn encode_obs(&self, obs: &GoalObs) -> Result<Vec<f32>> {
        self.encode(&obs.observation, &obs.desired_goal)
    }

    /// Standardizes `x` with the running statistics and clips the result.
    pub fn normalize(&self, x: &[f32]) -> Vec<f32> {
        self.normalizer
            .normalize(x)
            .into_iter()
            .map(|v| v.clamp(-self.clip_threshold, self.clip_threshold))
            .collect()
    }

    /// Folds `x` into the running statistics.
    pub fn update_statistics(&mut self, x: &[f32]) -> Result<()> {
        if x.len() != self.dim() {
            return Err(HerError::Precondition(format!(
                "feature has {} elements, expected {}",
                x.len(),
                self.dim()
            ))
            .into());
        }
        self.normalizer.update(x);
        Ok(())
    }

    /// Returns the running statistics.
    pub fn normalizer(&self) -> &RunningNormalizer {
        &self.normalizer
    }

    /// Saves the encoder including its statistics as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(&path)
            .with_context(|| format!("failed to create {:?}", path.as_ref()))?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }

    /// Loads an encoder saved with [`FeatureEncoder::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file =
            File::open(&path).with_context(|| format!("failed to open {:?}", path.as_ref()))?;
        let rdr = BufReader::new(file);
        Ok(serde_yaml::from_reader(rdr)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    fn encoder() -> FeatureEncoder {
        FeatureEncoder::new(&FeatureEncoderConfig::default().dims(2, 1))
    }

    #[test]
    fn test_encode_order() -> Result<()> {
        let enc = encoder();
        assert_eq!(enc.encode(&[1.0, 2.0], &[3.0])?, vec![1.0, 2.0, 3.0]);

        let obs = GoalObs::new(vec![1.0, 2.0], vec![9.0], vec![3.0]);
        assert_eq!(enc.encode_obs(&obs)?, vec![1.0, 2.0, 3.0]);
        Ok(())
    }

    #[test]
    fn test_malformed_input() {
        let enc = encoder();
        let err = enc.encode(&[1.0, 2.0], &[]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HerError>(),
            Some(HerError::Precondition(_))
        ));
        assert!(enc.encode(&[1.0], &[3.0]).is_err());
        assert!(encoder().update_statistics(&[0.0]).is_err());
    }

    #[test]
    fn test_normalize_and_clip() -> Result<()> {
        let mut enc = encoder();
        for x in [[0.0, 10.0, -1.0], [2.0, 10.0, 1.0], [4.0, 10.0, 0.0]] {
            enc.update_statistics(&x)?;
        }
        let y = enc.normalize(&[2.0, 10.0, 100.0]);

        // mean of the first dimension is 2, so it maps to 0
        assert!(y[0].abs() < 1e-6);
        // constant dimension has zero variance, std falls back to the lower bound
        assert!(y[1].abs() < 1e-6);
        // outliers are clipped
        assert_eq!(y[2], 5.0);
        Ok(())
    }

    #[test]
    fn test_save_load() -> Result<()> {
        let mut enc = encoder();
        enc.update_statistics(&[0.25, -1.5, 3.0])?;
        enc.update_statistics(&[0.5, 1.5, -3.0])?;

        let dir = TempDir::new("encoder")?;
        let path = dir.path().join("encoder.yaml");
        enc.save(&path)?;
        let enc_ = FeatureEncoder::load(&path)?;
        assert_eq!(enc, enc_);
        Ok(())
    }
}
