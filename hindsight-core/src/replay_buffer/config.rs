//! Configuration of [`HindsightReplayBuffer`](super::HindsightReplayBuffer).
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`HindsightReplayBuffer`](super::HindsightReplayBuffer).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct HerReplayBufferConfig {
    /// Maximum number of stored transitions.
    pub capacity: usize,

    /// Ratio of relabeled to original goals in sampled transitions.
    pub future_k: usize,

    /// Random seed for sampling.
    pub seed: u64,
}

impl Default for HerReplayBufferConfig {
    fn default() -> Self {
        Self {
            capacity: 1_000_000,
            future_k: 4,
            seed: 42,
        }
    }
}

impl HerReplayBufferConfig {
    /// Sets the capacity in transitions.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the relabeling ratio.
    pub fn future_k(mut self, future_k: usize) -> Self {
        self.future_k = future_k;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Probability of relabeling a sampled transition.
    pub fn future_prob(&self) -> f64 {
        self.future_k as f64 / (self.future_k as f64 + 1.0)
    }

    /// Constructs [`HerReplayBufferConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`HerReplayBufferConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_config() -> Result<()> {
        let config = HerReplayBufferConfig::default()
            .capacity(500)
            .future_k(2)
            .seed(3);
        let dir = TempDir::new("her_replay_buffer_config")?;
        let path = dir.path().join("config.yaml");
        config.save(&path)?;
        assert_eq!(config, HerReplayBufferConfig::load(&path)?);
        assert!((config.future_prob() - 2.0 / 3.0).abs() < 1e-12);
        Ok(())
    }
}
