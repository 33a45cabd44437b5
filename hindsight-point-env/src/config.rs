//! Configuration of [`PointGoalEnv`](super::PointGoalEnv).
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`PointGoalEnv`](super::PointGoalEnv).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct PointGoalEnvConfig {
    /// Number of steps after which an episode is truncated.
    pub max_episode_steps: usize,

    /// The goal is reached when the distance to the target is below this value.
    pub threshold: f32,

    /// Displacement of the point for the action `1.0`.
    pub action_scale: f32,

    /// Positions and targets lie in `[-bound, bound]`.
    pub bound: f32,
}

impl Default for PointGoalEnvConfig {
    fn default() -> Self {
        Self {
            max_episode_steps: 10,
            threshold: 0.05,
            action_scale: 0.3,
            bound: 1.0,
        }
    }
}

impl PointGoalEnvConfig {
    /// Sets the step limit of an episode.
    pub fn max_episode_steps(mut self, v: usize) -> Self {
        self.max_episode_steps = v;
        self
    }

    /// Sets the success threshold.
    pub fn threshold(mut self, v: f32) -> Self {
        self.threshold = v;
        self
    }

    /// Sets the displacement per unit action.
    pub fn action_scale(mut self, v: f32) -> Self {
        self.action_scale = v;
        self
    }

    /// Sets the bound of positions.
    pub fn bound(mut self, v: f32) -> Self {
        self.bound = v;
        self
    }

    /// Constructs [`PointGoalEnvConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`PointGoalEnvConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
