//! Policy.
use super::{Act, GoalObs};
use anyhow::Result;
use serde::de::DeserializeOwned;
use std::path::Path;

/// A policy on a goal-conditioned environment.
pub trait Policy {
    /// Selects an action given an observation.
    ///
    /// If `exploration` is `true`, the action is perturbed for exploration.
    /// Otherwise the greedy action is returned.
    fn act(&mut self, obs: &GoalObs, exploration: bool) -> Result<Act>;
}

/// A configurable object.
pub trait Configurable {
    /// Configuration.
    type Config: Clone + DeserializeOwned;

    /// Builds the object.
    fn build(config: Self::Config) -> Result<Self>
    where
        Self: Sized;

    /// Build the object with the configuration in the yaml file of the given path.
    fn build_from_path(path: impl AsRef<Path>) -> Result<Self>
    where
        Self: Sized,
    {
        let file = std::fs::File::open(path)?;
        let rdr = std::io::BufReader::new(file);
        let config = serde_yaml::from_reader(rdr)?;
        Self::build(config)
    }
}
