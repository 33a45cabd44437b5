//! Configuration of [`Trainer`](super::Trainer).
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// Configuration of [`Trainer`](super::Trainer).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct TrainerConfig {
    /// The number of environment steps for training.
    pub max_steps: usize,

    /// Interval of evaluation in environment steps.
    pub eval_interval: usize,

    /// The number of episodes in an evaluation.
    pub eval_n_runs: usize,

    /// Random seed of the training environment.
    pub seed: i64,

    /// Where to save the trained model.
    pub model_dir: Option<String>,

    /// Interval of saving model parameters in environment steps.
    pub save_interval: usize,

    /// Interval of flushing records in environment steps.
    pub flush_record_interval: usize,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            max_steps: 0,
            eval_interval: 100_000,
            eval_n_runs: 100,
            seed: 0,
            model_dir: None,
            save_interval: usize::MAX,
            flush_record_interval: 1000,
        }
    }
}

impl TrainerConfig {
    /// Sets the number of environment steps.
    pub fn max_steps(mut self, v: usize) -> Self {
        self.max_steps = v;
        self
    }

    /// Sets the interval of evaluation in environment steps.
    pub fn eval_interval(mut self, v: usize) -> Self {
        self.eval_interval = v;
        self
    }

    /// Sets the number of episodes in an evaluation.
    pub fn eval_n_runs(mut self, v: usize) -> Self {
        self.eval_n_runs = v;
        self
    }

    /// Sets the random seed.
    pub fn seed(mut self, v: i64) -> Self {
        self.seed = v;
        self
    }

    /// Sets the directory the trained model being saved.
    pub fn model_dir<T: Into<String>>(mut self, model_dir: T) -> Self {
        self.model_dir = Some(model_dir.into());
        self
    }

    /// Sets the interval of saving in environment steps.
    pub fn save_interval(mut self, v: usize) -> Self {
        self.save_interval = v;
        self
    }

    /// Sets the interval of flushing records in environment steps.
    pub fn flush_record_interval(mut self, v: usize) -> Self {
        self.flush_record_interval = v;
        self
    }

    /// Random seed of the evaluation environment, `u32::MAX - seed`.
    pub fn eval_seed(&self) -> i64 {
        u32::MAX as i64 - self.seed
    }

    /// Constructs [`TrainerConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`TrainerConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
