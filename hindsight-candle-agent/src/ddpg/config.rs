//! Configuration of DDPG agent.
use super::{ActorConfig, CriticConfig};
use crate::Device;
use anyhow::Result;
use hindsight_core::{BoxSpace, ExplorerConfig, FeatureEncoderConfig};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

/// How target networks follow the live networks.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub enum TargetUpdate {
    /// Verbatim copy every `interval` update cycles.
    Hard {
        /// Interval in update cycles.
        interval: usize,
    },

    /// `target = (1 - tau) * target + tau * live` after every update cycle.
    Soft {
        /// Blending coefficient.
        tau: f64,
    },
}

impl Default for TargetUpdate {
    fn default() -> Self {
        Self::Soft { tau: 1e-2 }
    }
}

/// Configuration of [`Ddpg`](super::Ddpg).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct DdpgConfig<P, Q> {
    /// Configuration of the actor.
    pub actor_config: ActorConfig<P>,

    /// Configuration of the critic.
    pub critic_config: CriticConfig<Q>,

    /// Configuration of the feature encoder.
    pub encoder_config: FeatureEncoderConfig,

    /// Configuration of the exploration.
    pub explorer_config: ExplorerConfig,

    /// Bounds of actions.
    pub action_space: Option<BoxSpace>,

    /// Discount factor.
    pub gamma: f64,

    /// Batch size of a gradient step.
    pub minibatch_size: usize,

    /// Updates start when the buffer holds this number of transitions.
    pub replay_start_size: usize,

    /// Environment steps between update cycles.
    pub update_interval: usize,

    /// Gradient steps in an update cycle.
    pub n_update_times: usize,

    /// Target synchronization.
    pub target_update: TargetUpdate,

    /// Scale of rewards in Q-targets.
    pub reward_scale: f32,

    /// Max norm of gradients.
    pub max_grad_norm: f64,

    /// Consecutive update cycles with non-finite values before giving up.
    pub max_numeric_failures: usize,

    /// Random seed for parameter initialization and exploration.
    pub seed: u64,

    /// Device for actor/critic models.
    pub device: Option<Device>,
}

impl<P, Q> Default for DdpgConfig<P, Q> {
    fn default() -> Self {
        Self {
            actor_config: Default::default(),
            critic_config: Default::default(),
            encoder_config: Default::default(),
            explorer_config: Default::default(),
            action_space: None,
            gamma: 0.98,
            minibatch_size: 128,
            replay_start_size: 10_000,
            update_interval: 800,
            n_update_times: 40,
            target_update: TargetUpdate::default(),
            reward_scale: 1.0,
            max_grad_norm: 1.0,
            max_numeric_failures: 3,
            seed: 42,
            device: None,
        }
    }
}

impl<P, Q> DdpgConfig<P, Q>
where
    P: Serialize + for<'de> Deserialize<'de>,
    Q: Serialize + for<'de> Deserialize<'de>,
{
    /// Configuration of actor.
    pub fn actor_config(mut self, v: ActorConfig<P>) -> Self {
        self.actor_config = v;
        self
    }

    /// Configuration of critic.
    pub fn critic_config(mut self, v: CriticConfig<Q>) -> Self {
        self.critic_config = v;
        self
    }

    /// Configuration of the feature encoder.
    pub fn encoder_config(mut self, v: FeatureEncoderConfig) -> Self {
        self.encoder_config = v;
        self
    }

    /// Configuration of the exploration.
    pub fn explorer_config(mut self, v: ExplorerConfig) -> Self {
        self.explorer_config = v;
        self
    }

    /// Bounds of actions.
    pub fn action_space(mut self, v: BoxSpace) -> Self {
        self.action_space = Some(v);
        self
    }

    /// Discount factor.
    pub fn discount_factor(mut self, v: f64) -> Self {
        self.gamma = v;
        self
    }

    /// Batch size.
    pub fn minibatch_size(mut self, v: usize) -> Self {
        self.minibatch_size = v;
        self
    }

    /// Warmup size in transitions.
    pub fn replay_start_size(mut self, v: usize) -> Self {
        self.replay_start_size = v;
        self
    }

    /// Interval of update cycles in environment steps.
    pub fn update_interval(mut self, v: usize) -> Self {
        self.update_interval = v;
        self
    }

    /// Gradient steps per update cycle.
    pub fn n_update_times(mut self, v: usize) -> Self {
        self.n_update_times = v;
        self
    }

    /// Target synchronization.
    pub fn target_update(mut self, v: TargetUpdate) -> Self {
        self.target_update = v;
        self
    }

    /// Reward scale.
    pub fn reward_scale(mut self, v: f32) -> Self {
        self.reward_scale = v;
        self
    }

    /// Max norm of gradients.
    pub fn max_grad_norm(mut self, v: f64) -> Self {
        self.max_grad_norm = v;
        self
    }

    /// Consecutive failing update cycles tolerated.
    pub fn max_numeric_failures(mut self, v: usize) -> Self {
        self.max_numeric_failures = v;
        self
    }

    /// Random seed.
    pub fn seed(mut self, v: u64) -> Self {
        self.seed = v;
        self
    }

    /// Device.
    pub fn device(mut self, device: Device) -> Self {
        self.device = Some(device);
        self
    }

    /// Constructs [`DdpgConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`DdpgConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}
