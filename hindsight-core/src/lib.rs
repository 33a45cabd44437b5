#![warn(missing_docs)]
//! Core components of goal-conditioned reinforcement learning with
//! hindsight experience replay.
//!
//! * [`Env`], [`Policy`] and [`Agent`] - Interfaces of environments and agents
//! * [`FeatureEncoder`] - Feature vectors of observations and goals with running normalization
//! * [`HerExplorer`] - Epsilon-greedy exploration with Gaussian noise
//! * [`HindsightReplayBuffer`] - Episode storage with goal relabeling
//! * [`Trainer`] - Training loop with periodic evaluation
pub mod dummy;
pub mod encoder;
pub mod error;
pub mod record;
pub mod replay_buffer;

mod base;
pub use base::{
    Act, Agent, BoxSpace, Configurable, Env, GoalObs, GoalSpace, Info, Policy, RewardFn, Step,
};

mod explorer;
pub use explorer::{ExplorerConfig, HerExplorer};

mod evaluator;
pub use evaluator::{DefaultEvaluator, EvalStats, Evaluator};

mod trainer;
pub use trainer::{Sampler, Trainer, TrainerConfig};

pub use encoder::{FeatureEncoder, FeatureEncoderConfig};
pub use replay_buffer::{HerReplayBufferConfig, HindsightReplayBuffer};
