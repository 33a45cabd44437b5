//! Agent.
use super::Policy;
use crate::{
    record::Record,
    replay_buffer::{HindsightReplayBuffer, Transition},
};
use anyhow::Result;
use std::path::Path;

/// Represents a trainable policy on a goal-conditioned environment.
pub trait Agent: Policy {
    /// Set the policy to training mode.
    fn train(&mut self);

    /// Set the policy to evaluation mode.
    fn eval(&mut self);

    /// Return if it is in training mode.
    fn is_train(&self) -> bool;

    /// Records a transition of the current episode.
    ///
    /// When `is_episode_end` is `true`, the episode is pushed into `buffer`.
    fn observe(
        &mut self,
        transition: Transition,
        is_episode_end: bool,
        buffer: &mut HindsightReplayBuffer,
    ) -> Result<()>;

    /// Discards the transitions of the current episode.
    fn abort_episode(&mut self);

    /// Performs an update cycle if the agent is eligible for it.
    ///
    /// Returns `None` when no update was done.
    fn update_if_ready(&mut self, buffer: &mut HindsightReplayBuffer) -> Result<Option<Record>>;

    /// Save the parameters of the agent in the given directory.
    fn save_params(&self, path: &Path) -> Result<()>;

    /// Load the parameters of the agent from the given directory.
    fn load_params(&mut self, path: &Path) -> Result<()>;
}
