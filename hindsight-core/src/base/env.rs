//! Environment.
use super::{Act, BoxSpace, GoalObs, GoalSpace, Info, Step};
use crate::record::Record;
use anyhow::Result;

/// Reward function `(achieved_goal, desired_goal) -> reward` used for relabeling.
pub type RewardFn = Box<dyn Fn(&[f32], &[f32]) -> f32>;

/// Represents a goal-conditioned environment.
pub trait Env {
    /// Configurations.
    type Config: Clone;

    /// Information in the [`Step`] object.
    type Info: Info;

    /// Builds an environment with a given random seed.
    fn build(config: &Self::Config, seed: i64) -> Result<Self>
    where
        Self: Sized;

    /// Resets the environment.
    ///
    /// If `seed` is given, the random state of the environment is reseeded before
    /// sampling the initial state.
    fn reset(&mut self, seed: Option<u64>) -> Result<GoalObs>;

    /// Performs an environment step.
    ///
    /// An action outside [`Env::action_space`] must be rejected with an error.
    fn step(&mut self, a: &Act) -> Result<(Step<Self>, Record)>
    where
        Self: Sized;

    /// Bounds of the action.
    fn action_space(&self) -> &BoxSpace;

    /// Dimensions of the observation.
    fn observation_space(&self) -> &GoalSpace;

    /// The step limit of an episode, if any.
    fn max_episode_steps(&self) -> Option<usize>;

    /// Computes the reward for reaching `achieved_goal` when pursuing `desired_goal`.
    fn compute_reward(
        &self,
        achieved_goal: &[f32],
        desired_goal: &[f32],
        info: Option<&Self::Info>,
    ) -> f32;

    /// Returns an owned reward function for hindsight relabeling.
    ///
    /// It must agree with [`Env::compute_reward`] called without `info`.
    fn reward_fn(&self) -> RewardFn;
}
