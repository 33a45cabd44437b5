//! A one-dimensional goal-reaching environment.
//!
//! [`PointGoalEnv`] moves a point on the segment `[-bound, bound]`. At every
//! step the action `a` in `[-1, 1]` displaces the point by `a * action_scale`.
//! The achieved goal is the position of the point and the desired goal is a
//! target position sampled at reset. The reward is sparse: `0` when the point
//! is within `threshold` of the target, `-1` otherwise. Episodes are never
//! terminated, they are truncated after `max_episode_steps` steps.
//!
//! ```rust
//! use hindsight_core::{Act, Env};
//! use hindsight_point_env::{PointGoalEnv, PointGoalEnvConfig};
//!
//! let config = PointGoalEnvConfig::default();
//! let mut env = PointGoalEnv::build(&config, 42).unwrap();
//! let obs = env.reset(None).unwrap();
//! let (step, _) = env.step(&Act(vec![0.5])).unwrap();
//! assert_eq!(step.obs.desired_goal, obs.desired_goal);
//! assert!(!step.is_terminated);
//! ```
mod base;
mod config;
pub use base::{point_goal_reward, PointGoalEnv, PointGoalInfo};
pub use config::PointGoalEnvConfig;
