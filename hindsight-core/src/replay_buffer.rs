//! Replay buffer with hindsight goal relabeling.
//!
//! Episodes are stored whole. Sampling picks an episode and a time step
//! uniformly and, with probability `future_k / (future_k + 1)`, replaces the
//! desired goal with a goal achieved at the same or a later time step of the
//! episode. Rewards are recomputed at sampling time against the active goal.
mod base;
mod config;
mod transition;
pub use base::HindsightReplayBuffer;
pub use config::HerReplayBufferConfig;
pub use transition::{Episode, RelabeledSample, Transition};
