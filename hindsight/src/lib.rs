//! Goal-conditioned reinforcement learning with hindsight experience replay.
//!
//! This crate is a collection of the following crates:
//!
//! * [hindsight-core](hindsight_core) provides traits of environments and agents,
//!   the feature encoder, the exploration policy, the hindsight replay buffer and
//!   the training loop.
//! * [hindsight-candle-agent](hindsight_candle_agent) includes a DDPG agent based on
//!   [candle](https://crates.io/crates/candle-core).
//! * [hindsight-point-env](hindsight_point_env) is a one-dimensional goal-reaching
//!   environment.
//! * [hindsight-tensorboard](hindsight_tensorboard) has `TensorboardRecorder`, writing
//!   records which can be shown in TensorBoard.
//!
//! The example `her_point_goal` trains and evaluates an agent on the point
//! environment.
pub mod util;
pub use hindsight_candle_agent as candle_agent;
pub use hindsight_core as core;
pub use hindsight_point_env as point_env;
pub use hindsight_tensorboard as tensorboard;
