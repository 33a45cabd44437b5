//! Core functionalities.
mod agent;
mod env;
mod obs;
mod policy;
mod space;
mod step;
pub use agent::Agent;
pub use env::{Env, RewardFn};
pub use obs::{Act, GoalObs};
pub use policy::{Configurable, Policy};
pub use space::{BoxSpace, GoalSpace};
pub use step::{Info, Step};
