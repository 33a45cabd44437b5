//! Deep deterministic policy gradient (DDPG) agent with hindsight experience replay.
mod actor;
mod base;
mod config;
mod critic;
pub use actor::{Actor, ActorConfig};
pub use base::Ddpg;
pub use config::{DdpgConfig, TargetUpdate};
pub use critic::{Critic, CriticConfig};
