//! Goal-conditioned DDPG agent implemented with [candle](https://crates.io/crates/candle-core).
pub mod ddpg;
pub mod mlp;
pub mod model;
pub mod opt;
pub mod util;
use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq, Default)]
/// Device for using candle.
///
/// This enum is added because [`candle_core::Device`] does not support serialization.
pub enum Device {
    /// The main CPU device.
    #[default]
    Cpu,

    /// The main GPU device.
    Cuda(usize),
}

impl Device {
    /// Returns the corresponding [`candle_core::Device`].
    pub fn to_candle(self) -> Result<candle_core::Device> {
        match self {
            Self::Cpu => Ok(candle_core::Device::Cpu),
            Self::Cuda(n) => Ok(candle_core::Device::new_cuda(n)?),
        }
    }
}
