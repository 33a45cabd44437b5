use crate::util::OutDim;
use serde::{Deserialize, Serialize};

/// Configuration of [`Mlp`](super::Mlp) and [`LnMlp`](super::LnMlp).
///
/// Layer sizes are `in_dim -> units[0] -> ... -> out_dim` with ReLU between
/// hidden layers.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct MlpConfig {
    pub(super) in_dim: usize,
    pub(super) units: Vec<usize>,
    pub(super) out_dim: usize,
    pub(super) activation_out: bool,
}

impl MlpConfig {
    /// Creates configuration of MLP.
    ///
    /// * `activation_out` - If `true`, activation function is added in the final layer.
    pub fn new(in_dim: usize, units: Vec<usize>, out_dim: usize, activation_out: bool) -> Self {
        Self {
            in_dim,
            units,
            out_dim,
            activation_out,
        }
    }

    /// Policy network from features of dimension `feature_dim` to actions.
    ///
    /// The output is unbounded, the actor squashes it into the action box.
    pub fn actor(feature_dim: usize, units: &[usize], act_dim: usize) -> Self {
        Self::new(feature_dim, units.to_vec(), act_dim, false)
    }

    /// Q-function taking features and actions, concatenated, to a scalar value.
    pub fn critic(feature_dim: usize, units: &[usize], act_dim: usize) -> Self {
        Self::new(feature_dim + act_dim, units.to_vec(), 1, false)
    }

    /// Input dimension.
    pub fn in_dim(&self) -> usize {
        self.in_dim
    }

    /// Widths of the hidden layers.
    pub fn units(&self) -> &[usize] {
        &self.units
    }
}

impl OutDim for MlpConfig {
    fn get_out_dim(&self) -> usize {
        self.out_dim
    }

    fn set_out_dim(&mut self, out_dim: usize) {
        self.out_dim = out_dim;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_critic_dims() {
        let actor = MlpConfig::actor(6, &[64, 64, 64], 4);
        assert_eq!((actor.in_dim(), actor.get_out_dim()), (6, 4));
        assert_eq!(actor.units(), &[64, 64, 64]);

        let critic = MlpConfig::critic(6, &[64, 64, 64], 4);
        assert_eq!((critic.in_dim(), critic.get_out_dim()), (10, 1));
    }
}
