//! Action and observation spaces.
use super::GoalObs;
use crate::error::HerError;
use anyhow::Result;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Box-shaped continuous space given by element-wise bounds.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct BoxSpace {
    low: Vec<f32>,
    high: Vec<f32>,
}

impl BoxSpace {
    /// Constructs a [`BoxSpace`].
    ///
    /// `low` and `high` must have the same length and `low[i] <= high[i]`.
    pub fn new(low: Vec<f32>, high: Vec<f32>) -> Result<Self> {
        if low.len() != high.len() {
            return Err(HerError::Precondition(format!(
                "bounds of different lengths: {} and {}",
                low.len(),
                high.len()
            ))
            .into());
        }
        if low.iter().zip(high.iter()).any(|(l, h)| !(l <= h)) {
            return Err(HerError::Precondition(format!(
                "lower bound exceeds upper bound: {:?} > {:?}",
                low, high
            ))
            .into());
        }
        Ok(Self { low, high })
    }

    /// Constructs a space `[-bound, bound]^dim`.
    pub fn symmetric(dim: usize, bound: f32) -> Self {
        Self {
            low: vec![-bound.abs(); dim],
            high: vec![bound.abs(); dim],
        }
    }

    /// Returns the dimension of the space.
    pub fn dim(&self) -> usize {
        self.low.len()
    }

    /// Lower bounds.
    pub fn low(&self) -> &[f32] {
        &self.low
    }

    /// Upper bounds.
    pub fn high(&self) -> &[f32] {
        &self.high
    }

    /// Returns the largest absolute bound over all dimensions.
    pub fn max_abs(&self) -> f32 {
        self.low
            .iter()
            .chain(self.high.iter())
            .fold(0f32, |m, v| m.max(v.abs()))
    }

    /// Returns `true` if `x` lies in the space.
    pub fn contains(&self, x: &[f32]) -> bool {
        x.len() == self.dim()
            && x
                .iter()
                .zip(self.low.iter().zip(self.high.iter()))
                .all(|(v, (l, h))| l <= v && v <= h)
    }

    /// Clips `x` into the space element-wise.
    pub fn clip(&self, x: &[f32]) -> Vec<f32> {
        x.iter()
            .zip(self.low.iter().zip(self.high.iter()))
            .map(|(v, (l, h))| v.max(*l).min(*h))
            .collect()
    }

    /// Samples a point uniformly.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Vec<f32> {
        self.low
            .iter()
            .zip(self.high.iter())
            .map(|(l, h)| rng.gen_range(*l..=*h))
            .collect()
    }
}

/// Dimensions of the named sub-spaces of a goal-conditioned observation.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct GoalSpace {
    /// Dimension of `observation`.
    pub observation: usize,

    /// Dimension of `achieved_goal`.
    pub achieved_goal: usize,

    /// Dimension of `desired_goal`.
    pub desired_goal: usize,
}

impl GoalSpace {
    /// Constructs a [`GoalSpace`] where achieved and desired goals share a dimension.
    pub fn new(observation: usize, goal: usize) -> Self {
        Self {
            observation,
            achieved_goal: goal,
            desired_goal: goal,
        }
    }

    /// Checks that all fields of `obs` have the declared dimensions.
    pub fn check(&self, obs: &GoalObs) -> Result<()> {
        for (name, expected, actual) in [
            ("observation", self.observation, obs.observation.len()),
            ("achieved_goal", self.achieved_goal, obs.achieved_goal.len()),
            ("desired_goal", self.desired_goal, obs.desired_goal.len()),
        ] {
            if expected != actual {
                return Err(HerError::Precondition(format!(
                    "field `{}` has {} elements, expected {}",
                    name, actual, expected
                ))
                .into());
            }
        }
        Ok(())
    }
}
