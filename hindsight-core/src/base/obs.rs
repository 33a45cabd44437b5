//! Observations and actions of goal-conditioned environments.
use serde::{Deserialize, Serialize};

/// Observation of a goal-conditioned environment.
///
/// This is the counterpart of a dictionary observation having the keys
/// `observation`, `achieved_goal` and `desired_goal`.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct GoalObs {
    /// State of the environment, excluding goals.
    pub observation: Vec<f32>,

    /// Goal actually reached in the current state.
    pub achieved_goal: Vec<f32>,

    /// Goal the agent is pursuing.
    pub desired_goal: Vec<f32>,
}

impl GoalObs {
    /// Constructs a [`GoalObs`].
    pub fn new(observation: Vec<f32>, achieved_goal: Vec<f32>, desired_goal: Vec<f32>) -> Self {
        Self {
            observation,
            achieved_goal,
            desired_goal,
        }
    }
}

/// Continuous action.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Act(pub Vec<f32>);

impl Act {
    /// Returns the number of action dimensions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the action has no dimension.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the action as a slice.
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

impl From<Vec<f32>> for Act {
    fn from(v: Vec<f32>) -> Self {
        Self(v)
    }
}

impl From<Act> for Vec<f32> {
    fn from(act: Act) -> Self {
        act.0
    }
}
