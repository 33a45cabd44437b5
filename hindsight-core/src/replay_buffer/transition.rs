//! Transitions, episodes and relabeled samples.
use crate::base::{Act, GoalObs};

/// A transition produced by one environment step.
///
/// Rewards are not stored since they depend on the goal that is active
/// when the transition is sampled.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition {
    /// Observation at time `t`.
    pub observation: Vec<f32>,

    /// Achieved goal at time `t`.
    pub achieved_goal: Vec<f32>,

    /// Desired goal during the episode.
    pub desired_goal: Vec<f32>,

    /// Action taken at time `t`.
    pub action: Vec<f32>,

    /// Observation at time `t + 1`.
    pub next_observation: Vec<f32>,

    /// Achieved goal at time `t + 1`.
    pub next_achieved_goal: Vec<f32>,

    /// `true` if the episode terminated at time `t + 1`.
    ///
    /// It is `false` for truncation by a step limit.
    pub done: bool,
}

impl Transition {
    /// Constructs a transition from observations before and after an action.
    pub fn new(obs: &GoalObs, act: &Act, next_obs: &GoalObs, done: bool) -> Self {
        Self {
            observation: obs.observation.clone(),
            achieved_goal: obs.achieved_goal.clone(),
            desired_goal: obs.desired_goal.clone(),
            action: act.0.clone(),
            next_observation: next_obs.observation.clone(),
            next_achieved_goal: next_obs.achieved_goal.clone(),
            done,
        }
    }
}

/// Transitions of a single rollout in temporal order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Episode(Vec<Transition>);

impl Episode {
    /// Creates an empty episode.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Appends a transition.
    pub fn push(&mut self, tr: Transition) {
        self.0.push(tr);
    }

    /// Returns the number of transitions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the episode has no transition.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the transition at time step `i`.
    pub fn get(&self, i: usize) -> Option<&Transition> {
        self.0.get(i)
    }

    /// Returns an iterator over the transitions.
    pub fn iter(&self) -> std::slice::Iter<Transition> {
        self.0.iter()
    }
}

impl From<Vec<Transition>> for Episode {
    fn from(v: Vec<Transition>) -> Self {
        Self(v)
    }
}

/// A transition with the active goal and the reward computed against it.
#[derive(Clone, Debug, PartialEq)]
pub struct RelabeledSample {
    /// Observation at time `t`.
    pub observation: Vec<f32>,

    /// Achieved goal at time `t`.
    pub achieved_goal: Vec<f32>,

    /// Active goal, either the original desired goal or a relabeled one.
    pub desired_goal: Vec<f32>,

    /// Action taken at time `t`.
    pub action: Vec<f32>,

    /// Observation at time `t + 1`.
    pub next_observation: Vec<f32>,

    /// Achieved goal at time `t + 1`.
    pub next_achieved_goal: Vec<f32>,

    /// Reward for `next_achieved_goal` under `desired_goal`.
    pub reward: f32,

    /// Terminal flag of the transition.
    pub done: bool,

    /// Time step `t` of the transition in its episode.
    pub time_step: usize,

    /// Time step whose achieved goal became the active goal, if relabeled.
    pub goal_time_step: Option<usize>,
}

impl RelabeledSample {
    /// Returns `true` if the desired goal was replaced.
    pub fn is_relabeled(&self) -> bool {
        self.goal_time_step.is_some()
    }
}
