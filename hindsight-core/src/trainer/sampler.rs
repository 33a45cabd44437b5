//! Interaction with the training environment.
use crate::{
    error::HerError,
    record::{Record, RecordValue::Scalar},
    replay_buffer::{HindsightReplayBuffer, Transition},
    Agent, Env, GoalObs,
};
use anyhow::Result;
use log::{trace, warn};

/// Runs environment steps with exploratory actions and hands transitions
/// to the agent.
///
/// An episode ends on termination, on truncation reported by the environment
/// or when the step limit of the environment is reached. Only termination is
/// stored as `done` in transitions.
pub struct Sampler<E: Env> {
    env: E,
    prev_obs: Option<GoalObs>,
    episode_return: f32,
    episode_length: usize,
}

impl<E: Env> Sampler<E> {
    /// Creates a sampler on the given environment.
    pub fn new(env: E) -> Self {
        Self {
            env,
            prev_obs: None,
            episode_return: 0.0,
            episode_length: 0,
        }
    }

    /// The training environment.
    pub fn env(&self) -> &E {
        &self.env
    }

    /// Performs an environment step and passes the transition to `agent`.
    ///
    /// The returned record has `episode_return` and `episode_length` when an
    /// episode ended. A failure of the environment step aborts the current
    /// episode and the next call starts a new one. A violated precondition
    /// such as an out-of-bounds action is returned as an error instead.
    pub fn sample_and_push<A: Agent>(
        &mut self,
        agent: &mut A,
        buffer: &mut HindsightReplayBuffer,
    ) -> Result<Record> {
        let prev_obs = match self.prev_obs.take() {
            Some(obs) => obs,
            None => {
                self.episode_return = 0.0;
                self.episode_length = 0;
                let obs = self.env.reset(None)?;
                self.env.observation_space().check(&obs)?;
                obs
            }
        };

        let act = agent.act(&prev_obs, true)?;
        let (step, mut record) = match self.env.step(&act) {
            Ok(x) => x,
            Err(e) if matches!(e.downcast_ref::<HerError>(), Some(HerError::Precondition(_))) => {
                return Err(e);
            }
            Err(e) => {
                warn!(
                    "Environment step failed, dropping an episode of length {}: {:?}",
                    self.episode_length, e
                );
                agent.abort_episode();
                return Ok(Record::empty());
            }
        };

        self.episode_return += step.reward;
        self.episode_length += 1;
        let limit = self
            .env
            .max_episode_steps()
            .is_some_and(|m| self.episode_length >= m);
        let is_episode_end = step.is_done() || limit;

        let transition = Transition::new(&prev_obs, &act, &step.obs, step.is_terminated);
        agent.observe(transition, is_episode_end, buffer)?;

        if is_episode_end {
            trace!(
                "Episode ended: return = {}, length = {}",
                self.episode_return,
                self.episode_length
            );
            record.insert("episode_return", Scalar(self.episode_return));
            record.insert("episode_length", Scalar(self.episode_length as f32));
        } else {
            self.prev_obs = Some(step.obs);
        }

        Ok(record)
    }
}
