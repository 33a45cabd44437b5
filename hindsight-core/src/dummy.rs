//! Environment and agent used for tests.
use crate::{
    error::HerError,
    record::Record,
    replay_buffer::{Episode, HindsightReplayBuffer, Transition},
    Act, Agent, BoxSpace, Env, GoalObs, GoalSpace, Policy, RewardFn, Step,
};
use anyhow::{anyhow, Result};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{fs, path::Path};

/// Configuration of [`DummyEnv`].
#[derive(Clone, Debug)]
pub struct DummyEnvConfig {
    /// Step limit of an episode.
    pub max_steps: usize,

    /// The environment fails once at this total step count.
    pub fail_at: Option<usize>,

    /// If `false`, steps never set `is_truncated` and only
    /// [`Env::max_episode_steps`] bounds an episode.
    pub report_truncation: bool,
}

impl Default for DummyEnvConfig {
    fn default() -> Self {
        Self {
            max_steps: 5,
            fail_at: None,
            report_truncation: true,
        }
    }
}

/// One-dimensional goal environment.
pub struct DummyEnv {
    config: DummyEnvConfig,
    pos: f32,
    goal: f32,
    t: usize,
    total_steps: usize,
    rng: StdRng,
    action_space: BoxSpace,
    observation_space: GoalSpace,
}

impl DummyEnv {
    fn obs(&self) -> GoalObs {
        GoalObs::new(vec![self.pos], vec![self.pos], vec![self.goal])
    }
}

fn dummy_reward(achieved_goal: &[f32], desired_goal: &[f32]) -> f32 {
    match (achieved_goal[0] - desired_goal[0]).abs() < 0.1 {
        true => 0.0,
        false => -1.0,
    }
}

impl Env for DummyEnv {
    type Config = DummyEnvConfig;
    type Info = ();

    fn build(config: &Self::Config, seed: i64) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            pos: 0.0,
            goal: 0.0,
            t: 0,
            total_steps: 0,
            rng: StdRng::seed_from_u64(seed as u64),
            action_space: BoxSpace::symmetric(1, 1.0),
            observation_space: GoalSpace::new(1, 1),
        })
    }

    fn reset(&mut self, seed: Option<u64>) -> Result<GoalObs> {
        if let Some(seed) = seed {
            self.rng = StdRng::seed_from_u64(seed);
        }
        self.pos = 0.0;
        self.goal = self.rng.gen_range(-1.0..1.0);
        self.t = 0;
        Ok(self.obs())
    }

    fn step(&mut self, a: &Act) -> Result<(Step<Self>, Record)> {
        self.total_steps += 1;
        if self.config.fail_at == Some(self.total_steps) {
            return Err(anyhow!("Simulated failure at step {}", self.total_steps));
        }
        if !self.action_space.contains(a.as_slice()) {
            return Err(HerError::Precondition(format!("Action out of bounds: {:?}", a)).into());
        }

        self.pos = (self.pos + 0.1 * a.0[0]).clamp(-1.0, 1.0);
        self.t += 1;
        let obs = self.obs();
        let reward = self.compute_reward(&obs.achieved_goal, &obs.desired_goal, None);
        let is_truncated = self.config.report_truncation && self.t >= self.config.max_steps;
        let step = Step::new(obs, a.clone(), reward, false, is_truncated, ());
        Ok((step, Record::empty()))
    }

    fn action_space(&self) -> &BoxSpace {
        &self.action_space
    }

    fn observation_space(&self) -> &GoalSpace {
        &self.observation_space
    }

    fn max_episode_steps(&self) -> Option<usize> {
        Some(self.config.max_steps)
    }

    fn compute_reward(
        &self,
        achieved_goal: &[f32],
        desired_goal: &[f32],
        _info: Option<&()>,
    ) -> f32 {
        dummy_reward(achieved_goal, desired_goal)
    }

    fn reward_fn(&self) -> RewardFn {
        Box::new(dummy_reward)
    }
}

/// Agent taking uniformly random actions, or [`DummyAgent::action`] if set.
///
/// It keeps counters of the calls from the training loop.
pub struct DummyAgent {
    rng: StdRng,
    train: bool,
    episode: Episode,

    /// Number of observed transitions.
    pub n_observed: usize,

    /// Terminal flags of observed transitions.
    pub dones: Vec<bool>,

    /// Number of aborted episodes.
    pub n_aborted: usize,

    /// Number of update cycles.
    pub n_updates: usize,

    /// Lengths of the episodes ended by the training loop.
    pub episode_lengths: Vec<usize>,

    /// Minimum number of stored transitions before updates.
    pub replay_start_size: usize,

    /// Action taken at every step instead of a random one.
    pub action: Option<f32>,
}

impl DummyAgent {
    /// Constructs the agent.
    pub fn new(seed: u64, replay_start_size: usize) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            train: false,
            episode: Episode::new(),
            n_observed: 0,
            dones: Vec::new(),
            n_aborted: 0,
            n_updates: 0,
            episode_lengths: Vec::new(),
            replay_start_size,
            action: None,
        }
    }
}

impl Policy for DummyAgent {
    fn act(&mut self, _obs: &GoalObs, _exploration: bool) -> Result<Act> {
        match self.action {
            Some(a) => Ok(Act(vec![a])),
            None => Ok(Act(vec![self.rng.gen_range(-1.0..=1.0)])),
        }
    }
}

impl Agent for DummyAgent {
    fn train(&mut self) {
        self.train = true;
    }

    fn eval(&mut self) {
        self.train = false;
    }

    fn is_train(&self) -> bool {
        self.train
    }

    fn observe(
        &mut self,
        transition: Transition,
        is_episode_end: bool,
        buffer: &mut HindsightReplayBuffer,
    ) -> Result<()> {
        self.n_observed += 1;
        self.dones.push(transition.done);
        self.episode.push(transition);
        if is_episode_end {
            self.episode_lengths.push(self.episode.len());
            buffer.append(std::mem::take(&mut self.episode))?;
        }
        Ok(())
    }

    fn abort_episode(&mut self) {
        self.n_aborted += 1;
        self.episode = Episode::new();
    }

    fn update_if_ready(&mut self, buffer: &mut HindsightReplayBuffer) -> Result<Option<Record>> {
        if buffer.len() < self.replay_start_size {
            return Ok(None);
        }
        let batch = buffer.sample(4)?;
        self.n_updates += 1;
        let mean_reward = batch.iter().map(|s| s.reward).sum::<f32>() / batch.len() as f32;
        Ok(Some(Record::from_scalar("mean_reward", mean_reward)))
    }

    fn save_params(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        fs::write(path.join("dummy.txt"), self.n_updates.to_string())?;
        Ok(())
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        let s = fs::read_to_string(path.join("dummy.txt"))?;
        self.n_updates = s.trim().parse()?;
        Ok(())
    }
}
