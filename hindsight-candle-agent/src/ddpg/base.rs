use super::{Actor, Critic, DdpgConfig, TargetUpdate};
use crate::{
    model::{SubModel1, SubModel2},
    util::{check_tensors, copy_params, set_tensors, track, OutDim},
};
use anyhow::{Context, Result};
use candle_core::{Device, Tensor, D};
use candle_nn::loss::mse;
use hindsight_core::{
    error::HerError,
    record::{Record, RecordValue},
    replay_buffer::{Episode, HindsightReplayBuffer, RelabeledSample, Transition},
    Act, Agent, Configurable, FeatureEncoder, GoalObs, HerExplorer, Policy,
};
use log::{debug, info, trace, warn};
use rand::{rngs::StdRng, SeedableRng};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    collections::HashMap,
    fmt::Debug,
    fs::{self, File},
    io::{BufReader, Write},
    path::Path,
};

/// Counters saved with the parameters.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
struct DdpgState {
    env_steps: usize,
    last_update_step: usize,
    n_updates: usize,
    n_opts: usize,
}

/// Losses and gradient norms of a gradient step.
struct StepStats {
    loss_critic: f32,
    loss_actor: f32,
    grad_norm_critic: f32,
    grad_norm_actor: f32,
    average_q: f32,
}

fn check_finite(values: &[f32], what: &str) -> Result<()> {
    match values.iter().all(|v| v.is_finite()) {
        true => Ok(()),
        false => Err(HerError::NumericInstability(format!("Non-finite {}", what)).into()),
    }
}

fn greedy_action<P>(pi: &Actor<P>, x: &Tensor) -> Result<Vec<f32>>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    pi.forward(x)?
        .to_vec2::<f32>()?
        .into_iter()
        .next()
        .context("Empty output of the policy")
}

/// DDPG agent with hindsight experience replay.
///
/// The agent keeps the transitions of the running episode and pushes the whole
/// episode into the replay buffer when it ends. Update cycles start once the
/// buffer holds `replay_start_size` transitions and then run every
/// `update_interval` environment steps, each doing `n_update_times` gradient
/// steps on relabeled minibatches followed by target synchronization.
pub struct Ddpg<P, Q>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
{
    pi: Actor<P>,
    pi_tgt: Actor<P>,
    q: Critic<Q>,
    q_tgt: Critic<Q>,
    encoder: FeatureEncoder,
    explorer: HerExplorer,
    rng: StdRng,
    gamma: f64,
    minibatch_size: usize,
    replay_start_size: usize,
    update_interval: usize,
    n_update_times: usize,
    target_update: TargetUpdate,
    reward_scale: f32,
    max_grad_norm: f64,
    max_numeric_failures: usize,
    train: bool,
    episode: Episode,
    env_steps: usize,
    last_update_step: usize,
    n_updates: usize,
    n_opts: usize,
    n_numeric_failures: usize,
    device: Device,
}

impl<P, Q> Ddpg<P, Q>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
    Q::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    /// Returns the feature encoder.
    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    /// Returns the live actor.
    pub fn actor(&self) -> &Actor<P> {
        &self.pi
    }

    /// Returns the target actor.
    pub fn actor_tgt(&self) -> &Actor<P> {
        &self.pi_tgt
    }

    /// Returns the live critic.
    pub fn critic(&self) -> &Critic<Q> {
        &self.q
    }

    /// Returns the target critic.
    pub fn critic_tgt(&self) -> &Critic<Q> {
        &self.q_tgt
    }

    /// The number of completed update cycles.
    pub fn n_updates(&self) -> usize {
        self.n_updates
    }

    /// The number of gradient steps.
    pub fn n_opts(&self) -> usize {
        self.n_opts
    }

    /// The number of observed environment steps.
    pub fn env_steps(&self) -> usize {
        self.env_steps
    }

    /// Normalized features of `samples` as tensors of shape `[batch_size, dim]`.
    fn features(&self, samples: &[RelabeledSample], next: bool) -> Result<Tensor> {
        let mut xs = Vec::with_capacity(samples.len() * self.encoder.dim());
        for s in samples {
            let obs = match next {
                false => &s.observation,
                true => &s.next_observation,
            };
            let x = self.encoder.encode(obs, &s.desired_goal)?;
            xs.extend(self.encoder.normalize(&x));
        }
        Ok(Tensor::from_vec(xs, (samples.len(), self.encoder.dim()), &self.device)?)
    }

    fn update_critic(
        &mut self,
        x: &Tensor,
        act: &Tensor,
        next_x: &Tensor,
        reward: &Tensor,
        not_done: &Tensor,
    ) -> Result<(f32, f32, f32)> {
        let tgt = {
            let next_a = self.pi_tgt.forward(next_x)?;
            let next_q = self.q_tgt.forward(next_x, &next_a)?.squeeze(D::Minus1)?;
            let next_q = not_done.mul(&next_q)?.affine(self.gamma, 0.0)?;
            (reward.affine(self.reward_scale as f64, 0.0)? + next_q)?.detach()
        };
        check_finite(&tgt.to_vec1::<f32>()?, "Q-target")?;

        let pred = self.q.forward(x, act)?.squeeze(D::Minus1)?;
        let average_q = pred.mean_all()?.to_scalar::<f32>()?;
        let loss = mse(&pred, &tgt)?;
        let loss_value = loss.to_scalar::<f32>()?;
        check_finite(&[loss_value], "critic loss")?;

        let grad_norm = self
            .q
            .backward_step(&loss, self.max_grad_norm)?
            .ok_or_else(|| HerError::NumericInstability("Non-finite critic gradient norm".into()))?;

        Ok((loss_value, grad_norm, average_q))
    }

    fn update_actor(&mut self, x: &Tensor) -> Result<(f32, f32)> {
        let act = self.pi.forward(x)?;
        let loss = self.q.forward(x, &act)?.mean_all()?.neg()?;
        let loss_value = loss.to_scalar::<f32>()?;
        check_finite(&[loss_value], "actor loss")?;

        let grad_norm = self
            .pi
            .backward_step(&loss, self.max_grad_norm)?
            .ok_or_else(|| HerError::NumericInstability("Non-finite actor gradient norm".into()))?;

        Ok((loss_value, grad_norm))
    }

    /// Performs a gradient step on the critic and the actor.
    fn update_step(&mut self, samples: &[RelabeledSample]) -> Result<StepStats> {
        let batch_size = samples.len();
        let x = self.features(samples, false)?;
        let next_x = self.features(samples, true)?;
        let act = {
            let act_dim = samples.first().map(|s| s.action.len()).unwrap_or(0);
            let act: Vec<f32> = samples.iter().flat_map(|s| s.action.iter().copied()).collect();
            Tensor::from_vec(act, (batch_size, act_dim), &self.device)?
        };
        let reward = {
            let reward: Vec<f32> = samples.iter().map(|s| s.reward).collect();
            Tensor::from_vec(reward, (batch_size,), &self.device)?
        };
        let not_done = {
            let not_done: Vec<f32> = samples.iter().map(|s| (!s.done) as i32 as f32).collect();
            Tensor::from_vec(not_done, (batch_size,), &self.device)?
        };

        trace!("update_critic()");
        let (loss_critic, grad_norm_critic, average_q) =
            self.update_critic(&x, &act, &next_x, &reward, &not_done)?;

        trace!("update_actor()");
        let (loss_actor, grad_norm_actor) = self.update_actor(&x)?;

        self.n_opts += 1;

        Ok(StepStats {
            loss_critic,
            loss_actor,
            grad_norm_critic,
            grad_norm_actor,
            average_q,
        })
    }

    /// Synchronizes target networks after an update cycle.
    fn sync_target(&mut self) -> Result<()> {
        match self.target_update {
            TargetUpdate::Soft { tau } => {
                track(self.pi_tgt.get_varmap(), self.pi.get_varmap(), tau)?;
                track(self.q_tgt.get_varmap(), self.q.get_varmap(), tau)?;
            }
            TargetUpdate::Hard { interval } => {
                if self.n_updates % interval == 0 {
                    debug!("Copy target networks at update cycle {}", self.n_updates);
                    copy_params(self.pi_tgt.get_varmap(), self.pi.get_varmap())?;
                    copy_params(self.q_tgt.get_varmap(), self.q.get_varmap())?;
                }
            }
        }
        Ok(())
    }

    /// Runs an update cycle of `n_update_times` gradient steps.
    fn update_cycle(&mut self, buffer: &mut HindsightReplayBuffer) -> Result<Record> {
        let mut loss_critic = 0f32;
        let mut loss_actor = 0f32;
        let mut grad_norm_critic = 0f32;
        let mut grad_norm_actor = 0f32;
        let mut average_q = 0f32;

        for _ in 0..self.n_update_times {
            let samples = buffer.sample(self.minibatch_size)?;
            let stats = match self.update_step(&samples) {
                Ok(stats) => stats,
                Err(e) => match e.downcast_ref::<HerError>() {
                    Some(HerError::NumericInstability(msg)) => {
                        return self.numeric_failure(msg.clone());
                    }
                    _ => return Err(e),
                },
            };
            loss_critic += stats.loss_critic;
            loss_actor += stats.loss_actor;
            grad_norm_critic += stats.grad_norm_critic;
            grad_norm_actor += stats.grad_norm_actor;
            average_q += stats.average_q;
        }

        self.n_numeric_failures = 0;
        self.n_updates += 1;
        self.sync_target()?;

        let n = self.n_update_times.max(1) as f32;
        Ok(Record::from_slice(&[
            ("loss_critic", RecordValue::Scalar(loss_critic / n)),
            ("loss_actor", RecordValue::Scalar(loss_actor / n)),
            ("grad_norm_critic", RecordValue::Scalar(grad_norm_critic / n)),
            ("grad_norm_actor", RecordValue::Scalar(grad_norm_actor / n)),
            ("average_q", RecordValue::Scalar(average_q / n)),
            ("n_updates", RecordValue::Scalar(self.n_updates as f32)),
        ]))
    }

    /// Skips the rest of the update cycle, or fails after too many consecutive failures.
    fn numeric_failure(&mut self, msg: String) -> Result<Record> {
        self.n_numeric_failures += 1;
        if self.n_numeric_failures >= self.max_numeric_failures {
            return Err(HerError::NumericInstability(format!(
                "{} in {} consecutive update cycles",
                msg, self.n_numeric_failures
            ))
            .into());
        }
        warn!(
            "Skip the update cycle at {} environment steps: {}",
            self.env_steps, msg
        );
        Ok(Record::from_scalar(
            "numeric_failures",
            self.n_numeric_failures as f32,
        ))
    }

    fn load_file(path: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
        candle_core::safetensors::load(path, device)
            .map_err(|e| HerError::Resource(format!("Failed to read {:?}: {}", path, e)).into())
    }

    fn save_(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        self.pi.save(path.join("pi.safetensors"))?;
        self.pi_tgt.save(path.join("pi_tgt.safetensors"))?;
        self.q.save(path.join("q.safetensors"))?;
        self.q_tgt.save(path.join("q_tgt.safetensors"))?;
        self.pi.get_opt().save(path.join("opt_pi.safetensors"))?;
        self.q.get_opt().save(path.join("opt_q.safetensors"))?;
        self.encoder.save(path.join("encoder.yaml"))?;

        let state = DdpgState {
            env_steps: self.env_steps,
            last_update_step: self.last_update_step,
            n_updates: self.n_updates,
            n_opts: self.n_opts,
        };
        let mut file = File::create(path.join("state.yaml"))?;
        file.write_all(serde_yaml::to_string(&state)?.as_bytes())?;
        Ok(())
    }

    fn load_(&mut self, path: &Path) -> Result<()> {
        // Read and validate every file before modifying the agent
        let pi = Self::load_file(&path.join("pi.safetensors"), &self.device)?;
        let pi_tgt = Self::load_file(&path.join("pi_tgt.safetensors"), &self.device)?;
        let q = Self::load_file(&path.join("q.safetensors"), &self.device)?;
        let q_tgt = Self::load_file(&path.join("q_tgt.safetensors"), &self.device)?;
        let opt_pi = Self::load_file(&path.join("opt_pi.safetensors"), &self.device)?;
        let opt_q = Self::load_file(&path.join("opt_q.safetensors"), &self.device)?;
        let encoder = FeatureEncoder::load(path.join("encoder.yaml"))?;
        let state: DdpgState = {
            let file = File::open(path.join("state.yaml"))?;
            serde_yaml::from_reader(BufReader::new(file))?
        };

        check_tensors(self.pi.get_varmap(), &pi)?;
        check_tensors(self.pi_tgt.get_varmap(), &pi_tgt)?;
        check_tensors(self.q.get_varmap(), &q)?;
        check_tensors(self.q_tgt.get_varmap(), &q_tgt)?;
        self.pi.get_opt().check_state(&opt_pi)?;
        self.q.get_opt().check_state(&opt_q)?;
        if encoder.dim() != self.encoder.dim() {
            return Err(HerError::Resource(format!(
                "Feature dimension {} differs from {}",
                encoder.dim(),
                self.encoder.dim()
            ))
            .into());
        }

        set_tensors(self.pi.get_varmap(), &pi)?;
        set_tensors(self.pi_tgt.get_varmap(), &pi_tgt)?;
        set_tensors(self.q.get_varmap(), &q)?;
        set_tensors(self.q_tgt.get_varmap(), &q_tgt)?;
        self.pi.get_opt_mut().set_state(&opt_pi)?;
        self.q.get_opt_mut().set_state(&opt_q)?;
        self.encoder = encoder;
        self.env_steps = state.env_steps;
        self.last_update_step = state.last_update_step;
        self.n_updates = state.n_updates;
        self.n_opts = state.n_opts;
        self.episode = Episode::new();
        Ok(())
    }
}

impl<P, Q> Configurable for Ddpg<P, Q>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
    Q::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    type Config = DdpgConfig<P::Config, Q::Config>;

    /// Constructs [`Ddpg`] agent.
    fn build(config: Self::Config) -> Result<Self> {
        let device = config.device.unwrap_or_default().to_candle()?;
        let action_space = config.action_space.context("action_space is not set.")?;
        if let TargetUpdate::Hard { interval: 0 } = config.target_update {
            let msg = "Hard target update interval must be positive";
            return Err(HerError::Precondition(msg.into()).into());
        }
        let mut rng = StdRng::seed_from_u64(config.seed);

        let pi = Actor::build(config.actor_config.clone(), &action_space, &device, &mut rng)?;
        let pi_tgt = Actor::build(config.actor_config, &action_space, &device, &mut rng)?;
        copy_params(pi_tgt.get_varmap(), pi.get_varmap())?;
        let q = Critic::build(config.critic_config.clone(), &device, &mut rng)?;
        let q_tgt = Critic::build(config.critic_config, &device, &mut rng)?;
        copy_params(q_tgt.get_varmap(), q.get_varmap())?;

        let encoder = FeatureEncoder::new(&config.encoder_config);
        let explorer = HerExplorer::new(&config.explorer_config, action_space)?;

        Ok(Self {
            pi,
            pi_tgt,
            q,
            q_tgt,
            encoder,
            explorer,
            rng,
            gamma: config.gamma,
            minibatch_size: config.minibatch_size,
            replay_start_size: config.replay_start_size,
            update_interval: config.update_interval,
            n_update_times: config.n_update_times,
            target_update: config.target_update,
            reward_scale: config.reward_scale,
            max_grad_norm: config.max_grad_norm,
            max_numeric_failures: config.max_numeric_failures,
            train: false,
            episode: Episode::new(),
            env_steps: 0,
            last_update_step: 0,
            n_updates: 0,
            n_opts: 0,
            n_numeric_failures: 0,
            device,
        })
    }
}

impl<P, Q> Policy for Ddpg<P, Q>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
    Q::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
    fn act(&mut self, obs: &GoalObs, exploration: bool) -> Result<Act> {
        let x = self.encoder.encode_obs(obs)?;
        let x = self.encoder.normalize(&x);
        let x = Tensor::from_vec(x, (1, self.encoder.dim()), &self.device)?;

        let act = match exploration {
            true => {
                let pi = &self.pi;
                self.explorer
                    .select_action(self.env_steps, || greedy_action(pi, &x), &mut self.rng)?
            }
            false => greedy_action(&self.pi, &x)?,
        };

        Ok(Act(act))
    }
}

impl<P, Q> Agent for Ddpg<P, Q>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
    Q::Config: DeserializeOwned + Serialize + OutDim + Debug + PartialEq + Clone,
{
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
        if self.train {
            let x = self
                .encoder
                .encode(&transition.observation, &transition.desired_goal)?;
            self.encoder.update_statistics(&x)?;
        }
        self.env_steps += 1;
        self.episode.push(transition);

        if is_episode_end {
            buffer.append(std::mem::take(&mut self.episode))?;
        }
        Ok(())
    }

    fn abort_episode(&mut self) {
        debug!("Discard an episode of length {}", self.episode.len());
        self.episode = Episode::new();
    }

    fn update_if_ready(&mut self, buffer: &mut HindsightReplayBuffer) -> Result<Option<Record>> {
        if !self.train
            || buffer.len() < self.replay_start_size
            || self.env_steps - self.last_update_step < self.update_interval
        {
            return Ok(None);
        }
        self.last_update_step = self.env_steps;

        trace!("Update cycle at {} environment steps", self.env_steps);
        Ok(Some(self.update_cycle(buffer)?))
    }

    fn save_params(&self, path: &Path) -> Result<()> {
        self.save_(path).map_err(|e| {
            HerError::Resource(format!("Failed to save agent in {:?}: {:#}", path, e))
        })?;
        info!("Saved agent in {:?}", path);
        Ok(())
    }

    fn load_params(&mut self, path: &Path) -> Result<()> {
        self.load_(path).map_err(|e| {
            HerError::Resource(format!("Failed to load agent from {:?}: {:#}", path, e))
        })?;
        info!("Loaded agent from {:?}", path);
        Ok(())
    }
}
