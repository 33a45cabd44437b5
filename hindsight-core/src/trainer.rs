//! Train [`Agent`].
mod config;
mod sampler;
use crate::{
    record::Recorder,
    replay_buffer::{HerReplayBufferConfig, HindsightReplayBuffer},
    Agent, Env, Evaluator,
};
use anyhow::{Context, Result};
pub use config::TrainerConfig;
use log::info;
pub use sampler::Sampler;
use std::path::Path;

#[cfg_attr(doc, aquamarine::aquamarine)]
/// Manages training loop and related objects.
///
/// # Training loop
///
/// 0. Given an agent implementing [`Agent`], a recorder implementing [`Recorder`]
///    and an evaluator implementing [`Evaluator`].
/// 1. Build the training environment with `seed` and a [`HindsightReplayBuffer`]
///    with the reward function of the environment.
/// 2. Do an environment step with an exploratory action and pass the transition
///    to the agent with [`Agent::observe`]. At the end of an episode the agent
///    stores the episode in the buffer. Reaching the step limit of the
///    environment ends the episode as truncation.
/// 3. `env_steps += 1`
/// 4. Call [`Agent::update_if_ready`]. The agent does an update cycle only after
///    the warmup period and at its update interval.
/// 5. If `env_steps % eval_interval == 0`:
///     * Evaluate the greedy policy and record `eval_mean`, `eval_median`,
///       `eval_stdev` and `eval_n_runs`.
///     * If the mean return is the best so far, agent's model parameters are
///       saved in directory `(model_dir)/best`.
/// 6. If `env_steps % save_interval == 0`, agent's model parameters are saved
///    in directory `(model_dir)/(env_steps)`.
/// 7. Records are stored in the recorder and flushed after every evaluation and
///    every `flush_record_interval` steps.
/// 8. Back to step 2 until `env_steps == max_steps`.
///
/// # Interaction of objects
///
/// ```mermaid
/// graph LR
///     A[Agent]-->|Act|B[Env]
///     B -->|GoalObs|A
///     A -->|Episode|C[HindsightReplayBuffer]
///     C -->|RelabeledSample|A
/// ```
///
/// The agent encodes the observation and the desired goal into features and
/// emits an exploratory action. Transitions of an episode are kept in the agent
/// until the episode ends, then pushed to the buffer as a whole. Update cycles
/// sample transitions whose goals are relabeled with achieved goals.
pub struct Trainer<E: Env> {
    /// Configuration of the environment for training.
    env_config_train: E::Config,

    /// Configuration of the replay buffer.
    replay_buffer_config: HerReplayBufferConfig,

    /// Where to save the trained model.
    model_dir: Option<String>,

    /// Interval of flushing records in environment steps.
    flush_records_interval: usize,

    /// Interval of evaluation in environment steps.
    eval_interval: usize,

    /// Interval of saving the model in environment steps.
    save_interval: usize,

    /// The number of environment steps.
    max_steps: usize,

    /// Random seed of the training environment.
    seed: i64,
}

impl<E: Env> Trainer<E> {
    /// Constructs a trainer.
    pub fn build(
        config: TrainerConfig,
        env_config_train: E::Config,
        replay_buffer_config: HerReplayBufferConfig,
    ) -> Self {
        Self {
            env_config_train,
            replay_buffer_config,
            model_dir: config.model_dir,
            flush_records_interval: config.flush_record_interval,
            eval_interval: config.eval_interval,
            save_interval: config.save_interval,
            max_steps: config.max_steps,
            seed: config.seed,
        }
    }

    fn save_model<A: Agent>(agent: &A, model_dir: &Path) -> Result<()> {
        agent
            .save_params(model_dir)
            .with_context(|| format!("Failed to save model in {:?}", model_dir))?;
        info!("Saved the model in {:?}", model_dir);
        Ok(())
    }

    /// Train the agent.
    pub fn train<A, D, R>(
        &mut self,
        agent: &mut A,
        recorder: &mut R,
        evaluator: &mut D,
    ) -> Result<()>
    where
        A: Agent,
        D: Evaluator<E>,
        R: Recorder + ?Sized,
    {
        let env = E::build(&self.env_config_train, self.seed)?;
        let mut buffer = HindsightReplayBuffer::build(&self.replay_buffer_config, env.reward_fn());
        let mut sampler = Sampler::new(env);
        let mut max_eval_reward = f32::MIN;
        agent.train();

        for env_steps in 1..=self.max_steps {
            let mut record = sampler.sample_and_push(agent, &mut buffer)?;

            if let Some(record_agent) = agent.update_if_ready(&mut buffer)? {
                record.merge_inplace(record_agent);
            }

            // Evaluation
            let is_eval = self.eval_interval > 0 && env_steps % self.eval_interval == 0;
            if is_eval {
                info!("Starts evaluation at {} environment steps", env_steps);
                agent.eval();
                let stats = evaluator.evaluate(agent)?;
                agent.train();
                info!(
                    "Evaluation: mean = {:.3}, median = {:.3}, stdev = {:.3}",
                    stats.mean, stats.median, stats.stdev
                );
                record.merge_inplace(stats.to_record());

                // Save the best model up to the current iteration
                if stats.mean > max_eval_reward {
                    max_eval_reward = stats.mean;
                    if let Some(model_dir) = &self.model_dir {
                        Self::save_model(agent, &Path::new(model_dir).join("best"))?;
                    }
                }
            }

            // Save the current model
            if self.save_interval > 0 && env_steps % self.save_interval == 0 {
                if let Some(model_dir) = &self.model_dir {
                    Self::save_model(agent, &Path::new(model_dir).join(env_steps.to_string()))?;
                }
            }

            if !record.is_empty() {
                recorder.store(record);
            }

            // Flush records
            let is_flush = self.flush_records_interval > 0
                && env_steps % self.flush_records_interval == 0;
            if is_eval || is_flush {
                recorder.flush(env_steps as _);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dummy::{DummyAgent, DummyEnv, DummyEnvConfig},
        error::HerError,
        record::BufferedRecorder,
        DefaultEvaluator,
    };
    use tempdir::TempDir;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn trainer(config: TrainerConfig, env_config: DummyEnvConfig) -> Trainer<DummyEnv> {
        let replay_buffer_config = HerReplayBufferConfig::default().capacity(100);
        Trainer::build(config, env_config, replay_buffer_config)
    }

    #[test]
    fn test_train_records_evaluations() -> Result<()> {
        init();
        let config = TrainerConfig::default()
            .max_steps(100)
            .eval_interval(20)
            .eval_n_runs(3)
            .flush_record_interval(10);
        let env_config = DummyEnvConfig::default();
        let mut evaluator = DefaultEvaluator::<DummyEnv>::new(&env_config, config.eval_seed(), 3)?;
        let mut agent = DummyAgent::new(0, 10);
        let mut recorder = BufferedRecorder::new();
        trainer(config, env_config).train(&mut agent, &mut recorder, &mut evaluator)?;

        let eval_means = recorder.scalars("eval_mean");
        assert_eq!(eval_means.len(), 5);
        assert!(eval_means.iter().all(|r| (-5.0..=0.0).contains(r)));
        assert_eq!(recorder.scalars("env_steps").len(), 10);
        assert_eq!(agent.n_observed, 100);
        assert!(agent.is_train());
        assert_eq!(agent.n_updates, 91);
        Ok(())
    }

    #[test]
    fn test_truncation_is_not_terminal() -> Result<()> {
        init();
        let config = TrainerConfig::default().max_steps(23).eval_interval(0);
        let env_config = DummyEnvConfig::default();
        let mut evaluator = DefaultEvaluator::<DummyEnv>::new(&env_config, 1, 1)?;
        let mut agent = DummyAgent::new(0, usize::MAX);
        let mut recorder = BufferedRecorder::new();
        trainer(config, env_config).train(&mut agent, &mut recorder, &mut evaluator)?;

        assert_eq!(agent.dones.len(), 23);
        assert!(agent.dones.iter().all(|d| !d));
        assert_eq!(agent.episode_lengths, vec![5; 4]);
        Ok(())
    }

    #[test]
    fn test_step_limit_ends_untruncated_episode() -> Result<()> {
        init();
        let config = TrainerConfig::default().max_steps(23).eval_interval(0);
        let env_config = DummyEnvConfig {
            max_steps: 5,
            report_truncation: false,
            ..Default::default()
        };
        let mut evaluator = DefaultEvaluator::<DummyEnv>::new(&env_config, 1, 1)?;
        let mut agent = DummyAgent::new(0, usize::MAX);
        let mut recorder = BufferedRecorder::new();
        trainer(config, env_config).train(&mut agent, &mut recorder, &mut evaluator)?;

        assert_eq!(agent.n_observed, 23);
        assert!(agent.dones.iter().all(|d| !d));
        assert_eq!(agent.episode_lengths, vec![5; 4]);
        assert_eq!(agent.n_aborted, 0);
        Ok(())
    }

    #[test]
    fn test_out_of_bounds_action_fails_training() -> Result<()> {
        init();
        let config = TrainerConfig::default().max_steps(50).eval_interval(0);
        let env_config = DummyEnvConfig::default();
        let mut evaluator = DefaultEvaluator::<DummyEnv>::new(&env_config, 1, 1)?;
        let mut agent = DummyAgent::new(0, usize::MAX);
        agent.action = Some(2.0);
        let mut recorder = BufferedRecorder::new();
        let err = trainer(config, env_config)
            .train(&mut agent, &mut recorder, &mut evaluator)
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<HerError>(),
            Some(HerError::Precondition(_))
        ));
        assert_eq!(agent.n_observed, 0);
        assert_eq!(agent.n_aborted, 0);
        Ok(())
    }

    #[test]
    fn test_env_failure_drops_episode() -> Result<()> {
        init();
        let config = TrainerConfig::default()
            .max_steps(30)
            .eval_interval(0)
            .flush_record_interval(30);
        let env_config = DummyEnvConfig {
            max_steps: 5,
            fail_at: Some(8),
            ..Default::default()
        };
        let mut evaluator = DefaultEvaluator::<DummyEnv>::new(&env_config, 1, 1)?;
        let mut agent = DummyAgent::new(0, usize::MAX);
        let mut recorder = BufferedRecorder::new();
        trainer(config, env_config).train(&mut agent, &mut recorder, &mut evaluator)?;

        assert_eq!(agent.n_aborted, 1);
        assert_eq!(agent.n_observed, 29);
        Ok(())
    }

    #[test]
    fn test_save_best_and_periodic_models() -> Result<()> {
        init();
        let dir = TempDir::new("trainer")?;
        let model_dir = dir.path().to_string_lossy().to_string();
        let config = TrainerConfig::default()
            .max_steps(40)
            .eval_interval(10)
            .save_interval(20)
            .model_dir(model_dir);
        let env_config = DummyEnvConfig::default();
        let mut evaluator = DefaultEvaluator::<DummyEnv>::new(&env_config, config.eval_seed(), 2)?;
        let mut agent = DummyAgent::new(0, 5);
        let mut recorder = BufferedRecorder::new();
        trainer(config, env_config).train(&mut agent, &mut recorder, &mut evaluator)?;

        assert!(dir.path().join("best").join("dummy.txt").exists());
        assert!(dir.path().join("20").join("dummy.txt").exists());
        assert!(dir.path().join("40").join("dummy.txt").exists());
        assert!(!dir.path().join("10").exists());

        let mut loaded = DummyAgent::new(0, 5);
        loaded.load_params(&dir.path().join("40"))?;
        assert_eq!(loaded.n_updates, agent.n_updates);
        Ok(())
    }
}
