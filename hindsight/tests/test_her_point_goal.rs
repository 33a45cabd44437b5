use anyhow::Result;
use hindsight::util::ddpg_config;
use hindsight_candle_agent::{
    ddpg::{ActorConfig, CriticConfig, Ddpg, TargetUpdate},
    mlp::Mlp,
    opt::OptimizerConfig,
};
use hindsight_core::{
    record::BufferedRecorder, Configurable, DefaultEvaluator, ExplorerConfig,
    HerReplayBufferConfig, Trainer, TrainerConfig,
};
use hindsight_point_env::{PointGoalEnv, PointGoalEnvConfig};

const MAX_STEPS: usize = 5_000;
const EVAL_INTERVAL: usize = 1_000;

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn test_her_point_goal() -> Result<()> {
    init();
    let env_config = PointGoalEnvConfig::default();
    let trainer_config = TrainerConfig::default()
        .max_steps(MAX_STEPS)
        .eval_interval(EVAL_INTERVAL)
        .eval_n_runs(20)
        .seed(1)
        .flush_record_interval(EVAL_INTERVAL);
    let replay_buffer_config = HerReplayBufferConfig::default().capacity(10_000).seed(1);

    let agent_config = {
        let config = ddpg_config::<PointGoalEnv>(&env_config, &[64, 64])?;
        let actor_config: ActorConfig<_> = config
            .actor_config
            .clone()
            .opt_config(OptimizerConfig::default().learning_rate(1e-3));
        let critic_config: CriticConfig<_> = config
            .critic_config
            .clone()
            .opt_config(OptimizerConfig::default().learning_rate(1e-3));
        config
            .actor_config(actor_config)
            .critic_config(critic_config)
            .explorer_config(ExplorerConfig::default().epsilon(0.2).noise_std(0.1))
            .minibatch_size(64)
            // The first evaluation sees an untrained agent
            .replay_start_size(EVAL_INTERVAL + 1)
            .update_interval(50)
            .n_update_times(50)
            .target_update(TargetUpdate::Soft { tau: 0.05 })
            .seed(1)
    };

    let mut agent = Ddpg::<Mlp, Mlp>::build(agent_config)?;
    let mut evaluator =
        DefaultEvaluator::<PointGoalEnv>::new(&env_config, trainer_config.eval_seed(), 20)?;
    let mut recorder = BufferedRecorder::new();
    let mut trainer =
        Trainer::<PointGoalEnv>::build(trainer_config, env_config, replay_buffer_config);
    trainer.train(&mut agent, &mut recorder, &mut evaluator)?;

    let eval_means = recorder.scalars("eval_mean");
    assert_eq!(eval_means.len(), MAX_STEPS / EVAL_INTERVAL);
    assert!(agent.n_updates() > 0);
    let (first, last) = (eval_means[0], eval_means[eval_means.len() - 1]);
    assert!(
        last > first,
        "evaluation did not improve: first = {}, last = {}, all = {:?}",
        first,
        last,
        eval_means
    );

    Ok(())
}
