use anyhow::Result;
use candle_core::Tensor;
use clap::{Parser, ValueEnum};
use hindsight::util::ddpg_config;
use hindsight_candle_agent::{
    ddpg::{Ddpg, DdpgConfig, TargetUpdate},
    mlp::{LnMlp, Mlp, MlpConfig},
    model::{SubModel1, SubModel2},
    opt::OptimizerConfig,
};
use hindsight_core::{
    record::{NullRecorder, Recorder},
    Agent, Configurable, DefaultEvaluator, Evaluator, ExplorerConfig, HerReplayBufferConfig,
    Trainer, TrainerConfig,
};
use hindsight_point_env::{PointGoalEnv, PointGoalEnvConfig};
use hindsight_tensorboard::TensorboardRecorder;
use log::info;
use serde::Serialize;
use std::{fs, path::Path};

const REPLAY_BUFFER_CAPACITY: usize = 100_000;
const FUTURE_K: usize = 4;

#[derive(Clone, Copy, Debug, ValueEnum, Serialize)]
enum TargetUpdateMethod {
    Hard,
    Soft,
}

/// Train/evaluate a DDPG agent with hindsight experience replay on the point environment
#[derive(Parser, Debug, Serialize)]
#[command(version, about)]
struct Args {
    /// Directory where results, configurations and models are saved
    #[arg(long, default_value = "results")]
    outdir: String,

    /// Random seed
    #[arg(long, default_value_t = 0)]
    seed: i64,

    /// Total number of environment steps
    #[arg(long, default_value_t = 20_000)]
    steps: usize,

    /// Learning rate of the actor
    #[arg(long, default_value_t = 1e-3)]
    actor_lr: f64,

    /// Learning rate of the critic
    #[arg(long, default_value_t = 1e-3)]
    critic_lr: f64,

    /// Minimum number of transitions in the replay buffer before updates
    #[arg(long, default_value_t = 1_000)]
    replay_start_size: usize,

    /// Gradient steps in an update cycle
    #[arg(long, default_value_t = 50)]
    n_update_times: usize,

    /// Environment steps between update cycles
    #[arg(long, default_value_t = 50)]
    update_interval: usize,

    /// Synchronization of target networks
    #[arg(long, value_enum, default_value_t = TargetUpdateMethod::Soft)]
    target_update_method: TargetUpdateMethod,

    /// Interval of hard target updates in update cycles
    #[arg(long, default_value_t = 50)]
    target_update_interval: usize,

    /// Coefficient of soft target updates
    #[arg(long, default_value_t = 0.05)]
    soft_update_tau: f64,

    /// Number of episodes in an evaluation
    #[arg(long, default_value_t = 20)]
    eval_n_runs: usize,

    /// Environment steps between evaluations
    #[arg(long, default_value_t = 1_000)]
    eval_interval: usize,

    /// Discount factor
    #[arg(long, default_value_t = 0.98)]
    gamma: f64,

    /// Batch size of a gradient step
    #[arg(long, default_value_t = 64)]
    minibatch_size: usize,

    /// Scale of rewards in Q-targets
    #[arg(long, default_value_t = 1.0)]
    reward_scale_factor: f32,

    /// Probability of random actions
    #[arg(long, default_value_t = 0.2)]
    epsilon: f64,

    /// Standard deviation of the Gaussian noise relative to the maximum action
    #[arg(long, default_value_t = 0.1)]
    noise_std: f64,

    /// Width of the hidden layers of the actor and the critic
    #[arg(long, default_value_t = 64)]
    n_hidden_channels: usize,

    /// Number of hidden layers of the actor and the critic
    #[arg(long, default_value_t = 3)]
    n_hidden_layers: usize,

    /// Use layer normalization in the actor and the critic
    #[arg(long, default_value_t = false)]
    use_layer_norm: bool,

    /// Directory of a saved model to be loaded
    #[arg(long)]
    load: Option<String>,

    /// Only evaluate the agent
    #[arg(long, default_value_t = false)]
    demo: bool,

    /// Write records for TensorBoard in the output directory
    #[arg(long, default_value_t = false)]
    tensorboard: bool,
}

impl Args {
    fn target_update(&self) -> TargetUpdate {
        match self.target_update_method {
            TargetUpdateMethod::Hard => TargetUpdate::Hard {
                interval: self.target_update_interval,
            },
            TargetUpdateMethod::Soft => TargetUpdate::Soft {
                tau: self.soft_update_tau,
            },
        }
    }

    fn units(&self) -> Vec<usize> {
        vec![self.n_hidden_channels; self.n_hidden_layers]
    }

    fn agent_config(
        &self,
        env_config: &PointGoalEnvConfig,
    ) -> Result<DdpgConfig<MlpConfig, MlpConfig>> {
        let config = ddpg_config::<PointGoalEnv>(env_config, &self.units())?;
        let actor_config = config
            .actor_config
            .clone()
            .opt_config(OptimizerConfig::default().learning_rate(self.actor_lr));
        let critic_config = config
            .critic_config
            .clone()
            .opt_config(OptimizerConfig::default().learning_rate(self.critic_lr));
        Ok(config
            .actor_config(actor_config)
            .critic_config(critic_config)
            .explorer_config(
                ExplorerConfig::default()
                    .epsilon(self.epsilon)
                    .noise_std(self.noise_std),
            )
            .discount_factor(self.gamma)
            .minibatch_size(self.minibatch_size)
            .replay_start_size(self.replay_start_size)
            .update_interval(self.update_interval)
            .n_update_times(self.n_update_times)
            .target_update(self.target_update())
            .reward_scale(self.reward_scale_factor)
            .seed(self.seed as u64))
    }

    fn trainer_config(&self) -> TrainerConfig {
        TrainerConfig::default()
            .max_steps(self.steps)
            .eval_interval(self.eval_interval)
            .eval_n_runs(self.eval_n_runs)
            .seed(self.seed)
            .model_dir(self.outdir.as_str())
            .flush_record_interval(self.eval_interval)
    }

    fn replay_buffer_config(&self) -> HerReplayBufferConfig {
        HerReplayBufferConfig::default()
            .capacity(REPLAY_BUFFER_CAPACITY)
            .future_k(FUTURE_K)
            .seed(self.seed as u64)
    }
}

fn create_recorder(args: &Args) -> Box<dyn Recorder> {
    match args.tensorboard {
        true => Box::new(TensorboardRecorder::new(&args.outdir)),
        false => Box::new(NullRecorder::default()),
    }
}

fn save_yaml<T: Serialize>(value: &T, path: impl AsRef<Path>) -> Result<()> {
    fs::write(path, serde_yaml::to_string(value)?)?;
    Ok(())
}

fn create_agent<P, Q>(args: &Args, env_config: &PointGoalEnvConfig) -> Result<Ddpg<P, Q>>
where
    P: SubModel1<Config = MlpConfig, Input = Tensor, Output = Tensor>,
    Q: SubModel2<Config = MlpConfig, Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
{
    let mut agent = Ddpg::<P, Q>::build(args.agent_config(env_config)?)?;
    if let Some(path) = &args.load {
        agent.load_params(Path::new(path))?;
        info!("Loaded the model from {}", path);
    }
    Ok(agent)
}

fn train<P, Q>(args: &Args) -> Result<()>
where
    P: SubModel1<Config = MlpConfig, Input = Tensor, Output = Tensor>,
    Q: SubModel2<Config = MlpConfig, Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
{
    let env_config = PointGoalEnvConfig::default();
    let trainer_config = args.trainer_config();
    let replay_buffer_config = args.replay_buffer_config();

    fs::create_dir_all(&args.outdir)?;
    let outdir = Path::new(&args.outdir);
    save_yaml(args, outdir.join("args.yaml"))?;
    env_config.save(outdir.join("env.yaml"))?;
    args.agent_config(&env_config)?.save(outdir.join("agent.yaml"))?;
    replay_buffer_config.save(outdir.join("replay_buffer.yaml"))?;
    trainer_config.save(outdir.join("trainer.yaml"))?;
    info!("Output files will be saved in {}", args.outdir);

    let mut agent = create_agent::<P, Q>(args, &env_config)?;
    let eval_seed = trainer_config.eval_seed();
    let mut evaluator =
        DefaultEvaluator::<PointGoalEnv>::new(&env_config, eval_seed, args.eval_n_runs)?;
    let mut recorder = create_recorder(args);
    let mut trainer =
        Trainer::<PointGoalEnv>::build(trainer_config, env_config, replay_buffer_config);

    trainer.train(&mut agent, recorder.as_mut(), &mut evaluator)
}

fn demo<P, Q>(args: &Args) -> Result<()>
where
    P: SubModel1<Config = MlpConfig, Input = Tensor, Output = Tensor>,
    Q: SubModel2<Config = MlpConfig, Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
{
    let env_config = PointGoalEnvConfig::default();
    let mut agent = create_agent::<P, Q>(args, &env_config)?;
    agent.eval();

    let eval_seed = args.trainer_config().eval_seed();
    let stats = DefaultEvaluator::<PointGoalEnv>::new(&env_config, eval_seed, args.eval_n_runs)?
        .evaluate(&mut agent)?;
    println!(
        "n_runs: {} mean: {} median: {} stdev: {}",
        stats.n_runs, stats.mean, stats.median, stats.stdev
    );

    Ok(())
}

fn run(args: &Args) -> Result<()> {
    match (args.demo, args.use_layer_norm) {
        (false, false) => train::<Mlp, Mlp>(args),
        (false, true) => train::<LnMlp, LnMlp>(args),
        (true, false) => demo::<Mlp, Mlp>(args),
        (true, true) => demo::<LnMlp, LnMlp>(args),
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    run(&args)
}

#[cfg(test)]
mod test {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_her_point_goal() -> Result<()> {
        let outdir = TempDir::new("her_point_goal")?;
        let outdir = outdir.path().to_string_lossy().to_string();
        let args = Args::parse_from([
            "her_point_goal",
            "--outdir",
            outdir.as_str(),
            "--steps",
            "200",
            "--replay-start-size",
            "100",
            "--eval-interval",
            "100",
            "--eval-n-runs",
            "2",
            "--target-update-method",
            "hard",
            "--use-layer-norm",
        ]);
        run(&args)?;
        for file in ["args.yaml", "env.yaml", "agent.yaml", "replay_buffer.yaml", "trainer.yaml"] {
            assert!(Path::new(&outdir).join(file).is_file());
        }

        let best = Path::new(&outdir).join("best").to_string_lossy().to_string();
        let args = Args::parse_from([
            "her_point_goal",
            "--demo",
            "--load",
            best.as_str(),
            "--eval-n-runs",
            "2",
            "--use-layer-norm",
        ]);
        run(&args)
    }

    #[test]
    fn test_hidden_layer_flags() -> Result<()> {
        let args = Args::parse_from([
            "her_point_goal",
            "--n-hidden-channels",
            "16",
            "--n-hidden-layers",
            "2",
        ]);
        assert_eq!(args.units(), vec![16, 16]);

        let config = args.agent_config(&PointGoalEnvConfig::default())?;
        let pi_units = config.actor_config.pi_config.as_ref().map(MlpConfig::units);
        let q_units = config.critic_config.q_config.as_ref().map(MlpConfig::units);
        assert_eq!(pi_units, Some(&[16, 16][..]));
        assert_eq!(q_units, Some(&[16, 16][..]));

        let defaults = Args::parse_from(["her_point_goal"]);
        assert_eq!(defaults.units(), vec![64, 64, 64]);
        Ok(())
    }
}
