//! Helpers for setting up agents on environments.
use anyhow::Result;
use hindsight_candle_agent::{
    ddpg::{ActorConfig, CriticConfig, DdpgConfig},
    mlp::MlpConfig,
};
use hindsight_core::{Env, FeatureEncoderConfig};

/// Returns a DDPG configuration whose dimensions follow the spaces of `env_config`.
///
/// The actor maps `[observation, goal]` to an action. The critic takes the
/// features and the action. Both have hidden layers of the given `units`.
/// Other fields are left to their defaults.
pub fn ddpg_config<E: Env>(
    env_config: &E::Config,
    units: &[usize],
) -> Result<DdpgConfig<MlpConfig, MlpConfig>> {
    let env = E::build(env_config, 0)?;
    let obs_dim = env.observation_space().observation;
    let goal_dim = env.observation_space().desired_goal;
    let action_space = env.action_space().clone();
    let act_dim = action_space.dim();
    let in_dim = obs_dim + goal_dim;
    let pi_config = MlpConfig::actor(in_dim, units, act_dim);
    let q_config = MlpConfig::critic(in_dim, units, act_dim);

    Ok(DdpgConfig::default()
        .actor_config(ActorConfig::default().pi_config(pi_config))
        .critic_config(CriticConfig::default().q_config(q_config))
        .encoder_config(FeatureEncoderConfig::default().dims(obs_dim, goal_dim))
        .action_space(action_space))
}
