//! Default implementation of the [`Evaluator`] trait.
use super::{EvalStats, Evaluator};
use crate::{Env, Policy};
use anyhow::Result;
use log::debug;

/// Runs a fixed number of greedy episodes and reports statistics of returns.
///
/// Episode `ix` of every evaluation resets the environment with seed
/// `seed + ix`, so evaluations at different training steps face the same
/// initial states and goals.
///
/// ```ignore
/// let seed = u32::MAX as i64 - 42;
/// let mut evaluator = DefaultEvaluator::<PointGoalEnv>::new(&env_config, seed, 10)?;
/// let stats = evaluator.evaluate(&mut agent)?;
/// println!("mean return: {}", stats.mean);
/// ```
pub struct DefaultEvaluator<E: Env> {
    n_episodes: usize,
    seed: u64,
    env: E,
}

impl<E: Env> Evaluator<E> for DefaultEvaluator<E> {
    fn evaluate<P>(&mut self, policy: &mut P) -> Result<EvalStats>
    where
        P: Policy + ?Sized,
    {
        let mut returns = Vec::with_capacity(self.n_episodes);

        for ix in 0..self.n_episodes {
            let mut obs = self.env.reset(Some(self.seed.wrapping_add(ix as u64)))?;
            let mut r_total = 0f32;
            let mut len = 0;

            loop {
                let act = policy.act(&obs, false)?;
                let (step, _) = self.env.step(&act)?;
                r_total += step.reward;
                len += 1;
                let limit = self.env.max_episode_steps().is_some_and(|m| len >= m);
                if step.is_done() || limit {
                    break;
                }
                obs = step.obs;
            }
            returns.push(r_total);
        }

        let stats = EvalStats::from_returns(&returns)?;
        debug!("Evaluation: {:?}", stats);
        Ok(stats)
    }
}

impl<E: Env> DefaultEvaluator<E> {
    /// Constructs a new [`DefaultEvaluator`].
    ///
    /// * `config` - Configuration of the environment
    /// * `seed` - Random seed of the evaluation environment
    /// * `n_episodes` - Number of episodes in an evaluation
    pub fn new(config: &E::Config, seed: i64, n_episodes: usize) -> Result<Self> {
        Ok(Self {
            n_episodes,
            seed: seed as u64,
            env: E::build(config, seed)?,
        })
    }
}
