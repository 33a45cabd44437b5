//! Point moving on a line toward a target.
use super::PointGoalEnvConfig;
use anyhow::Result;
use hindsight_core::{
    error::HerError,
    record::{Record, RecordValue},
    Act, BoxSpace, Env, GoalObs, GoalSpace, Info, RewardFn, Step,
};
use log::trace;
use rand::{rngs::StdRng, Rng, SeedableRng};

/// Information of a step of [`PointGoalEnv`].
#[derive(Clone, Debug, PartialEq)]
pub struct PointGoalInfo {
    /// Distance between the point and the target after the step.
    pub distance: f32,

    /// `true` if the target is reached.
    pub is_success: bool,
}

impl Info for PointGoalInfo {}

fn distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Returns the reward function of [`PointGoalEnv`] for the given threshold.
///
/// The reward is `0` if the distance between the goals is below `threshold`
/// and `-1` otherwise.
pub fn point_goal_reward(threshold: f32) -> RewardFn {
    Box::new(move |achieved_goal, desired_goal| {
        match distance(achieved_goal, desired_goal) < threshold {
            true => 0.0,
            false => -1.0,
        }
    })
}

/// One-dimensional goal-reaching environment.
///
/// See the [crate documentation](crate) for the dynamics.
pub struct PointGoalEnv {
    config: PointGoalEnvConfig,
    pos: f32,
    goal: f32,
    t: usize,
    rng: StdRng,
    action_space: BoxSpace,
    observation_space: GoalSpace,
}

impl PointGoalEnv {
    fn obs(&self) -> GoalObs {
        GoalObs::new(vec![self.pos], vec![self.pos], vec![self.goal])
    }

    /// Current position of the point.
    pub fn position(&self) -> f32 {
        self.pos
    }

    /// Current target position.
    pub fn goal(&self) -> f32 {
        self.goal
    }
}

impl Env for PointGoalEnv {
    type Config = PointGoalEnvConfig;
    type Info = PointGoalInfo;

    fn build(config: &Self::Config, seed: i64) -> Result<Self> {
        if !(config.bound > 0.0) || !(config.action_scale > 0.0) || !(config.threshold > 0.0) {
            return Err(HerError::Precondition(format!(
                "bound, action_scale and threshold must be positive: {:?}",
                config
            ))
            .into());
        }

        Ok(Self {
            config: config.clone(),
            pos: 0.0,
            goal: 0.0,
            // Forces a reset before the first step
            t: config.max_episode_steps,
            rng: StdRng::seed_from_u64(seed as u64),
            action_space: BoxSpace::symmetric(1, 1.0),
            observation_space: GoalSpace::new(1, 1),
        })
    }

    fn reset(&mut self, seed: Option<u64>) -> Result<GoalObs> {
        if let Some(seed) = seed {
            self.rng = StdRng::seed_from_u64(seed);
        }
        let bound = self.config.bound;
        self.pos = self.rng.gen_range(-bound..=bound);
        self.goal = self.rng.gen_range(-bound..=bound);
        self.t = 0;
        trace!("reset: pos = {}, goal = {}", self.pos, self.goal);
        Ok(self.obs())
    }

    fn step(&mut self, a: &Act) -> Result<(Step<Self>, Record)> {
        if !self.action_space.contains(a.as_slice()) {
            return Err(HerError::Precondition(format!(
                "action out of bounds {:?}: {:?}",
                self.action_space, a
            ))
            .into());
        }
        if self.t >= self.config.max_episode_steps {
            return Err(HerError::Precondition(
                "step after the end of an episode, reset is required".to_string(),
            )
            .into());
        }

        let bound = self.config.bound;
        self.pos = (self.pos + self.config.action_scale * a.0[0]).clamp(-bound, bound);
        self.t += 1;

        let obs = self.obs();
        let d = distance(&obs.achieved_goal, &obs.desired_goal);
        let info = PointGoalInfo {
            distance: d,
            is_success: d < self.config.threshold,
        };
        let reward = self.compute_reward(&obs.achieved_goal, &obs.desired_goal, Some(&info));
        let is_truncated = self.t >= self.config.max_episode_steps;
        let record = Record::from_slice(&[
            ("distance", RecordValue::Scalar(d)),
            ("is_success", RecordValue::Scalar(info.is_success as i32 as f32)),
        ]);

        Ok((Step::new(obs, a.clone(), reward, false, is_truncated, info), record))
    }

    fn action_space(&self) -> &BoxSpace {
        &self.action_space
    }

    fn observation_space(&self) -> &GoalSpace {
        &self.observation_space
    }

    fn max_episode_steps(&self) -> Option<usize> {
        Some(self.config.max_episode_steps)
    }

    fn compute_reward(
        &self,
        achieved_goal: &[f32],
        desired_goal: &[f32],
        _info: Option<&Self::Info>,
    ) -> f32 {
        (point_goal_reward(self.config.threshold))(achieved_goal, desired_goal)
    }

    fn reward_fn(&self) -> RewardFn {
        point_goal_reward(self.config.threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_precondition(e: &anyhow::Error) -> bool {
        matches!(e.downcast_ref::<HerError>(), Some(HerError::Precondition(_)))
    }

    #[test]
    fn test_reset() -> Result<()> {
        let mut env = PointGoalEnv::build(&PointGoalEnvConfig::default(), 0)?;
        for _ in 0..100 {
            let obs = env.reset(None)?;
            env.observation_space().check(&obs)?;
            assert_eq!(obs.observation, obs.achieved_goal);
            assert!(obs.achieved_goal[0].abs() <= 1.0);
            assert!(obs.desired_goal[0].abs() <= 1.0);
        }

        let obs1 = env.reset(Some(7))?;
        env.reset(None)?;
        let obs2 = env.reset(Some(7))?;
        assert_eq!(obs1, obs2);
        Ok(())
    }

    #[test]
    fn test_reward() -> Result<()> {
        let env = PointGoalEnv::build(&PointGoalEnvConfig::default(), 0)?;
        let reward_fn = env.reward_fn();
        let cases = [
            (0.0, 0.04, 0.0),
            (0.5, 0.46, 0.0),
            (0.0, 0.06, -1.0),
            (-1.0, 1.0, -1.0),
        ];
        for (a, d, r) in cases {
            assert_eq!(env.compute_reward(&[a], &[d], None), r);
            assert_eq!(reward_fn(&[a], &[d]), r);
        }
        Ok(())
    }

    #[test]
    fn test_truncation() -> Result<()> {
        let mut env = PointGoalEnv::build(&PointGoalEnvConfig::default(), 1)?;
        assert!(env.step(&Act(vec![0.0])).is_err());

        env.reset(None)?;
        for t in 1..=10 {
            let (step, _) = env.step(&Act(vec![0.1]))?;
            assert!(!step.is_terminated);
            assert_eq!(step.is_truncated, t == 10);
        }
        let e = env.step(&Act(vec![0.1])).err().expect("expected step to fail");
        assert!(is_precondition(&e));
        Ok(())
    }

    #[test]
    fn test_reject_invalid_action() -> Result<()> {
        let mut env = PointGoalEnv::build(&PointGoalEnvConfig::default(), 2)?;
        env.reset(None)?;
        let pos = env.position();
        for act in [vec![1.5], vec![-1.01], vec![0.0, 0.0], vec![], vec![f32::NAN]] {
            let e = env.step(&Act(act)).err().expect("expected step to fail");
            assert!(is_precondition(&e));
        }
        assert_eq!(env.position(), pos);
        Ok(())
    }

    #[test]
    fn test_reach_goal() -> Result<()> {
        let config = PointGoalEnvConfig::default();
        let mut env = PointGoalEnv::build(&config, 3)?;
        for _ in 0..20 {
            let mut obs = env.reset(None)?;
            let mut reached = false;
            for _ in 0..config.max_episode_steps {
                let a = ((obs.desired_goal[0] - obs.achieved_goal[0]) / config.action_scale)
                    .clamp(-1.0, 1.0);
                let (step, record) = env.step(&Act(vec![a]))?;
                obs = step.obs;
                if step.info.is_success {
                    assert_eq!(step.reward, 0.0);
                    assert_eq!(record.get_scalar("is_success")?, 1.0);
                    reached = true;
                    break;
                }
                assert_eq!(step.reward, -1.0);
            }
            assert!(reached);
        }
        Ok(())
    }

    #[test]
    fn test_invalid_config() {
        let config = PointGoalEnvConfig::default().threshold(0.0);
        assert!(PointGoalEnv::build(&config, 0).is_err());
    }
}
