//! Episode-structured replay buffer.
use super::{Episode, HerReplayBufferConfig, RelabeledSample};
use crate::{base::RewardFn, error::HerError};
use anyhow::Result;
use log::trace;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::collections::VecDeque;

/// Replay buffer storing whole episodes with hindsight goal relabeling.
///
/// The buffer holds at most `capacity` transitions. When an appended episode
/// exceeds the capacity, the oldest episodes are evicted as a whole.
pub struct HindsightReplayBuffer {
    capacity: usize,
    future_prob: f64,
    episodes: VecDeque<Episode>,
    n_transitions: usize,
    reward_fn: RewardFn,
    rng: StdRng,
}

impl HindsightReplayBuffer {
    /// Builds a buffer with the reward function used for relabeled goals.
    pub fn build(config: &HerReplayBufferConfig, reward_fn: RewardFn) -> Self {
        Self {
            capacity: config.capacity,
            future_prob: config.future_prob(),
            episodes: VecDeque::new(),
            n_transitions: 0,
            reward_fn,
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    /// Number of stored transitions.
    pub fn len(&self) -> usize {
        self.n_transitions
    }

    /// Returns `true` if no transition is stored.
    pub fn is_empty(&self) -> bool {
        self.n_transitions == 0
    }

    /// Number of stored episodes.
    pub fn n_episodes(&self) -> usize {
        self.episodes.len()
    }

    /// Maximum number of stored transitions.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterates over stored episodes from the oldest.
    pub fn episodes(&self) -> impl Iterator<Item = &Episode> {
        self.episodes.iter()
    }

    /// Stores an episode, evicting the oldest episodes if needed.
    ///
    /// Empty episodes are ignored. An episode longer than the capacity is rejected.
    pub fn append(&mut self, episode: Episode) -> Result<()> {
        if episode.is_empty() {
            return Ok(());
        }
        if episode.len() > self.capacity {
            return Err(HerError::Precondition(format!(
                "Episode of length {} exceeds buffer capacity {}",
                episode.len(),
                self.capacity
            ))
            .into());
        }

        self.n_transitions += episode.len();
        self.episodes.push_back(episode);

        while self.n_transitions > self.capacity {
            match self.episodes.pop_front() {
                Some(old) => {
                    trace!("Evict episode of length {}", old.len());
                    self.n_transitions -= old.len();
                }
                None => break,
            }
        }

        Ok(())
    }

    /// Samples `batch_size` transitions with goal relabeling.
    ///
    /// Each sample picks a stored episode and a time step `i` uniformly. With
    /// probability `future_k / (future_k + 1)` the desired goal is replaced by
    /// the next achieved goal at a time step `j` drawn uniformly from `[i, L - 1]`.
    /// The reward is computed against the resulting goal.
    pub fn sample(&mut self, batch_size: usize) -> Result<Vec<RelabeledSample>> {
        if self.episodes.is_empty() {
            return Err(HerError::Precondition("Sampling from an empty buffer".into()).into());
        }

        let mut samples = Vec::with_capacity(batch_size);
        for _ in 0..batch_size {
            let ix_ep = self.rng.gen_range(0..self.episodes.len());
            let ep = &self.episodes[ix_ep];
            let len = ep.len();
            let i = self.rng.gen_range(0..len);
            let relabel = self.future_prob > 0.0 && self.rng.gen_bool(self.future_prob);
            let goal_time_step = match relabel {
                true => Some(self.rng.gen_range(i..len)),
                false => None,
            };

            // Stored episodes are nonempty and indices are drawn within bounds
            let tr = ep
                .get(i)
                .ok_or_else(|| HerError::Precondition(format!("No transition at {}", i)))?;
            let desired_goal = match goal_time_step {
                Some(j) => ep
                    .get(j)
                    .ok_or_else(|| HerError::Precondition(format!("No transition at {}", j)))?
                    .next_achieved_goal
                    .clone(),
                None => tr.desired_goal.clone(),
            };
            let reward = (self.reward_fn)(&tr.next_achieved_goal, &desired_goal);

            samples.push(RelabeledSample {
                observation: tr.observation.clone(),
                achieved_goal: tr.achieved_goal.clone(),
                desired_goal,
                action: tr.action.clone(),
                next_observation: tr.next_observation.clone(),
                next_achieved_goal: tr.next_achieved_goal.clone(),
                reward,
                done: tr.done,
                time_step: i,
                goal_time_step,
            });
        }

        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay_buffer::Transition;

    fn sparse_reward() -> RewardFn {
        Box::new(|a: &[f32], d: &[f32]| {
            let dist = a
                .iter()
                .zip(d.iter())
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f32>()
                .sqrt();
            if dist < 0.05 {
                0.0
            } else {
                -1.0
            }
        })
    }

    /// Episode `id` of length `len`; achieved goals encode the time step.
    fn episode(id: usize, len: usize) -> Episode {
        (0..len)
            .map(|t| Transition {
                observation: vec![id as f32, t as f32],
                achieved_goal: vec![t as f32],
                desired_goal: vec![100.0],
                action: vec![0.0],
                next_observation: vec![id as f32, (t + 1) as f32],
                next_achieved_goal: vec![(t + 1) as f32],
                done: false,
            })
            .collect::<Vec<_>>()
            .into()
    }

    fn buffer(capacity: usize, future_k: usize) -> HindsightReplayBuffer {
        let config = HerReplayBufferConfig::default()
            .capacity(capacity)
            .future_k(future_k)
            .seed(7);
        HindsightReplayBuffer::build(&config, sparse_reward())
    }

    #[test]
    fn test_sample_from_empty_buffer() {
        let mut buffer = buffer(10, 4);
        let err = buffer.sample(1).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HerError>(),
            Some(HerError::Precondition(_))
        ));
    }

    #[test]
    fn test_relabeled_goal_is_from_future() -> Result<()> {
        let mut buffer = buffer(100, 4);
        buffer.append(episode(0, 5))?;
        buffer.append(episode(1, 9))?;

        for s in buffer.sample(2000)? {
            match s.goal_time_step {
                Some(j) => {
                    assert!(j >= s.time_step);
                    assert_eq!(s.desired_goal, vec![(j + 1) as f32]);
                }
                None => assert_eq!(s.desired_goal, vec![100.0]),
            }
        }
        Ok(())
    }

    #[test]
    fn test_reward_matches_active_goal() -> Result<()> {
        let mut buffer = buffer(100, 4);
        buffer.append(episode(0, 6))?;
        let reward_fn = sparse_reward();
        let mut n_success = 0;

        for s in buffer.sample(500)? {
            assert_eq!(s.reward, reward_fn(&s.next_achieved_goal, &s.desired_goal));
            if s.goal_time_step == Some(s.time_step) {
                assert_eq!(s.reward, 0.0);
            }
            if s.reward == 0.0 {
                n_success += 1;
            }
        }
        assert!(n_success > 0);
        Ok(())
    }

    #[test]
    fn test_relabel_fraction() -> Result<()> {
        let mut buffer = buffer(100, 4);
        buffer.append(episode(0, 3))?;
        let n = 1000;
        let n_relabeled = buffer.sample(n)?.iter().filter(|s| s.is_relabeled()).count();
        let frac = n_relabeled as f64 / n as f64;
        assert!((frac - 0.8).abs() < 0.05, "{}", frac);
        Ok(())
    }

    #[test]
    fn test_no_relabel_when_future_k_is_zero() -> Result<()> {
        let mut buffer = buffer(100, 0);
        buffer.append(episode(0, 4))?;
        assert!(buffer.sample(200)?.iter().all(|s| !s.is_relabeled()));
        Ok(())
    }

    #[test]
    fn test_fifo_eviction_of_whole_episodes() -> Result<()> {
        let mut buffer = buffer(10, 4);
        buffer.append(episode(0, 4))?;
        buffer.append(episode(1, 4))?;
        assert_eq!(buffer.len(), 8);
        buffer.append(episode(2, 4))?;
        assert_eq!(buffer.len(), 8);
        assert_eq!(buffer.n_episodes(), 2);
        buffer.append(episode(3, 3))?;
        assert_eq!(buffer.len(), 7);

        let ids = buffer
            .episodes()
            .map(|ep| ep.get(0).map(|tr| tr.observation[0]))
            .collect::<Vec<_>>();
        assert_eq!(ids, vec![Some(2.0), Some(3.0)]);
        for ep in buffer.episodes() {
            let id = ep.get(0).map(|tr| tr.observation[0]).unwrap_or(-1.0) as usize;
            assert_eq!(ep, &episode(id, ep.len()));
        }
        assert!(buffer.len() <= buffer.capacity());
        Ok(())
    }

    #[test]
    fn test_append_edge_cases() -> Result<()> {
        let mut buffer = buffer(5, 4);
        buffer.append(Episode::new())?;
        assert!(buffer.is_empty());
        assert_eq!(buffer.n_episodes(), 0);
        assert!(buffer.append(episode(0, 6)).is_err());
        buffer.append(episode(1, 5))?;
        assert_eq!(buffer.len(), 5);
        Ok(())
    }

    #[test]
    fn test_sampling_is_deterministic() -> Result<()> {
        let mut b1 = buffer(100, 4);
        let mut b2 = buffer(100, 4);
        for b in [&mut b1, &mut b2] {
            b.append(episode(0, 5))?;
            b.append(episode(1, 3))?;
        }
        assert_eq!(b1.sample(32)?, b2.sample(32)?);
        Ok(())
    }
}
