//! Evaluate [`Policy`].
use crate::{error::HerError, record::Record, record::RecordValue::Scalar, Env, Policy};
use anyhow::Result;
mod default_evaluator;
pub use default_evaluator::DefaultEvaluator;

/// Evaluate [`Policy`].
pub trait Evaluator<E: Env> {
    /// Runs evaluation episodes with the greedy actions of `policy`.
    ///
    /// The caller of this method needs to handle the internal state of `policy`,
    /// like training/evaluation mode.
    fn evaluate<P>(&mut self, policy: &mut P) -> Result<EvalStats>
    where
        P: Policy + ?Sized;
}

/// Statistics of episodic returns over evaluation runs.
#[derive(Debug, Clone, PartialEq)]
pub struct EvalStats {
    /// Mean of returns.
    pub mean: f32,

    /// Median of returns.
    pub median: f32,

    /// Sample standard deviation of returns, zero for a single run.
    pub stdev: f32,

    /// The number of evaluation runs.
    pub n_runs: usize,
}

impl EvalStats {
    /// Computes the statistics of the given episodic returns.
    pub fn from_returns(returns: &[f32]) -> Result<Self> {
        let n_runs = returns.len();
        if n_runs == 0 {
            return Err(HerError::Precondition("No evaluation run".into()).into());
        }

        let mean = returns.iter().sum::<f32>() / n_runs as f32;

        let mut sorted = returns.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let median = match n_runs % 2 {
            0 => 0.5 * (sorted[n_runs / 2 - 1] + sorted[n_runs / 2]),
            _ => sorted[n_runs / 2],
        };

        let stdev = if n_runs > 1 {
            let ss = returns.iter().map(|r| (r - mean).powi(2)).sum::<f32>();
            (ss / (n_runs - 1) as f32).sqrt()
        } else {
            0.0
        };

        Ok(Self {
            mean,
            median,
            stdev,
            n_runs,
        })
    }

    /// Converts the statistics into a [`Record`].
    pub fn to_record(&self) -> Record {
        let mut record = Record::empty();
        record.insert("eval_mean", Scalar(self.mean));
        record.insert("eval_median", Scalar(self.median));
        record.insert("eval_stdev", Scalar(self.stdev));
        record.insert("eval_n_runs", Scalar(self.n_runs as f32));
        record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval_stats() -> Result<()> {
        let stats = EvalStats::from_returns(&[-3.0, -1.0, -2.0, -6.0])?;
        assert_eq!(stats.n_runs, 4);
        assert_eq!(stats.mean, -3.0);
        assert_eq!(stats.median, -2.5);
        // Squared deviations: 0, 4, 1, 9
        assert!((stats.stdev - (14.0f32 / 3.0).sqrt()).abs() < 1e-6);

        let stats = EvalStats::from_returns(&[-4.0])?;
        assert_eq!(stats.median, -4.0);
        assert_eq!(stats.stdev, 0.0);

        let record = EvalStats::from_returns(&[1.0, 2.0, 6.0])?.to_record();
        assert_eq!(record.get_scalar("eval_mean")?, 3.0);
        assert_eq!(record.get_scalar("eval_median")?, 2.0);

        assert!(EvalStats::from_returns(&[]).is_err());
        Ok(())
    }
}
