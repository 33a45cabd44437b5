//! Actor of DDPG agent.
use crate::{
    model::SubModel1,
    opt::{Optimizer, OptimizerConfig},
    util::{init_params, named_vars, OutDim},
};
use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use hindsight_core::{error::HerError, BoxSpace};
use log::info;
use rand::rngs::StdRng;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`Actor`].
pub struct ActorConfig<P> {
    /// Configuration of the policy model.
    pub pi_config: Option<P>,

    /// Configuration of the optimizer.
    pub opt_config: OptimizerConfig,
}

impl<P> Default for ActorConfig<P> {
    fn default() -> Self {
        Self {
            pi_config: None,
            opt_config: OptimizerConfig::default().learning_rate(1e-4),
        }
    }
}

impl<P> ActorConfig<P>
where
    P: DeserializeOwned + Serialize + OutDim,
{
    /// Sets configurations for the policy model.
    pub fn pi_config(mut self, v: P) -> Self {
        self.pi_config = Some(v);
        self
    }

    /// Sets output dimension of the model.
    pub fn out_dim(mut self, v: usize) -> Self {
        if let Some(pi_config) = &mut self.pi_config {
            pi_config.set_out_dim(v);
        }
        self
    }

    /// Sets optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Constructs [`ActorConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`ActorConfig`] as YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Deterministic policy for DDPG agents.
///
/// The output of the model is squashed with `tanh` and scaled into the action box.
pub struct Actor<P>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
{
    varmap: VarMap,
    pi: P,
    opt: Optimizer,

    // Center and half width of the action box, shape [1, action_dim]
    action_mid: Tensor,
    action_half: Tensor,
}

impl<P> Actor<P>
where
    P: SubModel1<Input = Tensor, Output = Tensor>,
    P::Config: DeserializeOwned + Serialize + OutDim + Clone,
{
    /// Constructs [`Actor`] with parameters initialized from `rng`.
    pub fn build(
        config: ActorConfig<P::Config>,
        action_space: &BoxSpace,
        device: &Device,
        rng: &mut StdRng,
    ) -> Result<Actor<P>> {
        let pi_config = config.pi_config.context("pi_config is not set.")?;
        let action_dim = action_space.dim();
        if pi_config.get_out_dim() != action_dim {
            return Err(HerError::Precondition(format!(
                "Output dimension of the policy {} differs from action dimension {}",
                pi_config.get_out_dim(),
                action_dim
            ))
            .into());
        }

        let varmap = VarMap::new();
        let pi = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
            P::build(vb, pi_config)?
        };
        init_params(&varmap, rng)?;
        let opt = config.opt_config.build(named_vars(&varmap)?)?;

        let (mid, half): (Vec<f32>, Vec<f32>) = action_space
            .low()
            .iter()
            .zip(action_space.high())
            .map(|(l, h)| (0.5 * (l + h), 0.5 * (h - l)))
            .unzip();

        Ok(Self {
            varmap,
            pi,
            opt,
            action_mid: Tensor::from_vec(mid, (1, action_dim), device)?,
            action_half: Tensor::from_vec(half, (1, action_dim), device)?,
        })
    }

    /// Outputs actions given features of observations and goals.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let y = self.pi.forward(x)?.tanh()?;
        Ok(y
            .broadcast_mul(&self.action_half)?
            .broadcast_add(&self.action_mid)?)
    }

    /// Updates the parameters to minimize `loss`; see [`Optimizer::backward_step`].
    pub fn backward_step(&mut self, loss: &Tensor, max_grad_norm: f64) -> Result<Option<f32>> {
        self.opt.backward_step(loss, max_grad_norm)
    }

    /// Returns the variables of the model.
    pub fn get_varmap(&self) -> &VarMap {
        &self.varmap
    }

    /// Returns the optimizer.
    pub fn get_opt(&self) -> &Optimizer {
        &self.opt
    }

    pub(super) fn get_opt_mut(&mut self) -> &mut Optimizer {
        &mut self.opt
    }

    /// Saves the parameters of the model.
    pub fn save<T: AsRef<Path>>(&self, path: T) -> Result<()> {
        self.varmap.save(&path)?;
        info!("Save actor to {:?}", path.as_ref());
        Ok(())
    }
}
