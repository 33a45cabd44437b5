//! Critic of DDPG agent.
use crate::{
    model::SubModel2,
    opt::{Optimizer, OptimizerConfig},
    util::{init_params, named_vars},
};
use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use log::info;
use rand::rngs::StdRng;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::Path,
};

#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
/// Configuration of [`Critic`].
pub struct CriticConfig<Q> {
    /// Configuration of the action-value model.
    pub q_config: Option<Q>,

    /// Configuration of the optimizer.
    pub opt_config: OptimizerConfig,
}

impl<Q> Default for CriticConfig<Q> {
    fn default() -> Self {
        Self {
            q_config: None,
            opt_config: OptimizerConfig::default().learning_rate(1e-3),
        }
    }
}

impl<Q> CriticConfig<Q>
where
    Q: DeserializeOwned + Serialize,
{
    /// Sets configurations for action-value function.
    pub fn q_config(mut self, v: Q) -> Self {
        self.q_config = Some(v);
        self
    }

    /// Sets optimizer configuration.
    pub fn opt_config(mut self, v: OptimizerConfig) -> Self {
        self.opt_config = v;
        self
    }

    /// Constructs [`CriticConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`CriticConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

/// Action-value function for DDPG agents.
///
/// It takes features of observations and goals, and actions as inputs and
/// outputs action values of shape `[batch_size, 1]`.
pub struct Critic<Q>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
{
    varmap: VarMap,
    q: Q,
    opt: Optimizer,
}

impl<Q> Critic<Q>
where
    Q: SubModel2<Input1 = Tensor, Input2 = Tensor, Output = Tensor>,
    Q::Config: DeserializeOwned + Serialize + Clone,
{
    /// Constructs [`Critic`] with parameters initialized from `rng`.
    pub fn build(
        config: CriticConfig<Q::Config>,
        device: &Device,
        rng: &mut StdRng,
    ) -> Result<Critic<Q>> {
        let q_config = config.q_config.context("q_config is not set.")?;
        let varmap = VarMap::new();
        let q = {
            let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
            Q::build(vb, q_config)?
        };
        init_params(&varmap, rng)?;
        let opt = config.opt_config.build(named_vars(&varmap)?)?;

        Ok(Self { varmap, q, opt })
    }

    /// Outputs the action-value given features and actions.
    pub fn forward(&self, x: &Tensor, act: &Tensor) -> Result<Tensor> {
        self.q.forward(x, act)
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
        info!("Save critic to {:?}", path.as_ref());
        Ok(())
    }
}
