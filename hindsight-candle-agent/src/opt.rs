//! Optimizers.
use crate::util::clip_grad_norm;
use anyhow::Result;
use candle_core::{backprop::GradStore, Device, Tensor, Var};
use hindsight_core::error::HerError;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, path::Path};

/// Configuration of optimizer for training neural networks in an RL agent.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub enum OptimizerConfig {
    /// Adam optimizer.
    Adam {
        /// Learning rate.
        lr: f64,
        #[serde(default = "default_beta1")]
        /// Decay rate of the first moment.
        beta1: f64,
        #[serde(default = "default_beta2")]
        /// Decay rate of the second moment.
        beta2: f64,
        #[serde(default = "default_eps")]
        /// Term added to the denominator.
        eps: f64,
    },
}

fn default_beta1() -> f64 {
    0.9
}

fn default_beta2() -> f64 {
    0.999
}

fn default_eps() -> f64 {
    1e-8
}

impl OptimizerConfig {
    /// Constructs an optimizer on the given variables.
    ///
    /// Variables are identified by their names in the optimizer state.
    pub fn build(&self, vars: Vec<(String, Var)>) -> Result<Optimizer> {
        match &self {
            OptimizerConfig::Adam {
                lr,
                beta1,
                beta2,
                eps,
            } => {
                let params = vars
                    .into_iter()
                    .map(|(name, var)| {
                        let m = var.zeros_like()?;
                        let v = var.zeros_like()?;
                        Ok(AdamParam { name, var, m, v })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Optimizer::Adam(Adam {
                    params,
                    lr: *lr,
                    beta1: *beta1,
                    beta2: *beta2,
                    eps: *eps,
                    step_t: 0,
                }))
            }
        }
    }

    /// Override learning rate.
    pub fn learning_rate(self, lr: f64) -> Self {
        match self {
            Self::Adam {
                lr: _,
                beta1,
                beta2,
                eps,
            } => Self::Adam {
                lr,
                beta1,
                beta2,
                eps,
            },
        }
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self::Adam {
            lr: 1e-3,
            beta1: default_beta1(),
            beta2: default_beta2(),
            eps: default_eps(),
        }
    }
}

struct AdamParam {
    name: String,
    var: Var,
    m: Tensor,
    v: Tensor,
}

/// Adam optimizer whose moments can be saved and restored.
pub struct Adam {
    params: Vec<AdamParam>,
    lr: f64,
    beta1: f64,
    beta2: f64,
    eps: f64,
    step_t: usize,
}

const STEP_KEY: &str = "__step_t";

impl Adam {
    fn step(&mut self, grads: &GradStore) -> Result<()> {
        self.step_t += 1;
        let bias_correction1 = 1.0 - self.beta1.powi(self.step_t as i32);
        let bias_correction2 = 1.0 - self.beta2.powi(self.step_t as i32);

        for p in self.params.iter_mut() {
            let g = match grads.get(p.var.as_tensor()) {
                Some(g) => g.detach(),
                None => continue,
            };
            let m = (p.m.affine(self.beta1, 0.0)? + g.affine(1.0 - self.beta1, 0.0)?)?;
            let v = (p.v.affine(self.beta2, 0.0)? + g.sqr()?.affine(1.0 - self.beta2, 0.0)?)?;
            let m_hat = m.affine(1.0 / bias_correction1, 0.0)?;
            let v_hat = v.affine(1.0 / bias_correction2, 0.0)?;
            let delta = m_hat
                .div(&v_hat.sqrt()?.affine(1.0, self.eps)?)?
                .affine(self.lr, 0.0)?;
            let theta = p.var.as_tensor().detach().sub(&delta)?;
            p.var.set(&theta)?;
            p.m = m.detach();
            p.v = v.detach();
        }

        Ok(())
    }

    fn state(&self) -> Result<HashMap<String, Tensor>> {
        let mut state = HashMap::new();
        for p in self.params.iter() {
            state.insert(format!("m.{}", p.name), p.m.to_device(&Device::Cpu)?);
            state.insert(format!("v.{}", p.name), p.v.to_device(&Device::Cpu)?);
        }
        state.insert(
            STEP_KEY.to_string(),
            Tensor::new(&[self.step_t as i64], &Device::Cpu)?,
        );
        Ok(state)
    }

    /// Reads the step count and the moments of every parameter from `state`.
    fn read_state(
        &self,
        state: &HashMap<String, Tensor>,
    ) -> Result<(usize, Vec<(Tensor, Tensor)>)> {
        let step_t = match state.get(STEP_KEY) {
            Some(t) => t.to_vec1::<i64>()?.first().copied().unwrap_or(0) as usize,
            None => return Err(HerError::Resource("Missing optimizer step".into()).into()),
        };
        let mut moments = Vec::with_capacity(self.params.len());
        for p in self.params.iter() {
            let get = |key: String| -> Result<Tensor> {
                match state.get(&key) {
                    Some(t) if t.dims() == p.var.dims() => {
                        Ok(t.to_dtype(p.var.dtype())?.to_device(p.var.device())?)
                    }
                    _ => Err(HerError::Resource(format!("Invalid optimizer state {}", key)).into()),
                }
            };
            moments.push((get(format!("m.{}", p.name))?, get(format!("v.{}", p.name))?));
        }
        Ok((step_t, moments))
    }

    fn set_state(&mut self, state: &HashMap<String, Tensor>) -> Result<()> {
        let (step_t, moments) = self.read_state(state)?;
        for (p, (m, v)) in self.params.iter_mut().zip(moments) {
            p.m = m;
            p.v = v;
        }
        self.step_t = step_t;
        Ok(())
    }
}

/// Optimizers.
pub enum Optimizer {
    /// Adam optimizer.
    Adam(Adam),
}

impl Optimizer {
    fn vars(&self) -> Vec<Var> {
        match self {
            Self::Adam(opt) => opt.params.iter().map(|p| p.var.clone()).collect(),
        }
    }

    /// Applies a backward step pass with gradient norm clipping.
    ///
    /// Returns the gradient norm before clipping, or `None` if it is not finite,
    /// in which case the parameters are not updated.
    pub fn backward_step(&mut self, loss: &Tensor, max_grad_norm: f64) -> Result<Option<f32>> {
        let mut grads = loss.backward()?;
        let norm = clip_grad_norm(&self.vars(), &mut grads, max_grad_norm)?;
        if !norm.is_finite() {
            return Ok(None);
        }
        self.step(&grads)?;
        Ok(Some(norm))
    }

    /// Updates the parameters with the given gradients.
    pub fn step(&mut self, grads: &GradStore) -> Result<()> {
        match self {
            Self::Adam(opt) => opt.step(grads),
        }
    }

    /// The number of update steps done so far.
    pub fn step_count(&self) -> usize {
        match self {
            Self::Adam(opt) => opt.step_t,
        }
    }

    /// Returns the optimizer state as named tensors.
    pub fn state(&self) -> Result<HashMap<String, Tensor>> {
        match self {
            Self::Adam(opt) => opt.state(),
        }
    }

    /// Checks that `state` can be restored into this optimizer.
    pub fn check_state(&self, state: &HashMap<String, Tensor>) -> Result<()> {
        match self {
            Self::Adam(opt) => opt.read_state(state).map(|_| ()),
        }
    }

    /// Restores the optimizer state. Nothing is modified if the state is invalid.
    pub fn set_state(&mut self, state: &HashMap<String, Tensor>) -> Result<()> {
        match self {
            Self::Adam(opt) => opt.set_state(state),
        }
    }

    /// Saves the optimizer state in a safetensors file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        candle_core::safetensors::save(&self.state()?, path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::named_vars;
    use candle_core::DType;
    use candle_nn::{VarBuilder, VarMap};
    use tempdir::TempDir;

    fn quadratic() -> Result<(VarMap, Optimizer)> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let _ = vb.get_with_hints(2, "x", candle_nn::Init::Const(3.0))?;
        let opt = OptimizerConfig::default()
            .learning_rate(0.1)
            .build(named_vars(&varmap)?)?;
        Ok((varmap, opt))
    }

    fn x(varmap: &VarMap) -> Result<Vec<f32>> {
        Ok(named_vars(varmap)?[0].1.as_tensor().to_vec1::<f32>()?)
    }

    #[test]
    fn test_adam_minimizes_quadratic() -> Result<()> {
        let (varmap, mut opt) = quadratic()?;
        for _ in 0..200 {
            let loss = named_vars(&varmap)?[0].1.as_tensor().sqr()?.sum_all()?;
            opt.backward_step(&loss, 1e6)?;
        }
        assert!(x(&varmap)?.iter().all(|v| v.abs() < 0.1));
        assert_eq!(opt.step_count(), 200);
        Ok(())
    }

    #[test]
    fn test_adam_first_step() -> Result<()> {
        // The first Adam step moves each parameter by lr in the direction of the gradient sign
        let (varmap, mut opt) = quadratic()?;
        let loss = named_vars(&varmap)?[0].1.as_tensor().sqr()?.sum_all()?;
        let norm = opt.backward_step(&loss, 1e6)?;
        assert!(norm.is_some());
        for v in x(&varmap)? {
            assert!((v - 2.9).abs() < 1e-5);
        }
        Ok(())
    }

    #[test]
    fn test_state_round_trip() -> Result<()> {
        let (varmap, mut opt) = quadratic()?;
        for _ in 0..3 {
            let loss = named_vars(&varmap)?[0].1.as_tensor().sqr()?.sum_all()?;
            opt.backward_step(&loss, 1e6)?;
        }
        let dir = TempDir::new("adam")?;
        let path = dir.path().join("opt.safetensors");
        opt.save(&path)?;

        let (_, mut opt2) = quadratic()?;
        opt2.set_state(&candle_core::safetensors::load(&path, &Device::Cpu)?)?;
        assert_eq!(opt2.step_count(), 3);
        let s1 = opt.state()?;
        let s2 = opt2.state()?;
        for (k, t) in s1.iter().filter(|(k, _)| k.as_str() != STEP_KEY) {
            assert_eq!(t.to_vec1::<f32>()?, s2[k].to_vec1::<f32>()?);
        }

        let mut broken = s1.clone();
        broken.remove(STEP_KEY);
        let (_, mut opt3) = quadratic()?;
        assert!(opt3.set_state(&broken).is_err());
        assert_eq!(opt3.step_count(), 0);
        Ok(())
    }
}
