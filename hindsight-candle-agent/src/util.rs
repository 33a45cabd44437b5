//! Utilities.
use anyhow::{anyhow, Result};
use candle_core::{backprop::GradStore, Tensor, Var};
use candle_nn::VarMap;
use hindsight_core::error::HerError;
use log::trace;
use rand::{rngs::StdRng, Rng};
use std::collections::HashMap;

/// Interface for handling output dimensions.
pub trait OutDim {
    /// Returns the output dimension.
    fn get_out_dim(&self) -> usize;

    /// Sets the  output dimension.
    fn set_out_dim(&mut self, v: usize);
}

/// Returns the variables in a [`VarMap`] sorted by name.
pub fn named_vars(varmap: &VarMap) -> Result<Vec<(String, Var)>> {
    let data = varmap.data().lock().map_err(|e| anyhow!("{}", e))?;
    let mut vars: Vec<(String, Var)> = data.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
    vars.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(vars)
}

/// Apply soft update on variables.
///
/// Variables are identified by their names.
///
/// dest = tau * src + (1.0 - tau) * dest
pub fn track(dest: &VarMap, src: &VarMap, tau: f64) -> Result<()> {
    trace!("track(tau = {})", tau);
    let dest = dest.data().lock().map_err(|e| anyhow!("{}", e))?;
    let src = src.data().lock().map_err(|e| anyhow!("{}", e))?;

    for (k_dest, v_dest) in dest.iter() {
        let v_src = src
            .get(k_dest)
            .ok_or_else(|| anyhow!("Variable {} is not in the source", k_dest))?;
        let t_src = v_src.as_tensor();
        let t_dest = v_dest.as_tensor();
        let t_dest = (t_src.affine(tau, 0.0)? + t_dest.affine(1.0 - tau, 0.0)?)?;
        v_dest.set(&t_dest)?;
    }

    Ok(())
}

/// Copies the values of variables in `src` into `dest`.
///
/// The storage of `dest` stays separate from `src`.
pub fn copy_params(dest: &VarMap, src: &VarMap) -> Result<()> {
    let dest = dest.data().lock().map_err(|e| anyhow!("{}", e))?;
    let src = src.data().lock().map_err(|e| anyhow!("{}", e))?;

    for (k_dest, v_dest) in dest.iter() {
        let v_src = src
            .get(k_dest)
            .ok_or_else(|| anyhow!("Variable {} is not in the source", k_dest))?;
        v_dest.set(v_src.as_tensor())?;
    }

    Ok(())
}

/// Initializes linear layers with `rng`.
///
/// Weights `[out, in]` are drawn from `U(-1/sqrt(in), 1/sqrt(in))` and biases are
/// set to zero. Other variables are kept.
pub fn init_params(varmap: &VarMap, rng: &mut StdRng) -> Result<()> {
    for (name, var) in named_vars(varmap)? {
        let dims = var.dims().to_vec();
        let device = var.device().clone();
        if name.ends_with(".weight") && dims.len() == 2 {
            let bound = 1.0 / (dims[1] as f32).sqrt();
            let values: Vec<f32> = (0..dims[0] * dims[1])
                .map(|_| rng.gen_range(-bound..bound))
                .collect();
            var.set(&Tensor::from_vec(values, (dims[0], dims[1]), &device)?)?;
        } else if name.ends_with(".bias") {
            var.set(&var.zeros_like()?)?;
        }
    }
    Ok(())
}

/// Clips gradients of `vars` so that their global L2 norm does not exceed `max_norm`.
///
/// Returns the norm before clipping. A non-finite norm leaves the gradients untouched.
pub fn clip_grad_norm(vars: &[Var], grads: &mut GradStore, max_norm: f64) -> Result<f32> {
    let mut sq_sum = 0f32;
    for var in vars {
        if let Some(g) = grads.get(var.as_tensor()) {
            sq_sum += g.sqr()?.sum_all()?.to_scalar::<f32>()?;
        }
    }
    let norm = sq_sum.sqrt();

    if norm.is_finite() && norm as f64 > max_norm {
        let scale = max_norm / (norm as f64 + 1e-6);
        for var in vars {
            let g = match grads.get(var.as_tensor()) {
                Some(g) => g.affine(scale, 0.0)?,
                None => continue,
            };
            grads.insert(var.as_tensor(), g);
        }
    }

    Ok(norm)
}

/// Checks that `tensors` has a tensor of the same shape for every variable in `varmap`.
pub fn check_tensors(varmap: &VarMap, tensors: &HashMap<String, Tensor>) -> Result<()> {
    for (name, var) in named_vars(varmap)? {
        match tensors.get(&name) {
            Some(t) if t.dims() == var.dims() => {}
            Some(t) => {
                return Err(HerError::Resource(format!(
                    "Shape mismatch of {}: {:?} != {:?}",
                    name,
                    t.dims(),
                    var.dims()
                ))
                .into())
            }
            None => return Err(HerError::Resource(format!("Missing variable {}", name)).into()),
        }
    }
    Ok(())
}

/// Sets the values of variables in `varmap` from `tensors`.
///
/// Nothing is modified if a variable is missing or has a different shape.
pub fn set_tensors(varmap: &VarMap, tensors: &HashMap<String, Tensor>) -> Result<()> {
    check_tensors(varmap, tensors)?;
    for (name, var) in named_vars(varmap)? {
        if let Some(t) = tensors.get(&name) {
            var.set(&t.to_dtype(var.dtype())?.to_device(var.device())?)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::{linear, VarBuilder};
    use rand::SeedableRng;

    fn varmap_with_linear(seed: u64) -> Result<VarMap> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let _ = linear(4, 3, vb.pp("ln0"))?;
        init_params(&varmap, &mut StdRng::seed_from_u64(seed))?;
        Ok(varmap)
    }

    fn values(varmap: &VarMap, name: &str) -> Result<Vec<f32>> {
        let data = varmap.data().lock().map_err(|e| anyhow!("{}", e))?;
        let var = data.get(name).ok_or_else(|| anyhow!("no {}", name))?;
        Ok(var.as_tensor().flatten_all()?.to_vec1::<f32>()?)
    }

    #[test]
    fn test_track() -> Result<()> {
        let dest = varmap_with_linear(0)?;
        let src = varmap_with_linear(1)?;
        let w_dest = values(&dest, "ln0.weight")?;
        let w_src = values(&src, "ln0.weight")?;

        track(&dest, &src, 0.01)?;

        let w = values(&dest, "ln0.weight")?;
        for ((w, d), s) in w.iter().zip(&w_dest).zip(&w_src) {
            assert!((w - (0.99 * d + 0.01 * s)).abs() < 1e-6);
        }
        Ok(())
    }

    #[test]
    fn test_copy_params_is_not_aliased() -> Result<()> {
        let dest = varmap_with_linear(0)?;
        let src = varmap_with_linear(1)?;
        copy_params(&dest, &src)?;
        assert_eq!(values(&dest, "ln0.weight")?, values(&src, "ln0.weight")?);

        // Modifying the source leaves the copy intact
        let before = values(&dest, "ln0.weight")?;
        for (_, var) in named_vars(&src)? {
            var.set(&var.ones_like()?)?;
        }
        assert_eq!(values(&dest, "ln0.weight")?, before);
        assert_ne!(values(&src, "ln0.weight")?, before);
        Ok(())
    }

    #[test]
    fn test_init_params() -> Result<()> {
        let v1 = varmap_with_linear(3)?;
        let v2 = varmap_with_linear(3)?;
        let w = values(&v1, "ln0.weight")?;
        assert_eq!(w, values(&v2, "ln0.weight")?);
        assert!(w.iter().all(|x| x.abs() <= 0.5));
        assert!(values(&v1, "ln0.bias")?.iter().all(|&x| x == 0.0));
        Ok(())
    }

    #[test]
    fn test_clip_grad_norm() -> Result<()> {
        let var = Var::from_slice(&[1.0f32, 1.0], (2,), &Device::Cpu)?;
        // Gradient of 3 * sum(x) is [3, 3], norm 3 * sqrt(2)
        let loss = var.as_tensor().affine(3.0, 0.0)?.sum_all()?;
        let mut grads = loss.backward()?;
        let vars = vec![var.clone()];
        let norm = clip_grad_norm(&vars, &mut grads, 1.0)?;
        assert!((norm - 3.0 * 2f32.sqrt()).abs() < 1e-5);

        let g = grads
            .get(var.as_tensor())
            .ok_or_else(|| anyhow!("no grad"))?
            .to_vec1::<f32>()?;
        let clipped = (g[0] * g[0] + g[1] * g[1]).sqrt();
        assert!((clipped - 1.0).abs() < 1e-4);
        Ok(())
    }

    #[test]
    fn test_set_tensors_validates_before_mutation() -> Result<()> {
        let dest = varmap_with_linear(0)?;
        let before = values(&dest, "ln0.weight")?;
        let mut tensors = HashMap::new();
        tensors.insert(
            "ln0.weight".to_string(),
            Tensor::zeros((3, 4), DType::F32, &Device::Cpu)?,
        );
        assert!(set_tensors(&dest, &tensors).is_err());
        assert_eq!(values(&dest, "ln0.weight")?, before);

        tensors.insert("ln0.bias".to_string(), Tensor::ones(3, DType::F32, &Device::Cpu)?);
        set_tensors(&dest, &tensors)?;
        assert!(values(&dest, "ln0.weight")?.iter().all(|&x| x == 0.0));
        Ok(())
    }
}
