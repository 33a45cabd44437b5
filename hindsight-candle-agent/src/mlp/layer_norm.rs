use super::{create_linear_layers, mlp_forward, MlpConfig};
use crate::model::{SubModel1, SubModel2};
use anyhow::Result;
use candle_core::{Tensor, D};
use candle_nn::{Init, Linear, VarBuilder};

/// Layer normalization with a learnable scale and shift.
///
/// Composed of elementary tensor operations so that gradients flow through it.
pub(super) struct LayerNorm {
    scale: Tensor,
    shift: Tensor,
    eps: f64,
}

impl LayerNorm {
    fn new(dim: usize, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            scale: vb.get_with_hints(dim, "scale", Init::Const(1.0))?,
            shift: vb.get_with_hints(dim, "shift", Init::Const(0.0))?,
            eps: 1e-5,
        })
    }

    pub(super) fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let mean = xs.mean_keepdim(D::Minus1)?;
        let xs = xs.broadcast_sub(&mean)?;
        let var = xs.sqr()?.mean_keepdim(D::Minus1)?;
        let xs = xs.broadcast_div(&var.affine(1.0, self.eps)?.sqrt()?)?;
        Ok(xs.broadcast_mul(&self.scale)?.broadcast_add(&self.shift)?)
    }
}

/// Multilayer perceptron with layer normalization before each hidden activation.
pub struct LnMlp {
    config: MlpConfig,
    layers: Vec<Linear>,
    norms: Vec<LayerNorm>,
}

impl LnMlp {
    fn _build(vb: VarBuilder, config: MlpConfig) -> Result<Self> {
        let vb = vb.pp("ln_mlp");
        let layers = create_linear_layers(&vb, &config)?;
        let norms = config
            .units
            .iter()
            .enumerate()
            .map(|(i, &dim)| LayerNorm::new(dim, vb.pp(format!("norm{}", i))))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            config,
            layers,
            norms,
        })
    }

    fn _forward(&self, xs: Tensor) -> Result<Tensor> {
        let xs = mlp_forward(xs, &self.layers, Some(&self.norms))?;

        match self.config.activation_out {
            false => Ok(xs),
            true => Ok(xs.relu()?),
        }
    }
}

impl SubModel1 for LnMlp {
    type Config = MlpConfig;
    type Input = Tensor;
    type Output = Tensor;

    fn forward(&self, xs: &Self::Input) -> Result<Tensor> {
        self._forward(xs.clone())
    }

    fn build(vb: VarBuilder, config: Self::Config) -> Result<Self> {
        Self::_build(vb, config)
    }
}

impl SubModel2 for LnMlp {
    type Config = MlpConfig;
    type Input1 = Tensor;
    type Input2 = Tensor;
    type Output = Tensor;

    fn forward(&self, input1: &Self::Input1, input2: &Self::Input2) -> Result<Tensor> {
        let input = Tensor::cat(&[input1, input2], D::Minus1)?;
        self._forward(input)
    }

    fn build(vb: VarBuilder, config: Self::Config) -> Result<Self> {
        Self::_build(vb, config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    #[test]
    fn test_layer_norm_output() -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let norm = LayerNorm::new(4, vb)?;
        let xs = Tensor::from_slice(
            &[1.0f32, 2.0, 3.0, 4.0, -2.0, 0.0, 2.0, 8.0],
            (2, 4),
            &Device::Cpu,
        )?;
        let ys = norm.forward(&xs)?.to_vec2::<f32>()?;
        for y in ys {
            let mean = y.iter().sum::<f32>() / 4.0;
            let var = y.iter().map(|v| (v - mean).powi(2)).sum::<f32>() / 4.0;
            assert!(mean.abs() < 1e-5);
            assert!((var - 1.0).abs() < 1e-3);
        }
        Ok(())
    }

    #[test]
    fn test_ln_mlp_gradients() -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let mlp = <LnMlp as SubModel1>::build(vb, MlpConfig::new(3, vec![8, 8], 2, false))?;
        let xs = Tensor::from_slice(&[0.5f32, -1.0, 2.0, 1.0, 0.0, -0.5], (2, 3), &Device::Cpu)?;
        let loss = SubModel1::forward(&mlp, &xs)?.sqr()?.mean_all()?;
        let grads = loss.backward()?;
        for var in varmap.all_vars() {
            assert!(grads.get(var.as_tensor()).is_some());
        }
        Ok(())
    }
}
