use super::{create_linear_layers, mlp_forward, MlpConfig};
use crate::model::{SubModel1, SubModel2};
use anyhow::Result;
use candle_core::{Tensor, D};
use candle_nn::{Linear, VarBuilder};

/// Multilayer perceptron with ReLU activation function.
pub struct Mlp {
    config: MlpConfig,
    layers: Vec<Linear>,
}

impl Mlp {
    fn _build(vb: VarBuilder, config: MlpConfig) -> Result<Self> {
        let layers = create_linear_layers(&vb.pp("mlp"), &config)?;
        Ok(Self { config, layers })
    }

    fn _forward(&self, xs: Tensor) -> Result<Tensor> {
        let xs = mlp_forward(xs, &self.layers, None)?;

        match self.config.activation_out {
            false => Ok(xs),
            true => Ok(xs.relu()?),
        }
    }
}

impl SubModel1 for Mlp {
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

impl SubModel2 for Mlp {
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
    fn test_mlp_shapes() -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let mlp = <Mlp as SubModel2>::build(vb, MlpConfig::new(5, vec![8, 8], 1, false))?;
        let obs = Tensor::zeros((4, 3), DType::F32, &Device::Cpu)?;
        let act = Tensor::zeros((4, 2), DType::F32, &Device::Cpu)?;
        let q = SubModel2::forward(&mlp, &obs, &act)?;
        assert_eq!(q.dims(), [4, 1]);
        // Three layers with weight and bias
        assert_eq!(varmap.all_vars().len(), 6);
        Ok(())
    }
}
