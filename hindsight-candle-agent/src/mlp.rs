//! Multilayer perceptrons.
mod base;
mod config;
mod layer_norm;
use anyhow::Result;
pub use base::Mlp;
use candle_core::Tensor;
use candle_nn::{linear, Linear, Module, VarBuilder};
pub use config::MlpConfig;
pub use layer_norm::LnMlp;
use layer_norm::LayerNorm;

/// Returns linear layers `in_dim -> units[0] -> ... -> out_dim`.
fn create_linear_layers(vb: &VarBuilder, config: &MlpConfig) -> Result<Vec<Linear>> {
    let dims: Vec<usize> = std::iter::once(config.in_dim)
        .chain(config.units.iter().copied())
        .chain(std::iter::once(config.out_dim))
        .collect();

    dims.windows(2)
        .enumerate()
        .map(|(i, w)| Ok(linear(w[0], w[1], vb.pp(format!("ln{}", i)))?))
        .collect()
}

/// ReLU is applied after every hidden layer, preceded by normalization if `norms` is given.
fn mlp_forward(xs: Tensor, layers: &[Linear], norms: Option<&[LayerNorm]>) -> Result<Tensor> {
    let n_layers = layers.len();
    let mut xs = xs;

    for (i, layer) in layers.iter().enumerate() {
        xs = layer.forward(&xs)?;
        if i + 1 < n_layers {
            if let Some(norm) = norms.and_then(|norms| norms.get(i)) {
                xs = norm.forward(&xs)?;
            }
            xs = xs.relu()?;
        }
    }

    Ok(xs)
}
