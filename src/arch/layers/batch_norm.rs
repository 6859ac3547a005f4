use ndarray::prelude::*;

use crate::{
    MlErr, Result,
    initialization::{ConstParamGen, ParamGen},
};

const EPS: f32 = 1e-5;

/// Per channel normalization of `(batch, channels, height, width)` tensors.
///
/// The running statistics live in the flat parameter buffer next to the optional affine terms
/// and are only ever written by whoever owns the buffer, the forward pass always normalizes with
/// them. Layout: `[gamma | beta]` when affine, followed by `[running_mean | running_var]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchNorm2d {
    channels: usize,
    affine: bool,
}

impl BatchNorm2d {
    pub fn new(channels: usize, affine: bool) -> Self {
        Self { channels, affine }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn is_affine(&self) -> bool {
        self.affine
    }

    /// Returns the amount of parameters this layer has.
    pub fn size(&self) -> usize {
        let segments = if self.affine { 4 } else { 2 };
        segments * self.channels
    }

    /// Normalizes `x` in place.
    ///
    /// # Arguments
    /// * `params` - This layer's slice of the flat parameter buffer.
    /// * `x` - The tensor to normalize.
    ///
    /// # Returns
    /// The normalized tensor or an error if the channels or the parameters don't match.
    pub fn forward(&self, params: &[f32], mut x: Array4<f32>) -> Result<Array4<f32>> {
        let channels = x.len_of(Axis(1));
        if channels != self.channels {
            return Err(MlErr::SizeMismatch {
                what: "batch norm channels",
                got: channels,
                expected: self.channels,
            });
        }

        if params.len() != self.size() {
            return Err(MlErr::SizeMismatch {
                what: "batch norm parameters",
                got: params.len(),
                expected: self.size(),
            });
        }

        let (affine, stats) = params.split_at(params.len() - 2 * self.channels);
        let (mean, var) = stats.split_at(self.channels);
        let (gamma, beta) = affine.split_at(affine.len() / 2);

        for (c, mut plane) in x.axis_iter_mut(Axis(1)).enumerate() {
            let inv_std = 1. / (var[c] + EPS).sqrt();
            let (g, b) = match self.affine {
                true => (gamma[c], beta[c]),
                false => (1., 0.),
            };

            let (m, scale) = (mean[c], inv_std * g);
            plane.mapv_inplace(|v| (v - m) * scale + b);
        }

        Ok(x)
    }

    /// Generators for the identity normalization, one per segment of the layout.
    pub fn param_gens(&self) -> Vec<Box<dyn ParamGen>> {
        // [gamma, beta,] running_mean, running_var
        let segments: &[f32] = match self.affine {
            true => &[1., 0., 0., 1.],
            false => &[0., 1.],
        };

        segments
            .iter()
            .map(|&value| {
                Box::new(ConstParamGen::new(value, self.channels)) as Box<dyn ParamGen>
            })
            .collect()
    }
}
