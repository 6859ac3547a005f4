use std::{cell::RefCell, rc::Rc};

use ndarray::prelude::*;
use rand::Rng;

use super::{BatchNorm2d, Conv2d};
use crate::{Result, arch::activations::Relu, initialization::ParamGen};

/// The plain building block of the network: `Conv2d → BatchNorm2d → ReLU`.
///
/// Parameter layout: `[kernel | gamma | beta | running_mean | running_var]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvBlock {
    conv: Conv2d,
    bn: BatchNorm2d,
}

impl ConvBlock {
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        padding: usize,
    ) -> Self {
        Self {
            conv: Conv2d::new(in_channels, out_channels, kernel_size, stride, padding),
            bn: BatchNorm2d::new(out_channels, true),
        }
    }

    pub fn conv(&self) -> &Conv2d {
        &self.conv
    }

    pub fn size(&self) -> usize {
        self.conv.size() + self.bn.size()
    }

    pub fn forward(&self, params: &[f32], x: ArrayView4<f32>) -> Result<Array4<f32>> {
        let (kernel, bn_params) = params.split_at(self.conv.size().min(params.len()));

        let z = self.conv.forward(kernel, x)?;
        let mut a = self.bn.forward(bn_params, z)?;
        Relu.apply_inplace(&mut a);

        Ok(a)
    }

    pub fn param_gens<R: Rng + 'static>(
        &self,
        rng: &Rc<RefCell<R>>,
    ) -> Result<Vec<Box<dyn ParamGen>>> {
        let mut param_gens = self.conv.param_gens(rng)?;
        param_gens.extend(self.bn.param_gens());
        Ok(param_gens)
    }
}
