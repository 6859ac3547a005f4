use std::{cell::RefCell, rc::Rc};

use ndarray::{Array4, ArrayView4};
use rand::Rng;

use super::{ConvBlock, MaxPool2d, SignatureConv};
use crate::{Result, arch::LayerRole, initialization::ParamGen};

/// A stage of the feature pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Layer {
    MaxPool(MaxPool2d),
    Conv(ConvBlock),
    Signed(SignatureConv),
}
use Layer::*;

impl Layer {
    pub fn max_pool(kernel_size: usize, stride: usize) -> Self {
        Self::MaxPool(MaxPool2d::new(kernel_size, stride))
    }

    pub fn conv(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        padding: usize,
    ) -> Self {
        Self::Conv(ConvBlock::new(
            in_channels,
            out_channels,
            kernel_size,
            stride,
            padding,
        ))
    }

    pub fn signature_conv(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        padding: usize,
    ) -> Self {
        Self::Signed(SignatureConv::new(
            in_channels,
            out_channels,
            kernel_size,
            stride,
            padding,
        ))
    }

    pub fn role(&self) -> LayerRole {
        match self {
            MaxPool(_) => LayerRole::MaxPool,
            Conv(_) => LayerRole::PlainConvBlock,
            Signed(_) => LayerRole::SignedConvBlock,
        }
    }

    /// Returns the amount of parameters of the layer.
    pub fn size(&self) -> usize {
        match self {
            MaxPool(_) => 0,
            Conv(l) => l.size(),
            Signed(l) => l.size(),
        }
    }

    pub fn forward(&self, params: &[f32], x: ArrayView4<f32>) -> Result<Array4<f32>> {
        match self {
            MaxPool(l) => l.forward(x),
            Conv(l) => l.forward(params, x),
            Signed(l) => l.forward(params, x),
        }
    }

    pub fn param_gens<R: Rng + 'static>(
        &self,
        rng: &Rc<RefCell<R>>,
    ) -> Result<Vec<Box<dyn ParamGen>>> {
        match self {
            MaxPool(_) => Ok(Vec::new()),
            Conv(l) => l.param_gens(rng),
            Signed(l) => l.param_gens(rng),
        }
    }
}
