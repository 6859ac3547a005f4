use std::{cell::RefCell, rc::Rc};

use ndarray::{linalg, prelude::*};
use rand::Rng;
use rayon::prelude::*;

use crate::{
    MlErr, Result,
    initialization::{ParamGen, RandParamGen},
};

/// A bias-free 2D convolution (cross-correlation, as in every deep learning framework) over
/// batched `(batch, channels, height, width)` tensors.
///
/// The kernel is a view over the layer's slice of the flat parameter buffer with shape
/// `(out_channels, in_channels, kernel_size, kernel_size)` in row-major order. Each batch item
/// is lowered with *im2col* and multiplied against the kernel in a single GEMM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conv2d {
    in_channels: usize,
    out_channels: usize,
    kernel_size: usize,
    stride: usize,
    padding: usize,
}

impl Conv2d {
    /// Creates a new `Conv2d`.
    ///
    /// # Arguments
    /// * `in_channels` - The amount of channels of the input tensor.
    /// * `out_channels` - The amount of filters, i.e. channels of the output tensor.
    /// * `kernel_size` - The side of the square kernel.
    /// * `stride` - The step between two consecutive windows.
    /// * `padding` - The amount of zeros added on every side of the input.
    ///
    /// # Returns
    /// A new `Conv2d` instance.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        padding: usize,
    ) -> Self {
        Self {
            in_channels,
            out_channels,
            kernel_size,
            stride: stride.max(1),
            padding,
        }
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    pub fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn padding(&self) -> usize {
        self.padding
    }

    /// Returns the amount of parameters of the kernel.
    pub fn size(&self) -> usize {
        self.out_channels * self.in_channels * self.kernel_size * self.kernel_size
    }

    /// Computes the spatial size of the output for a given input size.
    ///
    /// # Arguments
    /// * `h` - The height of the input.
    /// * `w` - The width of the input.
    ///
    /// # Returns
    /// The output's `(height, width)` or an error if the kernel does not fit in the padded input.
    pub fn output_hw(&self, h: usize, w: usize) -> Result<(usize, usize)> {
        let (k, p, stride) = (self.kernel_size, self.padding, self.stride);

        if h + 2 * p < k || w + 2 * p < k {
            return Err(MlErr::WindowTooLarge {
                what: "conv kernel",
                input: (h + 2 * p, w + 2 * p),
                window: k,
            });
        }

        Ok(((h + 2 * p - k) / stride + 1, (w + 2 * p - k) / stride + 1))
    }

    /// Convolves every item of the batch with the kernel.
    ///
    /// # Arguments
    /// * `weights` - The kernel's slice of the flat parameter buffer.
    /// * `x` - The input tensor.
    ///
    /// # Returns
    /// A `(batch, out_channels, out_height, out_width)` tensor or an error if the input's
    /// channels or the kernel's length don't match this layer.
    pub fn forward(&self, weights: &[f32], x: ArrayView4<f32>) -> Result<Array4<f32>> {
        let (batch, channels, h, w) = x.dim();

        if channels != self.in_channels {
            return Err(MlErr::SizeMismatch {
                what: "conv input channels",
                got: channels,
                expected: self.in_channels,
            });
        }

        if weights.len() != self.size() {
            return Err(MlErr::SizeMismatch {
                what: "conv kernel",
                got: weights.len(),
                expected: self.size(),
            });
        }

        let (oh, ow) = self.output_hw(h, w)?;
        if batch == 0 {
            return Ok(Array4::zeros((0, self.out_channels, oh, ow)));
        }

        let patch = self.in_channels * self.kernel_size * self.kernel_size;
        let kernel = ArrayView2::from_shape((self.out_channels, patch), weights)?;

        let outs = (0..batch)
            .into_par_iter()
            .map(|i| {
                let cols = self.im2col(x.index_axis(Axis(0), i), oh, ow)?;
                let mut out = Array2::<f32>::zeros((self.out_channels, oh * ow));
                linalg::general_mat_mul(1.0, &kernel, &cols, 0.0, &mut out);
                out.into_shape_with_order((self.out_channels, oh, ow))
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let views: Vec<_> = outs.iter().map(|out| out.view()).collect();
        Ok(ndarray::stack(Axis(0), &views)?)
    }

    /// Generators for the kernel: Kaiming normal over the fan out, as is the default for
    /// convolutions followed by a ReLU.
    pub fn param_gens<R: Rng + 'static>(
        &self,
        rng: &Rc<RefCell<R>>,
    ) -> Result<Vec<Box<dyn ParamGen>>> {
        let fan_out = self.out_channels * self.kernel_size * self.kernel_size;
        let kernel: Box<dyn ParamGen> =
            Box::new(RandParamGen::kaiming(rng.clone(), self.size(), fan_out)?);
        Ok(vec![kernel])
    }

    /// Lowers a single `(channels, height, width)` item into a
    /// `(channels * kernel_size^2, out_height * out_width)` matrix, one column per window.
    fn im2col(
        &self,
        x: ArrayView3<f32>,
        oh: usize,
        ow: usize,
    ) -> std::result::Result<Array2<f32>, ndarray::ShapeError> {
        let (c, h, w) = x.dim();
        let (k, p, stride) = (self.kernel_size, self.padding, self.stride);

        let mut padded = Array3::<f32>::zeros((c, h + 2 * p, w + 2 * p));
        padded.slice_mut(s![.., p..p + h, p..p + w]).assign(&x);

        let mut cols = Array3::<f32>::zeros((c * k * k, oh, ow));
        for ci in 0..c {
            for ky in 0..k {
                for kx in 0..k {
                    let window = padded.slice(s![
                        ci,
                        ky..ky + stride * (oh - 1) + 1;stride,
                        kx..kx + stride * (ow - 1) + 1;stride
                    ]);
                    cols.index_axis_mut(Axis(0), (ci * k + ky) * k + kx)
                        .assign(&window);
                }
            }
        }

        cols.into_shape_with_order((c * k * k, oh * ow))
    }
}
