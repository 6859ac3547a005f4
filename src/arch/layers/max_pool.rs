use ndarray::{Zip, prelude::*};

use crate::{MlErr, Result};

/// Max pooling over the spatial axes of `(batch, channels, height, width)` tensors.
///
/// Windows that would hang over the border are dropped, so odd sizes get floored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaxPool2d {
    kernel_size: usize,
    stride: usize,
}

impl MaxPool2d {
    pub fn new(kernel_size: usize, stride: usize) -> Self {
        Self {
            kernel_size: kernel_size.max(1),
            stride: stride.max(1),
        }
    }

    pub fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Computes the spatial size of the output for a given input size.
    pub fn output_hw(&self, h: usize, w: usize) -> Result<(usize, usize)> {
        let k = self.kernel_size;

        if h < k || w < k {
            return Err(MlErr::WindowTooLarge {
                what: "max pool",
                input: (h, w),
                window: k,
            });
        }

        Ok(((h - k) / self.stride + 1, (w - k) / self.stride + 1))
    }

    /// Keeps the maximum of every window, a NaN anywhere in a window wins.
    ///
    /// # Arguments
    /// * `x` - The input tensor.
    ///
    /// # Returns
    /// The pooled tensor, with the same batch and channels as `x`.
    pub fn forward(&self, x: ArrayView4<f32>) -> Result<Array4<f32>> {
        let (batch, channels, h, w) = x.dim();
        let (oh, ow) = self.output_hw(h, w)?;
        let (k, stride) = (self.kernel_size, self.stride);

        let mut out = Array4::from_elem((batch, channels, oh, ow), f32::NEG_INFINITY);
        for ky in 0..k {
            for kx in 0..k {
                let window = x.slice(s![
                    ..,
                    ..,
                    ky..ky + stride * (oh - 1) + 1;stride,
                    kx..kx + stride * (ow - 1) + 1;stride
                ]);

                Zip::from(&mut out).and(&window).for_each(|acc, &v| {
                    if v > *acc || v.is_nan() {
                        *acc = v;
                    }
                });
            }
        }

        Ok(out)
    }
}
