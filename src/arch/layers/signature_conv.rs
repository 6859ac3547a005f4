use std::{cell::RefCell, rc::Rc};

use ndarray::prelude::*;
use rand::Rng;

use super::{BatchNorm2d, Conv2d, SignatureBlock};
use crate::{
    MlErr, Result,
    arch::activations::Relu,
    initialization::{ConstParamGen, ParamGen},
};

/// A convolution block whose per channel scale carries an ownership watermark:
/// `Conv2d → BatchNorm2d (non affine) → x·scale + bias → ReLU`.
///
/// Parameter layout: `[kernel | scale | bias | running_mean | running_var]`. The key material
/// of the watermark lives in the `SignatureBlock`, outside of the parameter buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureConv {
    conv: Conv2d,
    bn: BatchNorm2d,
    signature_block: SignatureBlock,
}

impl SignatureConv {
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        padding: usize,
    ) -> Self {
        Self {
            conv: Conv2d::new(in_channels, out_channels, kernel_size, stride, padding),
            bn: BatchNorm2d::new(out_channels, false),
            signature_block: SignatureBlock::new(out_channels),
        }
    }

    pub fn conv(&self) -> &Conv2d {
        &self.conv
    }

    pub fn signature_block(&self) -> &SignatureBlock {
        &self.signature_block
    }

    pub fn signature_block_mut(&mut self) -> &mut SignatureBlock {
        &mut self.signature_block
    }

    pub fn size(&self) -> usize {
        self.conv.size() + 2 * self.channels() + self.bn.size()
    }

    /// Gives a view of the watermark carrying scale inside this layer's parameters.
    ///
    /// # Arguments
    /// * `params` - This layer's slice of the flat parameter buffer.
    pub fn scale<'a>(&self, params: &'a [f32]) -> Result<ArrayView1<'a, f32>> {
        let (_, scale, _, _) = self.split_params(params)?;
        Ok(ArrayView1::from(scale))
    }

    pub fn forward(&self, params: &[f32], x: ArrayView4<f32>) -> Result<Array4<f32>> {
        let (kernel, scale, bias, bn_params) = self.split_params(params)?;

        let z = self.conv.forward(kernel, x)?;
        let mut a = self.bn.forward(bn_params, z)?;

        for (c, mut plane) in a.axis_iter_mut(Axis(1)).enumerate() {
            let (s, b) = (scale[c], bias[c]);
            plane.mapv_inplace(|v| v * s + b);
        }
        Relu.apply_inplace(&mut a);

        Ok(a)
    }

    /// Generators for the kernel (Kaiming), a unit scale, a zero bias and the identity
    /// normalization statistics.
    pub fn param_gens<R: Rng + 'static>(
        &self,
        rng: &Rc<RefCell<R>>,
    ) -> Result<Vec<Box<dyn ParamGen>>> {
        let c = self.channels();
        let mut param_gens = self.conv.param_gens(rng)?;
        for value in [1., 0.] {
            param_gens.push(Box::new(ConstParamGen::new(value, c)));
        }
        param_gens.extend(self.bn.param_gens());
        Ok(param_gens)
    }

    fn channels(&self) -> usize {
        self.conv.out_channels()
    }

    fn split_params<'a>(
        &self,
        params: &'a [f32],
    ) -> Result<(&'a [f32], &'a [f32], &'a [f32], &'a [f32])> {
        if params.len() != self.size() {
            return Err(MlErr::SizeMismatch {
                what: "signature conv parameters",
                got: params.len(),
                expected: self.size(),
            });
        }

        let c = self.channels();
        let (kernel, rest) = params.split_at(self.conv.size());
        let (scale, rest) = rest.split_at(c);
        let (bias, bn_params) = rest.split_at(c);
        Ok((kernel, scale, bias, bn_params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::initialization::ChainedParamGen;
    use ndarray::array;
    use rand::{SeedableRng, rngs::StdRng};

    fn init(layer: &SignatureConv) -> Vec<f32> {
        let rng = Rc::new(RefCell::new(StdRng::seed_from_u64(11)));
        ChainedParamGen::new(layer.param_gens(&rng).unwrap())
            .sample(layer.size())
            .unwrap()
    }

    #[test]
    fn size() {
        let layer = SignatureConv::new(192, 384, 3, 1, 1);
        assert_eq!(layer.size(), 384 * 192 * 9 + 4 * 384);
    }

    #[test]
    fn default_scale_is_one() {
        let layer = SignatureConv::new(4, 6, 3, 1, 1);
        let params = init(&layer);

        let scale = layer.scale(&params).unwrap();
        assert_eq!(scale.len(), 6);
        assert!(scale.iter().all(|&s| s == 1.));
    }

    #[test]
    fn default_params_after_the_kernel() {
        let layer = SignatureConv::new(2, 3, 1, 1, 0);
        let params = init(&layer);

        // scale, bias, running mean, running var
        let tail = &params[layer.conv().size()..];
        assert_eq!(tail, [1., 1., 1., 0., 0., 0., 0., 0., 0., 1., 1., 1.]);
    }

    #[test]
    fn scale_and_bias_are_applied() {
        // 1x1 identity kernel on a single channel, with scale 2 and bias -1.
        let layer = SignatureConv::new(1, 1, 1, 1, 0);
        let params = [1., 2., -1., 0., 1.];
        let x = array![[[[0f32, 1.], [2., 0.25]]]];

        let y = layer.forward(&params, x.view()).unwrap();
        let expected = array![[[[0f32, 1.], [3., 0.]]]];
        assert!(y.iter().zip(&expected).all(|(a, b)| (a - b).abs() < 1e-4));
    }

    #[test]
    fn forward_shape() {
        let layer = SignatureConv::new(4, 6, 3, 1, 1);
        let params = init(&layer);
        let x = Array4::from_elem((3, 4, 5, 5), 0.5);

        let y = layer.forward(&params, x.view()).unwrap();
        assert_eq!(y.dim(), (3, 6, 5, 5));
        assert!(y.iter().all(|&v| v >= 0.));
    }

    #[test]
    fn signature_lives_outside_params() {
        let mut layer = SignatureConv::new(2, 3, 3, 1, 1);
        let size = layer.size();

        layer
            .signature_block_mut()
            .set_signature(array![1f32, -1.], Array2::ones((2, 3)))
            .unwrap();

        assert_eq!(layer.size(), size);
        assert!(layer.signature_block().is_signed());
    }
}
