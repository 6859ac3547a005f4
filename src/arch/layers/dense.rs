use std::{cell::RefCell, rc::Rc};

use ndarray::{linalg, prelude::*};
use rand::Rng;

use crate::{
    MlErr, Result,
    initialization::{ParamGen, RandParamGen},
};

/// A fully connected layer, `y = x·W + b`.
///
/// Its slice of the flat parameter buffer holds the `(in, out)` weights in row-major order
/// followed by the `out` biases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dense {
    dim: (usize, usize),
    size: usize,
}

impl Dense {
    /// Creates a new `Dense`.
    ///
    /// # Arguments
    /// * `dim` - The `(input, output)` widths of the layer.
    pub fn new(dim: (usize, usize)) -> Self {
        Self {
            dim,
            size: (dim.0 + 1) * dim.1,
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    /// Returns the size of this layer.
    ///
    /// # Returns
    /// The amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Applies the layer to a batch of row vectors.
    ///
    /// # Arguments
    /// * `params` - This layer's slice of the flat parameter buffer.
    /// * `x` - A `(batch, input)` matrix.
    ///
    /// # Returns
    /// A `(batch, output)` matrix or an error if the input width doesn't match.
    pub fn forward(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        if x.ncols() != self.dim.0 {
            return Err(MlErr::SizeMismatch {
                what: "dense input",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }

        let (w, b) = self.view_params(params)?;
        let mut z = Array2::zeros((x.nrows(), self.dim.1));
        linalg::general_mat_mul(1.0, &x, &w, 0.0, &mut z);
        z += &b;

        Ok(z)
    }

    /// Generators for the weights and biases, both uniform over `±1/sqrt(input)`.
    pub fn param_gens<R: Rng + 'static>(
        &self,
        rng: &Rc<RefCell<R>>,
    ) -> Result<Vec<Box<dyn ParamGen>>> {
        let (fan_in, out) = self.dim;
        let weights: Box<dyn ParamGen> =
            Box::new(RandParamGen::fan_in_uniform(rng.clone(), fan_in * out, fan_in)?);
        let biases: Box<dyn ParamGen> =
            Box::new(RandParamGen::fan_in_uniform(rng.clone(), out, fan_in)?);

        Ok(vec![weights, biases])
    }

    /// Gives a view of the raw parameter slice as the weights and biases of this layer.
    ///
    /// # Arguments
    /// * `params` - A slice of parameters.
    ///
    /// # Returns
    /// A tuple containing the weights and biases.
    fn view_params<'a>(
        &self,
        params: &'a [f32],
    ) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        if params.len() != self.size {
            return Err(MlErr::SizeMismatch {
                what: "dense parameters",
                got: params.len(),
                expected: self.size,
            });
        }

        let w_size = self.size - self.dim.1;
        let weights = ArrayView2::from_shape(self.dim, &params[..w_size])?;
        let biases = ArrayView1::from_shape(self.dim.1, &params[w_size..])?;
        Ok((weights, biases))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn size() {
        assert_eq!(Dense::new((4096, 10)).size(), 4097 * 10);
        assert_eq!(Dense::new((4096, 0)).size(), 0);
    }

    #[test]
    fn forward() {
        let dense = Dense::new((3, 2));
        #[rustfmt::skip]
        let params = [
            1., 0.,
            0., 1.,
            1., -1.,
            0.5, -0.5,
        ];
        let x = array![[1f32, 2., 3.], [0., 0., 0.]];

        let y = dense.forward(&params, x.view()).unwrap();
        assert_eq!(y, array![[4.5f32, -1.5], [0.5, -0.5]]);
    }

    #[test]
    fn wrong_input_width() {
        let dense = Dense::new((3, 2));
        let params = [0.; 8];
        let x = Array2::zeros((1, 4));

        assert!(matches!(
            dense.forward(&params, x.view()),
            Err(MlErr::SizeMismatch { got: 4, expected: 3, .. })
        ));
    }
}
