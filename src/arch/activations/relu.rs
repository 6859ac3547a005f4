use ndarray::{ArrayBase, DataMut, Dimension};

/// Rectified linear unit, `max(0, x)`. NaNs pass through.
#[derive(Clone, Copy, Debug, Default)]
pub struct Relu;

impl Relu {
    pub fn f(&self, z: f32) -> f32 {
        if z < 0. { 0. } else { z }
    }

    /// Applies the activation over every element of `x`.
    pub fn apply_inplace<S, D>(&self, x: &mut ArrayBase<S, D>)
    where
        S: DataMut<Elem = f32>,
        D: Dimension,
    {
        x.mapv_inplace(|z| self.f(z));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn clamps_negatives() {
        let mut x = array![[-1f32, 0., 2.5], [-0.1, 3., -7.]];
        Relu.apply_inplace(&mut x);

        assert_eq!(x, array![[0f32, 0., 2.5], [0., 3., 0.]]);
    }

    #[test]
    fn nan_passes_through() {
        let mut x = array![f32::NAN, -1., 1.];
        Relu.apply_inplace(&mut x);

        assert!(x[0].is_nan());
        assert_eq!(x[1], 0.);
        assert_eq!(x[2], 1.);
    }
}
