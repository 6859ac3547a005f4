use std::{cell::RefCell, rc::Rc};

use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

use super::{ParamGen, param_gen::Quota};
use crate::Result;

/// A parameter generator that follows a certain probabilistic distribution.
///
/// Several generators may share the same `rng`, which is what makes a whole model reproducible
/// from a single seed.
pub struct RandParamGen<R: Rng, D: Distribution<f32>> {
    rng: Rc<RefCell<R>>,
    distribution: D,
    quota: Quota,
}

impl<R: Rng, D: Distribution<f32>> RandParamGen<R, D> {
    /// Creates a new `RandParamGen` parameter generator.
    ///
    /// # Arguments
    /// * `rng` - A shared random number generator.
    /// * `distribution` - The distribution to sample the random numbers from.
    /// * `limit` - The maximum amount of numbers to generate.
    pub fn new(rng: Rc<RefCell<R>>, distribution: D, limit: usize) -> Self {
        Self {
            rng,
            distribution,
            quota: Quota::new(limit),
        }
    }
}

impl<R: Rng> RandParamGen<R, Uniform<f32>> {
    /// Creates a new `RandParamGen` parameter generator with a uniform distribution.
    ///
    /// # Arguments
    /// * `rng` - A shared random number generator.
    /// * `limit` - The maximum amount of numbers to generate.
    /// * `low` - The inclusive lower limit.
    /// * `high` - The exclusive upper limit.
    ///
    /// # Returns
    /// An error if the range is invalid (low >= high).
    pub fn uniform(rng: Rc<RefCell<R>>, limit: usize, low: f32, high: f32) -> Result<Self> {
        Ok(Self::new(rng, Uniform::new(low, high)?, limit))
    }

    /// Creates a new `RandParamGen` parameter generator with the default initialization of a
    /// fully connected layer, that is, uniform in `[-1/sqrt(fan_in), 1/sqrt(fan_in))`.
    ///
    /// # Arguments
    /// * `rng` - A shared random number generator.
    /// * `limit` - The maximum amount of numbers to generate.
    /// * `fan_in` - The number of input units of the layer.
    pub fn fan_in_uniform(rng: Rc<RefCell<R>>, limit: usize, fan_in: usize) -> Result<Self> {
        let bound = 1. / (fan_in.max(1) as f32).sqrt();
        Self::uniform(rng, limit, -bound, bound)
    }
}

impl<R: Rng> RandParamGen<R, Normal<f32>> {
    /// Creates a new `RandParamGen` parameter generator with a normal distribution.
    ///
    /// # Arguments
    /// * `rng` - A shared random number generator.
    /// * `limit` - The maximum amount of numbers to generate.
    /// * `mean` - The mean of the distribution.
    /// * `std_dev` - The standard deviation of the distribution.
    ///
    /// # Returns
    /// An error if `std_dev` is not finite (Nan or infinite).
    pub fn normal(rng: Rc<RefCell<R>>, limit: usize, mean: f32, std_dev: f32) -> Result<Self> {
        Ok(Self::new(rng, Normal::new(mean, std_dev)?, limit))
    }

    /// Creates a new `RandParamGen` parameter generator using Kaiming normal initialization
    /// for a layer followed by a ReLU.
    ///
    /// # Arguments
    /// * `rng` - A shared random number generator.
    /// * `limit` - The maximum amount of numbers to generate.
    /// * `fan` - The fan of the weight tensor, convolutions use their fan out
    ///   (`out_channels * kernel * kernel`).
    ///
    /// # Returns
    /// An error if the calculated standard deviation is not finite.
    pub fn kaiming(rng: Rc<RefCell<R>>, limit: usize, fan: usize) -> Result<Self> {
        let std_dev = (2. / fan.max(1) as f32).sqrt();
        Self::normal(rng, limit, 0., std_dev)
    }
}

impl<R: Rng, D: Distribution<f32>> ParamGen for RandParamGen<R, D> {
    fn sample(&mut self, n: usize) -> Option<Vec<f32>> {
        let n = self.quota.claim(n)?;
        let mut rng = self.rng.borrow_mut();
        let sample = (0..n)
            .map(|_| self.distribution.sample(&mut *rng))
            .collect();
        Some(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};

    fn seeded_rng() -> Rc<RefCell<StdRng>> {
        Rc::new(RefCell::new(StdRng::seed_from_u64(42)))
    }

    #[test]
    fn empty() {
        let mut param_gen = RandParamGen::normal(seeded_rng(), 0, 0., 1.).unwrap();
        assert!(param_gen.sample(1).is_none());
    }

    #[test]
    fn partial() {
        let mut param_gen = RandParamGen::kaiming(seeded_rng(), 10, 64 * 5 * 5).unwrap();

        let sample = param_gen.sample(7).unwrap();
        assert_eq!(sample.len(), 7);

        let sample = param_gen.sample(7).unwrap();
        assert_eq!(sample.len(), 3);

        assert!(param_gen.sample(1).is_none());
    }

    #[test]
    fn fan_in_uniform_stays_in_bounds() {
        const FAN_IN: usize = 4096;
        let bound = 1. / (FAN_IN as f32).sqrt();

        let mut param_gen = RandParamGen::fan_in_uniform(seeded_rng(), 1000, FAN_IN).unwrap();
        let sample = param_gen.sample(1000).unwrap();

        assert!(sample.iter().all(|x| (-bound..bound).contains(x)));
    }

    #[test]
    fn empty_uniform_range_fails() {
        assert!(RandParamGen::uniform(seeded_rng(), 1, 1., 1.).is_err());
    }

    #[test]
    fn same_seed_same_sample() {
        let mut a = RandParamGen::kaiming(seeded_rng(), 32, 9).unwrap();
        let mut b = RandParamGen::kaiming(seeded_rng(), 32, 9).unwrap();

        assert_eq!(a.sample(32), b.sample(32));
    }
}
