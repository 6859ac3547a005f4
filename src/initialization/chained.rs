use super::ParamGen;

/// A parameter generator that delegates the generation to a chain of parameter generators.
///
/// Each layer of a model contributes one generator per parameter segment (weights, affine
/// terms, running statistics...), chaining them yields the initial flat parameter buffer of
/// the whole model in a single `sample` call.
pub struct ChainedParamGen {
    param_gens: Vec<Box<dyn ParamGen>>,
    curr: usize,
}

impl ChainedParamGen {
    /// Creates a new `ChainedParamGen` parameter generator.
    ///
    /// # Arguments
    /// * `param_gens` - A vec of potentially different parameter generators.
    pub fn new(param_gens: Vec<Box<dyn ParamGen>>) -> Self {
        Self {
            param_gens,
            curr: 0,
        }
    }
}

impl ParamGen for ChainedParamGen {
    fn sample(&mut self, n: usize) -> Option<Vec<f32>> {
        if self.curr == self.param_gens.len() {
            return None;
        }

        let mut sample = Vec::with_capacity(n);
        while self.curr < self.param_gens.len() {
            let missing = n - sample.len();

            match self.param_gens[self.curr].sample(missing) {
                Some(part) if part.len() == missing => {
                    sample.extend(part);
                    break;
                }
                Some(part) => {
                    sample.extend(part);
                    self.curr += 1;
                }
                None => self.curr += 1,
            }
        }

        if sample.is_empty() && self.curr == self.param_gens.len() {
            return None;
        }

        Some(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::{super::ConstParamGen, *};

    #[test]
    fn empty() {
        let mut param_gen = ChainedParamGen::new(vec![]);
        assert!(param_gen.sample(1).is_none());
    }

    #[test]
    fn exact() {
        let param_gens: Vec<Box<dyn ParamGen>> = vec![
            Box::new(ConstParamGen::new(0., 5)),
            Box::new(ConstParamGen::new(1., 5)),
        ];

        let mut param_gen = ChainedParamGen::new(param_gens);
        let sample = param_gen.sample(10).unwrap();
        let expected: Vec<_> = (0..10).map(|i| (i > 4) as u32 as f32).collect();

        assert_eq!(sample, expected);
        assert!(param_gen.sample(1).is_none());
    }

    #[test]
    fn skips_empty_segments() {
        let param_gens: Vec<Box<dyn ParamGen>> = vec![
            Box::new(ConstParamGen::new(0., 1)),
            Box::new(ConstParamGen::new(7., 0)),
            Box::new(ConstParamGen::new(1., 2)),
        ];

        let mut param_gen = ChainedParamGen::new(param_gens);

        assert_eq!(param_gen.sample(3).unwrap(), [0., 1., 1.]);
        assert!(param_gen.sample(1).is_none());
    }

    #[test]
    fn nested() {
        let inner: Vec<Box<dyn ParamGen>> = vec![
            Box::new(ConstParamGen::new(1., 1)),
            Box::new(ConstParamGen::new(2., 1)),
        ];

        let param_gens: Vec<Box<dyn ParamGen>> = vec![
            Box::new(ConstParamGen::new(0., 1)),
            Box::new(ChainedParamGen::new(inner)),
            Box::new(ConstParamGen::new(3., 1)),
        ];

        let mut param_gen = ChainedParamGen::new(param_gens);
        let sample = param_gen.sample(4).unwrap();

        assert_eq!(sample, [0., 1., 2., 3.]);
        assert!(param_gen.sample(1).is_none());
    }
}
