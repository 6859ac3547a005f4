use super::{ParamGen, param_gen::Quota};

/// Repeats a single value, e.g. the unit scales and zero shifts of the normalization layers.
pub struct ConstParamGen {
    value: f32,
    quota: Quota,
}

impl ConstParamGen {
    /// Creates a new `ConstParamGen` that yields `value` exactly `limit` times.
    pub fn new(value: f32, limit: usize) -> Self {
        Self {
            value,
            quota: Quota::new(limit),
        }
    }
}

impl ParamGen for ConstParamGen {
    fn sample(&mut self, n: usize) -> Option<Vec<f32>> {
        self.quota.claim(n).map(|n| vec![self.value; n])
    }
}
