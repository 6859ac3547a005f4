/// Fills one segment of the model's flat parameter buffer with its initial values.
///
/// Generators are finite: each one knows the length of its segment and returns `None` once it
/// has produced all of it, which is what lets [`super::ChainedParamGen`] move on to the next.
pub trait ParamGen {
    /// Produces the next `n` values of the segment, fewer if the segment ends before.
    fn sample(&mut self, n: usize) -> Option<Vec<f32>>;
}

/// The amount of values a generator may still produce.
#[derive(Debug, Clone, Copy)]
pub(super) struct Quota(usize);

impl Quota {
    pub(super) fn new(limit: usize) -> Self {
        Self(limit)
    }

    /// Takes up to `n` values out of the quota, `None` once it is spent.
    pub(super) fn claim(&mut self, n: usize) -> Option<usize> {
        if self.0 == 0 {
            return None;
        }

        let n = n.min(self.0);
        self.0 -= n;
        Some(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_until_spent() {
        let mut quota = Quota::new(10);

        assert_eq!(quota.claim(7), Some(7));
        assert_eq!(quota.claim(7), Some(3));
        assert_eq!(quota.claim(1), None);
    }

    #[test]
    fn zero_quota_is_spent() {
        assert_eq!(Quota::new(0).claim(1), None);
    }

    #[test]
    fn claiming_nothing_keeps_the_quota() {
        let mut quota = Quota::new(2);

        assert_eq!(quota.claim(0), Some(0));
        assert_eq!(quota.claim(5), Some(2));
    }
}
