use std::ops::Range;

use crate::{MlErr, Result};

/// Maps the flat parameter buffer into the slices of every stage and of the classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamLayout {
    stages: Vec<Range<usize>>,
    classifier: Range<usize>,
}

impl ParamLayout {
    /// Lays the segments one after the other, in pipeline order.
    ///
    /// # Arguments
    /// * `stage_sizes` - The amount of parameters of each stage.
    /// * `classifier_size` - The amount of parameters of the classifier.
    pub fn new<I>(stage_sizes: I, classifier_size: usize) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        let mut end = 0;
        let stages = stage_sizes
            .into_iter()
            .map(|size| {
                let start = end;
                end += size;
                start..end
            })
            .collect();

        Self {
            stages,
            classifier: end..end + classifier_size,
        }
    }

    pub fn stage(&self, position: usize) -> Option<Range<usize>> {
        self.stages.get(position).cloned()
    }

    pub fn stages(&self) -> &[Range<usize>] {
        &self.stages
    }

    pub fn classifier(&self) -> Range<usize> {
        self.classifier.clone()
    }

    /// The total amount of parameters.
    pub fn size(&self) -> usize {
        self.classifier.end
    }

    /// The sizes of every segment, stages first and the classifier last.
    pub fn sizes(&self) -> Vec<usize> {
        self.stages
            .iter()
            .chain([&self.classifier])
            .map(|range| range.len())
            .collect()
    }

    /// Checks that a buffer of `total_params` parameters can back this layout.
    pub fn validate(&self, total_params: usize) -> Result<()> {
        if total_params != self.size() {
            return Err(MlErr::SizeMismatch {
                what: "parameter buffer",
                got: total_params,
                expected: self.size(),
            });
        }

        Ok(())
    }
}
