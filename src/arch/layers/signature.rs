use ndarray::{Array1, Array2};

use crate::{MlErr, Result};

/// The key material of an ownership watermark: a string of `±1` bits and the projection key
/// that maps a layer's scale vector onto them.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    bits: Array1<f32>,
    key: Array2<f32>,
}

impl Signature {
    pub fn bits(&self) -> &Array1<f32> {
        &self.bits
    }

    /// The `(bits, channels)` projection key.
    pub fn key(&self) -> &Array2<f32> {
        &self.key
    }
}

/// Holds the private watermark state of a signature convolution.
///
/// None of it is part of the flat parameter buffer: the buffer gets shared and averaged between
/// owners while the signature never leaves its owner.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureBlock {
    channels: usize,
    signature: Option<Signature>,
}

impl SignatureBlock {
    /// Creates an empty `SignatureBlock` for a layer with `channels` output channels.
    pub fn new(channels: usize) -> Self {
        Self {
            channels,
            signature: None,
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// Installs the key material of a watermark, replacing any previous one.
    ///
    /// # Arguments
    /// * `bits` - The signature, every entry must be either `1` or `-1`.
    /// * `key` - A `(bits.len(), channels)` projection key.
    ///
    /// # Returns
    /// An error if the bits aren't `±1` or the key's shape doesn't match.
    pub fn set_signature(&mut self, bits: Array1<f32>, key: Array2<f32>) -> Result<()> {
        if let Some(bad) = bits.iter().find(|&&b| b != 1. && b != -1.) {
            return Err(MlErr::InvalidSignature(format!(
                "bits must be either 1 or -1, found {bad}"
            )));
        }

        let expected = (bits.len(), self.channels);
        if key.dim() != expected {
            return Err(MlErr::InvalidSignature(format!(
                "expected a {expected:?} key, got {:?}",
                key.dim()
            )));
        }

        self.signature = Some(Signature { bits, key });
        Ok(())
    }

    /// Removes the watermark, returning it.
    pub fn clear(&mut self) -> Option<Signature> {
        self.signature.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn starts_unsigned() {
        let block = SignatureBlock::new(4);
        assert!(!block.is_signed());
        assert!(block.signature().is_none());
    }

    #[test]
    fn set_and_clear() {
        let mut block = SignatureBlock::new(2);
        let bits = array![1f32, -1., 1.];
        let key = Array2::from_elem((3, 2), 0.25);

        block.set_signature(bits.clone(), key.clone()).unwrap();
        let signature = block.signature().unwrap();
        assert_eq!(signature.bits(), &bits);
        assert_eq!(signature.key(), &key);

        assert!(block.clear().is_some());
        assert!(!block.is_signed());
    }

    #[test]
    fn rejects_non_binary_bits() {
        let mut block = SignatureBlock::new(2);
        let res = block.set_signature(array![1f32, 0.], Array2::zeros((2, 2)));

        assert!(matches!(res, Err(MlErr::InvalidSignature(_))));
        assert!(!block.is_signed());
    }

    #[test]
    fn rejects_mismatched_key() {
        let mut block = SignatureBlock::new(2);
        let res = block.set_signature(array![1f32, -1.], Array2::zeros((2, 3)));

        assert!(matches!(res, Err(MlErr::InvalidSignature(_))));
    }
}
