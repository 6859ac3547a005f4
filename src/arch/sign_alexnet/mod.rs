mod layout;
mod spec;

use std::{cell::RefCell, rc::Rc};

use log::{debug, info};
use ndarray::{Array2, ArrayView4, Axis};
use rand::{Rng, SeedableRng, rngs::StdRng};

use super::{
    activations::softmax,
    layers::{Dense, Layer, SignatureConv},
};
use crate::{
    MlErr, Result,
    initialization::{ChainedParamGen, ParamGen},
};

pub use layout::ParamLayout;
pub use spec::{
    FEATURE_CHANNELS, FEATURE_SIDE, FLAT_DIM, IN_CHANNELS, LayerRole, LayerSpec, NUM_STAGES,
    StagePlan, plan,
};

/// A modified AlexNet whose 4th, 5th and 6th stages are signature convolutions, the layers
/// that carry the ownership watermarks of the model.
///
/// The model owns its learnable parameters as a single flat buffer (see [`ParamLayout`]), that
/// is what gets shipped around and averaged between federated rounds. The training/evaluation
/// mode is ambient state: in training mode `forward` returns raw class scores, in evaluation
/// mode it returns their softmax.
#[derive(Debug, Clone)]
pub struct SignAlexNet {
    features: Vec<Layer>,
    classifier: Dense,
    layout: ParamLayout,
    params: Vec<f32>,
    training: bool,
}

impl SignAlexNet {
    /// Creates a new `SignAlexNet` with freshly initialized parameters.
    ///
    /// # Arguments
    /// * `num_classes` - The width of the classifier's output, not validated.
    ///
    /// # Returns
    /// A new `SignAlexNet` in training mode.
    pub fn new(num_classes: usize) -> Result<Self> {
        Self::with_rng(num_classes, StdRng::from_rng(&mut rand::rng()))
    }

    /// Same as [`SignAlexNet::new`] but the parameters are initialized deterministically from
    /// `seed`.
    pub fn with_seed(num_classes: usize, seed: u64) -> Result<Self> {
        Self::with_rng(num_classes, StdRng::seed_from_u64(seed))
    }

    /// Creates a new `SignAlexNet` drawing the initial parameters from `rng`.
    pub fn with_rng<R: Rng + 'static>(num_classes: usize, rng: R) -> Result<Self> {
        let features: Vec<_> = plan().into_iter().map(build_stage).collect();
        let classifier = Dense::new((FLAT_DIM, num_classes));
        let layout = ParamLayout::new(features.iter().map(Layer::size), classifier.size());

        let rng = Rc::new(RefCell::new(rng));
        let mut param_gens = Vec::new();
        for layer in &features {
            param_gens.extend(layer.param_gens(&rng)?);
        }
        param_gens.extend(classifier.param_gens(&rng)?);

        let size = layout.size();
        let params = init_params(param_gens, &layout)?;

        info!(
            "built sign alexnet: num_classes={num_classes} stages={} params={size}",
            features.len()
        );

        Ok(Self {
            features,
            classifier,
            layout,
            params,
            training: true,
        })
    }

    /// Runs the network over a batch of images.
    ///
    /// # Arguments
    /// * `x` - A `(batch, 3, height, width)` tensor, the resolution must shrink to a 4x4 feature
    ///   map after the three poolings (32x32 images).
    ///
    /// # Returns
    /// A `(batch, num_classes)` matrix of raw scores in training mode or of class probabilities
    /// in evaluation mode. Shape mismatches are reported by the layer where they happen.
    pub fn forward(&self, x: ArrayView4<f32>) -> Result<Array2<f32>> {
        let mut features = x.to_owned();

        for (position, layer) in self.features.iter().enumerate() {
            let params = self.stage_params(position).unwrap_or_default();
            features = layer.forward(params, features.view())?;
            debug!("stage {position} output: {:?}", features.shape());
        }

        let batch = features.len_of(Axis(0));
        let flat_dim: usize = features.shape()[1..].iter().product();
        let flat = features.into_shape_with_order((batch, flat_dim))?;

        let scores = self
            .classifier
            .forward(&self.params[self.layout.classifier()], flat.view())?;

        match self.training {
            true => Ok(scores),
            false => Ok(softmax(scores)),
        }
    }

    /// Switches to training mode, `forward` returns raw scores.
    pub fn train(&mut self) {
        self.training = true;
    }

    /// Switches to evaluation mode, `forward` returns probabilities.
    pub fn eval(&mut self) {
        self.training = false;
    }

    pub fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    pub fn num_classes(&self) -> usize {
        self.classifier.dim().1
    }

    /// The stages of the feature pipeline, in order.
    pub fn features(&self) -> &[Layer] {
        &self.features
    }

    pub fn classifier(&self) -> &Dense {
        &self.classifier
    }

    pub fn layout(&self) -> &ParamLayout {
        &self.layout
    }

    /// Returns the amount of parameters in the model.
    pub fn size(&self) -> usize {
        self.params.len()
    }

    /// The amount of parameters of every stage followed by the classifier's.
    pub fn layer_sizes(&self) -> Vec<usize> {
        self.layout.sizes()
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }

    /// Mutable access to the flat parameter buffer, for the training procedure.
    pub fn params_mut(&mut self) -> &mut [f32] {
        &mut self.params
    }

    /// The slice of the parameter buffer that belongs to the stage at `position`.
    pub fn stage_params(&self, position: usize) -> Option<&[f32]> {
        self.layout
            .stage(position)
            .map(|range| &self.params[range])
    }

    /// Replaces the whole parameter buffer, e.g. with the aggregate of a federated round.
    ///
    /// # Returns
    /// An error if `params` doesn't have exactly `size()` entries, the current parameters are
    /// kept in that case.
    pub fn load_params(&mut self, params: Vec<f32>) -> Result<()> {
        self.layout.validate(params.len())?;
        self.params = params;
        Ok(())
    }

    /// Iterates the signature convolutions together with their position in the pipeline.
    pub fn signature_convs(&self) -> impl Iterator<Item = (usize, &SignatureConv)> {
        self.features
            .iter()
            .enumerate()
            .filter_map(|(position, layer)| match layer {
                Layer::Signed(l) => Some((position, l)),
                _ => None,
            })
    }

    /// The signature convolution at `position`, to install or inspect its watermark.
    ///
    /// # Returns
    /// An error if the stage at `position` is not a signature convolution.
    pub fn signature_conv_mut(&mut self, position: usize) -> Result<&mut SignatureConv> {
        match self.features.get_mut(position) {
            Some(Layer::Signed(l)) => Ok(l),
            _ => Err(MlErr::InvalidSignature(format!(
                "stage {position} is not a signature convolution"
            ))),
        }
    }
}

/// Samples the whole flat buffer out of the per segment generators.
fn init_params(param_gens: Vec<Box<dyn ParamGen>>, layout: &ParamLayout) -> Result<Vec<f32>> {
    let Some(params) = ChainedParamGen::new(param_gens).sample(layout.size()) else {
        return Err(MlErr::Init(format!(
            "no generator left for the {} parameters of the model",
            layout.size()
        )));
    };

    layout.validate(params.len())?;
    Ok(params)
}

fn build_stage(stage: StagePlan) -> Layer {
    match (stage.role, stage.conv) {
        (LayerRole::SignedConvBlock, Some(c)) => Layer::signature_conv(
            c.in_channels,
            c.out_channels,
            c.kernel_size,
            c.stride,
            c.padding,
        ),
        (LayerRole::PlainConvBlock, Some(c)) => {
            Layer::conv(c.in_channels, c.out_channels, c.kernel_size, c.stride, c.padding)
        }
        _ => Layer::max_pool(2, 2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::initialization::ConstParamGen;

    #[test]
    fn layout_matches_layers() {
        let model = SignAlexNet::with_seed(10, 0).unwrap();
        let sizes = model.layer_sizes();

        assert_eq!(sizes.len(), NUM_STAGES + 1);
        assert_eq!(sizes.iter().sum::<usize>(), model.size());
        for (size, layer) in sizes.iter().zip(model.features()) {
            assert_eq!(*size, layer.size());
        }
        assert_eq!(sizes[NUM_STAGES], (FLAT_DIM + 1) * 10);
    }

    #[test]
    fn pooling_stages_have_no_params() {
        let model = SignAlexNet::with_seed(2, 0).unwrap();

        for position in [1, 3, 7] {
            assert_eq!(model.stage_params(position).unwrap().len(), 0);
        }
        assert!(model.stage_params(NUM_STAGES).is_none());
    }

    #[test]
    fn signature_params_start_as_unit_scale() {
        let model = SignAlexNet::with_seed(2, 3).unwrap();

        for (position, layer) in model.signature_convs() {
            let params = model.stage_params(position).unwrap();
            let scale = layer.scale(params).unwrap();
            assert!(scale.iter().all(|&s| s == 1.));
        }
    }

    #[test]
    fn init_params_without_generators() {
        let layout = ParamLayout::new([3, 0], 2);

        assert!(matches!(
            init_params(Vec::new(), &layout),
            Err(MlErr::Init(_))
        ));
    }

    #[test]
    fn init_params_with_short_generators() {
        let layout = ParamLayout::new([3, 0], 2);
        let param_gens: Vec<Box<dyn ParamGen>> = vec![Box::new(ConstParamGen::new(1., 4))];

        assert!(matches!(
            init_params(param_gens, &layout),
            Err(MlErr::SizeMismatch { got: 4, expected: 5, .. })
        ));
    }

    #[test]
    fn mode_toggles() {
        let mut model = SignAlexNet::with_seed(2, 0).unwrap();
        assert!(model.is_training());

        model.eval();
        assert!(!model.is_training());

        model.train();
        assert!(model.is_training());

        model.set_training(false);
        assert!(!model.is_training());
    }

    #[test]
    fn signature_conv_mut_rejects_other_stages() {
        let mut model = SignAlexNet::with_seed(2, 0).unwrap();

        assert!(model.signature_conv_mut(4).is_ok());
        assert!(model.signature_conv_mut(0).is_err());
        assert!(model.signature_conv_mut(7).is_err());
        assert!(model.signature_conv_mut(8).is_err());
    }
}
