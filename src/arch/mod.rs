pub mod activations;
pub mod layers;
mod sign_alexnet;

pub use sign_alexnet::{
    FEATURE_CHANNELS, FEATURE_SIDE, FLAT_DIM, IN_CHANNELS, LayerRole, LayerSpec, NUM_STAGES,
    ParamLayout, SignAlexNet, StagePlan, plan,
};
