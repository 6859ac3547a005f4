mod batch_norm;
mod conv;
mod conv_block;
mod dense;
mod layer;
mod max_pool;
mod signature;
mod signature_conv;

pub use batch_norm::BatchNorm2d;
pub use conv::Conv2d;
pub use conv_block::ConvBlock;
pub use dense::Dense;
pub use layer::Layer;
pub use max_pool::MaxPool2d;
pub use signature::{Signature, SignatureBlock};
pub use signature_conv::SignatureConv;
