/// The amount of stages of the feature pipeline.
pub const NUM_STAGES: usize = 8;

/// The channels of the input images (RGB).
pub const IN_CHANNELS: usize = 3;

/// The spatial side of the last feature map for the 32x32 inputs the network is designed for.
pub const FEATURE_SIDE: usize = 4;

/// The channels of the last feature map.
pub const FEATURE_CHANNELS: usize = 256;

/// The width of the flattened feature map, i.e. the input width of the classifier.
pub const FLAT_DIM: usize = FEATURE_SIDE * FEATURE_SIDE * FEATURE_CHANNELS;

const MAX_POOL_STAGES: [usize; 3] = [1, 3, 7];
const SIGNED_STAGES: [usize; 3] = [4, 5, 6];

/// Every convolution has stride 1, pooling takes care of downsampling.
const CONV_STRIDE: usize = 1;

/// Output channels of the convolution at `position`.
fn out_channels(position: usize) -> Option<usize> {
    match position {
        0 => Some(64),
        2 => Some(192),
        4 => Some(384),
        5 | 6 => Some(256),
        _ => None,
    }
}

/// `(kernel_size, padding)` of the convolution at `position`.
fn kernel_padding(position: usize) -> Option<(usize, usize)> {
    match position {
        0 | 2 => Some((5, 2)),
        4..=6 => Some((3, 1)),
        _ => None,
    }
}

/// What a stage of the feature pipeline does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerRole {
    MaxPool,
    SignedConvBlock,
    PlainConvBlock,
}

impl LayerRole {
    /// The role of the stage at `position`.
    pub fn of(position: usize) -> Self {
        if MAX_POOL_STAGES.contains(&position) {
            LayerRole::MaxPool
        } else if SIGNED_STAGES.contains(&position) {
            LayerRole::SignedConvBlock
        } else {
            LayerRole::PlainConvBlock
        }
    }
}

/// The hyperparameters of a convolution stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerSpec {
    pub position: usize,
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel_size: usize,
    pub stride: usize,
    pub padding: usize,
}

/// A stage of the feature pipeline, before being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagePlan {
    pub position: usize,
    pub role: LayerRole,
    /// `None` for pooling stages.
    pub conv: Option<LayerSpec>,
}

/// Lays out the whole feature pipeline from the channel and kernel tables, chaining the input
/// channels of each convolution to the output channels of the previous one.
pub fn plan() -> [StagePlan; NUM_STAGES] {
    let mut in_channels = IN_CHANNELS;

    std::array::from_fn(|position| {
        let role = LayerRole::of(position);
        let conv = match (role, out_channels(position), kernel_padding(position)) {
            (LayerRole::MaxPool, ..) => None,
            (_, Some(out_channels), Some((kernel_size, padding))) => {
                let spec = LayerSpec {
                    position,
                    in_channels,
                    out_channels,
                    kernel_size,
                    stride: CONV_STRIDE,
                    padding,
                };
                in_channels = out_channels;
                Some(spec)
            }
            _ => None,
        };

        StagePlan {
            position,
            role,
            conv,
        }
    })
}
