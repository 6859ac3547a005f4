use std::{
    error::Error,
    fmt::{self, Display},
};

use ndarray::ShapeError;
use rand_distr::{NormalError, uniform::Error as UniformError};

/// The result type used in the entire model zoo.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The model zoo's error type.
///
/// Every variant is raised by the primitive where the mismatch happened and travels up to the
/// caller of `forward` untouched.
#[derive(Debug)]
pub enum MlErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    WindowTooLarge {
        what: &'static str,
        input: (usize, usize),
        window: usize,
    },
    InvalidSignature(String),
    Shape(ShapeError),
    /// A parameter distribution could not be built, e.g. an empty uniform range.
    Init(String),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch in {what}, got {got} and expected {expected}"
            ),
            MlErr::WindowTooLarge {
                what,
                input: (h, w),
                window,
            } => write!(
                f,
                "The {window}x{window} window of {what} does not fit in a {h}x{w} input"
            ),
            MlErr::InvalidSignature(msg) => write!(f, "Invalid signature: {msg}"),
            MlErr::Shape(e) => write!(f, "Failed to reshape a tensor: {e}"),
            MlErr::Init(e) => write!(f, "Failed to initialize the parameters: {e}"),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Shape(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ShapeError> for MlErr {
    fn from(value: ShapeError) -> Self {
        Self::Shape(value)
    }
}

impl From<NormalError> for MlErr {
    fn from(value: NormalError) -> Self {
        Self::Init(value.to_string())
    }
}

impl From<UniformError> for MlErr {
    fn from(value: UniformError) -> Self {
        Self::Init(value.to_string())
    }
}
