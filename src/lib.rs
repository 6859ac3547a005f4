//! Model zoo for IP protected federated learning: a modified AlexNet whose signature layers
//! carry ownership watermarks.

pub mod arch;
pub mod config;
pub mod error;
pub mod initialization;

pub use arch::SignAlexNet;
pub use error::{MlErr, Result};
