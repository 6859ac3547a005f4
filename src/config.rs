use std::{fs, io, path::Path};

use serde::Deserialize;

/// The configuration of a demo run, read from a JSON file.
///
/// Every field is optional in the file, missing ones take their default value.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub num_classes: usize,
    pub batch_size: usize,
    /// The side of the square input images.
    pub resolution: usize,
    /// Seeds both the parameter initialization and the random input batch.
    pub seed: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            num_classes: 10,
            batch_size: 2,
            resolution: 32,
            seed: None,
        }
    }
}

impl RunConfig {
    /// Parses a `RunConfig` from a JSON string.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Loads a `RunConfig` from a JSON file.
    ///
    /// # Errors
    /// If the file cannot be read or is not a valid configuration.
    pub fn load<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::from_json(&content)?)
    }
}
