//! The run configuration, stored as a human-readable TOML file.
//!
//! ```toml
//! target = "Amount"
//! predictors = ["Duration", "Age", "Job", "Housing"]
//! categorical = ["Job"]
//! split_ratio = 0.9
//! iterations = 1000
//! ```

use crate::data::LoadOptions;
use crate::design::ModelSpec;
use crate::partition::OffsetSeeds;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use thiserror::Error;

fn default_split_ratio() -> f64 {
    0.9
}

fn default_iterations() -> usize {
    1000
}

fn default_separator() -> String {
    ",".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutateConfig {
    pub target: String,
    pub predictors: Vec<String>,
    #[serde(default = "default_split_ratio")]
    pub split_ratio: f64,
    #[serde(default = "default_iterations")]
    pub iterations: usize,
    /// Iteration `i` is seeded with `seed_offset + i`.
    #[serde(default)]
    pub seed_offset: u64,
    #[serde(default)]
    pub parallel: bool,
    /// Fields read as categorical even if their values are numeric codes.
    #[serde(default)]
    pub categorical: Vec<String>,
    /// Single-byte field separator of the data file.
    #[serde(default = "default_separator")]
    pub separator: String,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read or write config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML config file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize config to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("The separator must be a single ASCII character, got {0:?}.")]
    InvalidSeparator(String),
}

impl MutateConfig {
    pub fn new(target: &str, predictors: &[&str]) -> Self {
        Self {
            target: target.to_string(),
            predictors: predictors.iter().map(|p| p.to_string()).collect(),
            split_ratio: default_split_ratio(),
            iterations: default_iterations(),
            seed_offset: 0,
            parallel: false,
            categorical: Vec::new(),
            separator: default_separator(),
        }
    }

    pub fn model_spec(&self) -> ModelSpec {
        ModelSpec::new(self.target.clone(), self.predictors.iter().cloned())
    }

    pub fn seeds(&self) -> OffsetSeeds {
        OffsetSeeds {
            offset: self.seed_offset,
        }
    }

    /// Loader options that extract exactly the fields the model reads.
    pub fn load_options(&self) -> Result<LoadOptions, ConfigError> {
        let separator = match self.separator.as_bytes() {
            [byte] if byte.is_ascii() => *byte,
            _ => return Err(ConfigError::InvalidSeparator(self.separator.clone())),
        };
        Ok(LoadOptions {
            separator,
            columns: self.model_spec().fields(),
            categorical: self.categorical.clone(),
        })
    }

    pub fn save(&self, path: &str) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        Ok(())
    }

    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let toml_string = fs::read_to_string(path)?;
        Ok(toml::from_str(&toml_string)?)
    }
}
