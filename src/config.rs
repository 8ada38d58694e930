//! Runtime settings for loaders and file stores
//!
//! Settings are plain serde structs read from JSON. Missing fields take
//! their defaults, so `{}` is a valid configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CACHE_CAPACITY: usize = 10_000;
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Most cells held by a loader's cache
    pub cache_capacity: usize,
    /// zstd level for file store frames (1..=22)
    pub compression_level: i32,
    /// Write the file store index when the store is dropped
    pub sync_on_drop: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            sync_on_drop: true,
        }
    }
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache_capacity == 0 {
            return Err(Error::Config("cache_capacity must be > 0".into()));
        }
        if !(1..=22).contains(&self.compression_level) {
            return Err(Error::Config(format!(
                "compression_level {} outside 1..=22",
                self.compression_level
            )));
        }
        Ok(())
    }
}
