//! Model configuration
//!
//! Loaded from YAML. Every field has a default, so an empty document (or no
//! file at all) gives the stock behaviour.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::models::Time;
use crate::segment::{Quantizer, Segment};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config as YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub segment: SegmentConfig,
    pub linker: LinkerConfig,
}

/// Defaults applied to segments added to a composition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Filler rests longer than this are split
    pub max_rest_duration: Option<Time>,
    pub quantize_unit: Option<Time>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkerConfig {
    /// Add a hidden C major key to segments that have none before their first note
    pub insert_implied_key: bool,
    /// Copy the source's end marker to linked copies
    pub mirror_end_marker: bool,
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            insert_implied_key: true,
            mirror_end_marker: true,
        }
    }
}

impl ModelConfig {
    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_yaml_str(&content)?;
        log::info!("Loaded model config from {}", path.display());
        Ok(config)
    }
}

impl SegmentConfig {
    /// Fill in settings the segment does not already have
    pub(crate) fn apply(&self, segment: &mut Segment) {
        if segment.max_rest_duration().is_none() {
            segment.set_max_rest_duration(self.max_rest_duration);
        }
        if segment.quantizer().is_none() {
            segment.set_quantizer(self.quantize_unit.map(Quantizer::new));
        }
    }
}
