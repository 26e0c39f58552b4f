//! Layout configuration (kflat.toml)
//!
//! Knobs that change storage efficiency but never correctness. The same
//! config must be used for layout and for code generation.

use crate::error::{LayoutError, LayoutResult};
use crate::offset::align_up;
use crate::sorter::PackingPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Widest primitive field (long/double)
const MAX_PRIMITIVE_SIZE: u32 = 8;

/// Layout settings for one compile run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct LayoutConfig {
    /// Bytes reserved at the start of every root class instance
    #[serde(default)]
    pub object_header_size: u32,

    /// Instance sizes are rounded up to this (power of two)
    #[serde(default = "default_object_alignment")]
    pub object_alignment: u32,

    /// Align every field to its own size
    #[serde(default = "default_align_fields")]
    pub align_fields: bool,

    /// Field ordering policy
    #[serde(default)]
    pub packing: PackingPolicy,
}

fn default_object_alignment() -> u32 {
    8
}

fn default_align_fields() -> bool {
    true
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            object_header_size: 0,
            object_alignment: default_object_alignment(),
            align_fields: default_align_fields(),
            packing: PackingPolicy::default(),
        }
    }
}

/// On-disk shape: settings live under a `[layout]` table
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    layout: LayoutConfig,
}

impl LayoutConfig {
    /// Load a config from a TOML file
    pub fn from_file(path: &Path) -> LayoutResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse a config from TOML text
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> LayoutResult<Self> {
        let file: ConfigFile = toml::from_str(content)?;
        file.layout.validate()?;
        Ok(file.layout)
    }

    /// Validate the config
    pub fn validate(&self) -> LayoutResult<()> {
        if self.object_alignment == 0 || !self.object_alignment.is_power_of_two() {
            return Err(LayoutError::Config(format!(
                "object-alignment must be a non-zero power of two, got {}",
                self.object_alignment
            )));
        }
        let fits = self
            .object_header_size
            .checked_add(MAX_PRIMITIVE_SIZE)
            .and_then(|end| align_up(end, self.object_alignment))
            .is_some();
        if !fits {
            return Err(LayoutError::Config(format!(
                "object-header-size {} leaves no room for fields",
                self.object_header_size
            )));
        }
        Ok(())
    }
}
