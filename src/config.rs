//! Configuration file support for pagecrop
//!
//! Supports TOML configuration files with the following search order:
//! 1. `--config <path>` - explicitly specified path
//! 2. `./pagecrop.toml` - current directory
//! 3. `~/.config/pagecrop/config.toml` - user config
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [detection]
//! threshold = 245
//! padding = 16
//!
//! [input]
//! dir = "screenshots"
//! extensions = ["png", "jpg"]
//!
//! [output]
//! dir = "cropped"
//! prefix = "cropped_"
//! document_name = "book.pdf"
//! dpi = 200
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::bounds::CropRect;
use crate::PipelineConfig;

/// Configuration file errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error reading config file
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// File not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
}

/// Bounds detection settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DetectionConfig {
    /// Luminance threshold (0-255)
    #[serde(default)]
    pub threshold: Option<u8>,

    /// Padding in pixels
    #[serde(default)]
    pub padding: Option<u32>,
}

/// Input settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InputConfig {
    /// Source directory
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Accepted file extensions
    #[serde(default)]
    pub extensions: Option<Vec<String>>,
}

/// Output settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// Destination directory
    #[serde(default)]
    pub dir: Option<PathBuf>,

    /// Prefix for cropped file names
    #[serde(default)]
    pub prefix: Option<String>,

    /// File name of the combined PDF
    #[serde(default)]
    pub document_name: Option<String>,

    /// PDF resolution
    #[serde(default)]
    pub dpi: Option<u32>,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub detection: DetectionConfig,

    #[serde(default)]
    pub input: InputConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from the default search path, falling back to
    /// defaults when no file exists
    pub fn load() -> Result<Self, ConfigError> {
        for path in Self::search_paths() {
            if path.exists() {
                return Self::load_from_path(&path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Convert to PipelineConfig
    pub fn to_pipeline_config(&self) -> PipelineConfig {
        let mut config = PipelineConfig::default();

        if let Some(threshold) = self.detection.threshold {
            config = config.with_threshold(threshold);
        }
        if let Some(padding) = self.detection.padding {
            config = config.with_padding(padding);
        }

        if let Some(dir) = &self.input.dir {
            config = config.with_input_dir(dir);
        }
        if let Some(extensions) = &self.input.extensions {
            config = config.with_extensions(extensions.iter().cloned());
        }

        if let Some(dir) = &self.output.dir {
            config = config.with_output_dir(dir);
        }
        if let Some(prefix) = &self.output.prefix {
            config = config.with_output_prefix(prefix.as_str());
        }
        if let Some(name) = &self.output.document_name {
            config = config.with_document_name(name.as_str());
        }
        if let Some(dpi) = self.output.dpi {
            config = config.with_dpi(dpi);
        }

        config
    }

    /// Merge with CLI arguments (CLI takes precedence)
    pub fn merge_with_cli(&self, cli: &CliOverrides) -> PipelineConfig {
        let mut config = self.to_pipeline_config();

        if let Some(dir) = &cli.input_dir {
            config = config.with_input_dir(dir);
        }
        if let Some(dir) = &cli.output_dir {
            config = config.with_output_dir(dir);
        }
        if let Some(threshold) = cli.threshold {
            config = config.with_threshold(threshold);
        }
        if let Some(padding) = cli.padding {
            config = config.with_padding(padding);
        }
        if cli.override_rect.is_some() {
            config = config.with_override_rect(cli.override_rect);
        }
        if let Some(index) = cli.reference_index {
            config = config.with_reference_index(index);
        }
        if let Some(verify) = cli.verify {
            config = config.with_verify(verify);
        }
        if cli.limit.is_some() {
            config = config.with_limit(cli.limit);
        }
        if let Some(assemble) = cli.assemble_document {
            config = config.with_document(assemble);
        }
        if let Some(extensions) = &cli.extensions {
            config = config.with_extensions(extensions.iter().cloned());
        }
        if let Some(dpi) = cli.dpi {
            config = config.with_dpi(dpi);
        }

        config
    }

    /// Get config file search paths
    pub fn search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("pagecrop.toml")];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("pagecrop").join("config.toml"));
        }

        paths
    }
}

/// CLI override values for merging with config file
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub input_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub threshold: Option<u8>,
    pub padding: Option<u32>,
    pub override_rect: Option<CropRect>,
    pub reference_index: Option<usize>,
    pub verify: Option<bool>,
    pub limit: Option<usize>,
    pub assemble_document: Option<bool>,
    pub extensions: Option<Vec<String>>,
    pub dpi: Option<u32>,
}

impl CliOverrides {
    /// Create new empty overrides
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_threshold(mut self, threshold: u8) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn with_padding(mut self, padding: u32) -> Self {
        self.padding = Some(padding);
        self
    }

    pub fn with_override_rect(mut self, rect: CropRect) -> Self {
        self.override_rect = Some(rect);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = Some(dpi);
        self
    }
}
