//! Controller, simulator and demo configuration.
//!
//! Everything here has a working default; a TOML file only needs the
//! values it wants to change.

use crate::device::{Facing, ImageFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings that shape the capture session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Which lens to open.
    pub facing: Facing,
    /// Format of the still-image sink.
    pub still_format: ImageFormat,
    /// Fixed rotation written into every still, in degrees.
    pub jpeg_orientation: u16,
    /// Images the sink may hold at once.
    pub max_images: u32,
    /// Display is portrait: the sink is created with the sensor axes swapped.
    pub portrait: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            facing: Facing::Back,
            still_format: ImageFormat::Jpeg,
            jpeg_orientation: 90,
            max_images: 1,
            portrait: true,
        }
    }
}

impl ControllerConfig {
    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jpeg_orientation % 90 != 0 || self.jpeg_orientation >= 360 {
            return Err(ConfigError::InvalidOrientation(self.jpeg_orientation));
        }
        if self.max_images == 0 {
            return Err(ConfigError::InvalidMaxImages);
        }
        Ok(())
    }
}

/// Behaviour of the mock device in simulator mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Seed for the convergence timing; same seed, same run.
    pub seed: u64,
    /// Upper bound on frames before autofocus locks.
    pub max_frames_to_focus: u32,
    /// Upper bound on frames before exposure converges.
    pub max_frames_to_expose: u32,
    /// Report flash-required instead of converged.
    pub flash_required: bool,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: 0x5eed,
            max_frames_to_focus: 6,
            max_frames_to_expose: 4,
            flash_required: false,
        }
    }
}

/// Demo binary settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Stills to take before closing.
    pub shots: u32,
    /// Metrics server port (0 to disable).
    pub metrics_port: u16,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            shots: 3,
            metrics_port: 0,
        }
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Orientation is not a quarter turn.
    #[error("jpeg orientation must be 0, 90, 180 or 270 (got {0})")]
    InvalidOrientation(u16),
    /// `max_images` is zero.
    #[error("image sink must hold at least one image")]
    InvalidMaxImages,
    /// The file could not be read.
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    /// The file is not valid TOML for this layout.
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// `[controller]` section.
    #[serde(default)]
    pub controller: ControllerConfig,
    /// `[simulator]` section.
    #[serde(default)]
    pub simulator: SimulatorConfig,
    /// `[demo]` section.
    #[serde(default)]
    pub demo: DemoConfig,
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.controller.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        assert!(ControllerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_bad_orientation() {
        let config = ControllerConfig {
            jpeg_orientation: 45,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidOrientation(45))
        ));
    }

    #[test]
    fn test_zero_images_invalid() {
        let config = ControllerConfig {
            max_images: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidMaxImages)));
    }

    #[test]
    fn test_partial_toml() {
        let config = FileConfig::from_toml(
            r#"
            [controller]
            facing = "front"
            jpeg_orientation = 270

            [demo]
            shots = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.controller.facing, Facing::Front);
        assert_eq!(config.controller.jpeg_orientation, 270);
        assert_eq!(config.controller.max_images, 1);
        assert_eq!(config.demo.shots, 5);
        assert_eq!(config.simulator, SimulatorConfig::default());
    }

    #[test]
    fn test_toml_rejects_invalid_controller() {
        let result = FileConfig::from_toml("[controller]\nmax_images = 0\n");
        assert!(matches!(result, Err(ConfigError::InvalidMaxImages)));
    }
}
