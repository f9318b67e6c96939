//! Calibration and listening-condition persistence
//!
//! The model needs to know what SPL a full-scale sinusoid corresponds to;
//! that and the field type are stored here so they need not be passed on
//! every run.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;
use tvl_analysis::FieldType;

/// Application configuration
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Config {
    /// dB SPL of a full-scale sinusoid
    pub calibration_level: Option<f32>,
    /// Sound field the recording is presented in
    pub field_type: Option<FieldType>,
}

impl Config {
    /// Load config from a specific path
    pub fn load_from(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = self.serialize();
        fs::write(path, content)
    }

    /// Get the default config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tvl")
            .join("config.txt")
    }

    /// Values from `overrides` win over the stored ones
    pub fn merged(&self, overrides: &Config) -> Config {
        Config {
            calibration_level: overrides.calibration_level.or(self.calibration_level),
            field_type: overrides.field_type.or(self.field_type),
        }
    }

    /// Parse config from simple key=value format
    fn parse(content: &str) -> Self {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            if value.is_empty() {
                continue;
            }

            match key {
                "calibration_level" => match value.parse::<f32>() {
                    Ok(level) if level.is_finite() => config.calibration_level = Some(level),
                    _ => warn!(value, "ignoring invalid calibration_level"),
                },
                "field_type" => match value.parse::<FieldType>() {
                    Ok(field) => config.field_type = Some(field),
                    Err(e) => warn!(error = %e, "ignoring invalid field_type"),
                },
                _ => {} // Ignore unknown keys
            }
        }

        config
    }

    /// Serialize config to simple key=value format
    fn serialize(&self) -> String {
        let mut lines = Vec::new();
        lines.push("# TVL Configuration".to_string());

        if let Some(level) = self.calibration_level {
            lines.push(format!("calibration_level={level}"));
        }
        if let Some(field) = self.field_type {
            lines.push(format!("field_type={field}"));
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty() {
        assert_eq!(Config::parse(""), Config::default());
    }

    #[test]
    fn test_parse_values() {
        let config = Config::parse("calibration_level=93.5\nfield_type=diffuse");
        assert_eq!(config.calibration_level, Some(93.5));
        assert_eq!(config.field_type, Some(FieldType::Diffuse));
    }

    #[test]
    fn test_parse_with_comments_and_junk() {
        let content = "# Comment\ncalibration_level = 100\nno equals sign\nunknown=1\n# Another";
        let config = Config::parse(content);
        assert_eq!(config.calibration_level, Some(100.0));
        assert!(config.field_type.is_none());
    }

    #[test]
    fn test_parse_invalid_values_ignored() {
        let config = Config::parse("calibration_level=loud\nfield_type=underwater");
        assert_eq!(config, Config::default());
        assert!(Config::parse("calibration_level=inf").calibration_level.is_none());
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = Config {
            calibration_level: Some(94.0),
            field_type: Some(FieldType::Free),
        };
        assert_eq!(Config::parse(&config.serialize()), config);
    }

    #[test]
    fn test_merged_prefers_overrides() {
        let stored = Config {
            calibration_level: Some(94.0),
            field_type: Some(FieldType::Diffuse),
        };
        let overrides = Config {
            calibration_level: Some(100.0),
            field_type: None,
        };
        let merged = stored.merged(&overrides);
        assert_eq!(merged.calibration_level, Some(100.0));
        assert_eq!(merged.field_type, Some(FieldType::Diffuse));
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir()
            .join(format!("tvl-config-{}", std::process::id()))
            .join("config.txt");
        let config = Config {
            calibration_level: Some(90.0),
            field_type: Some(FieldType::Diffuse),
        };
        config.save_to(&path).unwrap();
        let loaded = Config::load_from(&path).unwrap();
        if let Some(dir) = path.parent() {
            fs::remove_dir_all(dir).ok();
        }
        assert_eq!(loaded, config);
    }
}
