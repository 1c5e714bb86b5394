//! Preset configurations
//!
//! Presets trade memory held by the segment cache against replay latency.

use serde::{Deserialize, Serialize};

use super::error::{ConfigError, ConfigResult};

/// Configuration preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// Small segments, few cached payloads, references loaded lazily.
    ///
    /// For very large dumps on constrained machines.
    Compact,

    /// Default trade-off for interactive inspection.
    Balanced,

    /// Large segments, many cached payloads, references loaded eagerly.
    ///
    /// For batch reports that walk every edge.
    Thorough,
}

impl Preset {
    /// Parse preset from string
    pub fn parse(s: &str) -> ConfigResult<Self> {
        match s.to_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "balanced" => Ok(Self::Balanced),
            "thorough" => Ok(Self::Thorough),
            _ => Err(ConfigError::UnknownPreset(s.to_string())),
        }
    }

    /// Convert to string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Balanced => "balanced",
            Self::Thorough => "thorough",
        }
    }
}

impl Default for Preset {
    fn default() -> Self {
        Self::Balanced
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_parsing() {
        assert_eq!(Preset::parse("compact").unwrap(), Preset::Compact);
        assert_eq!(Preset::parse("BALANCED").unwrap(), Preset::Balanced);
        assert_eq!(Preset::parse("thorough").unwrap(), Preset::Thorough);
        assert!(matches!(
            Preset::parse("turbo"),
            Err(ConfigError::UnknownPreset(_))
        ));
    }

    #[test]
    fn test_preset_display() {
        assert_eq!(Preset::Compact.to_string(), "compact");
        assert_eq!(Preset::Thorough.to_string(), "thorough");
    }

    #[test]
    fn test_default_preset() {
        assert_eq!(Preset::default(), Preset::Balanced);
    }
}
