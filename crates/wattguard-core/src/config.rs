//! Split configuration
//!
//! Holds the tunable heuristics of the split and forecast engines plus the
//! predefined tag catalog.
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a two-layer resolution:
//! 1. Check for override in data dir (~/.local/share/wattguard/config/split.toml)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Keys missing from an override keep their default value, so an override
//! file may contain only `[params]` and still inherit the tag catalog.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::weights::PREDEFINED_TAGS;

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/split.toml");

/// Minimum per-participant ratio before normalization
pub const DEFAULT_RATIO_FLOOR: f64 = 0.2;

/// Weight for tags outside the predefined catalog
pub const DEFAULT_CUSTOM_TAG_WEIGHT: f64 = 0.1;

/// Forecast multiplier used when the analysis carries no forecast
pub const DEFAULT_FORECAST_ESCALATION: f64 = 1.12;

/// $/kWh used to estimate the previous bill from its usage
pub const DEFAULT_KWH_RATE_ESTIMATE: f64 = 0.28;

/// Numeric heuristics shared by the split and savings engines
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitParams {
    pub ratio_floor: f64,
    pub custom_tag_weight: f64,
    pub forecast_escalation: f64,
    pub kwh_rate_estimate: f64,
}

impl SplitParams {
    /// Reject parameters the engines cannot work with. A non-positive floor
    /// lets the ratio sum reach zero.
    pub fn validate(&self) -> Result<()> {
        if !self.ratio_floor.is_finite() || self.ratio_floor <= 0.0 {
            return Err(Error::Config(format!(
                "ratio_floor must be a positive number, got {}",
                self.ratio_floor
            )));
        }
        if !self.forecast_escalation.is_finite() || self.forecast_escalation < 0.0 {
            return Err(Error::Config(format!(
                "forecast_escalation must be non-negative, got {}",
                self.forecast_escalation
            )));
        }
        if !self.custom_tag_weight.is_finite() || !self.kwh_rate_estimate.is_finite() {
            return Err(Error::Config("weights and rates must be finite".into()));
        }
        Ok(())
    }
}

impl Default for SplitParams {
    fn default() -> Self {
        Self {
            ratio_floor: DEFAULT_RATIO_FLOOR,
            custom_tag_weight: DEFAULT_CUSTOM_TAG_WEIGHT,
            forecast_escalation: DEFAULT_FORECAST_ESCALATION,
            kwh_rate_estimate: DEFAULT_KWH_RATE_ESTIMATE,
        }
    }
}

/// A predefined tag and its signed weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagWeight {
    pub name: String,
    pub weight: f64,
}

/// Complete split configuration
#[derive(Debug, Clone, PartialEq)]
pub struct SplitConfig {
    pub params: SplitParams,
    /// Predefined catalog in display order
    pub tags: Vec<TagWeight>,
}

impl SplitConfig {
    /// Load from the default override location, falling back to the embedded config
    pub fn load() -> Result<Self> {
        load_config(None)
    }

    /// Load from an explicit override path (embedded config if the file is missing)
    pub fn load_from(path: &Path) -> Result<Self> {
        load_config(Some(path))
    }

    /// Parse a TOML document layered over the built-in defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        parse_config(content)
    }

    /// Compiled-in configuration, independent of any file
    pub fn builtin() -> Self {
        Self {
            params: SplitParams::default(),
            tags: PREDEFINED_TAGS
                .iter()
                .map(|(name, weight)| TagWeight {
                    name: (*name).to_string(),
                    weight: *weight,
                })
                .collect(),
        }
    }
}

impl Default for SplitConfig {
    fn default() -> Self {
        parse_config(DEFAULT_CONFIG).unwrap_or_else(|_| Self::builtin())
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("wattguard").join("config").join("split.toml"))
}

/// Load configuration (override first, then default)
fn load_config(override_path: Option<&Path>) -> Result<SplitConfig> {
    let path = match override_path {
        Some(p) => Some(p.to_path_buf()),
        None => default_config_path(),
    };

    let content = match path {
        Some(ref p) if p.exists() => fs::read_to_string(p)
            .map_err(|e| Error::Config(format!("Failed to read {}: {}", p.display(), e)))?,
        _ => DEFAULT_CONFIG.to_string(),
    };

    parse_config(&content)
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    params: Option<RawParams>,
    tags: Option<Vec<TagWeight>>,
}

#[derive(Debug, Deserialize)]
struct RawParams {
    ratio_floor: Option<f64>,
    custom_tag_weight: Option<f64>,
    forecast_escalation: Option<f64>,
    kwh_rate_estimate: Option<f64>,
}

fn parse_config(content: &str) -> Result<SplitConfig> {
    let raw: RawConfig = toml::from_str(content)?;

    let mut config = SplitConfig::builtin();

    if let Some(params) = raw.params {
        if let Some(floor) = params.ratio_floor {
            config.params.ratio_floor = floor;
        }
        if let Some(weight) = params.custom_tag_weight {
            config.params.custom_tag_weight = weight;
        }
        if let Some(escalation) = params.forecast_escalation {
            config.params.forecast_escalation = escalation;
        }
        if let Some(rate) = params.kwh_rate_estimate {
            config.params.kwh_rate_estimate = rate;
        }
    }

    if let Some(tags) = raw.tags {
        config.tags = tags;
    }

    validate(&config)?;
    Ok(config)
}

fn validate(config: &SplitConfig) -> Result<()> {
    config.params.validate()?;

    for (i, tag) in config.tags.iter().enumerate() {
        if tag.name.trim().is_empty() {
            return Err(Error::Config(format!("tag #{} has an empty name", i + 1)));
        }
        if !tag.weight.is_finite() {
            return Err(Error::Config(format!("tag '{}' has a non-finite weight", tag.name)));
        }
        if config.tags[..i].iter().any(|t| t.name == tag.name) {
            return Err(Error::Config(format!("duplicate tag '{}'", tag.name)));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_embedded_config_matches_builtin() {
        let config = parse_config(DEFAULT_CONFIG).unwrap();
        assert_eq!(config, SplitConfig::builtin());
    }

    #[test]
    fn test_default_params() {
        let config = SplitConfig::default();
        assert_eq!(config.params.ratio_floor, 0.2);
        assert_eq!(config.params.custom_tag_weight, 0.1);
        assert_eq!(config.params.forecast_escalation, 1.12);
        assert_eq!(config.tags.len(), 8);
        assert_eq!(config.tags[0].name, "Gaming PC");
    }

    #[test]
    fn test_partial_override_keeps_tags() {
        let config = SplitConfig::from_toml_str("[params]\nratio_floor = 0.5\n").unwrap();
        assert_eq!(config.params.ratio_floor, 0.5);
        assert_eq!(config.params.custom_tag_weight, 0.1);
        assert_eq!(config.tags, SplitConfig::builtin().tags);
    }

    #[test]
    fn test_override_replaces_catalog() {
        let config = SplitConfig::from_toml_str(
            r#"
            [[tags]]
            name = "Sauna"
            weight = 0.8
            "#,
        )
        .unwrap();
        assert_eq!(config.tags.len(), 1);
        assert_eq!(config.tags[0].name, "Sauna");
    }

    #[test]
    fn test_rejects_bad_floor() {
        let err = SplitConfig::from_toml_str("[params]\nratio_floor = 0.0\n").unwrap_err();
        assert!(err.to_string().contains("ratio_floor"));
    }

    #[test]
    fn test_rejects_duplicate_tags() {
        let err = SplitConfig::from_toml_str(
            r#"
            [[tags]]
            name = "A"
            weight = 0.1
            [[tags]]
            name = "A"
            weight = 0.2
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_rejects_invalid_toml() {
        assert!(matches!(
            SplitConfig::from_toml_str("params = ["),
            Err(Error::Toml(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[params]\nforecast_escalation = 1.5").unwrap();

        let config = SplitConfig::load_from(file.path()).unwrap();
        assert_eq!(config.params.forecast_escalation, 1.5);
    }

    #[test]
    fn test_load_from_missing_file_uses_embedded() {
        let config = SplitConfig::load_from(Path::new("/nonexistent/split.toml")).unwrap();
        assert_eq!(config, SplitConfig::default());
    }
}
