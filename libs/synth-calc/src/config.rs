//! Engine configuration
//!
//! Layered with figment:
//! 1. Built-in defaults
//! 2. `config/synth-calc.toml`
//! 3. `config/synth-calc.yaml`
//! 4. Environment variables prefixed `SYNTH_CALC_` (e.g. `SYNTH_CALC_PRECISION=12`)

use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::decimal::{DEFAULT_PRECISION, MAX_PRECISION};
use crate::error::{CalcError, Result};

pub const DEFAULT_MAX_DEPTH: usize = 64;
pub const DEFAULT_MAX_EXPRESSION_LENGTH: usize = 4096;

/// Deepest nesting a configuration may allow; each level costs several
/// parser stack frames
pub const MAX_DEPTH_LIMIT: usize = 256;

/// Evaluation limits and numeric precision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Significant digits kept by division (half-up)
    pub precision: u32,
    /// Maximum nesting of parentheses, unary signs and calls
    pub max_depth: usize,
    /// Maximum expression length in bytes
    pub max_expression_length: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            precision: DEFAULT_PRECISION,
            max_depth: DEFAULT_MAX_DEPTH,
            max_expression_length: DEFAULT_MAX_EXPRESSION_LENGTH,
        }
    }
}

impl EngineConfig {
    /// Default figment: defaults, config files, then environment
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(EngineConfig::default()))
            .merge(Toml::file("config/synth-calc.toml"))
            .merge(Yaml::file("config/synth-calc.yaml"))
            .merge(Env::prefixed("SYNTH_CALC_"))
    }

    /// Load from the default sources and validate
    pub fn load() -> Result<Self> {
        Self::from_figment(Self::figment())
    }

    /// Load from one file, format chosen by extension, over the defaults
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| CalcError::config("Config file must have an extension"))?;

        let defaults = Figment::from(Serialized::defaults(EngineConfig::default()));
        let figment = match extension {
            "toml" => defaults.merge(Toml::file(path)),
            "yaml" | "yml" => defaults.merge(Yaml::file(path)),
            "json" => defaults.merge(Json::file(path)),
            _ => {
                return Err(CalcError::config(format!(
                    "Unsupported config file format: {}",
                    extension
                )))
            },
        };
        Self::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: EngineConfig = figment
            .extract()
            .map_err(|e| CalcError::config(format!("Failed to load configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_PRECISION).contains(&self.precision) {
            return Err(CalcError::config(format!(
                "precision must be between 1 and {}, got {}",
                MAX_PRECISION, self.precision
            )));
        }
        if !(1..=MAX_DEPTH_LIMIT).contains(&self.max_depth) {
            return Err(CalcError::config(format!(
                "max_depth must be between 1 and {}, got {}",
                MAX_DEPTH_LIMIT, self.max_depth
            )));
        }
        if self.max_expression_length == 0 {
            return Err(CalcError::config(
                "max_expression_length must be greater than 0",
            ));
        }
        Ok(())
    }
}
