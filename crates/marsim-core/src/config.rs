//! Model configuration, loadable from JSON.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tunables for the containment model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Radius around a settlement that still counts as its vicinity (km).
    pub vicinity_radius_km: f64,
    /// Upper bound on container-chain walks. `None` bounds walks by the
    /// number of registered units plus one.
    pub max_containment_depth: Option<usize>,
    /// How many listener faults are kept for inspection.
    pub listener_fault_capacity: usize,
    pub verbose_logging: bool,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            vicinity_radius_km: 1.0,
            max_containment_depth: None,
            listener_fault_capacity: 64,
            verbose_logging: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("could not parse configuration: {0}")]
    Parse(String),
    #[error("vicinity radius must be positive, got {0}")]
    NonPositiveRadius(f64),
    #[error("max containment depth must be at least 1")]
    ZeroDepthBound,
    #[error("listener fault capacity must be at least 1")]
    ZeroFaultCapacity,
}

impl LocationConfig {
    /// Parse and validate. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, Vec<ConfigError>> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| vec![ConfigError::Parse(e.to_string())])?;
        let errors = config.validate();
        if errors.is_empty() {
            Ok(config)
        } else {
            Err(errors)
        }
    }

    /// Every problem found, empty when valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        if self.vicinity_radius_km.is_nan() || self.vicinity_radius_km <= 0.0 {
            errors.push(ConfigError::NonPositiveRadius(self.vicinity_radius_km));
        }
        if self.max_containment_depth == Some(0) {
            errors.push(ConfigError::ZeroDepthBound);
        }
        if self.listener_fault_capacity == 0 {
            errors.push(ConfigError::ZeroFaultCapacity);
        }
        errors
    }

    /// Walk bound for a model holding `unit_count` units.
    pub fn depth_bound(&self, unit_count: usize) -> usize {
        self.max_containment_depth.unwrap_or(unit_count + 1)
    }
}
