// src/config.rs

use crate::error::SignalError;
use crate::types::{Config, APPROACH_COUNT};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to built-in defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> std::result::Result<(), SignalError> {
        if self.intersection.approach_count != APPROACH_COUNT {
            return Err(SignalError::configuration(format!(
                "approach_count must be {}, got {}",
                APPROACH_COUNT, self.intersection.approach_count
            )));
        }
        if self.timing.minimum_seconds == 0 {
            return Err(SignalError::configuration(
                "minimum_seconds must be positive",
            ));
        }
        let round = self
            .timing
            .minimum_seconds
            .checked_add(self.timing.extra_budget_seconds)
            .and_then(|max| max.checked_mul(APPROACH_COUNT as u32));
        if round.is_none() {
            return Err(SignalError::configuration(format!(
                "minimum_seconds + extra_budget_seconds is too large for a {}-approach round",
                APPROACH_COUNT
            )));
        }
        let threshold = self.detection.confidence_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(SignalError::configuration(format!(
                "confidence_threshold must lie in [0, 1], got {threshold}"
            )));
        }
        if self.detection.vehicle_class_ids.is_empty() {
            return Err(SignalError::configuration(
                "vehicle_class_ids must not be empty",
            ));
        }
        if self.driver.tick_interval_ms == 0 {
            return Err(SignalError::configuration(
                "tick_interval_ms must be positive",
            ));
        }
        Ok(())
    }
}
