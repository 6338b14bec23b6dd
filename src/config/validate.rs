// src/config/validate.rs

use crate::config::model::{EngineConfig, RawEngineConfig};
use crate::errors::{PlanError, Result};

impl TryFrom<RawEngineConfig> for EngineConfig {
    type Error = crate::errors::PlanError;

    fn try_from(raw: RawEngineConfig) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(EngineConfig::new_unchecked(raw.engine, raw.logging))
    }
}

fn validate_raw_config(cfg: &RawEngineConfig) -> Result<()> {
    validate_cycle_length(cfg)?;
    validate_propagation_bound(cfg)?;
    Ok(())
}

fn validate_cycle_length(cfg: &RawEngineConfig) -> Result<()> {
    if cfg.engine.cycle_length_ms == 0 {
        return Err(PlanError::Config(
            "[engine].cycle_length_ms must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_propagation_bound(cfg: &RawEngineConfig) -> Result<()> {
    if cfg.engine.max_propagation_steps == 0 {
        return Err(PlanError::Config(
            "[engine].max_propagation_steps must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}
