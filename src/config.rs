use crate::error::{BoardError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;

/// Pointer travel before a press turns into a drag
pub const DEFAULT_DRAG_THRESHOLD_PX: f64 = 5.0;

/// What a board session does with its snapshot when a write fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteFailurePolicy {
    /// Keep the optimistic snapshot and only report the failure
    #[default]
    KeepOptimistic,
    /// Restore the snapshot that preceded the failed change
    Rollback,
}

/// Board session settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub drag_threshold_px: f64,
    pub write_failure_policy: WriteFailurePolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            drag_threshold_px: DEFAULT_DRAG_THRESHOLD_PX,
            write_failure_policy: WriteFailurePolicy::default(),
        }
    }
}

impl SessionConfig {
    /// Parses settings from JSON; missing fields take their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads settings from a JSON file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref()).await?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.drag_threshold_px.is_finite() || self.drag_threshold_px < 0.0 {
            return Err(BoardError::ConfigError(format!(
                "drag_threshold_px must be a non-negative number, got {}",
                self.drag_threshold_px
            )));
        }
        Ok(())
    }
}
