use crate::error::{CopilotError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_WINDOW_MONTHS: u32 = 3;
pub const DEFAULT_RUNWAY_LOOKBACK_DELTAS: usize = 3;

/// What to do when a query needs a month and none could be read from the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum MissingMonthPolicy {
    #[schemars(description = "Use the latest month present in the fact table")]
    #[default]
    LatestAvailable,

    #[schemars(description = "Report a missing parameter so the caller can ask the user")]
    AskForClarification,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CopilotConfig {
    #[schemars(description = "Trend window used when the query has no 'last N months'")]
    pub default_window_months: u32,

    #[schemars(description = "How many trailing month-over-month cash deltas feed the burn average")]
    pub runway_lookback_deltas: usize,

    pub missing_month_policy: MissingMonthPolicy,
}

impl Default for CopilotConfig {
    fn default() -> Self {
        Self {
            default_window_months: DEFAULT_WINDOW_MONTHS,
            runway_lookback_deltas: DEFAULT_RUNWAY_LOOKBACK_DELTAS,
            missing_month_policy: MissingMonthPolicy::default(),
        }
    }
}

impl CopilotConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_window_months == 0 {
            return Err(CopilotError::InvalidConfig(
                "default_window_months must be at least 1".to_string(),
            ));
        }
        if self.runway_lookback_deltas == 0 {
            return Err(CopilotError::InvalidConfig(
                "runway_lookback_deltas must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
