//! # CFO Copilot
//!
//! Answers natural-language finance questions ("What was June 2025 revenue vs
//! budget?", "gross margin last 6 months", "what is our runway?") over a small,
//! already-normalized monthly dataset.
//!
//! ## Core Concepts
//!
//! - **Dataset**: USD fact records (actuals and budget by entity, month and
//!   category) plus monthly cash balances. Validated once, then read-only.
//! - **Planner**: ordered keyword rules pick an [`Intent`]; independent helpers
//!   pull a month ("June 2025") and a window ("last 6 months") from the text.
//! - **Metrics Engine**: pure functions producing a [`MetricResult`] for revenue
//!   vs budget, gross margin trend, opex breakdown and cash runway.
//! - **Outcomes**: unknown intents, missing months and windows that run off
//!   the calendar are ordinary [`QueryOutcome`] variants, not errors.
//!
//! ## Example
//!
//! ```rust,ignore
//! use cfo_copilot::*;
//!
//! let jan = CalendarMonth::new(2023, 1).unwrap();
//! let dataset = Dataset::new(
//!     vec![
//!         FinancialRecord::new("ParentCo", jan, "Revenue", 1000.0, RecordSource::Actual),
//!         FinancialRecord::new("ParentCo", jan, "Revenue", 1200.0, RecordSource::Budget),
//!     ],
//!     vec![CashRecord::new("ParentCo", jan, 10_000.0)],
//! )
//! .unwrap();
//!
//! let copilot = Copilot::with_defaults(dataset);
//! match copilot.answer("What was Jan 2023 revenue vs budget?").unwrap() {
//!     QueryOutcome::Answered { result, .. } => println!("{}", result.summary()),
//!     other => println!("{:?}", other),
//! }
//! ```

pub mod config;
pub mod dataset;
pub mod error;
pub mod ingestion;
pub mod metrics;
pub mod planner;
pub mod results;
pub mod schema;
pub mod utils;

pub use config::{CopilotConfig, MissingMonthPolicy};
pub use dataset::Dataset;
pub use error::{CopilotError, Result};
pub use ingestion::{load_dataset, read_cash_records, read_financial_records};
pub use metrics::MetricsEngine;
pub use planner::{classify, extract_month, extract_n_months, plan, Intent, QueryParams, QueryPlan};
pub use results::*;
pub use schema::*;

use log::{debug, info, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum QueryParameter {
    Month,
    Window,
}

/// Everything a single query can end in. Only contract violations are errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum QueryOutcome {
    Answered {
        intent: Intent,
        params: QueryParams,
        result: MetricResult,
    },
    /// No rule matched; the caller should ask the user to rephrase.
    UnknownIntent { raw_text: String },
    /// The intent was understood but needs a value the text did not supply.
    MissingParameter {
        intent: Intent,
        parameter: QueryParameter,
        raw_text: String,
    },
    /// The text supplied a value no metric can be computed for, such as
    /// "last 30000 months".
    UnsupportedParameter {
        intent: Intent,
        parameter: QueryParameter,
        raw_text: String,
    },
}

pub struct Copilot {
    dataset: Dataset,
    config: CopilotConfig,
}

impl Copilot {
    pub fn new(dataset: Dataset, config: CopilotConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { dataset, config })
    }

    pub fn with_defaults(dataset: Dataset) -> Self {
        Self {
            dataset,
            config: CopilotConfig::default(),
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn config(&self) -> &CopilotConfig {
        &self.config
    }

    pub fn engine(&self) -> MetricsEngine<'_> {
        MetricsEngine::with_config(&self.dataset, &self.config)
    }

    /// The month a month-requiring intent runs for. This is the only place the
    /// missing-month policy is applied.
    pub fn resolve_month(&self, plan: &QueryPlan) -> Option<CalendarMonth> {
        if let Some(month) = plan.params.month {
            return Some(month);
        }
        match self.config.missing_month_policy {
            MissingMonthPolicy::LatestAvailable => self.dataset.latest_month(),
            MissingMonthPolicy::AskForClarification => None,
        }
    }

    /// Trend windows end at the named month, or at the latest data month.
    fn anchor_month(&self, plan: &QueryPlan) -> Option<CalendarMonth> {
        plan.params.month.or_else(|| self.dataset.latest_month())
    }

    pub fn answer(&self, text: &str) -> Result<QueryOutcome> {
        info!("Answering query: {}", text);
        self.execute(plan(text))
    }

    pub fn execute(&self, plan: QueryPlan) -> Result<QueryOutcome> {
        let engine = self.engine();

        let result = match plan.intent {
            Intent::Unknown => {
                debug!("No intent rule matched '{}'", plan.params.raw_text);
                return Ok(QueryOutcome::UnknownIntent {
                    raw_text: plan.params.raw_text,
                });
            }
            Intent::RevenueVsBudget | Intent::OpexBreakdown => {
                let Some(month) = self.resolve_month(&plan) else {
                    return Ok(missing_parameter(plan, QueryParameter::Month));
                };
                if plan.intent == Intent::RevenueVsBudget {
                    MetricResult::RevenueVsBudget(engine.revenue_vs_budget(month))
                } else {
                    MetricResult::OpexBreakdown(engine.opex_breakdown(month))
                }
            }
            Intent::GrossMarginTrend => {
                let Some(end_month) = self.anchor_month(&plan) else {
                    return Ok(missing_parameter(plan, QueryParameter::Month));
                };
                let window = plan
                    .params
                    .window_months
                    .unwrap_or(self.config.default_window_months);
                match engine.gross_margin_trend(end_month, window) {
                    Ok(trend) => MetricResult::GrossMarginTrend(trend),
                    Err(CopilotError::WindowOutOfRange { .. }) => {
                        return Ok(unsupported_parameter(plan, QueryParameter::Window));
                    }
                    Err(err) => return Err(err),
                }
            }
            Intent::CashRunway => MetricResult::CashRunway(engine.cash_runway()),
        };

        Ok(QueryOutcome::Answered {
            intent: plan.intent,
            params: plan.params,
            result,
        })
    }

    pub fn kpi_snapshot(&self) -> Option<KpiSnapshot> {
        self.engine().kpi_snapshot()
    }
}

fn missing_parameter(plan: QueryPlan, parameter: QueryParameter) -> QueryOutcome {
    debug!("{:?} needs a {:?} and none was resolved", plan.intent, parameter);
    QueryOutcome::MissingParameter {
        intent: plan.intent,
        parameter,
        raw_text: plan.params.raw_text,
    }
}

fn unsupported_parameter(plan: QueryPlan, parameter: QueryParameter) -> QueryOutcome {
    warn!(
        "{:?} cannot use the {:?} in '{}'",
        plan.intent, parameter, plan.params.raw_text
    );
    QueryOutcome::UnsupportedParameter {
        intent: plan.intent,
        parameter,
        raw_text: plan.params.raw_text,
    }
}
