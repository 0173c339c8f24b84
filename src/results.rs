//! Output contract handed to renderers.
//!
//! Every amount is USD and every numeric field is a plain number or `null`,
//! so charts and text summaries can both be produced from the same value.

use crate::schema::CalendarMonth;
use schemars::schema::RootSchema;
use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MetricType {
    RevenueVsBudget,
    GrossMarginTrend,
    OpexBreakdown,
    CashRunway,
    OpexRatio,
    RevenueGrowth,
    BurnMultiple,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "metric", rename_all = "snake_case")]
pub enum MetricResult {
    RevenueVsBudget(RevenueVsBudget),
    GrossMarginTrend(GrossMarginTrend),
    OpexBreakdown(OpexBreakdown),
    CashRunway(CashRunway),
    OpexRatio(OpexRatio),
    RevenueGrowth(RevenueGrowth),
    BurnMultiple(BurnMultiple),
}

impl MetricResult {
    pub fn metric_type(&self) -> MetricType {
        match self {
            MetricResult::RevenueVsBudget(_) => MetricType::RevenueVsBudget,
            MetricResult::GrossMarginTrend(_) => MetricType::GrossMarginTrend,
            MetricResult::OpexBreakdown(_) => MetricType::OpexBreakdown,
            MetricResult::CashRunway(_) => MetricType::CashRunway,
            MetricResult::OpexRatio(_) => MetricType::OpexRatio,
            MetricResult::RevenueGrowth(_) => MetricType::RevenueGrowth,
            MetricResult::BurnMultiple(_) => MetricType::BurnMultiple,
        }
    }

    pub fn summary(&self) -> &str {
        match self {
            MetricResult::RevenueVsBudget(r) => &r.summary,
            MetricResult::GrossMarginTrend(r) => &r.summary,
            MetricResult::OpexBreakdown(r) => &r.summary,
            MetricResult::CashRunway(r) => &r.summary,
            MetricResult::OpexRatio(r) => &r.summary,
            MetricResult::RevenueGrowth(r) => &r.summary,
            MetricResult::BurnMultiple(r) => &r.summary,
        }
    }
}

/// What revenue data existed for the requested month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    Complete,
    NoBudget,
    NoActuals,
    NoData,
}

impl BudgetStatus {
    pub fn has_budget(&self) -> bool {
        matches!(self, BudgetStatus::Complete | BudgetStatus::NoActuals)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RevenueVsBudget {
    pub month: CalendarMonth,
    /// Zero when no actual revenue was booked; check `status` to tell the cases apart.
    pub actual: f64,
    /// `null` under both `no_budget` and `no_data`; a budget row that exists
    /// is always reported, even when it is zero.
    pub budget: Option<f64>,
    pub variance_abs: Option<f64>,
    /// Fraction of budget, e.g. -0.1667 for 16.67% under.
    pub variance_pct: Option<f64>,
    pub status: BudgetStatus,
    pub summary: String,
}

impl RevenueVsBudget {
    pub(crate) fn summarized(mut self) -> Self {
        let label = self.month.label();
        self.summary = match (self.status, self.budget, self.variance_abs) {
            (BudgetStatus::NoData, _, _) => {
                format!("No revenue or budget data for {}.", label)
            }
            (BudgetStatus::NoBudget, _, _) => format!(
                "Revenue for {} was {}; no budget data to compare against.",
                label,
                format_usd(self.actual)
            ),
            (BudgetStatus::NoActuals, Some(budget), _) => format!(
                "No actual revenue booked for {} against a budget of {}.",
                label,
                format_usd(budget)
            ),
            (_, Some(budget), Some(variance)) => format!(
                "Revenue for {} was {} vs budget {}: variance {} ({}).",
                label,
                format_usd(self.actual),
                format_usd(budget),
                format_usd(variance),
                self.variance_pct
                    .map(format_pct)
                    .unwrap_or_else(|| "n/a".to_string())
            ),
            _ => format!("Revenue for {} was {}.", label, format_usd(self.actual)),
        };
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GrossMarginPoint {
    pub month: CalendarMonth,
    pub revenue: f64,
    pub cogs: f64,
    /// `None` when revenue is zero or the month has no data.
    pub gross_margin: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GrossMarginTrend {
    pub end_month: CalendarMonth,
    pub window_months: u32,
    /// One point per calendar month, oldest first, with no gaps.
    pub points: Vec<GrossMarginPoint>,
    /// Mean over months whose margin is defined.
    pub average_margin: Option<f64>,
    pub summary: String,
}

impl GrossMarginTrend {
    pub(crate) fn summarized(mut self) -> Self {
        let start = self.points.first().map(|p| p.month).unwrap_or(self.end_month);
        let defined = self.points.iter().filter(|p| p.gross_margin.is_some()).count();
        self.summary = match self.average_margin {
            Some(avg) => format!(
                "Gross margin {} to {}: average {} across {} of {} months.",
                start.label(),
                self.end_month.label(),
                format_pct(avg),
                defined,
                self.points.len()
            ),
            None => format!(
                "No gross margin could be computed from {} to {}: no revenue recorded.",
                start.label(),
                self.end_month.label()
            ),
        };
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OpexLine {
    pub category: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OpexBreakdown {
    pub month: CalendarMonth,
    /// Largest first; empty when the month has no opex.
    pub lines: Vec<OpexLine>,
    pub total: f64,
    pub summary: String,
}

impl OpexBreakdown {
    pub(crate) fn summarized(mut self) -> Self {
        self.summary = match self.lines.first() {
            None => format!("No opex recorded for {}.", self.month.label()),
            Some(top) => format!(
                "Opex for {} totalled {} across {} categories; largest was {} at {}.",
                self.month.label(),
                format_usd(self.total),
                self.lines.len(),
                top.category,
                format_usd(top.amount)
            ),
        };
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Runway {
    /// Cash is shrinking; months until it reaches zero at the current burn.
    Finite { months: f64 },
    /// Cash is flat or growing, or there is only one balance to go on.
    Infinite,
    /// No cash balances at all.
    Unavailable,
}

impl Runway {
    pub fn months(&self) -> Option<f64> {
        match self {
            Runway::Finite { months } => Some(*months),
            _ => None,
        }
    }

    pub fn is_infinite(&self) -> bool {
        matches!(self, Runway::Infinite)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CashRunway {
    /// Latest month in the cash series.
    pub as_of: Option<CalendarMonth>,
    pub current_cash: Option<f64>,
    pub deltas_used: usize,
    /// Mean month-over-month change in cash.
    pub average_delta: Option<f64>,
    /// Negative of `average_delta`; positive while cash is being spent.
    pub net_burn: Option<f64>,
    pub runway: Runway,
    pub summary: String,
}

impl CashRunway {
    pub(crate) fn summarized(mut self) -> Self {
        self.summary = match (self.as_of, self.current_cash, self.runway) {
            (Some(month), Some(cash), Runway::Finite { months }) => format!(
                "Cash at {} is {} with net burn of {}/month: runway {:.1} months.",
                month.label(),
                format_usd(cash),
                format_usd(self.net_burn.unwrap_or(0.0)),
                months
            ),
            (Some(month), Some(cash), Runway::Infinite) => format!(
                "Cash at {} is {} and is not depleting: runway is unlimited.",
                month.label(),
                format_usd(cash)
            ),
            _ => "No cash balance data available.".to_string(),
        };
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OpexRatio {
    pub month: CalendarMonth,
    pub opex_total: f64,
    pub revenue: Option<f64>,
    /// Opex as a fraction of actual revenue.
    pub opex_ratio: Option<f64>,
    pub summary: String,
}

impl OpexRatio {
    pub(crate) fn summarized(mut self) -> Self {
        self.summary = match self.opex_ratio {
            Some(ratio) => format!(
                "Opex for {} was {} of revenue ({} on {}).",
                self.month.label(),
                format_pct(ratio),
                format_usd(self.opex_total),
                format_usd(self.revenue.unwrap_or(0.0))
            ),
            None => format!(
                "Opex for {} was {}; no revenue to compare against.",
                self.month.label(),
                format_usd(self.opex_total)
            ),
        };
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RevenueGrowthPoint {
    pub month: CalendarMonth,
    /// Actual revenue booked in `month`, if any.
    pub revenue: Option<f64>,
    /// Actual revenue booked in the month before.
    pub prior_revenue: Option<f64>,
    /// Month-over-month change as a fraction of `prior_revenue`. `None` when
    /// either month has no revenue or the prior month's revenue is zero.
    pub growth: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RevenueGrowth {
    pub end_month: CalendarMonth,
    pub window_months: u32,
    /// One point per calendar month, oldest first, with no gaps.
    pub points: Vec<RevenueGrowthPoint>,
    pub average_growth: Option<f64>,
    pub summary: String,
}

impl RevenueGrowth {
    pub(crate) fn summarized(mut self) -> Self {
        let start = self.points.first().map(|p| p.month).unwrap_or(self.end_month);
        let defined = self.points.iter().filter(|p| p.growth.is_some()).count();
        self.summary = match self.average_growth {
            Some(avg) => format!(
                "Revenue growth {} to {}: average {} month over month across {} of {} months.",
                start.label(),
                self.end_month.label(),
                format_pct(avg),
                defined,
                self.points.len()
            ),
            None => format!(
                "No month-over-month revenue growth could be computed from {} to {}.",
                start.label(),
                self.end_month.label()
            ),
        };
        self
    }
}

/// Cash burned per dollar of new monthly revenue over a trailing window of the
/// cash series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BurnMultiple {
    pub window_months: u32,
    /// Month the window is measured from; `None` without cash data.
    pub start_month: Option<CalendarMonth>,
    /// Latest month of the cash series.
    pub end_month: Option<CalendarMonth>,
    /// Cash at `start_month` minus cash at `end_month`.
    pub net_burn: Option<f64>,
    /// Actual revenue at `end_month` minus actual revenue at `start_month`.
    pub net_new_revenue: Option<f64>,
    /// Defined only while cash is being burned and revenue is growing.
    pub burn_multiple: Option<f64>,
    pub summary: String,
}

impl BurnMultiple {
    pub(crate) fn summarized(mut self) -> Self {
        self.summary = match (
            self.start_month,
            self.end_month,
            self.net_burn,
            self.net_new_revenue,
        ) {
            (Some(start), Some(end), Some(burn), Some(new_revenue)) => match self.burn_multiple {
                Some(multiple) => format!(
                    "Burn multiple {} to {} is {:.2}x: burned {} for {} of new monthly revenue.",
                    start.label(),
                    end.label(),
                    multiple,
                    format_usd(burn),
                    format_usd(new_revenue)
                ),
                None if burn <= 0.0 => format!(
                    "Cash did not decrease from {} to {}; burn multiple does not apply.",
                    start.label(),
                    end.label()
                ),
                None => format!(
                    "Revenue did not grow from {} to {} ({}) while burning {}; burn multiple is undefined.",
                    start.label(),
                    end.label(),
                    format_usd(new_revenue),
                    format_usd(burn)
                ),
            },
            (Some(start), Some(end), _, _) => format!(
                "Not enough cash or revenue data between {} and {} for a burn multiple.",
                start.label(),
                end.label()
            ),
            _ => "No cash balance data available.".to_string(),
        };
        self
    }
}

/// Headline figures for a dashboard, all at the latest fact month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct KpiSnapshot {
    pub month: CalendarMonth,
    pub revenue_vs_budget: RevenueVsBudget,
    pub gross_margin: Option<f64>,
    pub opex_total: f64,
    /// Opex as a fraction of actual revenue; `None` without revenue.
    pub opex_ratio: Option<f64>,
    pub cash_runway: CashRunway,
}

/// JSON Schema of [`MetricResult`] for downstream renderers.
pub fn metric_result_schema() -> RootSchema {
    schema_for!(MetricResult)
}

pub fn format_usd(amount: f64) -> String {
    let rounded = format!("{:.0}", amount.abs());
    let mut grouped = String::with_capacity(rounded.len() + rounded.len() / 3);
    for (idx, ch) in rounded.chars().enumerate() {
        if idx > 0 && (rounded.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if amount < 0.0 && rounded != "0" {
        format!("-${}", grouped)
    } else {
        format!("${}", grouped)
    }
}

pub fn format_pct(fraction: f64) -> String {
    format!("{:.1}%", fraction * 100.0)
}
