use crate::config::{CopilotConfig, DEFAULT_RUNWAY_LOOKBACK_DELTAS};
use crate::dataset::Dataset;
use crate::error::{CopilotError, Result};
use crate::results::{
    BudgetStatus, BurnMultiple, CashRunway, GrossMarginPoint, GrossMarginTrend, KpiSnapshot,
    OpexBreakdown, OpexLine, OpexRatio, RevenueGrowth, RevenueGrowthPoint, RevenueVsBudget,
    Runway,
};
use crate::schema::{CalendarMonth, RecordSource, COGS_CATEGORY, REVENUE_CATEGORY};
use crate::utils::{mean, safe_ratio};
use log::{debug, warn};

/// Pure metric computations over a borrowed [`Dataset`].
///
/// Nothing here mutates the dataset, so one engine (or many) can be shared
/// freely across threads.
pub struct MetricsEngine<'a> {
    dataset: &'a Dataset,
    runway_lookback_deltas: usize,
}

impl<'a> MetricsEngine<'a> {
    pub fn new(dataset: &'a Dataset) -> Self {
        Self {
            dataset,
            runway_lookback_deltas: DEFAULT_RUNWAY_LOOKBACK_DELTAS,
        }
    }

    pub fn with_config(dataset: &'a Dataset, config: &CopilotConfig) -> Self {
        Self {
            dataset,
            runway_lookback_deltas: config.runway_lookback_deltas.max(1),
        }
    }

    pub fn revenue_vs_budget(&self, month: CalendarMonth) -> RevenueVsBudget {
        let actual = self
            .dataset
            .category_total(month, REVENUE_CATEGORY, RecordSource::Actual);
        let budget = self
            .dataset
            .category_total(month, REVENUE_CATEGORY, RecordSource::Budget);

        debug!(
            "Revenue for {}: actual={:?} budget={:?}",
            month, actual, budget
        );

        let (actual, budget, variance_abs, variance_pct, status) = match (actual, budget) {
            (Some(actual), Some(budget)) => {
                let variance = actual - budget;
                (
                    actual,
                    Some(budget),
                    Some(variance),
                    safe_ratio(variance, budget),
                    BudgetStatus::Complete,
                )
            }
            (Some(actual), None) => {
                warn!("No budget data for {}", month);
                (actual, None, None, None, BudgetStatus::NoBudget)
            }
            (None, Some(budget)) => (0.0, Some(budget), None, None, BudgetStatus::NoActuals),
            (None, None) => {
                warn!("No revenue data at all for {}", month);
                (0.0, None, None, None, BudgetStatus::NoData)
            }
        };

        RevenueVsBudget {
            month,
            actual,
            budget,
            variance_abs,
            variance_pct,
            status,
            summary: String::new(),
        }
        .summarized()
    }

    /// Margin for a single month from actuals. Months without revenue get `None`.
    pub fn gross_margin_point(&self, month: CalendarMonth) -> GrossMarginPoint {
        let revenue = self
            .dataset
            .category_total(month, REVENUE_CATEGORY, RecordSource::Actual);
        let cogs = self
            .dataset
            .category_total(month, COGS_CATEGORY, RecordSource::Actual)
            .unwrap_or(0.0);

        let gross_margin = revenue.and_then(|revenue| safe_ratio(revenue - cogs, revenue));

        GrossMarginPoint {
            month,
            revenue: revenue.unwrap_or(0.0),
            cogs,
            gross_margin,
        }
    }

    pub fn gross_margin_trend(
        &self,
        end_month: CalendarMonth,
        window_months: u32,
    ) -> Result<GrossMarginTrend> {
        let points: Vec<GrossMarginPoint> = trailing_months(end_month, window_months)?
            .into_iter()
            .map(|month| self.gross_margin_point(month))
            .collect();

        let defined: Vec<f64> = points.iter().filter_map(|p| p.gross_margin).collect();
        if defined.len() < points.len() {
            debug!(
                "{} of {} months ending {} have no computable gross margin",
                points.len() - defined.len(),
                points.len(),
                end_month
            );
        }

        Ok(GrossMarginTrend {
            end_month,
            window_months,
            average_margin: mean(&defined),
            points,
            summary: String::new(),
        }
        .summarized())
    }

    pub fn opex_breakdown(&self, month: CalendarMonth) -> OpexBreakdown {
        let mut lines: Vec<OpexLine> = self
            .dataset
            .opex_totals(month)
            .into_iter()
            .map(|(category, amount)| OpexLine { category, amount })
            .collect();
        lines.sort_by(|a, b| {
            b.amount
                .total_cmp(&a.amount)
                .then_with(|| a.category.cmp(&b.category))
        });

        let total = lines.iter().map(|line| line.amount).sum();

        OpexBreakdown {
            month,
            lines,
            total,
            summary: String::new(),
        }
        .summarized()
    }

    /// Runway at the latest month of the (consolidated) cash series.
    ///
    /// Net burn averages the trailing month-over-month deltas, up to the
    /// configured lookback. Only a shrinking balance yields a finite runway.
    pub fn cash_runway(&self) -> CashRunway {
        let series = self.dataset.consolidated_cash();

        let Some(&(as_of, current_cash)) = series.last() else {
            warn!("Cash runway requested but the cash series is empty");
            return CashRunway {
                as_of: None,
                current_cash: None,
                deltas_used: 0,
                average_delta: None,
                net_burn: None,
                runway: Runway::Unavailable,
                summary: String::new(),
            }
            .summarized();
        };

        let deltas: Vec<f64> = series.windows(2).map(|w| w[1].1 - w[0].1).collect();
        let trailing = &deltas[deltas.len().saturating_sub(self.runway_lookback_deltas)..];
        let average_delta = mean(trailing);

        let runway = match average_delta {
            Some(delta) if delta < 0.0 => {
                let months = safe_ratio(current_cash, -delta).unwrap_or(0.0).max(0.0);
                Runway::Finite { months }
            }
            _ => Runway::Infinite,
        };

        debug!(
            "Cash runway at {}: cash={} deltas={:?} runway={:?}",
            as_of, current_cash, trailing, runway
        );

        CashRunway {
            as_of: Some(as_of),
            current_cash: Some(current_cash),
            deltas_used: trailing.len(),
            average_delta,
            net_burn: average_delta.map(|delta| -delta),
            runway,
            summary: String::new(),
        }
        .summarized()
    }

    pub fn opex_ratio(&self, month: CalendarMonth) -> OpexRatio {
        let opex_total: f64 = self.dataset.opex_totals(month).values().sum();
        let revenue = self
            .dataset
            .category_total(month, REVENUE_CATEGORY, RecordSource::Actual);

        OpexRatio {
            month,
            opex_total,
            revenue,
            opex_ratio: revenue.and_then(|revenue| safe_ratio(opex_total, revenue)),
            summary: String::new(),
        }
        .summarized()
    }

    /// Month-over-month growth in actual revenue for each month of the window.
    pub fn revenue_growth(
        &self,
        end_month: CalendarMonth,
        window_months: u32,
    ) -> Result<RevenueGrowth> {
        let points: Vec<RevenueGrowthPoint> = trailing_months(end_month, window_months)?
            .into_iter()
            .map(|month| {
                let revenue = self.actual_revenue(month);
                let prior_revenue = month.prev().and_then(|prior| self.actual_revenue(prior));
                let growth = revenue
                    .zip(prior_revenue)
                    .and_then(|(current, prior)| safe_ratio(current - prior, prior));
                RevenueGrowthPoint {
                    month,
                    revenue,
                    prior_revenue,
                    growth,
                }
            })
            .collect();

        let defined: Vec<f64> = points.iter().filter_map(|p| p.growth).collect();

        Ok(RevenueGrowth {
            end_month,
            window_months,
            average_growth: mean(&defined),
            points,
            summary: String::new(),
        }
        .summarized())
    }

    /// Net burn over net new monthly revenue across the last `window_months`
    /// months of the cash series.
    pub fn burn_multiple(&self, window_months: u32) -> Result<BurnMultiple> {
        if window_months == 0 {
            return Err(CopilotError::InvalidWindow(window_months));
        }

        let series = self.dataset.consolidated_cash();
        let Some(&(end_month, end_cash)) = series.last() else {
            warn!("Burn multiple requested but the cash series is empty");
            return Ok(BurnMultiple {
                window_months,
                start_month: None,
                end_month: None,
                net_burn: None,
                net_new_revenue: None,
                burn_multiple: None,
                summary: String::new(),
            }
            .summarized());
        };

        let start_month = i32::try_from(window_months)
            .ok()
            .and_then(|back| end_month.offset(-back))
            .ok_or_else(|| CopilotError::WindowOutOfRange {
                window: window_months,
                end_month: end_month.to_string(),
            })?;

        let start_cash = series
            .iter()
            .find(|(month, _)| *month == start_month)
            .map(|&(_, cash)| cash);
        let net_burn = start_cash.map(|cash| cash - end_cash);
        let net_new_revenue = self
            .actual_revenue(end_month)
            .zip(self.actual_revenue(start_month))
            .map(|(end, start)| end - start);

        let burn_multiple = match (net_burn, net_new_revenue) {
            (Some(burn), Some(new_revenue)) if burn > 0.0 && new_revenue > 0.0 => {
                safe_ratio(burn, new_revenue)
            }
            _ => None,
        };

        debug!(
            "Burn multiple {}..{}: burn={:?} new_revenue={:?}",
            start_month, end_month, net_burn, net_new_revenue
        );

        Ok(BurnMultiple {
            window_months,
            start_month: Some(start_month),
            end_month: Some(end_month),
            net_burn,
            net_new_revenue,
            burn_multiple,
            summary: String::new(),
        }
        .summarized())
    }

    /// Dashboard figures at the latest fact month; `None` for an empty fact table.
    pub fn kpi_snapshot(&self) -> Option<KpiSnapshot> {
        let month = self.dataset.latest_month()?;
        let opex = self.opex_ratio(month);

        Some(KpiSnapshot {
            month,
            revenue_vs_budget: self.revenue_vs_budget(month),
            gross_margin: self.gross_margin_point(month).gross_margin,
            opex_total: opex.opex_total,
            opex_ratio: opex.opex_ratio,
            cash_runway: self.cash_runway(),
        })
    }

    fn actual_revenue(&self, month: CalendarMonth) -> Option<f64> {
        self.dataset
            .category_total(month, REVENUE_CATEGORY, RecordSource::Actual)
    }
}

fn trailing_months(end_month: CalendarMonth, window_months: u32) -> Result<Vec<CalendarMonth>> {
    if window_months == 0 {
        return Err(CopilotError::InvalidWindow(window_months));
    }
    end_month
        .trailing(window_months)
        .ok_or_else(|| CopilotError::WindowOutOfRange {
            window: window_months,
            end_month: end_month.to_string(),
        })
}
