use crate::error::{CopilotError, Result};
use crate::schema::CalendarMonth;

/// Ratio that is `None` whenever it is undefined: zero or non-finite denominator,
/// or a non-finite result. Every metric divides through here.
pub fn safe_ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 || !denominator.is_finite() || !numerator.is_finite() {
        return None;
    }
    let ratio = numerator / denominator;
    ratio.is_finite().then_some(ratio)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    safe_ratio(values.iter().sum(), values.len() as f64)
}

pub fn months_between(start: CalendarMonth, end: CalendarMonth) -> i32 {
    let year_diff = end.year() - start.year();
    let month_diff = end.month() as i32 - start.month() as i32;
    year_diff * 12 + month_diff
}

/// Parses a period string in the format "YYYY-MM" or "YYYY-MM:YYYY-MM"
/// Returns (start_month, end_month)
pub fn parse_period_string(period: &str) -> Result<(CalendarMonth, CalendarMonth)> {
    let parts: Vec<&str> = period.split(':').collect();

    match parts.as_slice() {
        [single] => {
            let month: CalendarMonth = single.parse()?;
            Ok((month, month))
        }
        [start, end] => {
            let start: CalendarMonth = start.parse()?;
            let end: CalendarMonth = end.parse()?;
            if end < start {
                return Err(CopilotError::InvalidMonth(format!(
                    "period '{}' ends before it starts",
                    period
                )));
            }
            Ok((start, end))
        }
        _ => Err(CopilotError::InvalidMonth(format!(
            "Invalid period format: {}. Expected 'YYYY-MM' or 'YYYY-MM:YYYY-MM'",
            period
        ))),
    }
}
