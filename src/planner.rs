//! Rule-based query planning: free text to an [`Intent`] plus [`QueryParams`].
//!
//! Classification walks [`INTENT_RULES`] in order and the first predicate that
//! matches wins. Month and window extraction are independent of classification
//! and never fail; absence comes back as `None`.

use crate::schema::CalendarMonth;
use log::debug;
use regex::{Captures, Regex};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    RevenueVsBudget,
    GrossMarginTrend,
    OpexBreakdown,
    CashRunway,
    Unknown,
}

impl Intent {
    /// Intents that answer for one specific month and cannot run without one.
    pub fn requires_month(&self) -> bool {
        matches!(self, Intent::RevenueVsBudget | Intent::OpexBreakdown)
    }

    /// Intents that span a trailing window of months.
    pub fn uses_window(&self) -> bool {
        matches!(self, Intent::GrossMarginTrend)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct QueryParams {
    /// Month read from the text, if any.
    pub month: Option<CalendarMonth>,
    /// Window read from "last N months", if any.
    pub window_months: Option<u32>,
    pub raw_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct QueryPlan {
    pub intent: Intent,
    pub params: QueryParams,
}

impl QueryPlan {
    /// The intent needs a month and the text did not name one.
    pub fn is_missing_month(&self) -> bool {
        self.intent.requires_month() && self.params.month.is_none()
    }
}

pub type IntentRule = (fn(&str) -> bool, Intent);

/// Evaluated top to bottom against lowercased text.
pub const INTENT_RULES: &[IntentRule] = &[
    (mentions_revenue_and_budget, Intent::RevenueVsBudget),
    (mentions_margin, Intent::GrossMarginTrend),
    (mentions_opex, Intent::OpexBreakdown),
    (mentions_runway, Intent::CashRunway),
];

fn mentions_revenue_and_budget(text: &str) -> bool {
    text.contains("revenue") && text.contains("budget")
}

fn mentions_margin(text: &str) -> bool {
    text.contains("margin")
}

fn mentions_opex(text: &str) -> bool {
    text.contains("opex")
}

fn mentions_runway(text: &str) -> bool {
    text.contains("runway")
}

pub fn classify(text: &str) -> Intent {
    let lowered = text.to_lowercase();
    INTENT_RULES
        .iter()
        .find(|(matches, _)| matches(&lowered))
        .map(|(_, intent)| *intent)
        .unwrap_or(Intent::Unknown)
}

const MONTH_TOKEN: &str = r"(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t|tember)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)";

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

fn name_then_year() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"(?i)\b{}\.?,?\s+(\d{{4}})\b", MONTH_TOKEN)).expect("valid regex")
    })
}

fn year_then_name() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"(?i)\b(\d{{4}})\s+{}\b", MONTH_TOKEN)).expect("valid regex")
    })
}

fn numeric_month() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{4})[-/](\d{1,2})\b").expect("valid regex"))
}

fn last_n_months() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\blast\s+(\d+)\s+months?\b").expect("valid regex"))
}

fn month_number(name: &str) -> Option<u32> {
    let prefix = name.get(..3)?.to_lowercase();
    MONTH_ABBREVIATIONS
        .iter()
        .position(|abbr| *abbr == prefix)
        .map(|idx| idx as u32 + 1)
}

/// First valid match of `re` in `text` as (byte offset, month).
fn first_month_match(
    re: &Regex,
    text: &str,
    resolve: impl Fn(&Captures) -> Option<CalendarMonth>,
) -> Option<(usize, CalendarMonth)> {
    re.captures_iter(text).find_map(|caps| {
        let start = caps.get(0)?.start();
        resolve(&caps).map(|month| (start, month))
    })
}

/// Reads a month/year pair such as "June 2025", "Mar 2023", "2025 June" or
/// "2025-06". Both parts must be present; the earliest match in the text wins.
pub fn extract_month(text: &str) -> Option<CalendarMonth> {
    let named = first_month_match(name_then_year(), text, |caps| {
        let month = month_number(caps.get(1)?.as_str())?;
        let year = caps.get(2)?.as_str().parse().ok()?;
        CalendarMonth::new(year, month).ok()
    });
    let year_first = first_month_match(year_then_name(), text, |caps| {
        let year = caps.get(1)?.as_str().parse().ok()?;
        let month = month_number(caps.get(2)?.as_str())?;
        CalendarMonth::new(year, month).ok()
    });
    let numeric = first_month_match(numeric_month(), text, |caps| {
        let year = caps.get(1)?.as_str().parse().ok()?;
        let month = caps.get(2)?.as_str().parse().ok()?;
        CalendarMonth::new(year, month).ok()
    });

    [named, year_first, numeric]
        .into_iter()
        .flatten()
        .min_by_key(|(start, _)| *start)
        .map(|(_, month)| month)
}

/// Reads "last N months" with N a positive integer written in digits.
pub fn extract_n_months(text: &str) -> Option<u32> {
    let caps = last_n_months().captures(text)?;
    caps.get(1)?
        .as_str()
        .parse::<u32>()
        .ok()
        .filter(|n| *n > 0)
}

pub fn plan(text: &str) -> QueryPlan {
    let intent = classify(text);
    let params = QueryParams {
        month: extract_month(text),
        window_months: extract_n_months(text),
        raw_text: text.to_string(),
    };

    debug!(
        "Planned {:?} with month={:?} window={:?}",
        intent, params.month, params.window_months
    );

    QueryPlan { intent, params }
}
