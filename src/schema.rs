use crate::error::{CopilotError, Result};
use chrono::{Datelike, NaiveDate};
use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const REVENUE_CATEGORY: &str = "Revenue";
pub const COGS_CATEGORY: &str = "COGS";
pub const OPEX_PREFIX: &str = "Opex:";

pub const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// A day-less calendar month. Ordering is chronological.
///
/// Serialized as `"YYYY-MM"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CalendarMonth {
    year: i32,
    month: u32,
}

impl CalendarMonth {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(CopilotError::InvalidMonth(format!(
                "month {} is outside 1..=12",
                month
            )));
        }
        if !(1..=9999).contains(&year) {
            return Err(CopilotError::InvalidMonth(format!(
                "year {} is outside 1..=9999",
                year
            )));
        }
        Ok(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Result<Self> {
        Self::new(date.year(), date.month())
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// Shifts by a signed number of months, rolling the year as needed.
    ///
    /// `None` when the result would leave years 1..=9999.
    pub fn offset(self, months: i32) -> Option<Self> {
        let index = i64::from(self.year) * 12 + i64::from(self.month) - 1 + i64::from(months);
        let year = i32::try_from(index.div_euclid(12)).ok()?;
        let month = u32::try_from(index.rem_euclid(12)).ok()? + 1;
        Self::new(year, month).ok()
    }

    pub fn next(self) -> Option<Self> {
        self.offset(1)
    }

    pub fn prev(self) -> Option<Self> {
        self.offset(-1)
    }

    /// The `window` consecutive months ending at (and including) `self`, oldest first.
    ///
    /// `None` when the window reaches back before year 1.
    pub fn trailing(self, window: u32) -> Option<Vec<Self>> {
        let Some(back) = window.checked_sub(1) else {
            return Some(Vec::new());
        };
        let start = self.offset(-i32::try_from(back).ok()?)?;
        let len = usize::try_from(window).ok()?;
        Some(std::iter::successors(Some(start), |m| m.next()).take(len).collect())
    }

    /// Human label such as "June 2025".
    pub fn label(&self) -> String {
        format!("{} {}", MONTH_NAMES[(self.month - 1) as usize], self.year)
    }
}

impl fmt::Display for CalendarMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for CalendarMonth {
    type Err = CopilotError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let date = NaiveDate::parse_from_str(&format!("{}-01", trimmed), "%Y-%m-%d").map_err(
            |_| CopilotError::InvalidMonth(format!("'{}' is not in YYYY-MM format", trimmed)),
        )?;
        Self::new(date.year(), date.month())
    }
}

impl TryFrom<String> for CalendarMonth {
    type Error = CopilotError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<CalendarMonth> for String {
    fn from(month: CalendarMonth) -> Self {
        month.to_string()
    }
}

impl JsonSchema for CalendarMonth {
    fn schema_name() -> String {
        "CalendarMonth".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        let mut schema = String::json_schema(gen).into_object();
        schema.string().pattern = Some(r"^\d{4}-\d{2}$".to_string());
        schema.metadata().description = Some("Calendar month formatted as YYYY-MM".to_string());
        schema.into()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RecordSource {
    #[schemars(description = "Booked actuals")]
    Actual,

    #[schemars(description = "Budgeted plan figures")]
    Budget,
}

/// One row of the combined actuals + budget fact table, already converted to USD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FinancialRecord {
    pub entity: String,
    pub month: CalendarMonth,
    /// "Revenue", "COGS" or "Opex:<subcategory>"; other categories are carried but unused.
    pub category: String,
    pub amount_usd: f64,
    pub source: RecordSource,
}

impl FinancialRecord {
    pub fn new(
        entity: impl Into<String>,
        month: CalendarMonth,
        category: impl Into<String>,
        amount_usd: f64,
        source: RecordSource,
    ) -> Self {
        Self {
            entity: entity.into(),
            month,
            category: category.into(),
            amount_usd,
            source,
        }
    }

    pub fn is_opex(&self) -> bool {
        self.category.starts_with(OPEX_PREFIX)
    }

    pub fn opex_subcategory(&self) -> Option<&str> {
        self.category.strip_prefix(OPEX_PREFIX)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CashRecord {
    pub entity: String,
    pub month: CalendarMonth,
    pub cash_balance_usd: f64,
}

impl CashRecord {
    pub fn new(entity: impl Into<String>, month: CalendarMonth, cash_balance_usd: f64) -> Self {
        Self {
            entity: entity.into(),
            month,
            cash_balance_usd,
        }
    }
}
