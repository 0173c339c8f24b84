//! The normalized, read-only input the metrics are computed over.
//!
//! A [`Dataset`] can only be built through [`Dataset::new`], which enforces the
//! ingestion contract. Every metric therefore sees well-formed, USD-only data and
//! signals absence through its result rather than failing.

use crate::error::{CopilotError, Result};
use crate::schema::{CalendarMonth, CashRecord, FinancialRecord, RecordSource, OPEX_PREFIX};
use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet, HashSet};

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<FinancialRecord>,
    cash: Vec<CashRecord>,
}

impl Dataset {
    pub fn new(records: Vec<FinancialRecord>, mut cash: Vec<CashRecord>) -> Result<Self> {
        for (idx, record) in records.iter().enumerate() {
            validate_record(idx + 1, record)?;
        }

        {
            let mut seen = HashSet::new();
            for (idx, balance) in cash.iter().enumerate() {
                validate_cash(idx + 1, balance)?;
                if !seen.insert((balance.entity.as_str(), balance.month)) {
                    return Err(CopilotError::DuplicateCashRecord {
                        entity: balance.entity.clone(),
                        month: balance.month.to_string(),
                    });
                }
            }
        }

        cash.sort_by(|a, b| a.month.cmp(&b.month).then_with(|| a.entity.cmp(&b.entity)));

        debug!(
            "Dataset holds {} fact records and {} cash balances",
            records.len(),
            cash.len()
        );

        Ok(Self { records, cash })
    }

    pub fn records(&self) -> &[FinancialRecord] {
        &self.records
    }

    /// Cash balances ordered by month, then entity.
    pub fn cash_records(&self) -> &[CashRecord] {
        &self.cash
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.cash.is_empty()
    }

    pub fn entities(&self) -> BTreeSet<&str> {
        self.records
            .iter()
            .map(|r| r.entity.as_str())
            .chain(self.cash.iter().map(|c| c.entity.as_str()))
            .collect()
    }

    /// A copy restricted to one entity. Already validated, so this cannot fail.
    pub fn for_entity(&self, entity: &str) -> Dataset {
        Dataset {
            records: self
                .records
                .iter()
                .filter(|r| r.entity == entity)
                .cloned()
                .collect(),
            cash: self
                .cash
                .iter()
                .filter(|c| c.entity == entity)
                .cloned()
                .collect(),
        }
    }

    /// Latest month present in the fact table (actuals or budget).
    pub fn latest_month(&self) -> Option<CalendarMonth> {
        self.records.iter().map(|r| r.month).max()
    }

    /// Sum of `amount_usd` for an exact category; `None` when no record matches,
    /// which is distinct from a genuine total of zero.
    pub fn category_total(
        &self,
        month: CalendarMonth,
        category: &str,
        source: RecordSource,
    ) -> Option<f64> {
        let mut matched = false;
        let mut total = 0.0;
        for record in self
            .records
            .iter()
            .filter(|r| r.month == month && r.source == source && r.category == category)
        {
            matched = true;
            total += record.amount_usd;
        }
        matched.then_some(total)
    }

    /// Actual opex for the month keyed by full category string.
    pub fn opex_totals(&self, month: CalendarMonth) -> BTreeMap<String, f64> {
        let mut totals = BTreeMap::new();
        for record in self
            .records
            .iter()
            .filter(|r| r.month == month && r.source == RecordSource::Actual && r.is_opex())
        {
            *totals.entry(record.category.clone()).or_insert(0.0) += record.amount_usd;
        }
        totals
    }

    /// Cash summed across entities per month, oldest first.
    ///
    /// Only months in which every cash-reporting entity has a balance are
    /// kept, so an entity that stops reporting never shows up as burn.
    pub fn consolidated_cash(&self) -> Vec<(CalendarMonth, f64)> {
        let entity_count = self
            .cash
            .iter()
            .map(|c| c.entity.as_str())
            .collect::<BTreeSet<_>>()
            .len();

        let mut by_month: BTreeMap<CalendarMonth, (usize, f64)> = BTreeMap::new();
        for balance in &self.cash {
            let entry = by_month.entry(balance.month).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += balance.cash_balance_usd;
        }

        by_month
            .into_iter()
            .filter_map(|(month, (reporting, total))| {
                if reporting == entity_count {
                    Some((month, total))
                } else {
                    warn!(
                        "Skipping {} in consolidated cash: {} of {} entities reported",
                        month, reporting, entity_count
                    );
                    None
                }
            })
            .collect()
    }
}

fn validate_record(row: usize, record: &FinancialRecord) -> Result<()> {
    if record.entity.trim().is_empty() {
        return Err(CopilotError::InvalidRecord {
            row,
            details: "entity is empty".to_string(),
        });
    }
    if record.category.trim().is_empty() {
        return Err(CopilotError::InvalidRecord {
            row,
            details: "category is empty".to_string(),
        });
    }
    if record
        .opex_subcategory()
        .is_some_and(|sub| sub.trim().is_empty())
    {
        return Err(CopilotError::InvalidRecord {
            row,
            details: format!("'{}' has no subcategory after '{}'", record.category, OPEX_PREFIX),
        });
    }
    if !record.amount_usd.is_finite() {
        return Err(CopilotError::InvalidRecord {
            row,
            details: format!("amount_usd {} is not a finite number", record.amount_usd),
        });
    }
    Ok(())
}

fn validate_cash(row: usize, balance: &CashRecord) -> Result<()> {
    if balance.entity.trim().is_empty() {
        return Err(CopilotError::InvalidRecord {
            row,
            details: "cash entity is empty".to_string(),
        });
    }
    if !balance.cash_balance_usd.is_finite() {
        return Err(CopilotError::InvalidRecord {
            row,
            details: format!(
                "cash_balance_usd {} is not a finite number",
                balance.cash_balance_usd
            ),
        });
    }
    Ok(())
}
