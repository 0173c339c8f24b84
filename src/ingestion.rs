//! Readers for the already-normalized fact and cash tables.
//!
//! Conversion to USD happens upstream. These readers only check that the
//! contract held: amounts parse as numbers and any currency column says USD.

use crate::dataset::Dataset;
use crate::error::{CopilotError, Result};
use crate::schema::{CalendarMonth, CashRecord, FinancialRecord, RecordSource};
use log::info;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
struct FactRow {
    entity: String,
    month: CalendarMonth,
    category: String,
    source: RecordSource,
    amount_usd: f64,
    #[serde(default)]
    currency: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct CashRow {
    entity: String,
    month: CalendarMonth,
    cash_balance_usd: f64,
    #[serde(default)]
    currency: Option<String>,
}

fn check_currency(row: usize, currency: Option<&str>) -> Result<()> {
    match currency.map(str::trim) {
        None | Some("") => Ok(()),
        Some(code) if code.eq_ignore_ascii_case("USD") => Ok(()),
        Some(code) => Err(CopilotError::NonUsdCurrency {
            row,
            currency: code.to_string(),
        }),
    }
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader)
}

/// Columns: `entity,month,category,source,amount_usd[,currency]`.
pub fn read_financial_records<R: Read>(reader: R) -> Result<Vec<FinancialRecord>> {
    let mut records = Vec::new();
    let mut rdr = csv_reader(reader);
    for (idx, row) in rdr.deserialize::<FactRow>().enumerate() {
        let row = row?;
        check_currency(idx + 1, row.currency.as_deref())?;
        records.push(FinancialRecord {
            entity: row.entity,
            month: row.month,
            category: row.category,
            amount_usd: row.amount_usd,
            source: row.source,
        });
    }
    Ok(records)
}

/// Columns: `entity,month,cash_balance_usd[,currency]`.
pub fn read_cash_records<R: Read>(reader: R) -> Result<Vec<CashRecord>> {
    let mut balances = Vec::new();
    let mut rdr = csv_reader(reader);
    for (idx, row) in rdr.deserialize::<CashRow>().enumerate() {
        let row = row?;
        check_currency(idx + 1, row.currency.as_deref())?;
        balances.push(CashRecord {
            entity: row.entity,
            month: row.month,
            cash_balance_usd: row.cash_balance_usd,
        });
    }
    Ok(balances)
}

pub fn load_dataset(facts_path: impl AsRef<Path>, cash_path: impl AsRef<Path>) -> Result<Dataset> {
    let facts_path = facts_path.as_ref();
    let cash_path = cash_path.as_ref();

    let records = read_financial_records(File::open(facts_path)?)?;
    let cash = read_cash_records(File::open(cash_path)?)?;

    info!(
        "Loaded {} fact rows from {} and {} cash rows from {}",
        records.len(),
        facts_path.display(),
        cash.len(),
        cash_path.display()
    );

    Dataset::new(records, cash)
}
