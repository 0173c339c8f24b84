use thiserror::Error;

#[derive(Error, Debug)]
pub enum CopilotError {
    #[error("Invalid record at row {row}: {details}")]
    InvalidRecord { row: usize, details: String },

    #[error("Row {row} carries currency '{currency}': amounts must already be normalized to USD")]
    NonUsdCurrency { row: usize, currency: String },

    #[error("Duplicate cash balance for entity '{entity}' in {month}")]
    DuplicateCashRecord { entity: String, month: String },

    #[error("Invalid month: {0}")]
    InvalidMonth(String),

    #[error("Invalid window of {0} months: must be at least 1")]
    InvalidWindow(u32),

    #[error("A {window}-month window ending {end_month} reaches back before year 1")]
    WindowOutOfRange { window: u32, end_month: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CopilotError>;
