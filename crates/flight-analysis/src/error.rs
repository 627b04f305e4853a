use thiserror::Error;

pub type Result<T> = std::result::Result<T, FlightError>;

#[derive(Debug, Error)]
pub enum FlightError {
    #[error("invalid selection: {0}")]
    InvalidSelection(String),
    #[error("insufficient data: {0}")]
    InsufficientData(String),
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("config error: {0}")]
    Config(String),
    #[error("malformed row {line} in {file}: {reason}")]
    MalformedRow {
        file: String,
        line: u64,
        reason: String,
    },
    #[error("referential integrity violation: {0}")]
    Integrity(String),
    #[error("unexpected result shape: {0}")]
    ResultShape(String),
}

impl FlightError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidSelection(message.into())
    }

    pub fn insufficient(message: impl Into<String>) -> Self {
        Self::InsufficientData(message.into())
    }

    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, Self::InsufficientData(_))
    }
}
