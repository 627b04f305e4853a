use serde_json::Value;

pub mod analysis;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod loader;
pub mod prediction;
pub mod registry;
pub mod shaper;

pub use config::{AppConfig, PipelineSettings};
pub use dispatch::{
    CatalogEntry, DispatchEngine, DispatchOutcome, ParameterSource, QueryClass,
    ScriptedParameters,
};
pub use error::{FlightError, Result};
pub use gateway::{SqliteGateway, StorageGateway};
pub use loader::{load_dataset, LoadSummary};
pub use prediction::{MetricsReport, OnTimeEstimate};
pub use shaper::{shape, DisplayTable};

/// SQL text plus positional integer bindings (`?1`, `?2`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryText {
    pub sql: String,
    pub bindings: Vec<i64>,
}

impl QueryText {
    pub fn fixed(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            bindings: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }
}
