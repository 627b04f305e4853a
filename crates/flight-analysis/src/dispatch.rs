use crate::analysis::{
    busiest_day, busiest_day_sql, carrier_delay_counts_sql, carrier_delay_share,
    highest_total_delays, non_relational_entry, total_delays_by_city_sql, NonRelationalQuery,
    NON_RELATIONAL_QUERIES,
};
use crate::config::PipelineSettings;
use crate::error::{FlightError, Result};
use crate::gateway::StorageGateway;
use crate::prediction::{
    classify_delay_general, flights_from_table, flights_sql, predict_on_time_for_carrier_day,
    MetricsReport, OnTimeEstimate,
};
use crate::registry::{build_template, relational_entry, RELATIONAL_TEMPLATES};
use crate::shaper::DisplayTable;
use flight_core::FlightRecord;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryClass {
    Relational,
    NonRelational,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub id: u8,
    pub title: &'static str,
}

impl QueryClass {
    pub const ALL: [QueryClass; 2] = [QueryClass::Relational, QueryClass::NonRelational];

    /// Menu selection: "1" is relational, "2" non-relational.
    pub fn parse(input: &str) -> Result<Self> {
        match input.trim() {
            "1" => Ok(Self::Relational),
            "2" => Ok(Self::NonRelational),
            other => Err(FlightError::invalid(format!("unknown query class '{}'", other))),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Relational => "Relational",
            Self::NonRelational => "Non-Relational",
        }
    }

    pub fn catalog(self) -> Vec<CatalogEntry> {
        match self {
            Self::Relational => RELATIONAL_TEMPLATES
                .iter()
                .map(|entry| CatalogEntry {
                    id: entry.id,
                    title: entry.title,
                })
                .collect(),
            Self::NonRelational => NON_RELATIONAL_QUERIES
                .iter()
                .map(|entry| CatalogEntry {
                    id: entry.id,
                    title: entry.title,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Parameter {
    Limit,
    Carrier,
    Day,
}

impl Parameter {
    pub fn prompt(self) -> &'static str {
        match self {
            Self::Limit => "Number of results to display: ",
            Self::Carrier => "Carrier code (e.g. AA for American Airlines): ",
            Self::Day => "Enter a number (1-7) for day of week (e.g. 3 for Wednesday): ",
        }
    }
}

/// Supplies interactively collected parameters. `None` means the user gave
/// nothing (closed input, or the value was never provided).
pub trait ParameterSource {
    fn request(&mut self, parameter: Parameter) -> Option<String>;
}

/// Fixed answers, for one-shot commands and tests. Records what was asked.
#[derive(Debug, Clone, Default)]
pub struct ScriptedParameters {
    values: BTreeMap<Parameter, String>,
    requested: Vec<Parameter>,
}

impl ScriptedParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, parameter: Parameter, value: impl Into<String>) -> Self {
        self.values.insert(parameter, value.into());
        self
    }

    pub fn set(&mut self, parameter: Parameter, value: Option<String>) {
        if let Some(value) = value {
            self.values.insert(parameter, value);
        }
    }

    pub fn requested(&self) -> &[Parameter] {
        &self.requested
    }
}

impl ParameterSource for ScriptedParameters {
    fn request(&mut self, parameter: Parameter) -> Option<String> {
        self.requested.push(parameter);
        self.values.get(&parameter).cloned()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Table(DisplayTable),
    Text(String),
    Report(MetricsReport),
    Estimate(OnTimeEstimate),
    /// Unknown class or identifier, or a missing/invalid parameter. Nothing ran.
    Invalid(String),
    InsufficientData(String),
    /// Storage or result-shape fault; already logged.
    Failed(String),
}

impl DispatchOutcome {
    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid(_))
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Table(table) => json!({ "ok": true, "kind": "table", "table": table.to_json() }),
            Self::Text(text) => json!({ "ok": true, "kind": "text", "text": text }),
            Self::Report(report) => json!({
                "ok": true,
                "kind": "report",
                "report": report,
                "text": report.to_string()
            }),
            Self::Estimate(estimate) => json!({
                "ok": true,
                "kind": "estimate",
                "estimate": estimate,
                "text": estimate.to_string()
            }),
            Self::Invalid(reason) => json_failure("invalid_input", reason),
            Self::InsufficientData(reason) => json_failure("insufficient_data", reason),
            Self::Failed(reason) => json_failure("query_failed", reason),
        }
    }
}

fn json_failure(code: &str, message: &str) -> Value {
    json!({
        "ok": false,
        "error": {
            "code": code,
            "message": message,
            "details": {}
        }
    })
}

/// Routes a (class, identifier) selection to a template or pipeline over an
/// explicitly passed gateway. Each call makes at most one storage round trip.
pub struct DispatchEngine<'g, G: StorageGateway + ?Sized> {
    gateway: &'g G,
    settings: PipelineSettings,
}

impl<'g, G: StorageGateway + ?Sized> DispatchEngine<'g, G> {
    pub fn new(gateway: &'g G, settings: PipelineSettings) -> Self {
        Self { gateway, settings }
    }

    pub fn dispatch(
        &self,
        class_input: &str,
        id_input: &str,
        params: &mut dyn ParameterSource,
    ) -> DispatchOutcome {
        match QueryClass::parse(class_input) {
            Ok(class) => self.dispatch_class(class, id_input, params),
            Err(err) => outcome_for(err),
        }
    }

    pub fn dispatch_class(
        &self,
        class: QueryClass,
        id_input: &str,
        params: &mut dyn ParameterSource,
    ) -> DispatchOutcome {
        info!(class = class.label(), id = %id_input.trim(), "dispatching query");
        let result = match class {
            QueryClass::Relational => self.run_relational(id_input, params),
            QueryClass::NonRelational => self.run_non_relational(id_input, params),
        };
        result.unwrap_or_else(outcome_for)
    }

    fn run_relational(
        &self,
        id_input: &str,
        params: &mut dyn ParameterSource,
    ) -> Result<DispatchOutcome> {
        let entry = relational_entry(id_input).ok_or_else(|| {
            FlightError::invalid(format!("unknown relational query '{}'", id_input.trim()))
        })?;
        let limit = if entry.needs_limit {
            params.request(Parameter::Limit)
        } else {
            None
        };
        let query = build_template(id_input, limit.as_deref())?;
        let table = self.gateway.execute(&query)?;
        Ok(DispatchOutcome::Table(DisplayTable::from_table(table)))
    }

    fn run_non_relational(
        &self,
        id_input: &str,
        params: &mut dyn ParameterSource,
    ) -> Result<DispatchOutcome> {
        let entry = non_relational_entry(id_input).ok_or_else(|| {
            FlightError::invalid(format!("unknown non-relational query '{}'", id_input.trim()))
        })?;
        match entry.query {
            NonRelationalQuery::BusiestDay => {
                let counts = self.gateway.execute(&busiest_day_sql())?;
                Ok(DispatchOutcome::Text(busiest_day(&counts)?))
            }
            NonRelationalQuery::HighestTotalDelays => {
                let totals = self.gateway.execute(&total_delays_by_city_sql())?;
                Ok(DispatchOutcome::Table(highest_total_delays(&totals)?))
            }
            NonRelationalQuery::CarrierDelayShare => {
                let counts = self.gateway.execute(&carrier_delay_counts_sql())?;
                Ok(DispatchOutcome::Table(carrier_delay_share(&counts)?))
            }
            NonRelationalQuery::DelayClassifier => {
                let flights = self.fetch_flights()?;
                let report = classify_delay_general(&flights, &self.settings)?;
                Ok(DispatchOutcome::Report(report))
            }
            NonRelationalQuery::CarrierDayOnTime => {
                let carrier = params.request(Parameter::Carrier).unwrap_or_default();
                let day = params.request(Parameter::Day).unwrap_or_default();
                let flights = self.fetch_flights()?;
                let estimate =
                    predict_on_time_for_carrier_day(&flights, &carrier, &day, &self.settings)?;
                Ok(DispatchOutcome::Estimate(estimate))
            }
        }
    }

    fn fetch_flights(&self) -> Result<Vec<FlightRecord>> {
        let table = self.gateway.execute(&flights_sql())?;
        let flights = flights_from_table(&table)?;
        debug!(flights = flights.len(), "fetched training data");
        Ok(flights)
    }
}

fn outcome_for(err: FlightError) -> DispatchOutcome {
    match err {
        FlightError::InvalidSelection(reason) => {
            debug!(%reason, "invalid selection");
            DispatchOutcome::Invalid(reason)
        }
        FlightError::InsufficientData(reason) => {
            warn!(%reason, "insufficient data");
            DispatchOutcome::InsufficientData(reason)
        }
        other => {
            error!(error = %other, "query execution failed");
            DispatchOutcome::Failed(other.to_string())
        }
    }
}
