pub mod features;
pub mod metrics;
pub mod model;
pub mod split;

use crate::analysis::{cell_i64, require_column};
use crate::config::PipelineSettings;
use crate::error::{FlightError, Result};
use crate::{QueryTable, QueryText};
use features::{carrier_column, FeatureSchema, NumericFeature};
use flight_core::{
    carrier_name, normalize_carrier_code, FlightRecord, Weekday, DEFAULT_CARRIER, FLIGHTS,
};
use metrics::{evaluate, ClassificationMetrics};
use model::LogisticRegression;
use serde::Serialize;
use serde_json::Value;
use split::train_test_split;
use std::fmt;
use tracing::{debug, info, warn};

const DELAY_FEATURES: [NumericFeature; 2] =
    [NumericFeature::OriginAirport, NumericFeature::DestAirport];
const ON_TIME_FEATURES: [NumericFeature; 1] = [NumericFeature::DayOfWeek];

/// The single round trip both pipelines need.
pub fn flights_sql() -> QueryText {
    QueryText::fixed(format!(
        "SELECT {} FROM {}",
        FLIGHTS.column_list(),
        FLIGHTS.name
    ))
}

pub fn flights_from_table(table: &QueryTable) -> Result<Vec<FlightRecord>> {
    let day_of_month = require_column(table, "day_of_month")?;
    let day_of_week = require_column(table, "day_of_week")?;
    let carrier = require_column(table, "carrier")?;
    let origin = require_column(table, "origin_airport_id")?;
    let dest = require_column(table, "dest_airport_id")?;
    let dep_delay = require_column(table, "dep_delay")?;
    let arr_delay = require_column(table, "arr_delay")?;

    table
        .rows
        .iter()
        .enumerate()
        .map(|(idx, row)| {
            let required = |column: usize, name: &str| {
                cell_i64(row, column).ok_or_else(|| {
                    FlightError::ResultShape(format!("flight row {} has no {}", idx + 1, name))
                })
            };
            let carrier = match row.get(carrier) {
                Some(Value::String(code)) => code.clone(),
                _ => {
                    return Err(FlightError::ResultShape(format!(
                        "flight row {} has no carrier",
                        idx + 1
                    )))
                }
            };
            Ok(FlightRecord {
                day_of_month: required(day_of_month, "day_of_month")?,
                day_of_week: required(day_of_week, "day_of_week")?,
                carrier,
                origin_airport_id: required(origin, "origin_airport_id")?,
                dest_airport_id: required(dest, "dest_airport_id")?,
                dep_delay: cell_i64(row, dep_delay),
                arr_delay: cell_i64(row, arr_delay),
            })
        })
        .collect()
}

/// Parses a 1-7 weekday number. Anything else resolves to Wednesday and the
/// returned flag is set.
pub fn resolve_weekday(input: &str) -> (Weekday, bool) {
    match input.trim().parse::<i64>().ok().and_then(Weekday::from_number) {
        Some(day) => (day, false),
        None => {
            warn!(input = %input.trim(), fallback = %Weekday::DEFAULT, "invalid weekday input; using default");
            (Weekday::DEFAULT, true)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsReport {
    pub metrics: ClassificationMetrics,
    pub train_size: usize,
    pub test_size: usize,
    pub feature_columns: Vec<String>,
}

impl fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.metrics;
        writeln!(f, "Logistic Regression Results:")?;
        writeln!(f, "----------------------------")?;
        writeln!(f, "Overall Accuracy: {:.2}%", m.accuracy * 100.0)?;
        writeln!(f, "Flights Not Delayed (Class 0):")?;
        writeln!(f, "- Precision: {:.2}%", m.negative.precision * 100.0)?;
        writeln!(f, "- Recall: {:.2}%", m.negative.recall * 100.0)?;
        writeln!(f, "Flights Delayed (Class 1):")?;
        writeln!(f, "- Precision: {:.2}%", m.positive.precision * 100.0)?;
        writeln!(f, "- Recall: {:.2}%", m.positive.recall * 100.0)?;
        writeln!(f)?;
        write!(
            f,
            "Note: Precision measures how accurate predictions were, while Recall measures how well delays were identified."
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OnTimeEstimate {
    /// `P(on_time = 1)` scaled to 0-100.
    pub probability_pct: f64,
    pub weekday: Weekday,
    pub day_defaulted: bool,
    pub carrier: String,
    pub carrier_name: Option<String>,
    /// Whether the carrier had an indicator column in the training data.
    pub carrier_seen: bool,
}

impl OnTimeEstimate {
    pub fn carrier_label(&self) -> &str {
        self.carrier_name.as_deref().unwrap_or(self.carrier.as_str())
    }
}

impl fmt::Display for OnTimeEstimate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Likelihood of being on-time: {:.2}% on a {} with {}.",
            self.probability_pct,
            self.weekday,
            self.carrier_label()
        )
    }
}

/// Rows without a departure delay carry no label and are left out.
fn labelled(flights: &[FlightRecord]) -> Vec<&FlightRecord> {
    flights
        .iter()
        .filter(|flight| flight.dep_delay.is_some())
        .collect()
}

fn partition<'a>(
    flights: &[&'a FlightRecord],
    settings: &PipelineSettings,
) -> (Vec<&'a FlightRecord>, Vec<&'a FlightRecord>) {
    let split = train_test_split(flights.len(), settings.test_ratio, settings.seed);
    let pick = |indices: &[usize]| indices.iter().map(|&idx| flights[idx]).collect::<Vec<_>>();
    (pick(&split.train), pick(&split.test))
}

/// Predicts `dep_delay > 0` from origin, destination and carrier, and
/// scores the held-out partition.
pub fn classify_delay_general(
    flights: &[FlightRecord],
    settings: &PipelineSettings,
) -> Result<MetricsReport> {
    let usable = labelled(flights);
    let (train, test) = partition(&usable, settings);
    if train.is_empty() || test.is_empty() {
        return Err(FlightError::insufficient(format!(
            "{} labelled flights cannot fill both a training and a test partition",
            usable.len()
        )));
    }

    let schema = FeatureSchema::capture(&DELAY_FEATURES, &train);
    let train_frame = schema.frame(&train, FlightRecord::departed_late);
    let model = LogisticRegression::fit(&train_frame.rows, &train_frame.labels, settings)?;

    let test_frame = schema.frame(&test, FlightRecord::departed_late);
    let predicted: Vec<bool> = test_frame.rows.iter().map(|row| model.predict(row)).collect();
    let metrics = evaluate(&test_frame.labels, &predicted);
    info!(
        train = train.len(),
        test = test.len(),
        accuracy = metrics.accuracy,
        "delay classifier evaluated"
    );

    Ok(MetricsReport {
        metrics,
        train_size: train.len(),
        test_size: test.len(),
        feature_columns: schema.columns().to_vec(),
    })
}

/// Probability that a departure on `day_input` with `carrier` leaves on
/// time. The inference row is reindexed onto the training columns, so an
/// unseen carrier contributes no indicator.
pub fn predict_on_time_for_carrier_day(
    flights: &[FlightRecord],
    carrier: &str,
    day_input: &str,
    settings: &PipelineSettings,
) -> Result<OnTimeEstimate> {
    let (weekday, day_defaulted) = resolve_weekday(day_input);
    let carrier = match normalize_carrier_code(carrier) {
        code if code.is_empty() => DEFAULT_CARRIER.to_string(),
        code => code,
    };

    let usable = labelled(flights);
    let (train, _) = partition(&usable, settings);
    if train.is_empty() {
        return Err(FlightError::insufficient(
            "no labelled flights available for training",
        ));
    }

    let schema = FeatureSchema::capture(&ON_TIME_FEATURES, &train);
    let frame = schema.frame(&train, FlightRecord::departed_on_time);
    let model = LogisticRegression::fit(&frame.rows, &frame.labels, settings)?;

    let indicator = carrier_column(&carrier);
    let carrier_seen = schema.position(&indicator).is_some();
    let sample = schema.reindex(&[
        (
            NumericFeature::DayOfWeek.column().to_string(),
            weekday.number() as f64,
        ),
        (indicator, 1.0),
    ]);
    let probability_pct = (model.predict_proba(&sample) * 100.0).clamp(0.0, 100.0);
    debug!(%carrier, %weekday, carrier_seen, probability_pct, "on-time estimate");

    Ok(OnTimeEstimate {
        probability_pct,
        weekday,
        day_defaulted,
        carrier_name: carrier_name(&carrier).map(str::to_string),
        carrier,
        carrier_seen,
    })
}
