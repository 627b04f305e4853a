use flight_core::FlightRecord;
use std::collections::BTreeSet;

pub const CARRIER_PREFIX: &str = "carrier_";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericFeature {
    DayOfWeek,
    OriginAirport,
    DestAirport,
}

impl NumericFeature {
    pub fn column(self) -> &'static str {
        match self {
            Self::DayOfWeek => "day_of_week",
            Self::OriginAirport => "origin_airport_id",
            Self::DestAirport => "dest_airport_id",
        }
    }

    pub fn value(self, flight: &FlightRecord) -> f64 {
        match self {
            Self::DayOfWeek => flight.day_of_week as f64,
            Self::OriginAirport => flight.origin_airport_id as f64,
            Self::DestAirport => flight.dest_airport_id as f64,
        }
    }
}

pub fn carrier_column(code: &str) -> String {
    format!("{}{}", CARRIER_PREFIX, code)
}

/// Ordered feature columns captured from a training partition: numeric
/// columns first, then one indicator column per carrier (sorted).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSchema {
    numeric: Vec<NumericFeature>,
    columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    pub rows: Vec<Vec<f64>>,
    pub labels: Vec<bool>,
}

impl FeatureSchema {
    pub fn capture(numeric: &[NumericFeature], training: &[&FlightRecord]) -> Self {
        let carriers: BTreeSet<&str> = training
            .iter()
            .map(|flight| flight.carrier.as_str())
            .collect();
        let mut columns: Vec<String> = numeric.iter().map(|f| f.column().to_string()).collect();
        columns.extend(carriers.into_iter().map(carrier_column));
        Self {
            numeric: numeric.to_vec(),
            columns,
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// Aligns a named sample to exactly this schema. Columns the schema has
    /// but the sample lacks are zero; sample columns unknown to the schema
    /// are dropped.
    pub fn reindex(&self, sample: &[(String, f64)]) -> Vec<f64> {
        let mut row = vec![0.0; self.columns.len()];
        for (name, value) in sample {
            if let Some(idx) = self.position(name) {
                row[idx] = *value;
            }
        }
        row
    }

    pub fn sample_for(&self, flight: &FlightRecord) -> Vec<(String, f64)> {
        let mut sample: Vec<(String, f64)> = self
            .numeric
            .iter()
            .map(|feature| (feature.column().to_string(), feature.value(flight)))
            .collect();
        sample.push((carrier_column(&flight.carrier), 1.0));
        sample
    }

    pub fn encode(&self, flight: &FlightRecord) -> Vec<f64> {
        self.reindex(&self.sample_for(flight))
    }

    pub fn frame(
        &self,
        flights: &[&FlightRecord],
        label: impl Fn(&FlightRecord) -> bool,
    ) -> FeatureFrame {
        FeatureFrame {
            rows: flights.iter().map(|flight| self.encode(flight)).collect(),
            labels: flights.iter().map(|flight| label(*flight)).collect(),
        }
    }
}
