use crate::error::{FlightError, Result};
use crate::shaper::DisplayTable;
use crate::{QueryTable, QueryText};
use serde_json::{json, Value};
use std::cmp::Ordering;

pub const TOP_DELAYED_CITIES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NonRelationalQuery {
    BusiestDay,
    HighestTotalDelays,
    CarrierDelayShare,
    DelayClassifier,
    CarrierDayOnTime,
}

pub struct AnalysisEntry {
    pub query: NonRelationalQuery,
    pub id: u8,
    pub title: &'static str,
}

pub static NON_RELATIONAL_QUERIES: [AnalysisEntry; 5] = [
    AnalysisEntry {
        query: NonRelationalQuery::BusiestDay,
        id: 1,
        title: "Get busiest travel day (Analysis)",
    },
    AnalysisEntry {
        query: NonRelationalQuery::HighestTotalDelays,
        id: 2,
        title: "Get airport with highest total delays (Analysis)",
    },
    AnalysisEntry {
        query: NonRelationalQuery::CarrierDelayShare,
        id: 3,
        title: "Get percentage of flights delayed by carrier (Analysis)",
    },
    AnalysisEntry {
        query: NonRelationalQuery::DelayClassifier,
        id: 4,
        title: "Predict probability of flight delay (Machine Learning)",
    },
    AnalysisEntry {
        query: NonRelationalQuery::CarrierDayOnTime,
        id: 5,
        title: "Predict on-time probability for a carrier and weekday (Machine Learning)",
    },
];

pub fn non_relational_entry(id_input: &str) -> Option<&'static AnalysisEntry> {
    let id = id_input.trim().parse::<u8>().ok()?;
    NON_RELATIONAL_QUERIES.iter().find(|entry| entry.id == id)
}

pub fn busiest_day_sql() -> QueryText {
    QueryText::fixed(
        "SELECT day_of_month, COUNT(*) AS total_flights
         FROM flights
         GROUP BY day_of_month
         ORDER BY day_of_month",
    )
}

pub fn total_delays_by_city_sql() -> QueryText {
    QueryText::fixed(
        "SELECT a.city, SUM(f.dep_delay + f.arr_delay) AS total_delay
         FROM flights f
         JOIN airports a ON f.origin_airport_id = a.airport_id
         GROUP BY a.city
         ORDER BY a.city",
    )
}

pub fn carrier_delay_counts_sql() -> QueryText {
    QueryText::fixed(
        "SELECT carrier,
            COUNT(*) AS total_flights,
            SUM(CASE WHEN dep_delay > 0 OR arr_delay > 0 THEN 1 ELSE 0 END) AS delayed_flights
         FROM flights
         GROUP BY carrier
         ORDER BY carrier",
    )
}

/// First day of month with the highest flight count.
pub fn busiest_day(table: &QueryTable) -> Result<String> {
    let day_idx = require_column(table, "day_of_month")?;
    let total_idx = require_column(table, "total_flights")?;

    let mut best: Option<(i64, i64)> = None;
    for row in &table.rows {
        let (Some(day), Some(total)) = (cell_i64(row, day_idx), cell_i64(row, total_idx)) else {
            continue;
        };
        if best.map_or(true, |(_, current)| total > current) {
            best = Some((day, total));
        }
    }
    let (day, total) =
        best.ok_or_else(|| FlightError::insufficient("no flights loaded to rank travel days"))?;
    Ok(format!("Busiest day: {} with {} flights", day, total))
}

pub fn highest_total_delays(table: &QueryTable) -> Result<DisplayTable> {
    let total_idx = require_column(table, "total_delay")?;
    let mut rows = table.rows.clone();
    rows.sort_by(|a, b| {
        match (cell_f64(a, total_idx), cell_f64(b, total_idx)) {
            (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    });
    rows.truncate(TOP_DELAYED_CITIES);
    Ok(DisplayTable::from_table(QueryTable {
        columns: table.columns.clone(),
        rows,
    }))
}

pub fn carrier_delay_share(table: &QueryTable) -> Result<DisplayTable> {
    let carrier_idx = require_column(table, "carrier")?;
    let total_idx = require_column(table, "total_flights")?;
    let delayed_idx = require_column(table, "delayed_flights")?;

    let rows = table
        .rows
        .iter()
        .map(|row| {
            let total = cell_i64(row, total_idx).unwrap_or(0);
            let delayed = cell_i64(row, delayed_idx).unwrap_or(0);
            let percentage = if total > 0 {
                json!(round2(delayed as f64 / total as f64 * 100.0))
            } else {
                Value::Null
            };
            vec![
                row.get(carrier_idx).cloned().unwrap_or(Value::Null),
                json!(total),
                json!(delayed),
                percentage,
            ]
        })
        .collect();

    Ok(DisplayTable::from_table(QueryTable {
        columns: vec![
            "carrier".to_string(),
            "total_flights".to_string(),
            "delayed_flights".to_string(),
            "delay_percentage".to_string(),
        ],
        rows,
    }))
}

pub(crate) fn require_column(table: &QueryTable, name: &str) -> Result<usize> {
    table
        .column_index(name)
        .ok_or_else(|| FlightError::ResultShape(format!("missing column '{}'", name)))
}

pub(crate) fn cell_i64(row: &[Value], idx: usize) -> Option<i64> {
    match row.get(idx)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn cell_f64(row: &[Value], idx: usize) -> Option<f64> {
    match row.get(idx)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
