use crate::error::{FlightError, Result};
use crate::gateway::StorageGateway;
use flight_core::{TableSpec, AIRPORTS, FLIGHTS, LOAD_ORDER};
use serde::Serialize;
use std::fs::File;
use std::io;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub airports: usize,
    pub flights: usize,
}

/// Reads one headerless, comma-delimited data file whose fields follow the
/// table's column order.
pub fn read_data_file(path: &Path, spec: &TableSpec) -> Result<Vec<Vec<String>>> {
    let file = File::open(path).map_err(|err| {
        FlightError::Io(io::Error::new(
            err.kind(),
            format!("cannot open {}: {}", path.display(), err),
        ))
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let line = record.position().map_or(rows.len() as u64 + 1, |pos| pos.line());
        if record.len() == 1 && record.get(0).map_or(true, str::is_empty) {
            continue;
        }
        let fields: Vec<String> = record.iter().map(str::to_string).collect();
        spec.check_row(&fields)
            .map_err(|reason| FlightError::MalformedRow {
                file: path.display().to_string(),
                line,
                reason,
            })?;
        rows.push(fields);
    }
    Ok(rows)
}

/// Replaces the contents of both tables with the data files in `data_dir`.
///
/// Both files are parsed and validated before anything is touched, and the
/// replacement itself is a single transaction, so a failed reload leaves the
/// stored data untouched.
pub fn load_dataset<G: StorageGateway + ?Sized>(
    gateway: &G,
    data_dir: &Path,
) -> Result<LoadSummary> {
    let mut parsed = Vec::with_capacity(LOAD_ORDER.len());
    for spec in LOAD_ORDER {
        let path = data_dir.join(spec.source_file);
        let rows = read_data_file(&path, &spec)?;
        info!(file = %path.display(), rows = rows.len(), "data file parsed");
        parsed.push((spec, rows));
    }

    let loaded = gateway.replace_all(&parsed)?;

    let mut summary = LoadSummary {
        airports: 0,
        flights: 0,
    };
    for ((spec, _), count) in parsed.iter().zip(loaded) {
        if spec.name == AIRPORTS.name {
            summary.airports = count;
        } else if spec.name == FLIGHTS.name {
            summary.flights = count;
        }
    }
    info!(
        airports = summary.airports,
        flights = summary.flights,
        "dataset loaded"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::SqliteGateway;
    use crate::QueryText;
    use flight_core::{AIRPORTS_FILE, FLIGHTS_FILE};
    use std::fs;
    use std::path::PathBuf;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir(label: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!(
            "flightq_loader_{}_{}_{}",
            label,
            std::process::id(),
            nanos
        ));
        fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    fn write_fixture(dir: &Path, airports: &str, flights: &str) {
        fs::write(dir.join(AIRPORTS_FILE), airports).expect("write airports");
        fs::write(dir.join(FLIGHTS_FILE), flights).expect("write flights");
    }

    fn count(gateway: &SqliteGateway, table: &str) -> i64 {
        let result = gateway
            .execute(&QueryText::fixed(format!("SELECT COUNT(*) FROM {}", table)))
            .expect("count");
        result.rows[0][0].as_i64().expect("integer")
    }

    const AIRPORTS_DATA: &str = "10397,\"Atlanta, GA\",GA,Hartsfield-Jackson Atlanta International\n\
12478,\"New York, NY\",NY,John F. Kennedy International\n";
    const FLIGHTS_DATA: &str = "1,3,DL,10397,12478,-4,-10\n2,4,AA,12478,10397,22,,\n";

    #[test]
    fn loads_quoted_fields_and_reports_counts() {
        let dir = temp_dir("counts");
        write_fixture(&dir, AIRPORTS_DATA, "1,3,DL,10397,12478,-4,-10\n2,4,AA,12478,10397,22,\n");
        let gateway = SqliteGateway::open_in_memory().expect("gateway");

        let summary = load_dataset(&gateway, &dir).expect("load");
        assert_eq!(
            summary,
            LoadSummary {
                airports: 2,
                flights: 2
            }
        );
        let cities = gateway
            .execute(&QueryText::fixed("SELECT city FROM airports ORDER BY airport_id"))
            .expect("cities");
        assert_eq!(cities.rows[0][0], "Atlanta, GA");
        let nulls = gateway
            .execute(&QueryText::fixed(
                "SELECT COUNT(*) FROM flights WHERE arr_delay IS NULL",
            ))
            .expect("nulls");
        assert_eq!(nulls.rows[0][0].as_i64(), Some(1));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn reloading_replaces_rather_than_appends() {
        let dir = temp_dir("reload");
        write_fixture(&dir, AIRPORTS_DATA, "1,3,DL,10397,12478,-4,-10\n");
        let gateway = SqliteGateway::open_in_memory().expect("gateway");
        load_dataset(&gateway, &dir).expect("first load");
        load_dataset(&gateway, &dir).expect("second load");
        assert_eq!(count(&gateway, "airports"), 2);
        assert_eq!(count(&gateway, "flights"), 1);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn malformed_row_reports_line_and_keeps_existing_data() {
        let dir = temp_dir("malformed");
        write_fixture(&dir, AIRPORTS_DATA, "1,3,DL,10397,12478,-4,-10\n");
        let gateway = SqliteGateway::open_in_memory().expect("gateway");
        load_dataset(&gateway, &dir).expect("good load");

        write_fixture(&dir, AIRPORTS_DATA, FLIGHTS_DATA);
        let err = load_dataset(&gateway, &dir).expect_err("extra field");
        match err {
            FlightError::MalformedRow { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(count(&gateway, "flights"), 1);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn text_in_integer_column_is_rejected_with_its_line() {
        let dir = temp_dir("kinds");
        write_fixture(
            &dir,
            AIRPORTS_DATA,
            "1,3,DL,10397,12478,-4,-10\n2,4,AA,12478,10397,22,5\n3,Mon,WN,10397,12478,1,1\n",
        );
        let gateway = SqliteGateway::open_in_memory().expect("gateway");
        let err = load_dataset(&gateway, &dir).expect_err("weekday name in integer column");
        match err {
            FlightError::MalformedRow { line, reason, .. } => {
                assert_eq!(line, 3);
                assert!(reason.contains("day_of_week"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(count(&gateway, "flights"), 0);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn reload_with_unknown_airport_keeps_previous_dataset() {
        let dir = temp_dir("fk");
        write_fixture(
            &dir,
            AIRPORTS_DATA,
            "1,3,DL,10397,12478,-4,-10\n2,4,AA,12478,10397,22,5\n",
        );
        let gateway = SqliteGateway::open_in_memory().expect("gateway");
        load_dataset(&gateway, &dir).expect("good load");

        write_fixture(
            &dir,
            AIRPORTS_DATA,
            "1,3,DL,10397,12478,-4,-10\n2,3,DL,1,999,5,5\n",
        );
        let err = load_dataset(&gateway, &dir).expect_err("unknown airport ids");
        assert!(err.to_string().contains("flights"), "{err}");
        assert_eq!(count(&gateway, "airports"), 2);
        assert_eq!(count(&gateway, "flights"), 2);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = temp_dir("missing");
        fs::write(dir.join(AIRPORTS_FILE), AIRPORTS_DATA).expect("write airports");
        let gateway = SqliteGateway::open_in_memory().expect("gateway");
        let err = load_dataset(&gateway, &dir).expect_err("no flights file");
        assert!(matches!(err, FlightError::Io(ref source) if source.kind() == io::ErrorKind::NotFound));
        assert!(err.to_string().contains(FLIGHTS_FILE));
        let _ = fs::remove_dir_all(&dir);
    }
}
