use crate::error::{FlightError, Result};
use crate::{QueryTable, QueryText};
use flight_core::{ensure_dir, is_null_field, TableSpec, LOAD_ORDER};
use include_dir::{include_dir, Dir};
use rusqlite::types::ValueRef;
use rusqlite::{params_from_iter, Connection};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};

static SCHEMA_SQL: Dir<'_> = include_dir!("$CARGO_MANIFEST_DIR/sql");

/// Storage seam consumed by the dispatch engine and the bulk loader.
///
/// Implementations are used by a single caller at a time; every method is
/// one round trip to the underlying store.
pub trait StorageGateway {
    fn execute(&self, query: &QueryText) -> Result<QueryTable>;
    fn bulk_load(&self, table: &TableSpec, rows: &[Vec<String>]) -> Result<usize>;
    fn truncate(&self, tables: &[TableSpec]) -> Result<()>;
    /// Empties every listed table and loads its rows as one atomic unit.
    /// Returns the loaded row count per table, in input order.
    fn replace_all(&self, tables: &[(TableSpec, Vec<Vec<String>>)]) -> Result<Vec<usize>>;
}

pub struct SqliteGateway {
    conn: Connection,
    location: String,
}

impl SqliteGateway {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_dir(parent).map_err(|err| {
                FlightError::Config(format!(
                    "failed to create database directory {}: {}",
                    parent.display(),
                    err
                ))
            })?;
        }
        let conn = Connection::open(path)?;
        let gateway = Self {
            conn,
            location: path.display().to_string(),
        };
        gateway.initialize()?;
        Ok(gateway)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let gateway = Self {
            conn,
            location: ":memory:".to_string(),
        };
        gateway.initialize()?;
        Ok(gateway)
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    fn initialize(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        for spec in LOAD_ORDER {
            let sql = load_table_ddl(&spec)?;
            self.conn.execute_batch(sql)?;
        }
        info!(location = %self.location, "storage schema ready");
        Ok(())
    }
}

impl StorageGateway for SqliteGateway {
    fn execute(&self, query: &QueryText) -> Result<QueryTable> {
        debug!(sql = %query.sql, bindings = ?query.bindings, "executing query");
        let mut stmt = self.conn.prepare(&query.sql)?;
        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let column_count = columns.len();
        let mut rows = stmt.query(params_from_iter(query.bindings.iter()))?;

        let mut out_rows: Vec<Vec<Value>> = Vec::new();
        while let Some(row) = rows.next()? {
            let mut out = Vec::with_capacity(column_count);
            for idx in 0..column_count {
                out.push(sql_value_to_json(row.get_ref(idx)?));
            }
            out_rows.push(out);
        }
        Ok(QueryTable {
            columns,
            rows: out_rows,
        })
    }

    fn bulk_load(&self, table: &TableSpec, rows: &[Vec<String>]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let loaded = insert_rows(&tx, table, rows)?;
        tx.commit()?;
        info!(table = table.name, rows = loaded, "bulk load committed");
        Ok(loaded)
    }

    fn truncate(&self, tables: &[TableSpec]) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = OFF;")?;
        let outcome = delete_all(&self.conn, tables.iter());
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        outcome
    }

    fn replace_all(&self, tables: &[(TableSpec, Vec<Vec<String>>)]) -> Result<Vec<usize>> {
        // foreign_keys cannot be toggled inside a transaction.
        self.conn.execute_batch("PRAGMA foreign_keys = OFF;")?;
        let outcome = self.replace_in_transaction(tables);
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        outcome
    }
}

impl SqliteGateway {
    fn replace_in_transaction(
        &self,
        tables: &[(TableSpec, Vec<Vec<String>>)],
    ) -> Result<Vec<usize>> {
        let tx = self.conn.unchecked_transaction()?;
        delete_all(&tx, tables.iter().map(|(table, _)| table))?;
        let mut loaded = Vec::with_capacity(tables.len());
        for (table, rows) in tables {
            loaded.push(insert_rows(&tx, table, rows)?);
        }
        if let Some(violation) = first_foreign_key_violation(&tx)? {
            return Err(FlightError::Integrity(violation));
        }
        tx.commit()?;
        info!(tables = tables.len(), "dataset replaced");
        Ok(loaded)
    }
}

fn insert_rows(conn: &Connection, table: &TableSpec, rows: &[Vec<String>]) -> Result<usize> {
    let placeholders = (1..=table.column_count())
        .map(|idx| format!("?{}", idx))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_identifier(table.name),
        table.column_list(),
        placeholders
    );
    let mut stmt = conn.prepare(&sql)?;
    for (idx, row) in rows.iter().enumerate() {
        table
            .check_row(row)
            .map_err(|reason| FlightError::MalformedRow {
                file: table.source_file.to_string(),
                line: idx as u64 + 1,
                reason,
            })?;
        let values = row
            .iter()
            .map(|field| (!is_null_field(field)).then(|| field.trim()));
        stmt.execute(params_from_iter(values))?;
    }
    Ok(rows.len())
}

fn delete_all<'a>(conn: &Connection, tables: impl Iterator<Item = &'a TableSpec>) -> Result<()> {
    for table in tables {
        let removed = conn.execute(&format!("DELETE FROM {}", quote_identifier(table.name)), [])?;
        debug!(table = table.name, removed, "table truncated");
    }
    Ok(())
}

fn first_foreign_key_violation(conn: &Connection) -> Result<Option<String>> {
    let mut stmt = conn.prepare("PRAGMA foreign_key_check")?;
    let mut rows = stmt.query([])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };
    let table: String = row.get(0)?;
    let rowid: Option<i64> = row.get(1)?;
    let parent: String = row.get(2)?;
    Ok(Some(format!(
        "{} row {} references a missing {} entry",
        table,
        rowid.map_or_else(|| "?".to_string(), |id| id.to_string()),
        parent
    )))
}

fn load_table_ddl(spec: &TableSpec) -> Result<&'static str> {
    let file_name = format!("{}.sql", spec.name);
    let file = SCHEMA_SQL.get_file(&file_name).ok_or_else(|| {
        FlightError::Config(format!("missing embedded schema file: {}", file_name))
    })?;
    file.contents_utf8()
        .ok_or_else(|| FlightError::Config(format!("schema file is not valid UTF-8: {}", file_name)))
}

fn sql_value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::from(v),
        ValueRef::Real(v) => serde_json::Number::from_f64(v)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::String(format!("<blob {} bytes>", bytes.len())),
    }
}

pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flight_core::{AIRPORTS, FLIGHTS, TRUNCATE_ORDER};
    use serde_json::json;

    fn row(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    fn count(gateway: &SqliteGateway, table: &str) -> i64 {
        let table = gateway
            .execute(&QueryText::fixed(format!("SELECT COUNT(*) AS n FROM {}", table)))
            .expect("count query");
        table.rows[0][0].as_i64().expect("integer count")
    }

    #[test]
    fn bulk_load_coerces_numeric_text_and_nulls_blank_fields() {
        let gateway = SqliteGateway::open_in_memory().expect("open gateway");
        gateway
            .bulk_load(&AIRPORTS, &[row(&["10", "Boston, MA", "MA", "Logan"])])
            .expect("load airports");
        gateway
            .bulk_load(&FLIGHTS, &[row(&["1", "3", "AA", "10", "10", "-4", ""])])
            .expect("load flights");

        let table = gateway
            .execute(&QueryText::fixed(
                "SELECT carrier, dep_delay, arr_delay FROM flights",
            ))
            .expect("select flights");
        assert_eq!(table.columns, vec!["carrier", "dep_delay", "arr_delay"]);
        assert_eq!(table.rows, vec![vec![json!("AA"), json!(-4), Value::Null]]);
    }

    #[test]
    fn bulk_load_rejects_rows_with_wrong_field_count() {
        let gateway = SqliteGateway::open_in_memory().expect("open gateway");
        let err = gateway
            .bulk_load(&AIRPORTS, &[row(&["10", "Boston"])])
            .expect_err("short row should fail");
        assert!(err.to_string().contains("expected 4 fields"));
        assert_eq!(count(&gateway, "airports"), 0);
    }

    #[test]
    fn truncate_clears_referencing_tables_and_restores_foreign_keys() {
        let gateway = SqliteGateway::open_in_memory().expect("open gateway");
        gateway
            .bulk_load(&AIRPORTS, &[row(&["10", "Boston", "MA", "Logan"])])
            .expect("load airports");
        gateway
            .bulk_load(&FLIGHTS, &[row(&["1", "3", "AA", "10", "10", "5", "7"])])
            .expect("load flights");

        gateway.truncate(&TRUNCATE_ORDER).expect("truncate");
        assert_eq!(count(&gateway, "flights"), 0);
        assert_eq!(count(&gateway, "airports"), 0);

        let err = gateway
            .bulk_load(&FLIGHTS, &[row(&["1", "3", "AA", "99", "99", "5", "7"])])
            .expect_err("foreign keys should be enforced again");
        assert!(matches!(err, FlightError::Storage(_)));
    }

    #[test]
    fn bulk_load_rejects_text_in_integer_column() {
        let gateway = SqliteGateway::open_in_memory().expect("open gateway");
        gateway
            .bulk_load(&AIRPORTS, &[row(&["10", "Boston", "MA", "Logan"])])
            .expect("load airports");
        let err = gateway
            .bulk_load(&FLIGHTS, &[row(&["1", "Mon", "AA", "10", "10", "5", "7"])])
            .expect_err("weekday name should fail");
        assert!(matches!(err, FlightError::MalformedRow { line: 1, .. }));
        assert_eq!(count(&gateway, "flights"), 0);
    }

    #[test]
    fn replace_all_rolls_back_on_dangling_airport_reference() {
        let gateway = SqliteGateway::open_in_memory().expect("open gateway");
        let airports = vec![
            row(&["10", "Boston", "MA", "Logan"]),
            row(&["11", "Denver", "CO", "DEN"]),
        ];
        let loaded = gateway
            .replace_all(&[
                (AIRPORTS, airports.clone()),
                (FLIGHTS, vec![row(&["1", "3", "AA", "10", "11", "5", "7"])]),
            ])
            .expect("initial replace");
        assert_eq!(loaded, vec![2, 1]);

        let err = gateway
            .replace_all(&[
                (AIRPORTS, airports),
                (
                    FLIGHTS,
                    vec![
                        row(&["1", "3", "AA", "10", "11", "5", "7"]),
                        row(&["2", "3", "DL", "1", "999", "5", "5"]),
                    ],
                ),
            ])
            .expect_err("dangling reference");
        assert!(matches!(err, FlightError::Integrity(_)));
        assert_eq!(count(&gateway, "airports"), 2);
        assert_eq!(count(&gateway, "flights"), 1);

        let err = gateway
            .bulk_load(&FLIGHTS, &[row(&["1", "3", "AA", "99", "99", "5", "7"])])
            .expect_err("foreign keys should be enforced again");
        assert!(matches!(err, FlightError::Storage(_)));
    }

    #[test]
    fn execute_binds_parameters_instead_of_interpolating() {
        let gateway = SqliteGateway::open_in_memory().expect("open gateway");
        gateway
            .bulk_load(
                &AIRPORTS,
                &[
                    row(&["10", "Boston", "MA", "Logan"]),
                    row(&["11", "Denver", "CO", "DEN"]),
                ],
            )
            .expect("load airports");
        let query = QueryText {
            sql: "SELECT city FROM airports ORDER BY city LIMIT ?1".to_string(),
            bindings: vec![1],
        };
        let table = gateway.execute(&query).expect("limited select");
        assert_eq!(table.rows, vec![vec![json!("Boston")]]);
    }

    #[test]
    fn open_creates_database_file_and_parent_directory() {
        let root = std::env::temp_dir().join(format!(
            "flightq_gateway_{}_{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos())
                .unwrap_or(0)
        ));
        let db_path = root.join("nested").join("flights.sqlite");
        let gateway = SqliteGateway::open(&db_path).expect("open file gateway");
        assert!(db_path.exists());
        assert_eq!(gateway.location(), db_path.display().to_string());
        drop(gateway);
        let _ = std::fs::remove_dir_all(root);
    }
}
