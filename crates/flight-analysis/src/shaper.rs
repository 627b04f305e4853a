use crate::QueryTable;
use serde_json::{json, Value};
use std::fmt;

pub const FIELD_SEPARATOR: &str = " | ";

/// Display-ready rendering of a result set: header, dash rule, one line per row.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayTable {
    pub header: String,
    pub separator: String,
    pub lines: Vec<String>,
    table: QueryTable,
}

impl DisplayTable {
    pub fn from_table(table: QueryTable) -> Self {
        let header = table.columns.join(FIELD_SEPARATOR);
        let separator = "-".repeat(header.chars().count());
        let lines = table
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(render_cell)
                    .collect::<Vec<_>>()
                    .join(FIELD_SEPARATOR)
            })
            .collect();
        Self {
            header,
            separator,
            lines,
            table,
        }
    }

    pub fn row_count(&self) -> usize {
        self.lines.len()
    }

    pub fn to_json(&self) -> Value {
        let mut objects = Vec::with_capacity(self.table.rows.len());
        for row in &self.table.rows {
            let mut obj = serde_json::Map::new();
            for (idx, column) in self.table.columns.iter().enumerate() {
                obj.insert(column.clone(), row.get(idx).cloned().unwrap_or(Value::Null));
            }
            objects.push(Value::Object(obj));
        }
        json!({
            "columns": self.table.columns,
            "rows": objects,
            "row_count": self.table.rows.len()
        })
    }
}

impl fmt::Display for DisplayTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.header)?;
        writeln!(f, "{}", self.separator)?;
        for line in &self.lines {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

pub fn shape(columns: &[String], rows: &[Vec<Value>]) -> DisplayTable {
    DisplayTable::from_table(QueryTable {
        columns: columns.to_vec(),
        rows: rows.to_vec(),
    })
}

pub fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(v) => v.to_string(),
        Value::Number(v) => match (v.as_i64(), v.as_u64(), v.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (None, Some(u), _) => u.to_string(),
            (None, None, Some(f)) => format!("{:.2}", f),
            _ => v.to_string(),
        },
        Value::String(v) => v.clone(),
        Value::Array(_) | Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}
