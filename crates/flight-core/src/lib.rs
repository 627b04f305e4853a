use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

pub const AIRPORTS_TABLE: &str = "airports";
pub const FLIGHTS_TABLE: &str = "flights";

pub const AIRPORTS_FILE: &str = "airports.dat";
pub const FLIGHTS_FILE: &str = "flights.dat";

pub const DEFAULT_DATABASE_FILE: &str = "flight_data.sqlite";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    pub kind: ColumnKind,
    pub nullable: bool,
}

impl Column {
    const fn required(name: &'static str, kind: ColumnKind) -> Self {
        Self {
            name,
            kind,
            nullable: false,
        }
    }

    const fn optional(name: &'static str, kind: ColumnKind) -> Self {
        Self {
            name,
            kind,
            nullable: true,
        }
    }

    /// Checks one raw data-file field against the column's declared kind.
    pub fn check(&self, field: &str) -> std::result::Result<(), String> {
        if is_null_field(field) {
            return if self.nullable {
                Ok(())
            } else {
                Err(format!("{} must not be empty", self.name))
            };
        }
        match self.kind {
            ColumnKind::Text => Ok(()),
            ColumnKind::Integer => field
                .trim()
                .parse::<i64>()
                .map(|_| ())
                .map_err(|_| format!("{} must be an integer, got '{}'", self.name, field.trim())),
        }
    }
}

/// Blank fields and a literal `NULL` (any case) are stored as SQL NULL.
pub fn is_null_field(field: &str) -> bool {
    let trimmed = field.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSpec {
    pub name: &'static str,
    pub source_file: &'static str,
    pub columns: &'static [Column],
}

impl TableSpec {
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_list(&self) -> String {
        self.columns
            .iter()
            .map(|column| column.name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Validates a full row: field count first, then each field by column.
    pub fn check_row(&self, fields: &[String]) -> std::result::Result<(), String> {
        if fields.len() != self.column_count() {
            return Err(format!(
                "expected {} fields, found {}",
                self.column_count(),
                fields.len()
            ));
        }
        self.columns
            .iter()
            .zip(fields)
            .try_for_each(|(column, field)| column.check(field))
    }
}

pub const AIRPORTS: TableSpec = TableSpec {
    name: AIRPORTS_TABLE,
    source_file: AIRPORTS_FILE,
    columns: &[
        Column::required("airport_id", ColumnKind::Integer),
        Column::required("city", ColumnKind::Text),
        Column::optional("state_abbreviation", ColumnKind::Text),
        Column::optional("airport", ColumnKind::Text),
    ],
};

pub const FLIGHTS: TableSpec = TableSpec {
    name: FLIGHTS_TABLE,
    source_file: FLIGHTS_FILE,
    columns: &[
        Column::required("day_of_month", ColumnKind::Integer),
        Column::required("day_of_week", ColumnKind::Integer),
        Column::required("carrier", ColumnKind::Text),
        Column::required("origin_airport_id", ColumnKind::Integer),
        Column::required("dest_airport_id", ColumnKind::Integer),
        Column::optional("dep_delay", ColumnKind::Integer),
        Column::optional("arr_delay", ColumnKind::Integer),
    ],
};

/// Tables in foreign-key order: referenced tables first.
pub const LOAD_ORDER: [TableSpec; 2] = [AIRPORTS, FLIGHTS];

/// Reverse of [`LOAD_ORDER`]; referencing tables are emptied first.
pub const TRUNCATE_ORDER: [TableSpec; 2] = [FLIGHTS, AIRPORTS];


#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightRecord {
    pub day_of_month: i64,
    pub day_of_week: i64,
    pub carrier: String,
    pub origin_airport_id: i64,
    pub dest_airport_id: i64,
    pub dep_delay: Option<i64>,
    pub arr_delay: Option<i64>,
}

impl FlightRecord {
    pub fn departed_late(&self) -> bool {
        self.dep_delay.is_some_and(|delay| delay > 0)
    }

    pub fn departed_on_time(&self) -> bool {
        self.dep_delay.is_some_and(|delay| delay <= 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Self::Monday,
        Self::Tuesday,
        Self::Wednesday,
        Self::Thursday,
        Self::Friday,
        Self::Saturday,
        Self::Sunday,
    ];

    /// Fallback used when a day-of-week input cannot be resolved.
    pub const DEFAULT: Weekday = Weekday::Wednesday;

    pub fn from_number(number: i64) -> Option<Self> {
        match number {
            1..=7 => Some(Self::ALL[(number - 1) as usize]),
            _ => None,
        }
    }

    pub fn number(self) -> i64 {
        match self {
            Self::Monday => 1,
            Self::Tuesday => 2,
            Self::Wednesday => 3,
            Self::Thursday => 4,
            Self::Friday => 5,
            Self::Saturday => 6,
            Self::Sunday => 7,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monday => "Monday",
            Self::Tuesday => "Tuesday",
            Self::Wednesday => "Wednesday",
            Self::Thursday => "Thursday",
            Self::Friday => "Friday",
            Self::Saturday => "Saturday",
            Self::Sunday => "Sunday",
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub const DEFAULT_CARRIER: &str = "AA";

const CARRIER_NAMES: &[(&str, &str)] = &[
    ("9E", "Endeavor Air"),
    ("AA", "American Airlines"),
    ("AS", "Alaska Airlines"),
    ("B6", "JetBlue Airways"),
    ("DL", "Delta Air Lines"),
    ("EV", "ExpressJet Airlines"),
    ("F9", "Frontier Airlines"),
    ("G4", "Allegiant Air"),
    ("HA", "Hawaiian Airlines"),
    ("MQ", "Envoy Air"),
    ("NK", "Spirit Airlines"),
    ("OH", "PSA Airlines"),
    ("OO", "SkyWest Airlines"),
    ("UA", "United Airlines"),
    ("WN", "Southwest Airlines"),
    ("YV", "Mesa Airlines"),
    ("YX", "Republic Airways"),
];

pub fn carrier_name(code: &str) -> Option<&'static str> {
    let code = code.trim();
    CARRIER_NAMES
        .iter()
        .find(|(known, _)| known.eq_ignore_ascii_case(code))
        .map(|(_, name)| *name)
}

pub fn normalize_carrier_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)?;
    Ok(())
}
