use crate::error::{FlightError, Result};
use crate::QueryText;

pub struct TemplateEntry {
    pub id: u8,
    pub title: &'static str,
    pub needs_limit: bool,
    build: fn(Option<i64>) -> QueryText,
}

impl TemplateEntry {
    pub fn build(&self, limit: Option<i64>) -> QueryText {
        (self.build)(limit)
    }
}

pub static RELATIONAL_TEMPLATES: [TemplateEntry; 8] = [
    TemplateEntry {
        id: 1,
        title: "Get total number of flights",
        needs_limit: false,
        build: total_flights_sql,
    },
    TemplateEntry {
        id: 2,
        title: "Get total number of airports",
        needs_limit: false,
        build: total_airports_sql,
    },
    TemplateEntry {
        id: 3,
        title: "Get most common flight routes",
        needs_limit: true,
        build: top_routes_sql,
    },
    TemplateEntry {
        id: 4,
        title: "Get airports with most departures",
        needs_limit: true,
        build: busiest_origin_cities_sql,
    },
    TemplateEntry {
        id: 5,
        title: "Get airports with longest average departure delays",
        needs_limit: true,
        build: longest_departure_delays_sql,
    },
    TemplateEntry {
        id: 6,
        title: "Get carriers with longest delays",
        needs_limit: true,
        build: carrier_delays_sql,
    },
    TemplateEntry {
        id: 7,
        title: "Get most popular cities by destination",
        needs_limit: true,
        build: popular_destinations_sql,
    },
    TemplateEntry {
        id: 8,
        title: "Get carriers with best on-time performance",
        needs_limit: true,
        build: carrier_on_time_sql,
    },
];

pub fn relational_entry(id_input: &str) -> Option<&'static TemplateEntry> {
    let id = id_input.trim().parse::<u8>().ok()?;
    RELATIONAL_TEMPLATES.iter().find(|entry| entry.id == id)
}

/// Parses an interactively supplied result limit. Only plain positive integers pass.
pub fn parse_limit(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    trimmed.parse::<i64>().ok().filter(|limit| *limit > 0)
}

/// Builds the query for a relational identifier. `limit` is the raw user
/// input and is only consulted for identifiers that take one.
pub fn build_template(id_input: &str, limit: Option<&str>) -> Result<QueryText> {
    let entry = relational_entry(id_input).ok_or_else(|| {
        FlightError::invalid(format!("unknown relational query '{}'", id_input.trim()))
    })?;
    if !entry.needs_limit {
        return Ok(entry.build(None));
    }
    let raw = limit.ok_or_else(|| {
        FlightError::invalid(format!("query {} requires a result limit", entry.id))
    })?;
    let limit = parse_limit(raw).ok_or_else(|| {
        FlightError::invalid(format!(
            "result limit must be a positive integer, got '{}'",
            raw.trim()
        ))
    })?;
    Ok(entry.build(Some(limit)))
}

fn limited(sql: &str, limit: Option<i64>) -> QueryText {
    QueryText {
        sql: sql.to_string(),
        bindings: limit.into_iter().collect(),
    }
}

fn total_flights_sql(_limit: Option<i64>) -> QueryText {
    QueryText::fixed("SELECT COUNT(*) AS total_flights FROM flights")
}

fn total_airports_sql(_limit: Option<i64>) -> QueryText {
    QueryText::fixed("SELECT COUNT(*) AS total_airports FROM airports")
}

fn top_routes_sql(limit: Option<i64>) -> QueryText {
    limited(
        "SELECT
            a1.city AS origin_city,
            a2.city AS destination_city,
            COUNT(*) AS total_flights
         FROM flights f
         JOIN airports a1 ON f.origin_airport_id = a1.airport_id
         JOIN airports a2 ON f.dest_airport_id = a2.airport_id
         GROUP BY f.origin_airport_id, f.dest_airport_id
         ORDER BY total_flights DESC, origin_city, destination_city
         LIMIT ?1",
        limit,
    )
}

fn busiest_origin_cities_sql(limit: Option<i64>) -> QueryText {
    limited(
        "SELECT
            a.city AS airport_city,
            COUNT(*) AS total_departures
         FROM flights f
         JOIN airports a ON f.origin_airport_id = a.airport_id
         GROUP BY f.origin_airport_id
         ORDER BY total_departures DESC, airport_city
         LIMIT ?1",
        limit,
    )
}

fn longest_departure_delays_sql(limit: Option<i64>) -> QueryText {
    limited(
        "SELECT
            a.city AS airport_city,
            AVG(f.dep_delay) AS avg_departure_delay
         FROM flights f
         JOIN airports a ON f.origin_airport_id = a.airport_id
         WHERE f.dep_delay > 0
         GROUP BY f.origin_airport_id
         ORDER BY avg_departure_delay DESC, airport_city
         LIMIT ?1",
        limit,
    )
}

fn carrier_delays_sql(limit: Option<i64>) -> QueryText {
    limited(
        "SELECT
            f.carrier,
            AVG(f.dep_delay) AS avg_departure_delay,
            AVG(f.arr_delay) AS avg_arrival_delay
         FROM flights f
         WHERE f.dep_delay > 0 OR f.arr_delay > 0
         GROUP BY f.carrier
         ORDER BY avg_departure_delay DESC, avg_arrival_delay DESC, f.carrier
         LIMIT ?1",
        limit,
    )
}

fn popular_destinations_sql(limit: Option<i64>) -> QueryText {
    limited(
        "SELECT
            a.city AS destination_city,
            COUNT(*) AS total_flights
         FROM flights f
         JOIN airports a ON f.dest_airport_id = a.airport_id
         GROUP BY f.dest_airport_id
         ORDER BY total_flights DESC, destination_city
         LIMIT ?1",
        limit,
    )
}

// Percentage is computed in floating point and rounded to two places in SQL.
fn carrier_on_time_sql(limit: Option<i64>) -> QueryText {
    limited(
        "SELECT
            f.carrier,
            SUM(CASE WHEN f.dep_delay <= 0 AND f.arr_delay <= 0 THEN 1 ELSE 0 END) AS on_time_flights,
            COUNT(*) AS total_flights,
            ROUND(
                100.0 * SUM(CASE WHEN f.dep_delay <= 0 AND f.arr_delay <= 0 THEN 1 ELSE 0 END) / COUNT(*),
                2
            ) AS on_time_percentage
         FROM flights f
         GROUP BY f.carrier
         ORDER BY on_time_percentage DESC, f.carrier
         LIMIT ?1",
        limit,
    )
}
