use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use flight_analysis::dispatch::Parameter;
use flight_analysis::{
    load_dataset, AppConfig, DispatchEngine, DispatchOutcome, ParameterSource, QueryClass,
    ScriptedParameters, SqliteGateway, StorageGateway,
};
use flight_core::Weekday;
use serde_json::{json, Value};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "flightq",
    version = "0.3.0",
    about = "Flight and airport dataset query console"
)]
struct Cli {
    /// YAML config file.
    #[arg(long, global = true, env = "FLIGHTQ_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long, global = true, env = "FLIGHTQ_DATABASE")]
    database: Option<PathBuf>,
    /// Directory holding airports.dat and flights.dat.
    #[arg(long, global = true, env = "FLIGHTQ_DATA_DIR")]
    data_dir: Option<PathBuf>,
    #[arg(long, global = true)]
    seed: Option<u64>,
    /// Used when RUST_LOG is unset.
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ClassArg {
    Relational,
    NonRelational,
}

impl From<ClassArg> for QueryClass {
    fn from(value: ClassArg) -> Self {
        match value {
            ClassArg::Relational => QueryClass::Relational,
            ClassArg::NonRelational => QueryClass::NonRelational,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive menu (default).
    Shell,
    /// Truncate and reload both tables from the data directory.
    Load {
        #[arg(long)]
        json: bool,
    },
    /// Run one query without the menu.
    Query {
        #[arg(long, value_enum)]
        class: ClassArg,
        #[arg(long)]
        id: String,
        #[arg(long)]
        limit: Option<String>,
        #[arg(long)]
        carrier: Option<String>,
        #[arg(long)]
        day: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// List the available queries.
    Catalog {
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let mut cli = Cli::parse();
    init_tracing(&cli.log_level);
    let command = cli.command.take().unwrap_or(Commands::Shell);
    let json_mode = command_json_mode(&command);
    let result = resolve_config(&cli).and_then(|config| run_command(command, &config));
    match result {
        Ok(Some(payload)) => {
            emit_json(&payload);
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(err) => {
            if json_mode {
                emit_json(&json_error("command_failed", format!("{:#}", err), json!({})));
                std::process::exit(1);
            }
            Err(err)
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config =
        AppConfig::load_or_default(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(database) = &cli.database {
        config.database = database.clone();
    }
    if let Some(data_dir) = &cli.data_dir {
        config.data_dir = data_dir.clone();
    }
    if let Some(seed) = cli.seed {
        config.pipeline.seed = seed;
    }
    Ok(config)
}

fn open_gateway(config: &AppConfig) -> Result<SqliteGateway> {
    let gateway = SqliteGateway::open(&config.database)
        .with_context(|| format!("failed to open database {}", config.database.display()))?;
    info!(database = gateway.location(), "database opened");
    Ok(gateway)
}

fn run_command(command: Commands, config: &AppConfig) -> Result<Option<Value>> {
    match command {
        Commands::Catalog { json } => {
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "catalog",
                    "relational": QueryClass::Relational.catalog(),
                    "non_relational": QueryClass::NonRelational.catalog()
                })));
            }
            let mut out = io::stdout().lock();
            for class in QueryClass::ALL {
                print_catalog(&mut out, class)?;
            }
        }
        Commands::Shell => {
            let gateway = open_gateway(config)?;
            let stdin = io::stdin();
            let mut input = stdin.lock();
            let mut out = io::stdout().lock();
            run_shell(&gateway, config, &mut input, &mut out)?;
        }
        Commands::Load { json } => {
            let gateway = open_gateway(config)?;
            let summary = load_dataset(&gateway, &config.data_dir).with_context(|| {
                format!("failed to load dataset from {}", config.data_dir.display())
            })?;
            if json {
                return Ok(Some(json!({
                    "ok": true,
                    "command": "load",
                    "database": gateway.location(),
                    "summary": summary
                })));
            }
            println!("database: {}", gateway.location());
            println!("airports: {}", summary.airports);
            println!("flights: {}", summary.flights);
        }
        Commands::Query {
            class,
            id,
            limit,
            carrier,
            day,
            json,
        } => {
            let gateway = open_gateway(config)?;
            let engine = DispatchEngine::new(&gateway, config.pipeline.clone());
            let mut params = ScriptedParameters::new();
            params.set(Parameter::Limit, limit);
            params.set(Parameter::Carrier, carrier);
            params.set(Parameter::Day, day);
            let outcome = engine.dispatch_class(class.into(), &id, &mut params);
            if json {
                return Ok(Some(outcome.to_json()));
            }
            let mut out = io::stdout().lock();
            render_outcome(&mut out, &outcome)?;
            match outcome {
                DispatchOutcome::Invalid(reason)
                | DispatchOutcome::InsufficientData(reason)
                | DispatchOutcome::Failed(reason) => bail!(reason),
                _ => {}
            }
        }
    }
    Ok(None)
}

/// Menu loop. Returns on Exit or when input is exhausted; only output
/// failures end it early.
fn run_shell<G, R, W>(gateway: &G, config: &AppConfig, input: &mut R, out: &mut W) -> Result<()>
where
    G: StorageGateway + ?Sized,
    R: BufRead,
    W: Write,
{
    let engine = DispatchEngine::new(gateway, config.pipeline.clone());
    writeln!(out, "Welcome to the Query Application!")?;
    loop {
        print_menu(out)?;
        let Some(choice) = prompt(input, out, "\nSelect an option: ")? else {
            writeln!(out)?;
            break;
        };
        match choice.trim() {
            "3" => match load_dataset(gateway, &config.data_dir) {
                Ok(summary) => writeln!(
                    out,
                    "Dataset loaded: {} airports, {} flights.",
                    summary.airports, summary.flights
                )?,
                Err(err) => {
                    error!(error = %err, "dataset load failed");
                    writeln!(out, "Failed to load dataset: {}", err)?;
                }
            },
            "4" => {
                writeln!(out, "\nExiting program.")?;
                break;
            }
            selection => {
                let Ok(class) = QueryClass::parse(selection) else {
                    writeln!(out, "Invalid input detected.")?;
                    continue;
                };
                print_catalog(out, class)?;
                let Some(id) = prompt(input, out, "\nChoose a query to execute: ")? else {
                    writeln!(out)?;
                    break;
                };
                let outcome = {
                    let mut params = ConsoleParameters {
                        input: &mut *input,
                        out: &mut *out,
                    };
                    engine.dispatch_class(class, &id, &mut params)
                };
                render_outcome(out, &outcome)?;
            }
        }
    }
    Ok(())
}

struct ConsoleParameters<'a, R, W> {
    input: &'a mut R,
    out: &'a mut W,
}

impl<R: BufRead, W: Write> ParameterSource for ConsoleParameters<'_, R, W> {
    fn request(&mut self, parameter: Parameter) -> Option<String> {
        match prompt(&mut *self.input, &mut *self.out, parameter.prompt()) {
            Ok(answer) => answer,
            Err(err) => {
                error!(error = %err, "failed to read parameter");
                None
            }
        }
    }
}

fn prompt<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    text: &str,
) -> io::Result<Option<String>> {
    write!(out, "{}", text)?;
    out.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

fn print_menu<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "\nApplication Options:")?;
    writeln!(out, "1. Relational Queries")?;
    writeln!(out, "2. Non-Relational Queries")?;
    writeln!(out, "3. Load/Reload Dataset")?;
    writeln!(out, "4. Exit")
}

fn print_catalog<W: Write>(out: &mut W, class: QueryClass) -> io::Result<()> {
    writeln!(out, "\nAvailable {} Queries:", class.label())?;
    for entry in class.catalog() {
        writeln!(out, "{}. {}", entry.id, entry.title)?;
    }
    Ok(())
}

fn render_outcome<W: Write>(out: &mut W, outcome: &DispatchOutcome) -> io::Result<()> {
    match outcome {
        DispatchOutcome::Table(table) => {
            writeln!(out, "\nQuery Result:")?;
            write!(out, "{}", table)
        }
        DispatchOutcome::Text(text) => writeln!(out, "{}", text),
        DispatchOutcome::Report(report) => writeln!(out, "\n{}", report),
        DispatchOutcome::Estimate(estimate) => {
            if estimate.day_defaulted {
                writeln!(
                    out,
                    "Invalid input for day. Automatically setting default day as {}.",
                    Weekday::DEFAULT
                )?;
            }
            writeln!(out, "{}", estimate)
        }
        DispatchOutcome::Invalid(_) => writeln!(out, "Invalid input detected."),
        DispatchOutcome::InsufficientData(reason) => {
            writeln!(out, "Not enough data to answer this query: {}", reason)
        }
        DispatchOutcome::Failed(_) => writeln!(out, "Query failed; nothing to display."),
    }
}

fn command_json_mode(command: &Commands) -> bool {
    match command {
        Commands::Load { json } | Commands::Query { json, .. } | Commands::Catalog { json } => {
            *json
        }
        Commands::Shell => false,
    }
}

fn emit_json(value: &Value) {
    match serde_json::to_string(value) {
        Ok(s) => println!("{}", s),
        Err(_) => println!(
            "{{\"ok\":false,\"error\":{{\"code\":\"serialization_error\",\"message\":\"failed to serialize JSON payload\",\"details\":{{}}}}}}"
        ),
    }
}

fn json_error(code: &str, message: String, details: Value) -> Value {
    json!({
        "ok": false,
        "error": {
            "code": code,
            "message": message,
            "details": details
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Cursor;
    use std::path::Path;

    fn fixture_config() -> AppConfig {
        AppConfig {
            data_dir: Path::new(env!("CARGO_MANIFEST_DIR"))
                .join("..")
                .join("flight-analysis")
                .join("tests")
                .join("fixtures"),
            ..AppConfig::default()
        }
    }

    fn drive(script: &str) -> String {
        let gateway = SqliteGateway::open_in_memory().expect("in-memory store");
        let mut input = Cursor::new(script.as_bytes().to_vec());
        let mut out = Vec::new();
        run_shell(&gateway, &fixture_config(), &mut input, &mut out).expect("shell run");
        String::from_utf8(out).expect("utf8 output")
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn query_subcommand_parses_all_parameters() {
        let cli = Cli::try_parse_from([
            "flightq",
            "--seed",
            "7",
            "query",
            "--class",
            "non-relational",
            "--id",
            "5",
            "--carrier",
            "DL",
            "--day",
            "2",
            "--json",
        ])
        .expect("parse");
        assert_eq!(cli.seed, Some(7));
        let Some(Commands::Query {
            class,
            id,
            carrier,
            json,
            ..
        }) = cli.command
        else {
            panic!("expected query command");
        };
        assert!(matches!(class, ClassArg::NonRelational));
        assert_eq!(id, "5");
        assert_eq!(carrier.as_deref(), Some("DL"));
        assert!(json);
    }

    #[test]
    fn shell_loads_then_answers_a_limited_query() {
        let output = drive("3\n1\n4\n1\n4\n");
        assert!(output.starts_with("Welcome to the Query Application!\n"));
        assert!(output.contains("Dataset loaded: 10 airports, 100 flights."));
        assert!(output.contains("Available Relational Queries:\n1. Get total number of flights\n"));
        assert!(output.contains(
            "Query Result:\nairport_city | total_departures\n-------------------------------\nAtlanta, GA | 22\n"
        ));
        assert!(output.ends_with("\nExiting program.\n"));
    }

    #[test]
    fn invalid_selections_loop_back_to_the_menu() {
        let output = drive("7\n1\n12\n1\n4\nzero\n");
        assert_eq!(output.matches("Invalid input detected.").count(), 3);
        assert_eq!(output.matches("Application Options:").count(), 4);
        assert!(!output.contains("Query Result:"));
    }

    #[test]
    fn estimate_with_bad_day_reports_the_default() {
        let output = drive("3\n2\n5\nAA\n9\n4\n");
        assert!(output.contains("Available Non-Relational Queries:"));
        assert!(output
            .contains("Invalid input for day. Automatically setting default day as Wednesday."));
        assert!(output.contains("Likelihood of being on-time: "));
        assert!(output.contains("% on a Wednesday with American Airlines."));
    }

    #[test]
    fn queries_before_loading_report_without_failing() {
        let output = drive("2\n1\n1\n1\n4\n");
        assert!(output.contains("Not enough data to answer this query"));
        assert!(output.contains("Query Result:\ntotal_flights\n-------------\n0\n"));
    }

    #[test]
    fn command_line_flags_override_config_file() {
        let dir = std::env::temp_dir().join(format!("flightq_cli_config_{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join("flightq.yaml");
        std::fs::write(&path, "database: from-file.sqlite\npipeline:\n  seed: 11\n")
            .expect("write config");
        let cli = Cli::try_parse_from([
            "flightq",
            "--config",
            path.to_str().expect("utf8 path"),
            "--seed",
            "5",
            "catalog",
        ])
        .expect("parse");
        let config = resolve_config(&cli).expect("config");
        assert_eq!(config.database, PathBuf::from("from-file.sqlite"));
        assert_eq!(config.pipeline.seed, 5);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
