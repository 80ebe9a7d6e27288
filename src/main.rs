//! Solar quote entry point: CLI wiring, reference loading, proposal output.

use std::fs;
use std::io;
use std::path::Path;
use std::process;

use chrono::{Local, NaiveDate};
use tracing_subscriber::EnvFilter;

use solar_quote::cache::{
    ReferenceProvider, StaticProvider, TomlFileProvider, TtlCache, load_reference,
};
use solar_quote::record::{export_record_csv, to_record};
use solar_quote::{FormInput, ReferenceData, generate};

/// Parsed CLI arguments.
struct CliArgs {
    input_path: Option<String>,
    reference_path: Option<String>,
    preset: Option<String>,
    date: Option<NaiveDate>,
    record_out: Option<String>,
    json: bool,
}

fn print_help() {
    eprintln!("solar-quote — Photovoltaic sizing and pricing proposals");
    eprintln!();
    eprintln!("Usage: solar-quote --input <path> [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --input <path>           Form answers as TOML, or JSON when the path ends in .json");
    eprintln!("  --reference <path>       Load reference data from a TOML file");
    eprintln!("  --preset <name>          Use built-in reference data (default, simplified)");
    eprintln!("  --date <YYYY-MM-DD>      Quote date for tariff selection (default: today)");
    eprintln!("  --record-out <path>      Write the CRM record as field,value CSV");
    eprintln!("  --json                   Print the proposal as JSON instead of a summary");
    eprintln!("  --help                   Show this help message");
    eprintln!();
    eprintln!("If no --reference or --preset is given, the default preset is used.");
    eprintln!("Set RUST_LOG (e.g. RUST_LOG=solar_quote=debug) for pipeline logs.");
}

fn require_value(args: &[String], i: usize, flag: &str, what: &str) -> String {
    match args.get(i) {
        Some(v) => v.clone(),
        None => {
            eprintln!("error: {flag} requires {what}");
            process::exit(1);
        }
    }
}

fn parse_args() -> CliArgs {
    let args: Vec<String> = std::env::args().collect();
    let mut cli = CliArgs {
        input_path: None,
        reference_path: None,
        preset: None,
        date: None,
        record_out: None,
        json: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                process::exit(0);
            }
            "--input" => {
                i += 1;
                cli.input_path = Some(require_value(&args, i, "--input", "a path argument"));
            }
            "--reference" => {
                i += 1;
                cli.reference_path =
                    Some(require_value(&args, i, "--reference", "a path argument"));
            }
            "--preset" => {
                i += 1;
                cli.preset = Some(require_value(&args, i, "--preset", "a name argument"));
            }
            "--date" => {
                i += 1;
                let raw = require_value(&args, i, "--date", "a YYYY-MM-DD argument");
                match NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
                    Ok(d) => cli.date = Some(d),
                    Err(_) => {
                        eprintln!("error: --date value \"{raw}\" is not a valid YYYY-MM-DD date");
                        process::exit(1);
                    }
                }
            }
            "--record-out" => {
                i += 1;
                cli.record_out = Some(require_value(&args, i, "--record-out", "a path argument"));
            }
            "--json" => {
                cli.json = true;
            }
            other => {
                eprintln!("error: unknown argument \"{other}\"");
                print_help();
                process::exit(1);
            }
        }
        i += 1;
    }

    cli
}

fn read_form(path: &Path) -> Result<FormInput, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("error: cannot read \"{}\": {e}", path.display()))?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        serde_json::from_str(&content).map_err(|e| format!("error: invalid form JSON: {e}"))
    } else {
        toml::from_str(&content).map_err(|e| format!("error: invalid form TOML: {e}"))
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = parse_args();

    let Some(input_path) = cli.input_path else {
        eprintln!("error: --input is required");
        print_help();
        process::exit(1);
    };
    let input = read_form(Path::new(&input_path)).unwrap_or_else(|e| {
        eprintln!("{e}");
        process::exit(1);
    });

    // --reference takes priority, then --preset, then the default preset
    let provider: Box<dyn ReferenceProvider> = if let Some(path) = cli.reference_path {
        Box::new(TomlFileProvider::new(path))
    } else {
        let name = cli.preset.as_deref().unwrap_or("default");
        match ReferenceData::from_preset(name) {
            Ok(data) => Box::new(StaticProvider(data)),
            Err(e) => {
                eprintln!("{e}");
                process::exit(1);
            }
        }
    };
    let cache = TtlCache::default();
    let reference = load_reference(&cache, provider.as_ref()).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        process::exit(1);
    });

    let as_of = cli.date.unwrap_or_else(|| Local::now().date_naive());
    let proposal = generate(&input, &reference, as_of).unwrap_or_else(|e| {
        eprintln!("error: {e}");
        process::exit(1);
    });

    if cli.json {
        match serde_json::to_string_pretty(&proposal) {
            Ok(text) => println!("{text}"),
            Err(e) => {
                eprintln!("error: failed to serialize proposal: {e}");
                process::exit(1);
            }
        }
    } else {
        println!("{proposal}");
    }

    if let Some(ref path) = cli.record_out {
        let record = to_record(&proposal).unwrap_or_else(|e| {
            eprintln!("error: failed to build record: {e}");
            process::exit(1);
        });
        if let Err(e) = export_record_csv(&record, Path::new(path)) {
            eprintln!("error: failed to write CSV: {e}");
            process::exit(1);
        }
        eprintln!("Record written to {path}");
    }
}
