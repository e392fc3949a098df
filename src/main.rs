use chrono::NaiveDate;
use clap::Parser;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use proposal_validation_engine::config::{self, ValidationConfig};
use proposal_validation_engine::context::Context;
use proposal_validation_engine::Engine;

/// Grade an automated system's change proposals against a hand-authored
/// expectation. Prints the verdict as JSON; exits 0 when the proposals
/// match.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Expected proposal(s): a JSON object or array. Pass `null` to probe
    /// the missing-expectation verdict.
    expected: String,
    /// Actual proposal(s) produced by the system under test (JSON).
    actual: String,
    /// Dataset-level configuration layer (JSON, or @path to a file).
    #[arg(long)]
    config: Option<String>,
    /// Evaluation date (YYYY-MM-DD, resolved at UTC midnight). Defaults to
    /// the wall clock; pin it for reproducible runs.
    #[arg(long)]
    date: Option<String>,
    /// Pretty-print the verdict.
    #[arg(long)]
    pretty: bool,
}

fn parse_json(label: &str, text: &str) -> Value {
    match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            eprintln!("Invalid {label} JSON: {e}");
            std::process::exit(2);
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let expected = parse_json("expected", &args.expected);
    let actual = parse_json("actual", &args.actual);

    // Dataset-level layer, inline or @file.
    let dataset: Option<ValidationConfig> = args.config.as_ref().map(|raw| {
        let text = match raw.strip_prefix('@') {
            Some(path) => match std::fs::read_to_string(path) {
                Ok(contents) => contents,
                Err(e) => {
                    eprintln!("Cannot read config file {path}: {e}");
                    std::process::exit(2);
                }
            },
            None => raw.clone(),
        };
        match config::from_value(parse_json("config", &text)) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(2);
            }
        }
    });

    let ctx = match args.date.as_deref() {
        Some(date) => match date.parse::<NaiveDate>() {
            Ok(d) => Context::fixed(d.and_hms_opt(0, 0, 0).expect("midnight is valid").and_utc()),
            Err(e) => {
                eprintln!("Invalid --date: {e}");
                std::process::exit(2);
            }
        },
        None => Context::now(),
    };

    let engine = Engine::new();
    let verdict = engine.grade(Some(&expected), dataset.as_ref(), &actual, &ctx);

    let rendered = if args.pretty {
        serde_json::to_string_pretty(&verdict)
    } else {
        serde_json::to_string(&verdict)
    }
    .expect("verdict serializes");
    println!("{rendered}");

    std::process::exit(i32::from(verdict.score == 0));
}
