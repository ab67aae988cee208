use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use lingo_core::badges::BadgeCatalog;
use lingo_core::model::{EngineSettings, UserId};
use serde_json::json;
use services::{AppServices, Clock};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidUser { raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
    InvalidRecent { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidUser { raw } => write!(f, "invalid --user value: {raw:?}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
            ArgsError::InvalidRecent { raw } => write!(f, "invalid --recent value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

struct Args {
    db_url: String,
    user_id: UserId,
    catalog: Option<PathBuf>,
    now: Option<DateTime<Utc>>,
    recent: usize,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- [options]");
    eprintln!();
    eprintln!("Prints the learner's progress report and badge overview as JSON.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:dev.sqlite3)");
    eprintln!("  --user <id>               Learner id (default: demo)");
    eprintln!("  --catalog <path>          Badge catalog JSON (default: built-in catalog)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic reports");
    eprintln!("  --recent <n>              Recent badges to include (default: 3)");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  LINGO_DB_URL, LINGO_USER_ID, LINGO_BADGE_CATALOG");
    eprintln!("  RUST_LOG controls log output (default: info)");
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("LINGO_DB_URL").unwrap_or_else(|_| "sqlite:dev.sqlite3".into());
        let mut user_raw = std::env::var("LINGO_USER_ID").unwrap_or_else(|_| "demo".into());
        let mut catalog = std::env::var("LINGO_BADGE_CATALOG").ok().map(PathBuf::from);
        let mut now: Option<DateTime<Utc>> = None;
        let mut recent = 3_usize;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--user" => {
                    user_raw = require_value(args, "--user")?;
                }
                "--catalog" => {
                    catalog = Some(PathBuf::from(require_value(args, "--catalog")?));
                }
                "--now" => {
                    let value = require_value(args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--recent" => {
                    let value = require_value(args, "--recent")?;
                    recent = value
                        .parse::<usize>()
                        .map_err(|_| ArgsError::InvalidRecent { raw: value.clone() })?;
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let user_id =
            UserId::new(user_raw.clone()).map_err(|_| ArgsError::InvalidUser { raw: user_raw })?;

        Ok(Self {
            db_url,
            user_id,
            catalog,
            now,
            recent,
        })
    }
}

fn load_catalog(path: Option<&PathBuf>) -> Result<BadgeCatalog, Box<dyn std::error::Error>> {
    let Some(path) = path else {
        return Ok(BadgeCatalog::builtin());
    };
    let raw = std::fs::read_to_string(path)?;
    let catalog = BadgeCatalog::from_json(&raw)?;
    info!(path = %path.display(), badges = catalog.len(), "badge catalog loaded");
    Ok(catalog)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);
    let args = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let clock = args.now.map_or_else(Clock::default_clock, Clock::fixed);
    let catalog = load_catalog(args.catalog.as_ref())?;
    let engine =
        AppServices::new_sqlite(&args.db_url, clock, EngineSettings::default(), catalog).await?;

    let user = &args.user_id;
    let metrics = engine.compute_progress(user).await;
    let badges = engine.list_badges(user).await?;
    let recent = engine.recent_badges(user, args.recent).await;
    info!(
        user = %user,
        sessions = metrics.total_sessions,
        earned = badges.earned.len(),
        "progress report built"
    );

    let report = json!({
        "user_id": user,
        "progress": metrics.rounded(),
        "badges": badges,
        "recent_badges": recent,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// `RUST_LOG` when it is set and valid, `info` otherwise.
fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter())
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
