use std::fmt;

use chrono::{DateTime, Duration, Utc};
use lingo_core::model::{Difficulty, Feedback, SessionDraft, TurnDraft, TurnPatch, UserId};
use lingo_core::progress::completion_summary;
use storage::repository::{SessionCompletion, Storage};

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    user_id: UserId,
    language: String,
    sessions: u32,
    turns: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidUser { raw: String },
    InvalidSessions { raw: String },
    InvalidTurns { raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidUser { raw } => write!(f, "invalid --user value: {raw:?}"),
            ArgsError::InvalidSessions { raw } => write!(f, "invalid --sessions value: {raw}"),
            ArgsError::InvalidTurns { raw } => write!(f, "invalid --turns value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
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

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("LINGO_DB_URL").unwrap_or_else(|_| "sqlite:dev.sqlite3".into());
        let mut user_raw = std::env::var("LINGO_USER_ID").unwrap_or_else(|_| "demo".into());
        let mut language = std::env::var("LINGO_LANGUAGE").unwrap_or_else(|_| "es".into());
        let mut sessions = std::env::var("LINGO_SESSIONS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(5);
        let mut turns = std::env::var("LINGO_TURNS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(4);
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--user" => {
                    user_raw = require_value(&mut args, "--user")?;
                }
                "--language" => {
                    language = require_value(&mut args, "--language")?;
                }
                "--sessions" => {
                    let value = require_value(&mut args, "--sessions")?;
                    sessions = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidSessions { raw: value.clone() })?;
                }
                "--turns" => {
                    let value = require_value(&mut args, "--turns")?;
                    turns = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidTurns { raw: value.clone() })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
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
            language,
            sessions,
            turns,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:dev.sqlite3)");
    eprintln!("  --user <id>               Learner id to seed (default: demo)");
    eprintln!("  --language <code>         Target language (default: es)");
    eprintln!("  --sessions <n>            Completed sessions to create, one per day (default: 5)");
    eprintln!("  --turns <n>               Turns per session (default: 4)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!("  LINGO_DB_URL, LINGO_USER_ID, LINGO_LANGUAGE, LINGO_SESSIONS, LINGO_TURNS");
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let samples = [
        ("Hola, ¿cómo estás?", "Hello, how are you?"),
        ("Me gustaría un café", "I would like a coffee"),
        ("¿Dónde está la estación?", "Where is the station?"),
        ("Muchas gracias", "Thank you very much"),
        ("Hasta mañana", "See you tomorrow"),
    ];

    for day in (0..args.sessions).rev() {
        let started_at = now - Duration::days(i64::from(day)) - Duration::minutes(20);
        let difficulty = if day == 0 {
            Difficulty::Intermediate
        } else {
            Difficulty::Beginner
        };
        let draft = SessionDraft::new(args.language.clone(), difficulty)
            .validate(args.user_id.clone(), started_at)?;
        let session = storage.sessions.insert_session(&draft).await?;

        let mut turns = Vec::new();
        for i in 0..args.turns {
            let (text, meaning) = samples[(i as usize) % samples.len()];
            let new_turn = TurnDraft {
                session_id: session.id,
                turn_number: i + 1,
                target_text: text.into(),
                meaning: Some(meaning.into()),
            }
            .validate(session.id, started_at)?;
            let mut turn = storage.turns.insert_turn(&new_turn).await?;

            // scores drift upwards across the seeded history
            let base = 70.0 + f64::from(args.sessions - day) * 3.0 + f64::from(i);
            let patch = TurnPatch {
                transcript: Some(text.into()),
                pronunciation: Some(Feedback::scored(base.min(100.0))),
                grammar: Some(Feedback::scored((base - 5.0).min(100.0))),
                completed: Some(true),
            };
            let change = patch.apply(&mut turn, started_at + Duration::minutes(i64::from(i) + 1));
            turn = storage.turns.update_turn(&turn).await?;
            storage
                .sessions
                .adjust_completed_turns(session.id, change.counter_delta())
                .await?;
            turns.push(turn);
        }

        let ended_at = started_at + Duration::minutes(15);
        let session = storage.sessions.get_session(session.id).await?;
        let summary = completion_summary(&session, &turns, ended_at);
        storage
            .sessions
            .complete_session(
                session.id,
                &SessionCompletion {
                    ended_at,
                    completed_turns: summary.completed_turns,
                    progress: summary,
                },
            )
            .await?;
    }

    println!(
        "Seeded {} sessions with {} turns each for user {} into {}",
        args.sessions, args.turns, args.user_id, args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
