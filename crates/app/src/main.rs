use std::fmt;
use std::sync::Arc;

use quiz_core::model::{QuizSettings, ResultId, SettingsError};
use services::{Clock, QuestionBank, QuizError, QuizLoopService, ResultService, SessionRunner};
use storage::repository::{InMemoryRepository, Storage};
use storage::sample::sample_questions;
use tracing_subscriber::EnvFilter;

mod terminal;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidNumber { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
    Settings(SettingsError),
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidNumber { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::Settings(err) => write!(f, "{err}"),
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

fn parse_number<T: std::str::FromStr>(flag: &'static str, raw: &str) -> Result<T, ArgsError> {
    raw.trim().parse().map_err(|_| ArgsError::InvalidNumber {
        flag,
        raw: raw.to_owned(),
    })
}

fn env_number<T: std::str::FromStr>(key: &'static str) -> Result<Option<T>, ArgsError> {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => parse_number(key, &raw).map(Some),
        _ => Ok(None),
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- [play] [--db <sqlite_url>] [--category <name>] [--size <n>] [--time-limit <secs>]");
    eprintln!("  cargo run -p app -- categories [--db <sqlite_url>]");
    eprintln!("  cargo run -p app -- history [--db <sqlite_url>] [--limit <n>] [--id <result_id>]");
    eprintln!();
    eprintln!("Without --db the built-in sample bank is used in memory.");
    eprintln!("Seed a database with: cargo run -p storage --bin seed -- --db <sqlite_url>");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  QUIZ_DB_URL, QUIZ_CATEGORY, QUIZ_SESSION_SIZE, QUIZ_TIME_LIMIT_SECS, RUST_LOG");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Play,
    Categories,
    History,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "play" => Some(Self::Play),
            "categories" => Some(Self::Categories),
            "history" => Some(Self::History),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct Args {
    db_url: Option<String>,
    category: Option<String>,
    settings: QuizSettings,
    limit: u32,
    result_id: Option<ResultId>,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("QUIZ_DB_URL")
            .ok()
            .filter(|value| !value.trim().is_empty());
        let mut category = std::env::var("QUIZ_CATEGORY")
            .ok()
            .filter(|value| !value.trim().is_empty());
        let mut session_size: Option<usize> = env_number("QUIZ_SESSION_SIZE")?;
        let mut time_limit: Option<u32> = env_number("QUIZ_TIME_LIMIT_SECS")?;
        let mut limit = 10;
        let mut result_id = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = Some(value);
                }
                "--category" => {
                    let value = require_value(args, "--category")?;
                    category = Some(value).filter(|v| !v.trim().is_empty());
                }
                "--size" => {
                    let value = require_value(args, "--size")?;
                    session_size = Some(parse_number("--size", &value)?);
                }
                "--time-limit" => {
                    let value = require_value(args, "--time-limit")?;
                    time_limit = Some(parse_number("--time-limit", &value)?);
                }
                "--limit" => {
                    let value = require_value(args, "--limit")?;
                    limit = parse_number("--limit", &value)?;
                }
                "--id" => {
                    let value = require_value(args, "--id")?;
                    result_id = Some(parse_number("--id", &value)?);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let settings = QuizSettings::new(
            session_size.unwrap_or(QuizSettings::DEFAULT_SESSION_SIZE),
            time_limit.unwrap_or(QuizSettings::DEFAULT_SESSION_BUDGET_SECS),
            QuizSettings::DEFAULT_QUESTION_BUDGET_SECS,
        )
        .map_err(ArgsError::Settings)?;

        Ok(Self {
            db_url,
            category,
            settings,
            limit,
            result_id,
        })
    }
}

async fn open_storage(db_url: Option<&str>) -> Result<Storage, Box<dyn std::error::Error>> {
    match db_url {
        Some(url) => {
            tracing::info!(db_url = url, "opening sqlite storage");
            Ok(Storage::sqlite(url).await?)
        }
        None => {
            tracing::info!("using in-memory sample bank");
            let repo = InMemoryRepository::with_questions(sample_questions()?);
            Ok(Storage::from_in_memory(repo))
        }
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    // Default behavior: play when no subcommand is provided.
    let cmd = match argv.first().map(String::as_str) {
        None => Command::Play,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Play,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let parsed = Args::parse(&mut argv.into_iter()).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = open_storage(parsed.db_url.as_deref()).await?;

    match cmd {
        Command::Play => {
            let service = QuizLoopService::new(
                Clock::default(),
                QuestionBank::new(Arc::clone(&storage.questions)),
                Arc::clone(&storage.results),
            )
            .with_settings(parsed.settings);

            let session = match service.start_session(parsed.category.clone()).await {
                Ok(session) => session,
                Err(QuizError::EmptyPool) => {
                    eprintln!(
                        "No questions available for {}. Try `categories` or seed the database.",
                        parsed.category.as_deref().unwrap_or("any category")
                    );
                    return Ok(());
                }
                Err(err) => return Err(err.into()),
            };

            let running = SessionRunner::spawn(service, session);
            terminal::play(running).await
        }
        Command::Categories => {
            let bank = QuestionBank::new(Arc::clone(&storage.questions));
            terminal::print_categories(&bank.categories().await);
            Ok(())
        }
        Command::History => {
            let results = ResultService::new(Arc::clone(&storage.history));
            match parsed.result_id {
                Some(id) => terminal::print_detail(&results.detail(id).await?),
                None => terminal::print_history(&results.list_recent(parsed.limit).await?),
            }
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
