//! A CLI tool that runs one winner-resolution sweep against the database.
//! It declares the same outcomes the server would, and is safe to run while
//! the server is live.

use chrono::Utc;
use clap::{Arg, ArgAction, ArgMatches, Command};
use log::LevelFilter;
use log4rs::{
    append::console::{ConsoleAppender, Target},
    config::{Appender, Root},
    encode::pattern::PatternEncoder,
};
use mongodb::Client as MongoClient;
use thiserror::Error;

use firstin_backend::model::{
    mongodb::MongoMeetingStore,
    voting::{resolve_pending, SweepReport, VotingPolicy},
};

const PROGRAM_NAME: &str = "resolve-cli";

const ABOUT_TEXT: &str = "Declare the winner of every meeting whose voting has ended.

EXIT CODES:
     0: Every pending meeting was handled.
   255: The sweep ran, but some meetings could not be resolved.
 Other: Error.";

const DB_URI: &str = "DB_URI";
const DATABASE: &str = "database";
const RETRY_EMPTY: &str = "retry-empty";
const VERBOSE: &str = "verbose";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .arg(
            Arg::new(DB_URI)
                .help("MongoDB connection string")
                .action(ArgAction::Set)
                .required(true),
        )
        .arg(
            Arg::new(DATABASE)
                .long(DATABASE)
                .help("Name of the database holding the meetings")
                .action(ArgAction::Set)
                .default_value("firstin"),
        )
        .arg(
            Arg::new(RETRY_EMPTY)
                .long(RETRY_EMPTY)
                .help("Leave meetings without votes unresolved for a later sweep")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new(VERBOSE)
                .short('v')
                .long(VERBOSE)
                .help("Log each meeting as it is resolved")
                .action(ArgAction::SetTrue),
        )
}

/// Errors that this program may produce.
#[derive(Debug, Error)]
enum Error {
    #[error("Failed to set up logging: {0}")]
    Logging(String),
    #[error("Failed to start the async runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error(transparent)]
    Db(#[from] mongodb::error::Error),
    #[error(transparent)]
    Sweep(#[from] firstin_backend::error::Error),
}

/// What the command line asked for.
#[derive(Debug, PartialEq, Eq)]
struct Options {
    db_uri: String,
    database: String,
    policy: VotingPolicy,
    verbose: bool,
}

impl Options {
    fn from_args(args: &ArgMatches) -> Self {
        Self {
            // Required argument is guaranteed to be present.
            db_uri: args.get_one::<String>(DB_URI).cloned().unwrap_or_default(),
            database: args
                .get_one::<String>(DATABASE)
                .cloned()
                .unwrap_or_default(),
            policy: VotingPolicy {
                retry_empty_meetings: args.get_flag(RETRY_EMPTY),
                ..VotingPolicy::default()
            },
            verbose: args.get_flag(VERBOSE),
        }
    }
}

/// Log to stderr, keeping stdout for the report.
fn init_logging(verbose: bool) -> Result<(), Error> {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("{h({l})} {m}{n}")))
        .build();
    let config = log4rs::Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(level))
        .map_err(|e| Error::Logging(e.to_string()))?;
    log4rs::init_config(config).map_err(|e| Error::Logging(e.to_string()))?;
    Ok(())
}

/// Human-readable summary of a sweep.
fn describe(report: &SweepReport) -> String {
    let mut lines = Vec::new();
    for (id, winner) in &report.declared {
        let outcome = match winner {
            Some(winner) => winner
                .identities()
                .cloned()
                .collect::<Vec<_>>()
                .join(", "),
            None => "no winner".to_string(),
        };
        lines.push(format!("{id}: {outcome}"));
    }
    for (id, reason) in &report.failed {
        lines.push(format!("{id}: FAILED ({reason})"));
    }
    lines.push(format!(
        "Declared {}, already declared {}, deferred {}, failed {}.",
        report.declared.len(),
        report.already_declared,
        report.deferred,
        report.failed.len()
    ));
    lines.join("\n")
}

async fn sweep(options: &Options) -> Result<SweepReport, Error> {
    let client = MongoClient::with_uri_str(&options.db_uri).await?;
    let store = MongoMeetingStore::new(&client.database(&options.database));
    Ok(resolve_pending(&store, Utc::now(), &options.policy).await?)
}

/// Run the sweep, report the result, and return the exit code.
fn run(options: &Options) -> Result<u8, Error> {
    let runtime = rocket::tokio::runtime::Runtime::new()?;
    let report = runtime.block_on(sweep(options))?;
    println!("{}", describe(&report));
    Ok(if report.failed.is_empty() { 0 } else { 255 })
}

fn main() {
    let options = Options::from_args(&cli().get_matches());
    let exit_code = match init_logging(options.verbose).and_then(|_| run(&options)) {
        Ok(code) => code,
        Err(err) => {
            println!("{err}");
            1
        }
    };
    std::process::exit(exit_code.into())
}
