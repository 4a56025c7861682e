use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use logger::{LevelFilter, init_tracing};
use rand::Rng;
use rand::distributions::Alphanumeric;
use serde_json::json;
use tracing::warn;

use uppe_checks::logs::LogStore;
use uppe_checks::monitoring::types::{
    CHECK_ID_LEN, Check, CheckState, MAX_TIMEOUT_SECONDS, MIN_TIMEOUT_SECONDS,
};
use uppe_checks::monitoring::validate_check;
use uppe_checks::store::{CHECKS, FileStore, RecordStore};
use uppe_checks::{Config, Orchestrator};

#[derive(Debug, Parser)]
#[command(version, about = "Uptime checks with SMS alerts")]
struct Cli {
    /// Config file (defaults to $XDG_CONFIG_HOME/uppe/checks.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// More output, repeat for trace level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the scan and log rotation workers (default)
    Run,
    /// Run a single scan cycle
    Scan,
    /// Rotate all live logs once
    Rotate,
    /// Create a new check
    AddCheck {
        /// Owner phone number, 10 digits
        #[arg(long)]
        phone: String,
        #[arg(long, value_enum, default_value = "https")]
        protocol: ProtocolArg,
        /// Host and path, without the protocol
        #[arg(long)]
        url: String,
        #[arg(long, value_enum, default_value = "get")]
        method: MethodArg,
        /// Accepted status codes
        #[arg(long, value_delimiter = ',', default_value = "200")]
        codes: Vec<u16>,
        #[arg(long, default_value_t = 3)]
        timeout: u64,
    },
    /// Inspect stored checks
    Checks {
        #[command(subcommand)]
        command: ChecksCommand,
    },
    /// Inspect probe logs
    Logs {
        #[command(subcommand)]
        command: LogsCommand,
    },
    /// Print the effective configuration
    Config,
}

#[derive(Debug, Subcommand)]
enum ChecksCommand {
    /// List checks with their last observed state
    List {
        /// Only checks last seen up
        #[arg(long, conflicts_with = "down")]
        up: bool,
        /// Only checks last seen down
        #[arg(long)]
        down: bool,
    },
    /// Print a stored check document
    Show { id: String },
}

#[derive(Debug, Subcommand)]
enum LogsCommand {
    /// List log names
    List {
        /// Include compressed archives
        #[arg(long)]
        archives: bool,
    },
    /// Print the records of a compressed archive
    Show { archive_id: String },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProtocolArg {
    Http,
    Https,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum MethodArg {
    Get,
    Post,
    Put,
    Delete,
}

fn level_for(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Random lowercase alphanumeric check id
fn new_check_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .map(|c| char::from(c).to_ascii_lowercase())
        .take(CHECK_ID_LEN)
        .collect()
}

fn state_filter(up: bool, down: bool) -> Option<CheckState> {
    match (up, down) {
        (true, _) => Some(CheckState::Up),
        (_, true) => Some(CheckState::Down),
        _ => None,
    }
}

fn check_line(check: &Check) -> String {
    format!(
        "{}  {:<13}  {} {}",
        check.id,
        check.observed_state().map_or("never checked", |state| state.as_str()),
        check.method.as_str().to_uppercase(),
        check.target()
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(level_for(cli.verbose));

    let config = Config::from_config(cli.config.as_ref()).context("loading configuration")?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => Arc::new(Orchestrator::from_config(&config)?).run().await,
        Command::Scan => {
            let report = Orchestrator::from_config(&config)?.scan_once().await;
            println!(
                "listed: {}, updated: {}, malformed: {}, failed: {}, alerts sent: {}",
                report.listed, report.updated, report.malformed, report.failed, report.alerts
            );
            Ok(())
        }
        Command::Rotate => {
            let report = Orchestrator::from_config(&config)?.rotate_once().await;
            println!(
                "rotated: {}, empty: {}, failed: {}",
                report.rotated, report.empty, report.failed
            );
            Ok(())
        }
        Command::AddCheck { phone, protocol, url, method, codes, timeout } => {
            if !(MIN_TIMEOUT_SECONDS..=MAX_TIMEOUT_SECONDS).contains(&timeout) {
                bail!("timeout must be between {MIN_TIMEOUT_SECONDS} and {MAX_TIMEOUT_SECONDS} seconds");
            }

            let id = new_check_id();
            let document = json!({
                "id": id,
                "userPhone": phone.trim(),
                "protocol": match protocol {
                    ProtocolArg::Http => "http",
                    ProtocolArg::Https => "https",
                },
                "url": url.trim(),
                "method": match method {
                    MethodArg::Get => "get",
                    MethodArg::Post => "post",
                    MethodArg::Put => "put",
                    MethodArg::Delete => "delete",
                },
                "successCodes": codes,
                "timeoutSeconds": timeout,
            });
            validate_check(&document)?;

            let store = FileStore::new(&config.storage.data_dir);
            store.create(CHECKS, &id, &document).await?;
            println!("{id}");
            Ok(())
        }
        Command::Checks { command } => {
            let store = FileStore::new(&config.storage.data_dir);
            match command {
                ChecksCommand::List { up, down } => {
                    let wanted = state_filter(up, down);
                    for id in store.list(CHECKS).await? {
                        let document = match store.read(CHECKS, &id).await {
                            Ok(document) => document,
                            Err(e) => {
                                warn!(check_id = %id, error = %e, "Skipping unreadable check");
                                continue;
                            }
                        };
                        let check = match validate_check(&document) {
                            Ok(check) => check,
                            Err(e) => {
                                warn!(check_id = %id, error = %e, "Skipping improperly formatted check");
                                continue;
                            }
                        };
                        if wanted.is_some_and(|state| check.observed_state() != Some(state)) {
                            continue;
                        }
                        println!("{}", check_line(&check));
                    }
                }
                ChecksCommand::Show { id } => {
                    let document = store.read(CHECKS, &id).await?;
                    println!("{}", serde_json::to_string_pretty(&document)?);
                }
            }
            Ok(())
        }
        Command::Logs { command } => {
            let logs = LogStore::new(&config.storage.logs_dir);
            match command {
                LogsCommand::List { archives } => {
                    for name in logs.list(archives).await? {
                        println!("{name}");
                    }
                }
                LogsCommand::Show { archive_id } => {
                    let contents = logs.decompress(&archive_id).await?;
                    for line in contents.lines().filter(|line| !line.trim().is_empty()) {
                        let record: serde_json::Value = serde_json::from_str(line)
                            .with_context(|| format!("invalid record in {archive_id}"))?;
                        println!("{}", serde_json::to_string_pretty(&record)?);
                    }
                }
            }
            Ok(())
        }
        Command::Config => {
            print!("{config}");
            Ok(())
        }
    }
}
