//! coursesync CLI
//!
//! Local entry point: sync from the portal, then inspect, export or
//! download what was collected.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use clap::{Parser, Subcommand};
use coursesync::{
    error::{AppError, Result},
    models::{AggregatedSnapshot, Config, ItemRecord},
    pipeline::{self, AggregationEngine},
    services::{Command as ControllerCommand, Controller, HttpBrowser, Navigator, StatusReporter},
    storage::{self, KeyValueStore, LocalStorage},
};

/// coursesync - Blackboard course content aggregator
#[derive(Parser, Debug)]
#[command(
    name = "coursesync",
    version,
    about = "Collects announcements and assignments from a Blackboard portal"
)]
struct Cli {
    /// Directory holding config.toml and the stored data
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the portal landing page and run one aggregation
    Sync {
        /// Start from this page instead of the configured landing URL
        #[arg(long)]
        start_url: Option<String>,
    },

    /// Reset the stored snapshot to empty
    Clear,

    /// Print the stored records
    Show {
        /// Only records of this course
        #[arg(long)]
        course: Option<String>,
    },

    /// Write the stored snapshot to a JSON file
    Export {
        /// Output file (default: blackboard_data_<date>.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only records of this course
        #[arg(long)]
        course: Option<String>,
    },

    /// List assignment attachments, optionally downloading them
    Attachments {
        #[arg(long)]
        course: Option<String>,

        /// Download into this directory
        #[arg(long)]
        download: Option<PathBuf>,
    },

    /// Print the event log, newest first
    Logs {
        /// Empty the log instead
        #[arg(long)]
        clear: bool,
    },

    /// Show the current status and snapshot summary
    Status,

    /// Validate the configuration file
    Validate,
}

/// Initialize logging based on verbosity flag and the configured level.
fn init_logging(verbose: bool, configured: &str) {
    let level = if verbose { "debug" } else { configured };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn print_record(record: &ItemRecord) {
    println!("  - [{}] {}", record.course, record.title);
    if let Some(due) = &record.due_date {
        println!("      due: {due}");
    }
    if let Some(author) = &record.author {
        println!("      by: {author}");
    }
    if let Some(attachments) = &record.attachments {
        for attachment in attachments {
            println!("      file: {} <{}>", attachment.text.trim(), attachment.url);
        }
    }
}

fn print_snapshot(snapshot: &AggregatedSnapshot) {
    for (kind, records) in snapshot.collections() {
        println!("{} ({}):", kind, records.len());
        for record in records {
            print_record(record);
        }
    }
    match snapshot.last_updated {
        Some(at) => println!("Last updated: {}", at.with_timezone(&Local)),
        None => println!("Never synced."),
    }
}

/// Wire an HTTP browser, the engine and a controller over `store`.
fn build_controller(
    config: &Config,
    store: &Arc<dyn KeyValueStore>,
) -> Result<(Arc<HttpBrowser>, Controller)> {
    let browser = Arc::new(HttpBrowser::new(&config.browser)?);
    let engine = AggregationEngine::new(browser.clone(), store.clone(), config)?;
    let controller = Controller::new(Arc::new(engine), store.clone(), config.portal.clone());
    Ok((browser, controller))
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.storage_dir.join("config.toml");
    let loaded = Config::load(&config_path);
    let level = loaded
        .as_ref()
        .map(|c| c.logging.level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_logging(cli.verbose, &level);

    let config = loaded.unwrap_or_else(|e| {
        log::warn!(
            "Config load failed from {}: {}. Using defaults.",
            config_path.display(),
            e
        );
        Config::default()
    });
    let store: Arc<dyn KeyValueStore> = Arc::new(LocalStorage::new(&cli.storage_dir));

    match cli.command {
        Command::Sync { start_url } => {
            config.validate()?;
            let (browser, controller) = build_controller(&config, &store)?;
            let navigator = Navigator::new(browser, &config.navigation);

            let start = start_url.unwrap_or_else(|| config.portal.landing_url.clone());
            log::info!("Opening {}", start);
            navigator.load_and_await_complete(&start).await?;

            let response = controller.handle(ControllerCommand::StartAggregation).await;
            if !response.is_ok() {
                return Err(AppError::validation(response.message));
            }
            controller.wait_idle().await;

            let status = storage::load_status(store.as_ref()).await?;
            log::info!("{:?}: {}", status.name, status.message);
        }

        Command::Clear => {
            let (_, controller) = build_controller(&config, &store)?;
            let response = controller.handle(ControllerCommand::ClearData).await;
            if !response.is_ok() {
                return Err(AppError::storage(response.message));
            }
            log::info!("{}", response.message);
        }

        Command::Show { course } => {
            let snapshot = storage::load_snapshot(store.as_ref()).await?;
            print_snapshot(&snapshot.filter_by_course(course.as_deref()));
        }

        Command::Export { output, course } => {
            let snapshot = storage::load_snapshot(store.as_ref())
                .await?
                .filter_by_course(course.as_deref());
            let path = output.unwrap_or_else(|| {
                PathBuf::from(pipeline::default_export_file_name(Local::now().date_naive()))
            });
            let written = pipeline::export_snapshot(&snapshot, &path).await?;
            log::info!("Saved {}", written.display());
        }

        Command::Attachments { course, download } => {
            let snapshot = storage::load_snapshot(store.as_ref()).await?;
            let attachments = pipeline::collect_attachments(&snapshot, course.as_deref());
            if attachments.is_empty() {
                log::warn!("No attachments found.");
                return Ok(());
            }

            for attachment in &attachments {
                println!(
                    "[{}] {}: {} <{}>",
                    attachment.course,
                    attachment.assignment_title,
                    attachment.text.trim(),
                    attachment.url
                );
            }

            if let Some(target_dir) = download {
                let browser = HttpBrowser::new(&config.browser)?;
                let summary =
                    pipeline::download_all(browser.client(), &attachments, &target_dir).await;
                log::info!(
                    "Downloads finished: {} succeeded, {} failed",
                    summary.succeeded,
                    summary.failed
                );
            }
        }

        Command::Logs { clear } => {
            let reporter = StatusReporter::new(store.clone(), config.logging.max_entries);
            if clear {
                reporter.clear().await?;
                log::info!("Log cleared.");
                return Ok(());
            }
            let entries = reporter.entries().await?;
            for entry in entries.iter().rev() {
                println!(
                    "{} {:?} {} {}",
                    entry.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
                    entry.level,
                    entry.event,
                    entry.context
                );
            }
        }

        Command::Status => {
            let status = storage::load_status(store.as_ref()).await?;
            let snapshot = storage::load_snapshot(store.as_ref()).await?;
            println!("Status: {:?} - {}", status.name, status.message);
            println!(
                "Records: {} announcements, {} assignments, {} others in {} courses",
                snapshot.announcements.len(),
                snapshot.assignments.len(),
                snapshot.others.len(),
                snapshot.courses.len()
            );
            match snapshot.last_updated {
                Some(at) => println!("Last updated: {}", at.with_timezone(&Local)),
                None => println!("Never synced."),
            }
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK (portal, navigation and selectors)");
        }
    }

    Ok(())
}
