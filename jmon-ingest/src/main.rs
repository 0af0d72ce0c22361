//! jmon - judicial registry monitor
//!
//! Command-line entry point: queries the public judicial registry, stores the
//! results, and annotates processes with summaries and action classifications.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use jmon_common::config::MonitorConfig;
use jmon_common::db::init_database;
use jmon_common::models::{PersonType, Process};
use jmon_ingest::models::{NameQuery, NumberQuery};
use jmon_ingest::services::{Engines, IngestionCoordinator, MonitorWorkflow, RegistryClient};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for jmon
#[derive(Parser, Debug)]
#[command(name = "jmon")]
#[command(about = "Judicial registry monitor")]
#[command(version)]
struct Args {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database file and tables
    InitDb,

    /// Search processes by party name and store them
    SearchName {
        name: String,

        /// jur (company) or nat (natural person)
        #[arg(long, default_value = "jur")]
        person_type: PersonType,

        /// Office code (codificacionDespacho) to narrow broad searches
        #[arg(long)]
        office_code: Option<String>,

        /// Include inactive processes
        #[arg(long)]
        include_inactive: bool,

        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Follow pagination until the last page
        #[arg(long)]
        all_pages: bool,
    },

    /// Search processes by registration number and store them
    SearchNumber {
        number: String,

        /// Only active processes
        #[arg(long)]
        active_only: bool,

        #[arg(long, default_value_t = 1)]
        page: u32,
    },

    /// Refresh one process: detail, actions, summary and classifications
    Process { process_id: String },

    /// Fetch and store the documents of one action
    Documents { action_id: String },

    /// Download one document as PDF
    Download {
        document_id: String,

        /// Target directory
        #[arg(long, default_value = "documents")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = MonitorConfig::resolve(args.config.as_deref(), args.database.as_deref())
        .context("Failed to load configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    config.log_resolution();

    let pool = init_database(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    if let Command::InitDb = args.command {
        println!("Database ready at {}", config.database_path.display());
        return Ok(());
    }

    let registry = RegistryClient::new(&config.registry).context("Failed to create registry client")?;
    let coordinator = IngestionCoordinator::new(pool, registry.base_url());
    let workflow = MonitorWorkflow::new(
        Arc::new(registry),
        coordinator,
        Engines::from_config(&config),
        config.search.max_pages,
    );

    match args.command {
        Command::InitDb => {}

        Command::SearchName {
            name,
            person_type,
            office_code,
            include_inactive,
            page,
            all_pages,
        } => {
            let mut query = NameQuery::new(name, person_type).with_page(page);
            query.active_only = !include_inactive;
            query.office_code = office_code;

            if all_pages {
                let outcome = workflow.search_by_name_all_pages(&query).await?;
                print_processes(&outcome.stored);
                println!("{} process(es) stored from {} page(s)", outcome.stored.len(), outcome.pages_fetched);
            } else {
                let outcome = workflow.search_by_name(&query).await?;
                print_processes(&outcome.stored);
                if let Some(pagination) = &outcome.response.pagination {
                    println!(
                        "Page {} of {} ({} record(s) in total)",
                        pagination.page.unwrap_or(i64::from(query.page)),
                        pagination.total_pages.unwrap_or(1),
                        pagination.total_records.unwrap_or(0)
                    );
                }
            }
        }

        Command::SearchNumber {
            number,
            active_only,
            page,
        } => {
            let mut query = NumberQuery::new(number);
            query.active_only = active_only;
            query.page = page.max(1);

            let outcome = workflow.search_by_number(&query).await?;
            print_processes(&outcome.stored);
        }

        Command::Process { process_id } => {
            let report = workflow.refresh_process(&process_id).await?;

            println!(
                "Process {} ({})",
                report.detail.process_key.as_deref().unwrap_or("-"),
                process_id
            );
            println!();
            println!("{}", report.summary);
            println!();
            for action in &report.actions {
                println!(
                    "[{:<7}] {}  {}  {}{}",
                    action.classification.urgency,
                    action.record.action_date.as_deref().unwrap_or("-"),
                    action.record.action_id.as_deref().unwrap_or("-"),
                    action.record.label.as_deref().unwrap_or("-"),
                    if action.classification.action_required { "  (action required)" } else { "" }
                );
            }
            if report.process_missing {
                println!();
                println!("Process {} is not stored; find it with a search first to keep these results", process_id);
            }
        }

        Command::Documents { action_id } => {
            let report = workflow.refresh_action_documents(&action_id).await?;
            if report.action_missing {
                println!("Action {} is not stored; refresh its process first", action_id);
            }
            for document in &report.stored {
                println!(
                    "{}  {}  {}",
                    document.document_id,
                    document.name.as_deref().unwrap_or("-"),
                    document.download_url
                );
            }
        }

        Command::Download { document_id, dir } => {
            let path = workflow.download_document(&document_id, &dir).await?;
            println!("Saved {}", path.display());
        }
    }

    Ok(())
}

fn print_processes(processes: &[Process]) {
    for process in processes {
        println!(
            "{}  {}  {}  {}",
            process.process_id,
            process.process_key.as_deref().unwrap_or("-"),
            process
                .last_action_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "-".to_string()),
            process.office.as_deref().unwrap_or("-")
        );
    }
}
