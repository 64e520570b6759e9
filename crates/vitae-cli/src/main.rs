//! Vitae CLI - CV document stage pipeline

mod commands;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vitae_core::Stage;

/// Vitae - text, entity and image extraction for uploaded CVs
#[derive(Parser)]
#[command(name = "vitae")]
#[command(version)]
#[command(about = "Stage pipeline for uploaded CV documents", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Data directory (database and blobs); overrides the config file
    #[arg(long, global = true, env = "VITAE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize Vitae (create config, database and blob store)
    Init,

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Upload a document
    Upload {
        /// Path to a PDF, image or text file
        path: PathBuf,
    },

    /// List documents, newest first
    List {
        /// Only documents uploaded on this day (dd-mm-yyyy)
        #[arg(short, long)]
        date: Option<String>,

        /// Maximum number of documents to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Show a document and its stage results
    Show {
        /// Document file_id
        file_id: String,

        /// Print the raw record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Remove a document and its results
    Remove {
        /// Document file_id
        file_id: String,
    },

    /// Show per-stage progress
    Status,

    /// List failing and dead-lettered documents
    Failures {
        /// Only this stage (ocr, ner, cv)
        #[arg(short, long)]
        stage: Option<Stage>,

        /// Only dead-lettered documents
        #[arg(long)]
        dead: bool,
    },

    /// Make a failed document eligible again for a stage
    Requeue {
        /// Document file_id
        file_id: String,

        /// Stage to retry (ocr, ner, cv)
        #[arg(short, long)]
        stage: Stage,
    },

    /// Check external tools and the Ollama server
    Health,

    /// Run a single tick of a stage
    Tick {
        /// Stage to run (ocr, ner, cv)
        #[arg(short, long)]
        stage: Stage,
    },

    /// Run a stage service until Ctrl+C
    Serve {
        /// Stage to run (ocr, ner, cv)
        #[arg(short, long)]
        stage: Stage,

        /// Seconds between ticks (default: from config)
        #[arg(short, long)]
        interval: Option<u64>,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Print the config file location
    Path,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vitae=debug,info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vitae=info,warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let data_dir = cli.data_dir.as_deref();

    let result = match cli.command {
        Commands::Init => commands::init::run(data_dir),
        Commands::Config(cmd) => match cmd {
            ConfigCommands::Show => commands::config::show(),
            ConfigCommands::Path => commands::config::path(),
        },
        Commands::Upload { path } => commands::upload::run(data_dir, &path),
        Commands::List { date, limit } => commands::documents::list(data_dir, date.as_deref(), limit),
        Commands::Show { file_id, json } => commands::documents::show(data_dir, &file_id, json),
        Commands::Remove { file_id } => commands::documents::remove(data_dir, &file_id),
        Commands::Status => commands::status::run(data_dir),
        Commands::Failures { stage, dead } => commands::failures::list(data_dir, stage, dead),
        Commands::Requeue { file_id, stage } => {
            commands::failures::requeue(data_dir, &file_id, stage)
        }
        Commands::Health => commands::health::run(),
        Commands::Tick { stage } => commands::run::tick(data_dir, stage),
        Commands::Serve { stage, interval } => commands::run::serve(data_dir, stage, interval),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}
