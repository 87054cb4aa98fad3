//! Filament CLI - extract SQL lineage with multi-pass model analysis
//!
//! Usage:
//!   filament extract <path> [--workers <n>] [--sequential] [--no-cache]
//!   filament assess <file.sql>
//!
//! Examples:
//!   filament extract ./warehouse/etl --workers 8
//!   filament extract ./queries/orders.sql --no-cache
//!   filament assess ./queries/orders.sql

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use filament::complexity::assess_complexity;
use filament::config::Settings;
use filament::gateway::OpenAiGateway;
use filament::service::{FileOutcome, LineageService};

#[derive(Parser)]
#[command(name = "filament")]
#[command(about = "Filament - LLM-driven table and column lineage extraction for SQL")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract lineage from a file or a folder of SQL/Jinja2 sources
    Extract {
        /// Source file or folder
        path: PathBuf,

        /// Path to a filament.toml (defaults to ./filament.toml when present)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Files processed in parallel for folder runs
        #[arg(short, long, default_value_t = 4)]
        workers: usize,

        /// One model call at a time within each pass (slower, gentler on quotas)
        #[arg(long)]
        sequential: bool,

        /// Ignore the processing cache and analyze every file fresh
        #[arg(long)]
        no_cache: bool,

        /// Output directory override
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Score a file's complexity without calling the model
    Assess {
        /// Source file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Extract {
            path,
            config,
            workers,
            sequential,
            no_cache,
            output,
        } => cmd_extract(path, config, workers, sequential, no_cache, output).await,
        Commands::Assess { file } => cmd_assess(file),
    }
}

async fn cmd_extract(
    path: PathBuf,
    config: Option<PathBuf>,
    workers: usize,
    sequential: bool,
    no_cache: bool,
    output: Option<PathBuf>,
) -> ExitCode {
    let settings = match config {
        Some(config_path) => Settings::load(&config_path),
        None => Settings::load_or_default(),
    };
    let mut settings = match settings {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    if sequential {
        settings.extraction.concurrent = false;
    }
    if no_cache {
        settings.cache.enabled = false;
    }
    if let Some(base_dir) = output {
        settings.output.base_dir = base_dir;
    }

    let gateway = match OpenAiGateway::from_settings(&settings.model) {
        Ok(gateway) => Arc::new(gateway),
        Err(err) => {
            eprintln!("error: {err}");
            return ExitCode::FAILURE;
        }
    };

    let service = Arc::new(LineageService::new(settings, gateway));

    if path.is_dir() {
        let stats = service.process_folder(&path, workers).await;
        println!(
            "Processed {} files: {} succeeded, {} failed",
            stats.processed, stats.succeeded, stats.failed
        );
        if stats.failed > 0 {
            return ExitCode::FAILURE;
        }
    } else {
        match service.process_single(&path).await {
            FileOutcome::Processed {
                yaml_path,
                tables,
                table_edges,
                column_edges,
            } => {
                println!("Lineage written to {}", yaml_path.display());
                println!(
                    "Extracted {tables} tables, {table_edges} table edges, {column_edges} column edges"
                );
            }
            FileOutcome::Skipped { yaml_path } => {
                println!("Skipped: content unchanged");
                if let Some(yaml_path) = yaml_path {
                    println!("Existing lineage at {}", yaml_path.display());
                }
            }
            FileOutcome::NoDependencies => {
                println!("No tables or dependencies found");
            }
            FileOutcome::Failed { message } => {
                eprintln!("error: {message}");
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}

fn cmd_assess(file: PathBuf) -> ExitCode {
    let content = match std::fs::read_to_string(&file) {
        Ok(content) => content,
        Err(err) => {
            eprintln!("error: failed to read {}: {err}", file.display());
            return ExitCode::FAILURE;
        }
    };

    let assessment = assess_complexity(&content);
    println!("File: {}", file.display());
    println!("Complexity score: {:.1}", assessment.score);
    println!("Insert statements: {}", assessment.insert_count);
    println!(
        "Chunking recommended: {}",
        if assessment.should_chunk { "yes" } else { "no" }
    );

    ExitCode::SUCCESS
}
