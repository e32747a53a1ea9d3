//! tabmerge CLI - Merge per-entity TSV files into one entity view
//!
//! Usage:
//!   tabmerge merge --studies <dir> --request <request.json> [--data-dir <dir>]
//!   tabmerge plan --studies <dir> --request <request.json>
//!   tabmerge functions
//!
//! Examples:
//!   tabmerge merge --studies studies/ --request bmi.json --data-dir data/
//!   tabmerge plan --studies studies/ --request bmi.json

use clap::{Parser, Subcommand};
use std::fs::{self, File};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use tabmerge::config::MergeSettings;
use tabmerge::metadata::{JsonStudyProvider, StudyProvider};
use tabmerge::plugins::standard_registry;
use tabmerge::processor::{write_tabular, DirectoryFetcher, MergeRequest, MergeRequestProcessor};
use tabmerge::MergeError;

#[derive(Parser)]
#[command(name = "tabmerge")]
#[command(about = "tabmerge - Merge entity streams of hierarchical study data")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to TABMERGE_CONFIG, ./tabmerge.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge the streams a request needs and write tab-delimited rows
    Merge {
        /// Directory of <study_id>.json study documents
        #[arg(short, long)]
        studies: PathBuf,

        /// Path to the request JSON
        #[arg(short, long)]
        request: PathBuf,

        /// Directory of <entity_id>.tsv files (overrides fetch.data_dir)
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// TSV holding the computed variables, if the request has any
        #[arg(long)]
        computed: Option<PathBuf>,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the entity tree and the streams a request would read
    Plan {
        /// Directory of <study_id>.json study documents
        #[arg(short, long)]
        studies: PathBuf,

        /// Path to the request JSON
        #[arg(short, long)]
        request: PathBuf,
    },

    /// List the registered derived variable functions
    Functions,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => MergeSettings::from_file(path),
        None => MergeSettings::load(),
    };
    let settings = match settings {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            return ExitCode::FAILURE;
        }
    };
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(settings.logging.level.as_str()),
    )
    .init();

    let result = match cli.command {
        Commands::Merge {
            studies,
            request,
            data_dir,
            computed,
            output,
        } => cmd_merge(settings, studies, request, data_dir, computed, output).await,
        Commands::Plan { studies, request } => cmd_plan(settings, studies, request).await,
        Commands::Functions => {
            cmd_functions();
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error ({:?}): {}", e.kind(), e);
            ExitCode::FAILURE
        }
    }
}

async fn load_processor(
    settings: MergeSettings,
    studies: PathBuf,
    request: PathBuf,
) -> Result<MergeRequestProcessor, MergeError> {
    let request = MergeRequest::from_json(&fs::read_to_string(&request)?)?;
    let metadata = JsonStudyProvider::new(studies)
        .study(&request.study_id)
        .await?;
    MergeRequestProcessor::new(metadata, request, &standard_registry(), settings)
}

async fn cmd_merge(
    settings: MergeSettings,
    studies: PathBuf,
    request: PathBuf,
    data_dir: Option<PathBuf>,
    computed: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<(), MergeError> {
    let data_dir = match data_dir {
        Some(dir) => dir,
        None => settings.fetch.resolved_data_dir()?.ok_or_else(|| {
            MergeError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                "no data directory given (use --data-dir or fetch.data_dir)",
            ))
        })?,
    };
    let mut fetcher = DirectoryFetcher::new(data_dir);
    if let Some(path) = computed {
        fetcher = fetcher.with_computed_file(path);
    }

    let processor = load_processor(settings, studies, request).await?;
    let mut merged = processor.process(&fetcher).await?;

    match output {
        Some(path) => write_tabular(&mut merged, File::create(path)?)?,
        None => write_tabular(&mut merged, io::stdout().lock())?,
    };
    Ok(())
}

async fn cmd_plan(
    settings: MergeSettings,
    studies: PathBuf,
    request: PathBuf,
) -> Result<(), MergeError> {
    let processor = load_processor(settings, studies, request).await?;
    let plan = processor.plan()?;
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

fn cmd_functions() {
    let registry = standard_registry();
    for name in registry.function_names() {
        println!("{}", name);
    }
}
