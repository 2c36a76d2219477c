//! Consultation summarisation CLI.
//!
//! Listing commands run without model credentials; summary commands wire
//! the configured provider and cache, print the result JSON to stdout, and
//! save a copy under a timestamped `output/` directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use summarisation::{
    build_provider, load_prepared_data, ConsultationService, Settings, SummaryCache,
};

#[derive(Parser)]
#[command(name = "consultations")]
#[command(about = "Local consultation summarisation")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available organisations
    ListOrgs,

    /// List available questions
    ListQuestions,

    /// Generate an organisation summary (Approach 1)
    SummaryOrg {
        /// Target submission ID
        #[arg(long)]
        response_id: String,

        /// Skip cache read/write
        #[arg(long)]
        no_cache: bool,
    },

    /// Generate a question summary (Approach 2)
    SummaryQuestion {
        /// Target question ID, e.g. Q01
        #[arg(long)]
        question_id: String,

        /// Skip cache read/write
        #[arg(long)]
        no_cache: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let require_llm = matches!(
        cli.command,
        Commands::SummaryOrg { .. } | Commands::SummaryQuestion { .. }
    );
    let service = build_service(require_llm).await?;

    match cli.command {
        Commands::ListOrgs => {
            for (response_id, label) in service.list_organisations() {
                println!("{response_id}\t{label}");
            }
        }
        Commands::ListQuestions => {
            for (question_id, label) in service.list_questions() {
                println!("{question_id}\t{label}");
            }
        }
        Commands::SummaryOrg {
            response_id,
            no_cache,
        } => {
            let result = service
                .summarise_organisation(&response_id, !no_cache)
                .await?;
            emit_result(&serde_json::to_value(&result)?, "approach_1", &response_id)?;
        }
        Commands::SummaryQuestion {
            question_id,
            no_cache,
        } => {
            let result = service
                .summarise_question(&question_id, !no_cache)
                .await?;
            emit_result(&serde_json::to_value(&result)?, "approach_2", &question_id)?;
        }
    }

    Ok(())
}

/// Construct the application service from environment configuration.
async fn build_service(require_llm: bool) -> Result<ConsultationService> {
    let settings = Settings::from_env();

    let llm = build_provider(&settings, require_llm).context("failed to build LLM provider")?;

    let cache = if settings.cache_enabled {
        Some(
            SummaryCache::open(&settings.cache_path)
                .await
                .context("failed to open summary cache")?,
        )
    } else {
        None
    };

    let prepared = load_prepared_data(&settings).context("failed to load consultation data")?;

    Ok(ConsultationService::new(settings, llm, cache, prepared))
}

/// Print the result JSON to stdout and save a timestamped copy.
fn emit_result(payload: &serde_json::Value, approach: &str, target_id: &str) -> Result<()> {
    let rendered = serde_json::to_string_pretty(payload)?;
    println!("{rendered}");

    let saved = write_output_json(payload, approach, target_id)?;
    eprintln!("Saved summary JSON to: {}", saved.display());
    Ok(())
}

/// Persist summary output into a timestamped folder under `output/`.
fn write_output_json(
    payload: &serde_json::Value,
    approach: &str,
    target_id: &str,
) -> Result<PathBuf> {
    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let output_dir = Path::new("output").join(timestamp.to_string());
    std::fs::create_dir_all(&output_dir)?;

    let safe_target: String = {
        let trimmed = target_id.trim();
        let base = if trimmed.is_empty() { "unknown" } else { trimmed };
        base.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                    c
                } else {
                    '_'
                }
            })
            .collect()
    };

    let output_path = output_dir.join(format!("{approach}_{safe_target}.json"));
    std::fs::write(&output_path, format!("{}\n", serde_json::to_string_pretty(payload)?))?;
    Ok(output_path)
}
