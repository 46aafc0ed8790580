// src/main.rs
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use job_pilot::analyzer::{Analyzer, GeminiClient};
use job_pilot::submit::{run_submitter, HttpSubmitter};
use job_pilot::{pipeline, AppConfig, Database};

#[derive(Parser)]
#[command(name = "jobpilot", about = "Job search automation: scrape, score, review, apply")]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one discovery cycle, then submit approved applications
    Run,
    /// Serve the review dashboard
    Serve,
    /// Run one discovery cycle, then serve the dashboard
    Start,
    /// Verify configuration, resume file, API key and database access
    Check,
    /// Delete all stored postings, analyses, applications and resumes
    ClearDb {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

fn init_tracing(log_file: &Path) -> Result<()> {
    if let Some(parent) = log_file.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory: {}", parent.display()))?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("Failed to open log file: {}", log_file.display()))?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().json().with_writer(std::sync::Mutex::new(file)))
        .init();
    Ok(())
}

fn build_analyzer(config: &AppConfig) -> Result<Analyzer> {
    let api_key = config.api_key()?;
    let client = GeminiClient::new(api_key, config.matching.model.clone())?;
    Ok(Analyzer::new(Box::new(client)))
}

async fn command_run(db: &Database, config: &AppConfig) -> Result<()> {
    let analyzer = build_analyzer(config)?;
    let report = pipeline::run_cycle(db, config, &analyzer).await?;
    println!(
        "Cycle done: {} found, {} new, {} analyzed, {} queued{}",
        report.postings_found,
        report.postings_new,
        report.analyses_run,
        report.applications_created,
        if report.used_sample_data {
            " (sample data)"
        } else {
            ""
        }
    );

    let submitter = HttpSubmitter::new()?;
    let submit_report = run_submitter(db, config, &submitter).await?;
    println!(
        "Submissions: {} attempted, {} submitted, {} failed",
        submit_report.attempted, submit_report.submitted, submit_report.failed
    );
    Ok(())
}

async fn command_check(config: &AppConfig, config_path: &Path) -> Result<()> {
    println!("Configuration: ok ({})", config_path.display());

    config.validate_resume_file()?;
    println!("Resume file: ok ({})", config.resume.file_path.display());

    config.api_key()?;
    println!("API key: ok ({} is set)", job_pilot::config::API_KEY_ENV);

    Database::new(&config.storage.database_path).await?;
    println!("Database: ok ({})", config.storage.database_path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load(&cli.config)?;
    init_tracing(&config.storage.log_file)?;
    info!("jobpilot starting");

    match cli.command {
        Command::Run => {
            let db = Database::new(&config.storage.database_path).await?;
            command_run(&db, &config).await?;
        }
        Command::Serve => {
            let db = Database::new(&config.storage.database_path).await?;
            job_pilot::start_web_server(db, config, cli.config).await?;
        }
        Command::Start => {
            let db = Database::new(&config.storage.database_path).await?;
            let analyzer = build_analyzer(&config)?;
            let report = pipeline::run_cycle(&db, &config, &analyzer).await?;
            info!(
                new = report.postings_new,
                queued = report.applications_created,
                "Initial cycle complete, starting dashboard"
            );
            job_pilot::start_web_server(db, config, cli.config).await?;
        }
        Command::Check => {
            command_check(&config, &cli.config).await?;
            println!("All checks passed.");
        }
        Command::ClearDb { yes } => {
            if !yes {
                anyhow::bail!("Refusing to clear the database without --yes");
            }
            let db = Database::new(&config.storage.database_path).await?;
            db.clear().await?;
            println!("Database cleared.");
        }
    }
    Ok(())
}
