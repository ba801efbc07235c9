use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Instant;
use tidemark::config::AppConfig;
use tidemark::engine;
use tidemark::migration::ScriptOutcome;

#[derive(Parser)]
#[command(name = "tidemark", about = "Templated SQL migration runner")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "tidemark.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new migration script
    Add {
        /// Human readable name, turned into the file name
        name: String,
        /// File whose content becomes the script body
        seed_file: Option<PathBuf>,
    },
    /// Apply every pending migration
    Start,
}

#[tokio::main]
async fn main() -> Result<()> {
    let now = Instant::now();
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = AppConfig::load(&cli.config)?;
    tracing::info!("Configuration '{}' loaded successfully", cli.config.display());

    match cli.command {
        Command::Add { name, seed_file } => {
            let content = match seed_file {
                Some(path) => tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("Failed to read seed file '{}'", path.display()))?,
                None => String::new(),
            };

            let identifier = engine::add_migration(&config, &name, &content).await?;
            println!("{}", identifier);
        }
        Command::Start => {
            config.validate()?;
            tracing::info!("Using the {} backend", engine::backend_name(&config)?);

            let report = engine::start_migration(&config).await?;
            for (identifier, outcome) in &report.migrations.outcomes {
                let label = match outcome {
                    ScriptOutcome::Applied => "applied",
                    ScriptOutcome::Skipped => "skipped",
                };
                println!("{:<8} {}", label, identifier);
            }
            println!(
                "{} applied, {} skipped in {}ms",
                report.migrations.applied().len(),
                report.migrations.skipped().len(),
                now.elapsed().as_millis()
            );
        }
    }

    Ok(())
}
