mod cli;
mod commands;
mod config;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use config::Config;
use tracing_subscriber::EnvFilter;
use wiki_core::WikiSystem;

const DEFAULT_LOG_LEVEL: &str = "info";

fn init_logging(cli: &Cli, config: &Config) {
    let level = cli
        .log_level
        .map(|l| l.as_str().to_string())
        .or_else(|| config.log_level.clone())
        .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Logs go to stderr so --json output stays parseable.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref(), cli.data_directory.clone())?;
    init_logging(&cli, &config);

    let data_dir = config.data_directory()?;
    let system = WikiSystem::open(data_dir, config.system.clone())
        .with_context(|| format!("Failed to open data directory {}", data_dir.display()))?;

    let json = cli.json;
    match cli.command {
        Commands::Create { title, page } => commands::page::create(&system, title, page, json).await?,
        Commands::Update { id, title, page } => {
            commands::page::update(&system, id, title, page, json).await?
        }
        Commands::Show { id } => commands::page::show(&system, id, json).await?,
        Commands::Neighbors { id } => commands::links::neighbors(&system, id, json).await?,
        Commands::Backlinks { target } => commands::links::backlinks(&system, target, json).await?,
        Commands::List { page_type } => commands::catalog::list(&system, page_type, json).await?,
        Commands::Recent { pinned } => commands::catalog::recent(&system, pinned, json).await?,
        Commands::Count => commands::catalog::count(&system, json).await?,
        Commands::Tag { slug } => commands::catalog::tag(&system, slug, json).await?,
        Commands::Category { slug } => commands::catalog::category(&system, slug, json).await?,
        Commands::Search { query, limit } => {
            commands::search::execute(&system, query, limit, json).await?
        }
    }

    Ok(())
}
