use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use tracing::info;

use shortener::cli::{Cli, Commands};
use shortener::config::AppConfig;
use shortener::deletion::{DeletionCoordinator, apply_fallback_log, read_fallback_log};
use shortener::errors::ShortenerError;
use shortener::storage::RepositoryFactory;
use shortener::system::{init_logging, shutdown_on, wait_for_signal};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<ShortenerError>() {
            Some(err) => eprintln!("{}", err.format_colored()),
            None => eprintln!("{} {:#}", "Error:".bold().red(), e),
        }
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // 生成配置不需要加载现有配置
    if cli.command() == &Commands::GenerateConfig {
        println!("{}", AppConfig::generate_sample_config());
        return Ok(());
    }

    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config))?;
    let _guard = init_logging(&config.logging).context("Failed to initialize logging")?;

    match cli.command() {
        Commands::Serve => serve(&config).await,
        Commands::Stats => {
            let repository = RepositoryFactory::create(&config.storage).await?;
            let stats = repository.stats().await?;
            println!("{} {}", "backend:".bold(), repository.backend_name());
            println!("{} {}", "users:".bold(), stats.users);
            println!("{} {}", "urls:".bold(), stats.urls);
            Ok(())
        }
        Commands::InspectFallback { path } => {
            let path = fallback_path(&config, path.as_deref());
            let batches = read_fallback_log(&path)?;
            if batches.is_empty() {
                println!("{} is empty or missing", path.display());
            }
            for batch in &batches {
                println!("{}", serde_json::to_string(batch)?);
            }
            Ok(())
        }
        Commands::ApplyFallback { path } => {
            let path = fallback_path(&config, path.as_deref());
            let repository = RepositoryFactory::create(&config.storage).await?;
            let applied = apply_fallback_log(repository.as_ref(), &path).await?;
            println!(
                "{} {} delete batches from {}",
                "Applied".green(),
                applied,
                path.display()
            );
            Ok(())
        }
        Commands::GenerateConfig => Ok(()),
    }
}

async fn serve(config: &AppConfig) -> Result<()> {
    let repository = RepositoryFactory::create(&config.storage)
        .await
        .context("Failed to initialize storage")?;
    repository
        .ping()
        .await
        .context("Storage is not reachable")?;

    let coordinator = DeletionCoordinator::start(repository, &config.deletion);
    info!("Shortener is running, press Ctrl+C to stop");

    let report = shutdown_on(&coordinator, wait_for_signal()).await?;
    if report.lost_batches > 0 {
        anyhow::bail!(
            "{} delete batches could not be written to {}",
            report.lost_batches,
            config.deletion.fallback_log_path
        );
    }
    Ok(())
}

fn fallback_path(config: &AppConfig, path: Option<&str>) -> PathBuf {
    PathBuf::from(path.unwrap_or(&config.deletion.fallback_log_path))
}
