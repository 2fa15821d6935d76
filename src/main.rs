mod config;
mod error;
mod manifest;
mod models;
mod seeder;
mod store;
mod validation;

use std::env;

use anyhow::{bail, Context, Result};
use clap::Parser;
use config::{Cli, Command, Config};
use dotenvy::dotenv;
use store::{MemoryStore, MongoStore};

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries the report, which `validate --json` keeps machine-readable
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    // flags alone are enough to run, so a missing .env is not fatal here
    if let Err(e) = dotenv() {
        tracing::debug!("No .env loaded: {}", e);
    }

    let cli = Cli::parse();
    let config = Config::from_sources(&cli, |key| env::var(key).ok())?;
    let manifest = config.manifest().context("Failed to load the seed manifest")?;

    match cli.command.unwrap_or_default() {
        Command::Validate { json } => {
            // dry run against an empty scratch store, not the target database
            let report = seeder::seed_all(&MemoryStore::new(), &manifest, config.options).await?;
            tracing::info!("Manifest is valid");
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report);
            }
        }
        Command::Seed => {
            let store = MongoStore::connect(config.database_url()?, &config.database_name)
                .await
                .context("Could not connect to the database; is DATABASE_URL right?")?;

            let result = seeder::seed_all(&store, &manifest, config.options).await;
            store.shutdown().await;

            let report = result.context("Seeding stopped partway; earlier collections were kept")?;
            tracing::info!(
                database = %config.database_name,
                strategy = ?config.options.strategy,
                inserted = report.inserted(),
                "Seeding finished"
            );
            print!("{}", report);
        }
        Command::Verify => {
            let store = MongoStore::connect(config.database_url()?, &config.database_name)
                .await
                .context("Could not connect to the database; is DATABASE_URL right?")?;

            let result = seeder::verify(&store, &manifest).await;
            store.shutdown().await;

            let report = result.context("Failed to read collections back")?;
            print!("{}", report);
            if !report.is_ok() {
                bail!("Database does not match the seed manifest!");
            }
        }
    }

    Ok(())
}
