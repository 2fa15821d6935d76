use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use secrecy::SecretString;

use crate::{
    manifest::Manifest,
    seeder::{SeedOptions, SeedStrategy},
    validation::WindowPolicy,
};

/// The bot reads everything from the `data` database.
pub const DEFAULT_DATABASE_NAME: &str = "data";

/// Seeds the Pi-Bot database with its initial censor list, events,
/// invitationals and settings.
#[derive(Debug, Parser)]
#[command(name = "pibot-seed", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// database to seed [env: DATABASE_NAME, default: data]
    #[arg(long, global = true)]
    pub database: Option<String>,

    /// how to treat collections that already hold documents [env: SEED_STRATEGY]
    #[arg(long, value_enum, global = true)]
    pub strategy: Option<SeedStrategy>,

    /// whether closed_days < open_days fails validation [env: SEED_WINDOW_POLICY]
    #[arg(long, value_enum, global = true)]
    pub window_policy: Option<WindowPolicy>,

    /// JSON manifest to seed instead of the built-in one [env: SEED_MANIFEST]
    #[arg(long, global = true)]
    pub manifest: Option<PathBuf>,

    /// overrides settings.invitational_season [env: SEED_INVITATIONAL_SEASON]
    #[arg(long, global = true)]
    pub season: Option<i32>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Write the manifest to the database
    #[default]
    Seed,
    /// Check the manifest without connecting. The report shows what a seed
    /// would write into an empty database, not into the configured one
    Validate {
        /// print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Compare the database against the manifest
    Verify,
}

pub struct Config {
    pub database_url: Option<SecretString>,
    pub database_name: String,
    pub options: SeedOptions,
    pub manifest_path: Option<PathBuf>,
    pub season: Option<i32>,
}

fn parse_enum<T: ValueEnum>(key: &str, value: &str) -> Result<T> {
    <T as ValueEnum>::from_str(value, true)
        .map_err(|e| anyhow::anyhow!("Invalid value for {}: {}", key, e))
}

impl Config {
    /// Flags win over the environment, the environment wins over defaults.
    pub fn from_sources(cli: &Cli, env: impl Fn(&str) -> Option<String>) -> Result<Config> {
        let strategy = match (cli.strategy, env("SEED_STRATEGY")) {
            (Some(strategy), _) => strategy,
            (None, Some(value)) => parse_enum("SEED_STRATEGY", &value)?,
            (None, None) => SeedStrategy::default(),
        };

        let window_policy = match (cli.window_policy, env("SEED_WINDOW_POLICY")) {
            (Some(policy), _) => policy,
            (None, Some(value)) => parse_enum("SEED_WINDOW_POLICY", &value)?,
            (None, None) => WindowPolicy::default(),
        };

        let season = match (cli.season, env("SEED_INVITATIONAL_SEASON")) {
            (Some(season), _) => Some(season),
            (None, Some(value)) => Some(
                value
                    .parse::<i32>()
                    .with_context(|| format!("{} is not a valid season year!", value))?,
            ),
            (None, None) => None,
        };

        Ok(Config {
            database_url: env("DATABASE_URL").map(SecretString::new),
            database_name: cli
                .database
                .clone()
                .or_else(|| env("DATABASE_NAME"))
                .unwrap_or_else(|| DEFAULT_DATABASE_NAME.to_string()),
            options: SeedOptions {
                strategy,
                window_policy,
            },
            manifest_path: cli
                .manifest
                .clone()
                .or_else(|| env("SEED_MANIFEST").map(PathBuf::from)),
            season,
        })
    }

    pub fn database_url(&self) -> Result<&SecretString> {
        self.database_url
            .as_ref()
            .context("Could not find DATABASE_URL; did you specify it in .env?")
    }

    pub fn manifest(&self) -> Result<Manifest> {
        let mut manifest = match &self.manifest_path {
            Some(path) => Manifest::from_file(path)?,
            None => Manifest::builtin(),
        };

        if let Some(season) = self.season {
            manifest.settings.invitational_season = season;
        }

        Ok(manifest)
    }
}
