use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use chrono::Local;
use clap::{Parser, Subcommand};
use inquire::Password;
use tracing::debug;
use weather_audit_core::{
    Config, OpenWeatherClient, PageTemperatureSource, Scenarios, WeatherStore,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "weather-audit",
    version,
    about = "Cross-check weather API readings against city pages and a local store"
)]
pub struct Cli {
    /// Config file; defaults to the platform config directory.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database file; overrides `[database] path` from the config.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// More log output (-v for debug, -vv for trace). `RUST_LOG` wins when set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeatherMap API key in the config file.
    Configure,

    /// Run every scenario for every city and print a report.
    Run,

    /// Fetch a city's current weather and store it as the current snapshot.
    Insert {
        city: String,

        /// Query the API by the city's numeric id instead of its name.
        #[arg(long)]
        by_id: bool,
    },

    /// Compare the API temperature with the city's weather page.
    Compare { city: String },

    /// Read only the temperature shown on the city's weather page.
    Scrape { city: String },

    /// Show the stored city with the highest average temperature.
    Highest,

    /// Append the current weather to the history log and list the log.
    History { city: String },
}

impl Cli {
    fn config_path(&self) -> anyhow::Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => Config::config_file_path(),
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let config_path = self.config_path()?;
        debug!(config = %config_path.display(), "Using config file");
        let db = self.db;

        match self.command {
            Command::Configure => configure(config_path)?,
            Command::Run => {
                let session = Session::open(&config_path, db)?;
                let report = session.scenarios().run_all().await;
                println!("{report}");
                if !report.passed() {
                    bail!("{} scenario(s) failed", report.failures().count());
                }
            }
            Command::Insert { city, by_id } => {
                let session = Session::open(&config_path, db)?;
                let scenarios = session.scenarios();
                let reading = if by_id {
                    scenarios.insert_by_id(&city).await?
                } else {
                    scenarios.insert_by_name(&city).await?
                };
                println!(
                    "{}: temp {:.2}°C, feels like {:.2}°C, avg {:.2}°C",
                    reading.city, reading.temperature, reading.feels_like, reading.avg_temp
                );
            }
            Command::Compare { city } => {
                let session = Session::open(&config_path, db)?;
                let check = session.scenarios().compare_api_vs_page(&city).await?;
                println!(
                    "{city} - API Temp: {:.2}°C, Website Temp: {:.2}°C, discrepancy {:.2}°C",
                    check.api_c, check.page_c, check.discrepancy
                );
            }
            Command::Scrape { city } => {
                let session = Session::open(&config_path, db)?;
                let temp = session.scenarios().resilient_page_read(&city).await?;
                println!("{city} website temperature: {temp:.2}°C");
            }
            Command::Highest => {
                let session = Session::open(&config_path, db)?;
                let top = session.scenarios().highest_average()?;
                println!(
                    "City with the highest average temperature: {} ({:.2}°C)",
                    top.city, top.avg_temp
                );
            }
            Command::History { city } => {
                let session = Session::open(&config_path, db)?;
                let latest = session.scenarios().store_history(&city).await?;
                for entry in session.store.history_for(&latest.city)? {
                    println!(
                        "{}  {}: temp {:.2}°C, feels like {:.2}°C",
                        entry.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"),
                        entry.city,
                        entry.temperature,
                        entry.feels_like
                    );
                }
            }
        }

        Ok(())
    }
}

/// Handles for one invocation, opened from the config file.
struct Session {
    config: Config,
    store: WeatherStore,
    client: OpenWeatherClient,
    page: PageTemperatureSource,
}

impl Session {
    fn open(config_path: &Path, db: Option<PathBuf>) -> anyhow::Result<Self> {
        let config = Config::load_from(config_path)?;
        let client = OpenWeatherClient::from_config(&config)?;
        let db_path = db.unwrap_or_else(|| config.database.path.clone());
        let store = WeatherStore::open(&db_path)?;

        Ok(Self { config, store, client, page: PageTemperatureSource::new() })
    }

    fn scenarios(&self) -> Scenarios<'_> {
        Scenarios::new(&self.client, &self.store, &self.page, self.config.tolerances)
    }
}

fn configure(path: PathBuf) -> anyhow::Result<()> {
    let mut config = Config::load_or_default(&path)?;

    let api_key = Password::new("OpenWeatherMap API key:")
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    config.set_api_key(api_key.trim().to_string());
    if config.api_key().is_none() {
        bail!("API key must not be empty");
    }

    config.save_to(&path)?;
    println!("Saved configuration to {}", path.display());
    Ok(())
}
