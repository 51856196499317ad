//! Core library for the `weather-audit` tool.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - A thin client for the OpenWeatherMap current-weather endpoint
//! - SQLite persistence for current and historical readings
//! - Reading the displayed temperature from a city's weather page
//! - Unit conversion, tolerance checks and the audit scenarios built on them
//!
//! It is used by `weather-audit-cli`, and the scenarios are also driven directly
//! from the integration tests.

pub mod api;
pub mod compare;
pub mod config;
pub mod model;
pub mod page;
pub mod scenario;
pub mod store;
pub mod units;

pub use api::OpenWeatherClient;
pub use compare::{DiscrepancyCheck, Tolerances};
pub use config::Config;
pub use model::{CITIES, City, CurrentConditions, HighestAverage, WeatherHistoryEntry, WeatherReading};
pub use page::{PageError, PageTemperatureSource, TemperatureSource};
pub use scenario::{Report, ScenarioError, Scenarios};
pub use store::WeatherStore;
