//! End-to-end audit scenarios over the API, the city pages and the store.
//!
//! Each scenario either returns what it observed or a [`ScenarioError`]
//! describing why the check failed. [`Scenarios::run_all`] runs the full
//! suite and keeps going past failures.

use std::fmt;

use thiserror::Error;
use tracing::{info, warn};

use crate::{
    api::OpenWeatherClient,
    compare::{DiscrepancyCheck, Tolerances, approx_eq, check_discrepancy},
    model::{CITIES, City, CurrentConditions, HighestAverage, WeatherHistoryEntry, WeatherReading, find_city},
    page::{TemperatureSource, read_page_temperature},
    store::WeatherStore,
};

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Unknown city '{0}'")]
    UnknownCity(String),

    #[error("{city}: reading was not stored")]
    NotStored { city: String },

    #[error("{city}: stored {field} {stored} differs from source value {expected}")]
    Mismatch {
        city: String,
        field: &'static str,
        stored: f64,
        expected: f64,
    },

    #[error("{city}: Failed to extract temperature from site")]
    ExtractionFailed { city: String },

    #[error(
        "{city} temperature discrepancy too high: {:.2}°C (API {:.2}°C, website {:.2}°C, limit {:.2}°C)",
        .check.discrepancy, .check.api_c, .check.page_c, .check.threshold
    )]
    Discrepancy { city: String, check: DiscrepancyCheck },

    #[error("No readings stored; cannot pick highest average temperature")]
    EmptyStore,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Borrowed handles a scenario run works against.
#[derive(Debug)]
pub struct Scenarios<'a> {
    client: &'a OpenWeatherClient,
    store: &'a WeatherStore,
    page: &'a dyn TemperatureSource,
    tolerances: Tolerances,
}

impl<'a> Scenarios<'a> {
    pub fn new(
        client: &'a OpenWeatherClient,
        store: &'a WeatherStore,
        page: &'a dyn TemperatureSource,
        tolerances: Tolerances,
    ) -> Self {
        Self { client, store, page, tolerances }
    }

    /// Fetch by city name, store the °C reading and check it reads back unchanged.
    pub async fn insert_by_name(&self, city: &str) -> Result<WeatherReading, ScenarioError> {
        let known = resolve(city)?;

        let response = self.client.current_weather(known.name).await?;
        let conditions = CurrentConditions::from_response(response).await?;
        info!(
            city = known.name,
            temp = conditions.temperature_celsius(),
            feels_like = conditions.feels_like_celsius(),
            "API reading"
        );
        self.store_and_verify(known.name, &conditions)
    }

    /// Same as [`Self::insert_by_name`] but queries the API by numeric city id.
    pub async fn insert_by_id(&self, city: &str) -> Result<WeatherReading, ScenarioError> {
        let known = resolve(city)?;

        let response = self.client.weather_by_city_id(known.id).await?;
        let conditions = CurrentConditions::from_response(response).await?;
        info!(
            city = known.name,
            id = known.id,
            temp = conditions.temperature_celsius(),
            feels_like = conditions.feels_like_celsius(),
            "API reading by id"
        );
        self.store_and_verify(known.name, &conditions)
    }

    fn store_and_verify(
        &self,
        city: &str,
        conditions: &CurrentConditions,
    ) -> Result<WeatherReading, ScenarioError> {
        let temperature = conditions.temperature_celsius();
        let feels_like = conditions.feels_like_celsius();

        self.store.upsert_current(city, temperature, feels_like)?;

        let stored = self
            .store
            .read_current(city)?
            .ok_or_else(|| ScenarioError::NotStored { city: city.to_string() })?;

        self.expect_close(city, "temperature", stored.temperature, temperature)?;
        self.expect_close(city, "feels_like", stored.feels_like, feels_like)?;
        Ok(stored)
    }

    fn expect_close(
        &self,
        city: &str,
        field: &'static str,
        stored: f64,
        expected: f64,
    ) -> Result<(), ScenarioError> {
        if approx_eq(stored, expected, self.tolerances.relative) {
            Ok(())
        } else {
            Err(ScenarioError::Mismatch { city: city.to_string(), field, stored, expected })
        }
    }

    pub fn highest_average(&self) -> Result<HighestAverage, ScenarioError> {
        let top = self.store.highest_average_city()?.ok_or(ScenarioError::EmptyStore)?;
        info!(city = %top.city, avg_temp = top.avg_temp, "Highest average temperature");
        Ok(top)
    }

    /// Compare the API temperature with the one shown on the city's page.
    pub async fn compare_api_vs_page(&self, city: &str) -> Result<DiscrepancyCheck, ScenarioError> {
        let city = resolve(city)?.name;

        let response = self.client.current_weather(city).await?;
        let api_c = CurrentConditions::from_response(response).await?.temperature_celsius();

        let page_c = read_page_temperature(self.page, city)
            .await?
            .ok_or_else(|| ScenarioError::ExtractionFailed { city: city.to_string() })?;

        let check = check_discrepancy(api_c, page_c, self.tolerances.discrepancy_c);
        info!(%city, api_c, page_c, discrepancy = check.discrepancy, "Compared API and website");

        if check.passed() {
            Ok(check)
        } else {
            Err(ScenarioError::Discrepancy { city: city.to_string(), check })
        }
    }

    /// Read the page temperature alone; a missing element fails the check without aborting.
    pub async fn resilient_page_read(&self, city: &str) -> Result<f64, ScenarioError> {
        let city = resolve(city)?.name;

        let temp = read_page_temperature(self.page, city)
            .await?
            .ok_or_else(|| ScenarioError::ExtractionFailed { city: city.to_string() })?;
        info!(%city, temp, "Website temperature");
        Ok(temp)
    }

    /// Fetch the current weather and append it to the history log.
    pub async fn store_history(&self, city: &str) -> Result<WeatherHistoryEntry, ScenarioError> {
        let city = resolve(city)?.name;

        let response = self.client.current_weather(city).await?;
        let conditions = CurrentConditions::from_response(response).await?;

        let entry = self.store.append_history(
            city,
            conditions.temperature_celsius(),
            conditions.feels_like_celsius(),
        )?;
        info!(%city, temp = entry.temperature, feels_like = entry.feels_like, "Stored history entry");
        Ok(entry)
    }

    /// Run every scenario for every known city, in order.
    ///
    /// The snapshot table is cleared first so the highest-average check only
    /// sees readings from this run.
    pub async fn run_all(&self) -> Report {
        let mut report = Report::default();

        if let Err(e) = self.store.clear_current() {
            report.record("clear_current", None, Err::<String, _>(ScenarioError::Other(e)));
        }

        for city in CITIES.iter().map(|c| c.name) {
            let outcome = self.insert_by_name(city).await.map(|r| describe_reading(&r));
            report.record("insert_by_name", Some(city), outcome);
        }

        for city in CITIES.iter().map(|c| c.name) {
            let outcome = self.insert_by_id(city).await.map(|r| describe_reading(&r));
            report.record("insert_by_id", Some(city), outcome);
        }

        let outcome = self
            .highest_average()
            .map(|top| format!("{} ({:.2}°C)", top.city, top.avg_temp));
        report.record("highest_average", None, outcome);

        let first = CITIES[0].name;
        let outcome = self.resilient_page_read(first).await.map(|t| format!("{t:.2}°C"));
        report.record("resilient_page_read", Some(first), outcome);

        for city in CITIES.iter().map(|c| c.name) {
            let outcome = self.compare_api_vs_page(city).await.map(|c| {
                format!(
                    "API {:.2}°C, website {:.2}°C, discrepancy {:.2}°C",
                    c.api_c, c.page_c, c.discrepancy
                )
            });
            report.record("compare_api_vs_page", Some(city), outcome);
        }

        let outcome = self.store_history(first).await.map(|e| {
            format!("{:.2}°C / {:.2}°C at {}", e.temperature, e.feels_like, e.timestamp)
        });
        report.record("store_history", Some(first), outcome);

        report
    }
}

/// Known city for `name`, so every table row uses the same spelling.
fn resolve(name: &str) -> Result<&'static City, ScenarioError> {
    find_city(name).ok_or_else(|| ScenarioError::UnknownCity(name.trim().to_string()))
}

fn describe_reading(r: &WeatherReading) -> String {
    format!(
        "temp {:.2}°C, feels like {:.2}°C, avg {:.2}°C",
        r.temperature, r.feels_like, r.avg_temp
    )
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioResult {
    pub scenario: &'static str,
    pub city: Option<String>,
    pub passed: bool,
    pub detail: String,
}

impl fmt::Display for ScenarioResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.passed { "PASS" } else { "FAIL" };
        match &self.city {
            Some(city) => write!(f, "{status} {}[{city}]: {}", self.scenario, self.detail),
            None => write!(f, "{status} {}: {}", self.scenario, self.detail),
        }
    }
}

/// Collected results of a scenario run.
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub results: Vec<ScenarioResult>,
}

impl Report {
    pub fn record<T: fmt::Display>(
        &mut self,
        scenario: &'static str,
        city: Option<&str>,
        outcome: Result<T, ScenarioError>,
    ) {
        let (passed, detail) = match outcome {
            Ok(v) => (true, v.to_string()),
            Err(e) => (false, format!("{e:#}")),
        };

        if passed {
            info!(scenario, city = ?city, %detail, "Scenario passed");
        } else {
            warn!(scenario, city = ?city, %detail, "Scenario failed");
        }

        self.results.push(ScenarioResult {
            scenario,
            city: city.map(str::to_string),
            passed,
            detail,
        });
    }

    pub fn passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ScenarioResult> {
        self.results.iter().filter(|r| !r.passed)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for r in &self.results {
            writeln!(f, "{r}")?;
        }
        let failed = self.failures().count();
        write!(f, "{} passed, {} failed", self.results.len() - failed, failed)
    }
}
