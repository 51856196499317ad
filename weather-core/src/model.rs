use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::units::kelvin_to_celsius;

/// Latest stored reading for a city, all values in °C.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    pub city: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub avg_temp: f64,
}

impl WeatherReading {
    pub fn new(city: impl Into<String>, temperature: f64, feels_like: f64) -> Self {
        Self {
            city: city.into(),
            temperature,
            feels_like,
            avg_temp: average(temperature, feels_like),
        }
    }
}

pub fn average(temperature: f64, feels_like: f64) -> f64 {
    (temperature + feels_like) / 2.0
}

/// One row of the append-only history log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherHistoryEntry {
    pub city: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighestAverage {
    pub city: String,
    pub avg_temp: f64,
}

/// A city covered by the audit, with its OpenWeatherMap id and reference page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct City {
    pub name: &'static str,
    pub id: u32,
    pub page_url: &'static str,
}

pub const CITIES: [City; 5] = [
    City {
        name: "London",
        id: 2643743,
        page_url: "https://www.timeanddate.com/weather/uk/london",
    },
    City {
        name: "New York",
        id: 5128581,
        page_url: "https://www.timeanddate.com/weather/usa/new-york",
    },
    City {
        name: "Tokyo",
        id: 1850147,
        page_url: "https://www.timeanddate.com/weather/japan/tokyo",
    },
    City {
        name: "Paris",
        id: 2988507,
        page_url: "https://www.timeanddate.com/weather/france/paris",
    },
    City {
        name: "Berlin",
        id: 2950159,
        page_url: "https://www.timeanddate.com/weather/germany/berlin",
    },
];

/// Case-insensitive lookup in [`CITIES`].
pub fn find_city(name: &str) -> Option<&'static City> {
    CITIES.iter().find(|c| c.name.eq_ignore_ascii_case(name.trim()))
}

/// The part of the current-weather payload the audit reads. Kelvin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrentConditions {
    pub temp_k: f64,
    pub feels_like_k: f64,
}

impl CurrentConditions {
    pub fn temperature_celsius(&self) -> f64 {
        kelvin_to_celsius(self.temp_k)
    }

    pub fn feels_like_celsius(&self) -> f64 {
        kelvin_to_celsius(self.feels_like_k)
    }
}
