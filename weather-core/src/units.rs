//! Temperature unit conversions.
//!
//! Everything that reaches the store is in degrees Celsius. The weather API
//! reports Kelvin and the city pages show either °C or °F.

use anyhow::{Context, Result};

const KELVIN_OFFSET: f64 = 273.15;

pub fn kelvin_to_celsius(kelvin: f64) -> f64 {
    kelvin - KELVIN_OFFSET
}

pub fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}

/// Unit suffix found on a displayed temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayUnit {
    Celsius,
    Fahrenheit,
}

impl DisplayUnit {
    pub fn suffix(&self) -> &'static str {
        match self {
            DisplayUnit::Celsius => "°C",
            DisplayUnit::Fahrenheit => "°F",
        }
    }

    /// Anything not marked °F is read as Celsius.
    pub fn detect(text: &str) -> Self {
        if text.contains(DisplayUnit::Fahrenheit.suffix()) {
            DisplayUnit::Fahrenheit
        } else {
            DisplayUnit::Celsius
        }
    }
}

/// Parse a temperature as shown on a page ("12 °C", "54°F", "7") into Celsius.
pub fn parse_displayed_temperature(text: &str) -> Result<f64> {
    let unit = DisplayUnit::detect(text);
    let number = text.replace(unit.suffix(), "");
    let value: f64 = number
        .trim()
        .parse()
        .with_context(|| format!("Displayed temperature is not a number: '{}'", text.trim()))?;

    Ok(match unit {
        DisplayUnit::Celsius => value,
        DisplayUnit::Fahrenheit => fahrenheit_to_celsius(value),
    })
}
