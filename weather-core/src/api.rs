//! Thin client for the OpenWeatherMap current-weather endpoint.
//!
//! Requests hand back the raw [`reqwest::Response`]; decoding is up to the caller,
//! usually through [`CurrentConditions::from_response`].

use anyhow::{Context, Result, anyhow};
use reqwest::{Client, Response};
use serde::Deserialize;
use tracing::debug;

use crate::{Config, model::CurrentConditions};

pub const BASE_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    api_key: String,
    base_url: String,
    http: Client,
}

impl OpenWeatherClient {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            base_url: BASE_URL.to_string(),
            http: Client::new(),
        }
    }

    /// Build a client from config. Fails when no API key is configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.api_key().ok_or_else(|| {
            anyhow!(
                "No API key configured for the weather API.\n\
                 Hint: run `weather-audit configure` and enter your API key."
            )
        })?;

        let client = Self::new(api_key.to_owned());
        Ok(match &config.api.base_url {
            Some(url) => client.with_base_url(url.clone()),
            None => client,
        })
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Current weather by city name (`?q=`).
    pub async fn current_weather(&self, city: &str) -> Result<Response> {
        self.get("q", city).await
    }

    /// Current weather by OpenWeatherMap city id (`?id=`).
    pub async fn weather_by_city_id(&self, city_id: u32) -> Result<Response> {
        self.get("id", &city_id.to_string()).await
    }

    async fn get(&self, key: &str, value: &str) -> Result<Response> {
        debug!(url = %self.base_url, %key, %value, "Requesting current weather");

        self.http
            .get(&self.base_url)
            .query(&[(key, value), ("appid", self.api_key.as_str())])
            .send()
            .await
            .with_context(|| format!("Failed to send request to OpenWeather ({key}={value})"))
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    feels_like: f64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    main: OwMain,
}

impl CurrentConditions {
    /// Decode a current-weather response body. The HTTP status is not checked;
    /// an error payload simply fails to decode.
    pub async fn from_response(response: Response) -> Result<Self> {
        let body = response
            .text()
            .await
            .context("Failed to read OpenWeather current response body")?;
        Self::from_json(&body)
    }

    pub fn from_json(body: &str) -> Result<Self> {
        let parsed: OwCurrentResponse = serde_json::from_str(body).with_context(|| {
            format!("Failed to parse OpenWeather current JSON: {}", truncate_body(body))
        })?;

        Ok(Self {
            temp_k: parsed.main.temp,
            feels_like_k: parsed.main.feels_like,
        })
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_config_errors_when_missing_api_key() {
        let cfg = Config::default();
        let err = OpenWeatherClient::from_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("No API key configured"));
    }

    #[test]
    fn from_config_uses_base_url_override() {
        let mut cfg = Config::default();
        cfg.set_api_key("KEY".into());
        cfg.api.base_url = Some("http://localhost:9999/weather".into());

        let client = OpenWeatherClient::from_config(&cfg).unwrap();
        assert_eq!(client.base_url(), "http://localhost:9999/weather");
    }

    #[test]
    fn default_base_url() {
        let client = OpenWeatherClient::new("KEY".into());
        assert_eq!(client.base_url(), BASE_URL);
    }

    #[test]
    fn decodes_main_block() {
        let body = r#"{"name":"London","main":{"temp":288.15,"feels_like":287.15,"humidity":70}}"#;
        let c = CurrentConditions::from_json(body).unwrap();
        assert_eq!(c.temp_k, 288.15);
        assert_eq!(c.feels_like_k, 287.15);
    }

    #[test]
    fn error_payload_fails_to_decode() {
        let body = r#"{"cod":401,"message":"Invalid API key"}"#;
        let err = CurrentConditions::from_json(body).unwrap_err();
        assert!(err.to_string().contains("Invalid API key"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let long = "°".repeat(300);
        let out = truncate_body(&long);
        assert!(out.ends_with("..."));
        assert_eq!(out.chars().count(), 203);
    }
}
