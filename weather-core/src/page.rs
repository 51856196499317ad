//! Reading the displayed temperature for a city from a public weather page.

use std::fmt::Debug;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, Url};
use scraper::{Html, Selector};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{model::find_city, units::parse_displayed_temperature};

/// CSS class of the element holding the current temperature.
pub const TEMPERATURE_CLASS: &str = "h2";

#[derive(Debug, Error)]
pub enum PageError {
    #[error("Unknown city '{0}'")]
    UnknownCity(String),

    #[error("Failed to fetch weather page for {city}")]
    Fetch {
        city: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Temperature element not found for {city}")]
    ElementNotFound { city: String },
}

/// Something that can show the current temperature for a city as text.
#[async_trait]
pub trait TemperatureSource: Send + Sync + Debug {
    /// Raw displayed text, e.g. `"12 °C"`.
    async fn displayed_temperature(&self, city: &str) -> Result<String, PageError>;
}

/// Fetches the city's timeanddate.com page and reads the `.h2` element.
#[derive(Debug, Clone)]
pub struct PageTemperatureSource {
    base_url: Option<String>,
    http: Client,
}

impl Default for PageTemperatureSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PageTemperatureSource {
    pub fn new() -> Self {
        Self { base_url: None, http: Client::new() }
    }

    /// Serve page paths from `base_url` instead of the real site.
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    pub fn page_url(&self, city: &str) -> Result<String, PageError> {
        let known = find_city(city).ok_or_else(|| PageError::UnknownCity(city.to_string()))?;

        match &self.base_url {
            None => Ok(known.page_url.to_string()),
            Some(base) => {
                let path = Url::parse(known.page_url)
                    .map(|u| u.path().to_string())
                    .map_err(|_| PageError::UnknownCity(city.to_string()))?;
                Ok(format!("{}{}", base.trim_end_matches('/'), path))
            }
        }
    }
}

#[async_trait]
impl TemperatureSource for PageTemperatureSource {
    async fn displayed_temperature(&self, city: &str) -> Result<String, PageError> {
        let url = self.page_url(city)?;
        debug!(%city, %url, "Fetching weather page");

        let fetch_err = |source: reqwest::Error| PageError::Fetch { city: city.to_string(), source };
        let body = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(fetch_err)?
            .text()
            .await
            .map_err(fetch_err)?;

        extract_temperature_text(&body)
            .ok_or_else(|| PageError::ElementNotFound { city: city.to_string() })
    }
}

/// Trimmed text of the first element with class [`TEMPERATURE_CLASS`].
pub fn extract_temperature_text(html: &str) -> Option<String> {
    let selector = Selector::parse(&format!(".{TEMPERATURE_CLASS}")).ok()?;
    let document = Html::parse_document(html);

    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
}

/// Read the page temperature for `city` in °C.
///
/// A page without the temperature element yields `Ok(None)`; other failures propagate.
pub async fn read_page_temperature(
    source: &dyn TemperatureSource,
    city: &str,
) -> Result<Option<f64>> {
    match source.displayed_temperature(city).await {
        Ok(text) => {
            let celsius = parse_displayed_temperature(&text)?;
            debug!(%city, %text, celsius, "Read page temperature");
            Ok(Some(celsius))
        }
        Err(PageError::ElementNotFound { city }) => {
            warn!(%city, "Temperature element not found");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Fixed(Result<&'static str, ()>);

    #[async_trait]
    impl TemperatureSource for Fixed {
        async fn displayed_temperature(&self, city: &str) -> Result<String, PageError> {
            self.0
                .map(str::to_string)
                .map_err(|_| PageError::ElementNotFound { city: city.to_string() })
        }
    }

    #[test]
    fn extracts_first_h2_text() {
        let html = r#"<html><body>
            <div id="qlook"><div class="h2">12&nbsp;°C</div></div>
            <div class="h2">99 °C</div>
        </body></html>"#;
        let text = extract_temperature_text(html).unwrap();
        assert!(text.starts_with("12"));
        assert!(text.ends_with("°C"));
        assert_eq!(parse_displayed_temperature(&text).unwrap(), 12.0);
    }

    #[test]
    fn extracts_text_from_nested_markup() {
        let html = r#"<div class="h2"> <span>54</span> °F </div>"#;
        assert_eq!(extract_temperature_text(html).as_deref(), Some("54 °F"));
    }

    #[test]
    fn missing_element_extracts_nothing() {
        assert!(extract_temperature_text("<h2>12 °C</h2>").is_none());
    }

    #[test]
    fn page_url_for_known_city() {
        let source = PageTemperatureSource::new();
        assert_eq!(
            source.page_url("tokyo").unwrap(),
            "https://www.timeanddate.com/weather/japan/tokyo"
        );
    }

    #[test]
    fn page_url_rebased() {
        let source = PageTemperatureSource::new().with_base_url("http://127.0.0.1:8080/".into());
        assert_eq!(source.page_url("Paris").unwrap(), "http://127.0.0.1:8080/weather/france/paris");
    }

    #[test]
    fn page_url_unknown_city() {
        let err = PageTemperatureSource::new().page_url("Atlantis").unwrap_err();
        assert!(matches!(err, PageError::UnknownCity(_)));
    }

    #[tokio::test]
    async fn fahrenheit_text_is_converted() {
        let temp = read_page_temperature(&Fixed(Ok("212 °F")), "London").await.unwrap();
        assert!((temp.unwrap() - 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn missing_element_becomes_none() {
        let temp = read_page_temperature(&Fixed(Err(())), "London").await.unwrap();
        assert!(temp.is_none());
    }

    #[tokio::test]
    async fn garbage_text_is_an_error() {
        assert!(read_page_temperature(&Fixed(Ok("--")), "London").await.is_err());
    }
}
