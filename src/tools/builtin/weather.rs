//! weather tool - current conditions from OpenWeatherMap

use async_trait::async_trait;
use log::debug;
use serde_json::{Map, Value};

use crate::config::ToolsConfig;
use crate::domain::ToolFailure;
use crate::tools::definition::{ParamKind, ParamSpec, ToolCategory, ToolSpec};
use crate::tools::registry::ToolHandler;

use super::{status_failure, str_arg};

/// Current weather for a location; registered only with an API key
pub struct WeatherTool {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
}

impl WeatherTool {
    pub fn new(client: reqwest::Client, config: &ToolsConfig, api_key: impl Into<String>) -> Self {
        Self {
            client,
            api_url: config.weather_api_url.clone(),
            api_key: api_key.into(),
        }
    }

    pub fn spec() -> ToolSpec {
        ToolSpec::new(
            "weather",
            ToolCategory::Knowledge,
            "Get current weather for a location: temperature, conditions, humidity and wind \
             speed. Format the location as 'City, Country' (e.g. 'London, UK').",
        )
        .with_param(ParamSpec::required("location", ParamKind::String, "City and country"))
    }
}

#[async_trait]
impl ToolHandler for WeatherTool {
    async fn call(&self, arguments: Map<String, Value>) -> Result<String, ToolFailure> {
        let location = str_arg(&arguments, "location")?.trim();
        if location.is_empty() {
            return Err(ToolFailure::invalid_arguments("'location' must not be empty"));
        }
        debug!("Getting weather for: {}", location);

        let response = self
            .client
            .get(&self.api_url)
            .query(&[("q", location), ("appid", self.api_key.as_str()), ("units", "metric")])
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(format!("Weather data not available for: {}", location));
        }
        if !response.status().is_success() {
            return Err(status_failure("OpenWeatherMap", response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ToolFailure::external(format!("Failed to parse weather response: {}", e)))?;

        Ok(format_weather(location, &body))
    }
}

fn format_weather(location: &str, body: &Value) -> String {
    let Some(temp) = body["main"]["temp"].as_f64() else {
        return format!("Weather data not available for: {}", location);
    };

    let place = match (body["name"].as_str(), body["sys"]["country"].as_str()) {
        (Some(name), Some(country)) if !name.is_empty() => format!("{}, {}", name, country),
        (Some(name), _) if !name.is_empty() => name.to_string(),
        _ => location.to_string(),
    };

    let mut lines = vec![format!("Weather in {}:", place)];
    if let Some(conditions) = body["weather"][0]["description"].as_str() {
        lines.push(format!("Conditions: {}", conditions));
    }
    match body["main"]["feels_like"].as_f64() {
        Some(feels) => lines.push(format!("Temperature: {:.1}°C (feels like {:.1}°C)", temp, feels)),
        None => lines.push(format!("Temperature: {:.1}°C", temp)),
    }
    if let Some(humidity) = body["main"]["humidity"].as_f64() {
        lines.push(format!("Humidity: {}%", humidity));
    }
    if let Some(speed) = body["wind"]["speed"].as_f64() {
        lines.push(format!("Wind: {:.1} m/s", speed));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_format_weather() {
        let body = json!({
            "name": "London",
            "sys": { "country": "GB" },
            "weather": [ { "main": "Rain", "description": "light rain" } ],
            "main": { "temp": 12.34, "feels_like": 11.0, "humidity": 81 },
            "wind": { "speed": 4.12 }
        });
        assert_eq!(
            format_weather("London, UK", &body),
            "Weather in London, GB:\nConditions: light rain\nTemperature: 12.3°C (feels like 11.0°C)\n\
             Humidity: 81%\nWind: 4.1 m/s"
        );
    }

    #[test]
    fn test_format_weather_sparse_body() {
        let body = json!({ "main": { "temp": -3 } });
        assert_eq!(format_weather("Oslo", &body), "Weather in Oslo:\nTemperature: -3.0°C");
    }

    #[test]
    fn test_format_weather_without_temperature() {
        assert_eq!(
            format_weather("Atlantis", &json!({ "cod": "404" })),
            "Weather data not available for: Atlantis"
        );
    }

    #[tokio::test]
    async fn test_empty_location_rejected() {
        let tool = WeatherTool::new(reqwest::Client::new(), &ToolsConfig::default(), "key");
        let args = json!({ "location": "  " }).as_object().unwrap().clone();
        let err = tool.call(args).await.unwrap_err();
        assert_eq!(err.kind, crate::domain::ToolFailureKind::InvalidArguments);
    }
}
