//! Current weather lookup

use super::{Tool, ToolOutcome};
use crate::state::Artifact;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

pub const WEATHER_TOOL_NAME: &str = "get_weather";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemperatureUnit {
    #[default]
    Fahrenheit,
    Celsius,
}

impl TemperatureUnit {
    pub fn symbol(self) -> char {
        match self {
            TemperatureUnit::Fahrenheit => 'F',
            TemperatureUnit::Celsius => 'C',
        }
    }

    /// Convert a temperature expressed in `from` into this unit
    pub fn convert(self, value: f64, from: TemperatureUnit) -> f64 {
        match (from, self) {
            (TemperatureUnit::Fahrenheit, TemperatureUnit::Celsius) => (value - 32.0) * 5.0 / 9.0,
            (TemperatureUnit::Celsius, TemperatureUnit::Fahrenheit) => value * 9.0 / 5.0 + 32.0,
            _ => value,
        }
    }
}

impl FromStr for TemperatureUnit {
    type Err = WeatherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fahrenheit" | "f" => Ok(TemperatureUnit::Fahrenheit),
            "celsius" | "c" => Ok(TemperatureUnit::Celsius),
            other => Err(WeatherError::UnsupportedUnit(other.to_string())),
        }
    }
}

impl fmt::Display for TemperatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemperatureUnit::Fahrenheit => f.write_str("fahrenheit"),
            TemperatureUnit::Celsius => f.write_str("celsius"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    pub temperature: f64,
    pub unit: TemperatureUnit,
    pub conditions: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WeatherError {
    #[error("unsupported unit '{0}', expected 'fahrenheit' or 'celsius'")]
    UnsupportedUnit(String),
}

/// Weather backend
#[async_trait]
pub trait WeatherProvider: Send + Sync {
    async fn fetch(
        &self,
        location: &str,
        unit: TemperatureUnit,
    ) -> Result<WeatherReport, WeatherError>;
}

/// Fixed report used when no weather service is configured: 72°F and sunny
pub struct PlaceholderWeather;

impl PlaceholderWeather {
    const TEMPERATURE_F: f64 = 72.0;
}

#[async_trait]
impl WeatherProvider for PlaceholderWeather {
    async fn fetch(
        &self,
        _location: &str,
        unit: TemperatureUnit,
    ) -> Result<WeatherReport, WeatherError> {
        Ok(WeatherReport {
            temperature: unit.convert(Self::TEMPERATURE_F, TemperatureUnit::Fahrenheit),
            unit,
            conditions: "sunny".to_string(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct WeatherInput {
    location: String,
    #[serde(default)]
    unit: Option<String>,
}

pub struct WeatherTool {
    provider: Arc<dyn WeatherProvider>,
}

impl WeatherTool {
    pub fn new(provider: Arc<dyn WeatherProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Tool for WeatherTool {
    fn name(&self) -> &'static str {
        WEATHER_TOOL_NAME
    }

    fn description(&self) -> String {
        "Get the current weather for a location.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["location"],
            "properties": {
                "location": {
                    "type": "string",
                    "description": "City or place name, e.g. \"Boston\""
                },
                "unit": {
                    "type": "string",
                    "enum": ["fahrenheit", "celsius"],
                    "default": "fahrenheit"
                }
            }
        })
    }

    async fn invoke(&self, input: Value) -> ToolOutcome {
        let input: WeatherInput = match serde_json::from_value(input) {
            Ok(i) => i,
            Err(e) => return ToolOutcome::failure(format!("Invalid input: {e}")),
        };
        let location = input.location.trim();
        if location.is_empty() {
            return ToolOutcome::failure("location must not be empty");
        }
        let unit = match input.unit.as_deref().map(str::parse::<TemperatureUnit>).transpose() {
            Ok(unit) => unit.unwrap_or_default(),
            Err(e) => return ToolOutcome::failure(e.to_string()),
        };

        match self.provider.fetch(location, unit).await {
            Ok(report) => ToolOutcome::with_artifact(
                format!(
                    "The current weather in {location} is {:.0}°{}",
                    report.temperature,
                    report.unit.symbol()
                ),
                Artifact::Text(format!("Conditions: {}", report.conditions)),
            ),
            Err(e) => {
                tracing::warn!(location, error = %e, "Weather lookup failed");
                ToolOutcome::failure(format!("weather lookup failed for '{location}': {e}"))
            }
        }
    }
}
