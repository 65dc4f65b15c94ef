use serde::{Deserialize, Serialize};

use crate::options::ParsedOptions;

/// Subtracted from Kelvin readings to get degrees Celsius (approximation of 273.15).
pub const KELVIN_OFFSET: f64 = 273.0;

pub const COUNTRY_CODE: &str = "country_code";
pub const CITY_NAME: &str = "city_name";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Temperature,
    MinTemperature,
    MaxTemperature,
    FeelsLike,
    Pressure,
    Humidity,
}

/// Static description of one displayable metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricInfo {
    pub metric: Metric,
    /// Long name of the CLI flag selecting this metric.
    pub option: &'static str,
    pub short: char,
    pub description: &'static str,
    pub label: &'static str,
    /// Key under `main` in the OpenWeatherMap response.
    pub json_key: &'static str,
    pub unit: &'static str,
    pub kelvin: bool,
}

impl MetricInfo {
    /// The `"name,x"` declaration for the option parser.
    pub fn declaration(&self) -> String {
        format!("{},{}", self.option, self.short)
    }

    /// Converts a raw API reading into the value that gets printed.
    pub fn display_value(&self, raw: f64) -> f64 {
        if self.kelvin { raw - KELVIN_OFFSET } else { raw }
    }
}

/// Every metric, in the order its line is printed.
pub const METRICS: [MetricInfo; 6] = [
    MetricInfo {
        metric: Metric::Temperature,
        option: "temperature",
        short: 't',
        description: "displays the temperature",
        label: "TEMPERATURE",
        json_key: "temp",
        unit: " °C",
        kelvin: true,
    },
    MetricInfo {
        metric: Metric::MinTemperature,
        option: "min_temperature",
        short: 'l',
        description: "displays the minimum temperature",
        label: "MINIMUM TEMPERATURE",
        json_key: "temp_min",
        unit: " °C",
        kelvin: true,
    },
    MetricInfo {
        metric: Metric::MaxTemperature,
        option: "max_temperature",
        short: 'h',
        description: "displays the maximum temperature",
        label: "MAXIMUM TEMPERATURE",
        json_key: "temp_max",
        unit: " °C",
        kelvin: true,
    },
    MetricInfo {
        metric: Metric::FeelsLike,
        option: "feels_like",
        short: 'f',
        description: "displays the temperature it feels like",
        label: "FEELS LIKE",
        json_key: "feels_like",
        unit: " °C",
        kelvin: true,
    },
    MetricInfo {
        metric: Metric::Pressure,
        option: "pressure",
        short: 'p',
        description: "displays the atmospheric pressure",
        label: "PRESSURE",
        json_key: "pressure",
        unit: " hPa",
        kelvin: false,
    },
    MetricInfo {
        metric: Metric::Humidity,
        option: "humidity",
        short: 'v',
        description: "displays the relative humidity",
        label: "HUMIDITY",
        json_key: "humidity",
        unit: "%",
        kelvin: false,
    },
];

impl Metric {
    pub fn info(&self) -> &'static MetricInfo {
        let index = match self {
            Metric::Temperature => 0,
            Metric::MinTemperature => 1,
            Metric::MaxTemperature => 2,
            Metric::FeelsLike => 3,
            Metric::Pressure => 4,
            Metric::Humidity => 5,
        };
        &METRICS[index]
    }
}

/// Whether a metric should be printed, and where to find it in the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSelector {
    pub metric: Metric,
    pub selected: bool,
    pub json_key: &'static str,
}

impl FieldSelector {
    /// Dotted path of the field in the response tree, e.g. `main.temp`.
    pub fn path(&self) -> String {
        format!("main.{}", self.json_key)
    }
}

/// One selector per metric, in print order, selected when its flag was given.
pub fn build_field_selectors(parsed: &ParsedOptions) -> Vec<FieldSelector> {
    METRICS
        .iter()
        .map(|info| FieldSelector {
            metric: info.metric,
            selected: parsed.flag(info.option).unwrap_or(false),
            json_key: info.json_key,
        })
        .collect()
}

/// Where to ask the weather for. Empty strings mean "not provided".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryTarget {
    pub country_code: String,
    pub city_name: String,
}

impl QueryTarget {
    pub fn new(country_code: impl Into<String>, city_name: impl Into<String>) -> Self {
        Self {
            country_code: country_code.into(),
            city_name: city_name.into(),
        }
    }

    pub fn from_options(parsed: &ParsedOptions) -> Self {
        Self::new(
            parsed.string(COUNTRY_CODE).unwrap_or_default(),
            parsed.string(CITY_NAME).unwrap_or_default(),
        )
    }

    pub fn country_label(&self) -> &str {
        if self.country_code.is_empty() {
            "NO COUNTRY CODE PROVIDED"
        } else {
            &self.country_code
        }
    }

    pub fn city_label(&self) -> &str {
        if self.city_name.is_empty() {
            "NO CITY NAME PROVIDED"
        } else {
            &self.city_name
        }
    }
}
