//! Biometeorology weather client
//!
//! This module fetches current conditions for the configured region from
//! Bright Sky or the DWD biometeorology feeds and maps them to a
//! [`WeatherReport`].

use chrono::NaiveDate;
use thiserror::Error;

use super::{Stress, StressLevel};
use crate::config::RegionConfig;
use crate::metrics::{classify_stress, round_to};
use crate::source::{fields, normalize_stress, read_payload, ProbeError, Prober, Record};

/// Humidity assumed when classifying stress from temperature alone
const DEFAULT_HUMIDITY_PCT: f64 = 65.0;

/// Temperature assumed for an observation that reports no temperature
const DEFAULT_TEMPERATURE_C: f64 = 15.0;

/// Description used when the upstream gives neither a text nor a condition
const DEFAULT_DESCRIPTION: &str =
    "Die biometeorologischen Bedingungen sind für die meisten Menschen als angenehm zu bezeichnen.";

/// Errors that can occur when fetching weather data
#[derive(Debug, Error)]
pub enum WeatherError {
    /// No candidate endpoint produced a usable record
    #[error("Weather data unavailable: {0}")]
    Unavailable(#[from] ProbeError),
}

/// Current biometeorological conditions for one region
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    pub date: NaiveDate,
    pub stress: Stress,
    pub description: String,
    pub warning: Option<String>,
    /// Air temperature in °C, rounded to 0.1
    pub temperature_c: Option<f64>,
    /// Relative humidity in %, rounded to an integer
    pub humidity_pct: Option<f64>,
    /// Sunshine duration in minutes, feeds the UV estimate
    pub sunshine_minutes: Option<f64>,
}

impl WeatherReport {
    /// Map an extracted region record to a report
    ///
    /// # Arguments
    /// * `record` - Region record from any weather feed
    /// * `region` - Region the report is for
    /// * `reference_date` - Used when the record carries no parsable date
    ///
    /// # Returns
    /// * `Some(WeatherReport)` - If the record holds at least one weather field
    /// * `None` - If nothing in the record is usable
    pub fn from_record(record: &Record<'_>, region: &RegionConfig, reference_date: NaiveDate) -> Option<Self> {
        let raw_stress = record.text(&fields::STRESS);
        let feeling = record.text(&fields::FEELING);
        let description = record.text(&fields::DESCRIPTION);
        let condition = record.text(&fields::CONDITION);
        let warning = record.text(&fields::WARNING);
        let temperature_c = record.number(&fields::TEMPERATURE);
        let humidity_pct = record.number(&fields::HUMIDITY);

        let usable = raw_stress.is_some()
            || feeling.is_some()
            || description.is_some()
            || condition.is_some()
            || warning.is_some()
            || temperature_c.is_some()
            || humidity_pct.is_some();
        if !usable {
            return None;
        }

        let stress = match (raw_stress, temperature_c) {
            (Some(raw), _) => {
                let level = normalize_stress(&raw);
                Stress {
                    level,
                    feeling: feeling.unwrap_or_else(|| level.default_feeling().to_string()),
                }
            }
            (None, Some(temp)) => classify_stress(temp, humidity_pct.unwrap_or(DEFAULT_HUMIDITY_PCT)),
            (None, None) => match feeling {
                Some(feeling) => Stress {
                    level: StressLevel::Moderate,
                    feeling,
                },
                // Observation feeds (condition or humidity) are classified anyway
                None if condition.is_some() || humidity_pct.is_some() => classify_stress(
                    DEFAULT_TEMPERATURE_C,
                    humidity_pct.unwrap_or(DEFAULT_HUMIDITY_PCT),
                ),
                None => Stress::of(StressLevel::Moderate),
            },
        };

        let description = description
            .or_else(|| {
                condition.map(|c| {
                    format!(
                        "Aktuelle Wetterbedingungen in {}: {}. Die biometeorologischen Bedingungen basieren auf DWD-Daten über Bright Sky API.",
                        region.name, c
                    )
                })
            })
            .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string());

        Some(Self {
            date: record.date().unwrap_or(reference_date),
            stress,
            description,
            warning,
            temperature_c: temperature_c.map(|t| round_to(t, 1)),
            humidity_pct: humidity_pct.map(|h| round_to(h, 0)),
            sunshine_minutes: record.number(&fields::SUNSHINE),
        })
    }
}

/// Client for the weather pipeline
#[derive(Debug, Clone)]
pub struct WeatherClient {
    prober: Prober,
    region: RegionConfig,
    endpoints: Vec<String>,
}

impl WeatherClient {
    /// Create a new WeatherClient
    ///
    /// `endpoints` may contain `{lat}`, `{lon}` and `{date}` placeholders.
    pub fn new(prober: Prober, region: RegionConfig, endpoints: Vec<String>) -> Self {
        Self {
            prober,
            region,
            endpoints,
        }
    }

    /// Fetch current conditions for the region
    ///
    /// # Arguments
    /// * `date` - Reference date, also substituted into endpoint templates
    ///
    /// # Returns
    /// * `Ok(WeatherReport)` - From the first endpoint with usable data
    /// * `Err(WeatherError)` - If every endpoint failed
    pub async fn fetch_weather(&self, date: NaiveDate) -> Result<WeatherReport, WeatherError> {
        let candidates = self.region.expand_all(&self.endpoints, date);

        let report = self
            .prober
            .probe_map(&candidates, |payload| {
                read_payload(&payload, &self.region, |record| {
                    WeatherReport::from_record(&record, &self.region, date)
                })
            })
            .await?;

        Ok(report)
    }
}
