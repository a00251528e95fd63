//! Core data models for Biowetter
//!
//! This module contains the unified record handed to the presentation layer
//! together with the classification enums and the per-pipeline readings it is
//! assembled from.

pub mod hazard;
pub mod pollen;
pub mod weather;

pub use hazard::HazardClient;
pub use pollen::PollenClient;
pub use weather::{WeatherClient, WeatherError, WeatherReport};

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metrics::{classify_ozone, classify_uv};

/// Pollen severity per species, 0 (none) to 3 (high)
pub type PollenLevels = BTreeMap<String, u8>;

/// Biometeorological stress level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StressLevel {
    Low,
    Moderate,
    Elevated,
    High,
}

impl StressLevel {
    /// Feeling text paired with this level when the upstream gives none
    pub fn default_feeling(&self) -> &'static str {
        match self {
            StressLevel::Low => "Sehr angenehm",
            StressLevel::Moderate => "Angenehm",
            StressLevel::Elevated => "Etwas belastend",
            StressLevel::High => "Belastend",
        }
    }
}

/// UV index category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UvCategory {
    Low,
    Moderate,
    High,
    VeryHigh,
    ExtremeHigh,
}

/// Ozone concentration category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OzoneCategory {
    Low,
    Moderate,
    Elevated,
    High,
}

/// A stress level together with its feeling text
#[derive(Debug, Clone, PartialEq)]
pub struct Stress {
    pub level: StressLevel,
    pub feeling: String,
}

impl Stress {
    /// Stress with the level's default feeling text
    pub fn of(level: StressLevel) -> Self {
        Self {
            level,
            feeling: level.default_feeling().to_string(),
        }
    }
}

/// Pollen pipeline result
#[derive(Debug, Clone, PartialEq)]
pub struct PollenReading {
    pub levels: PollenLevels,
    /// True when `levels` is the seasonal table rather than a live feed
    pub estimated: bool,
}

/// UV/ozone pipeline result
#[derive(Debug, Clone, PartialEq)]
pub struct HazardReading {
    pub uv_index: Option<f64>,
    pub ozone: Option<f64>,
    /// True when both values are the seasonal placeholder estimate
    pub estimated: bool,
}

impl HazardReading {
    pub fn uv_category(&self) -> Option<UvCategory> {
        self.uv_index.map(classify_uv)
    }

    pub fn ozone_category(&self) -> Option<OzoneCategory> {
        self.ozone.map(classify_ozone)
    }
}

/// Errors raised when a deserialized record breaks the pairing rules
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("stressLevel and feeling must both be set or both be null")]
    UnpairedStress,

    #[error("uvCategory must be present exactly when uvIndex is")]
    UnpairedUv,

    #[error("ozoneCategory must be present exactly when ozoneMicrogramsM3 is")]
    UnpairedOzone,
}

/// The unified biometeorological record for one region and day
///
/// Every optional field serializes as an explicit `null` when absent. The
/// stress/feeling and value/category pairs can only be set together, so the
/// record cannot be built in a half-filled state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RecordRepr")]
pub struct UnifiedWeatherRecord {
    region: String,
    date: NaiveDate,
    stress_level: Option<StressLevel>,
    feeling: Option<String>,
    description: Option<String>,
    warning_notice: Option<String>,
    temperature_c: Option<f64>,
    relative_humidity_pct: Option<f64>,
    pollen: Option<PollenLevels>,
    uv_index: Option<f64>,
    uv_category: Option<UvCategory>,
    ozone_micrograms_m3: Option<f64>,
    ozone_category: Option<OzoneCategory>,
    pollen_estimated: bool,
    uv_ozone_estimated: bool,
}

impl UnifiedWeatherRecord {
    /// Creates an empty record with every optional field null
    pub fn new(region: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            region: region.into(),
            date,
            stress_level: None,
            feeling: None,
            description: None,
            warning_notice: None,
            temperature_c: None,
            relative_humidity_pct: None,
            pollen: None,
            uv_index: None,
            uv_category: None,
            ozone_micrograms_m3: None,
            ozone_category: None,
            pollen_estimated: false,
            uv_ozone_estimated: false,
        }
    }

    pub fn with_stress(mut self, stress: Stress) -> Self {
        self.stress_level = Some(stress.level);
        self.feeling = Some(stress.feeling);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_warning(mut self, warning: Option<String>) -> Self {
        self.warning_notice = warning;
        self
    }

    pub fn with_temperature(mut self, temperature_c: Option<f64>) -> Self {
        self.temperature_c = temperature_c;
        self
    }

    pub fn with_humidity(mut self, humidity_pct: Option<f64>) -> Self {
        self.relative_humidity_pct = humidity_pct;
        self
    }

    pub fn with_pollen(mut self, reading: PollenReading) -> Self {
        self.pollen = Some(reading.levels);
        self.pollen_estimated = reading.estimated;
        self
    }

    /// Sets UV and ozone values; categories are derived from them
    pub fn with_hazards(mut self, reading: HazardReading) -> Self {
        self.uv_category = reading.uv_category();
        self.ozone_category = reading.ozone_category();
        self.uv_index = reading.uv_index;
        self.ozone_micrograms_m3 = reading.ozone;
        self.uv_ozone_estimated = reading.estimated;
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn stress_level(&self) -> Option<StressLevel> {
        self.stress_level
    }

    pub fn feeling(&self) -> Option<&str> {
        self.feeling.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn warning_notice(&self) -> Option<&str> {
        self.warning_notice.as_deref()
    }

    pub fn temperature_c(&self) -> Option<f64> {
        self.temperature_c
    }

    pub fn relative_humidity_pct(&self) -> Option<f64> {
        self.relative_humidity_pct
    }

    pub fn pollen(&self) -> Option<&PollenLevels> {
        self.pollen.as_ref()
    }

    pub fn uv_index(&self) -> Option<f64> {
        self.uv_index
    }

    pub fn uv_category(&self) -> Option<UvCategory> {
        self.uv_category
    }

    pub fn ozone_micrograms_m3(&self) -> Option<f64> {
        self.ozone_micrograms_m3
    }

    pub fn ozone_category(&self) -> Option<OzoneCategory> {
        self.ozone_category
    }

    /// Whether `pollen` holds the seasonal table instead of measured data
    pub fn pollen_estimated(&self) -> bool {
        self.pollen_estimated
    }

    /// Whether the UV and ozone values are the seasonal placeholder
    pub fn uv_ozone_estimated(&self) -> bool {
        self.uv_ozone_estimated
    }
}

/// Wire shape used to validate records on deserialization
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordRepr {
    region: String,
    date: NaiveDate,
    stress_level: Option<StressLevel>,
    feeling: Option<String>,
    description: Option<String>,
    warning_notice: Option<String>,
    temperature_c: Option<f64>,
    relative_humidity_pct: Option<f64>,
    pollen: Option<PollenLevels>,
    uv_index: Option<f64>,
    uv_category: Option<UvCategory>,
    ozone_micrograms_m3: Option<f64>,
    ozone_category: Option<OzoneCategory>,
    #[serde(default)]
    pollen_estimated: bool,
    #[serde(default)]
    uv_ozone_estimated: bool,
}

impl TryFrom<RecordRepr> for UnifiedWeatherRecord {
    type Error = RecordError;

    fn try_from(repr: RecordRepr) -> Result<Self, Self::Error> {
        if repr.stress_level.is_some() != repr.feeling.is_some() {
            return Err(RecordError::UnpairedStress);
        }
        if repr.uv_index.is_some() != repr.uv_category.is_some() {
            return Err(RecordError::UnpairedUv);
        }
        if repr.ozone_micrograms_m3.is_some() != repr.ozone_category.is_some() {
            return Err(RecordError::UnpairedOzone);
        }

        Ok(Self {
            region: repr.region,
            date: repr.date,
            stress_level: repr.stress_level,
            feeling: repr.feeling,
            description: repr.description,
            warning_notice: repr.warning_notice,
            temperature_c: repr.temperature_c,
            relative_humidity_pct: repr.relative_humidity_pct,
            pollen: repr.pollen,
            uv_index: repr.uv_index,
            uv_category: repr.uv_category,
            ozone_micrograms_m3: repr.ozone_micrograms_m3,
            ozone_category: repr.ozone_category,
            pollen_estimated: repr.pollen_estimated,
            uv_ozone_estimated: repr.uv_ozone_estimated,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 15).unwrap()
    }

    fn full_record() -> UnifiedWeatherRecord {
        let mut pollen = PollenLevels::new();
        pollen.insert("Gräser".to_string(), 3);
        pollen.insert("Beifuß".to_string(), 2);

        UnifiedWeatherRecord::new("Wiesbaden", sample_date())
            .with_stress(Stress::of(StressLevel::Low))
            .with_description("Sonnig")
            .with_warning(None)
            .with_temperature(Some(22.4))
            .with_humidity(Some(55.0))
            .with_pollen(PollenReading {
                levels: pollen,
                estimated: true,
            })
            .with_hazards(HazardReading {
                uv_index: Some(6.5),
                ozone: Some(130.0),
                estimated: false,
            })
    }

    #[test]
    fn test_new_record_serializes_every_field_as_null() {
        let record = UnifiedWeatherRecord::new("Wiesbaden", sample_date());
        let json = serde_json::to_value(&record).expect("Failed to serialize record");
        let object = json.as_object().expect("record should be an object");

        for key in [
            "stressLevel",
            "feeling",
            "description",
            "warningNotice",
            "temperatureC",
            "relativeHumidityPct",
            "pollen",
            "uvIndex",
            "uvCategory",
            "ozoneMicrogramsM3",
            "ozoneCategory",
        ] {
            assert!(object.contains_key(key), "missing key {}", key);
            assert!(object[key].is_null(), "{} should be null", key);
        }
        assert_eq!(object["region"], "Wiesbaden");
        assert_eq!(object["date"], "2024-07-15");
    }

    #[test]
    fn test_record_serialization_roundtrip() {
        let record = full_record();

        let json = serde_json::to_string(&record).expect("Failed to serialize record");
        let deserialized: UnifiedWeatherRecord =
            serde_json::from_str(&json).expect("Failed to deserialize record");

        assert_eq!(deserialized, record);
    }

    #[test]
    fn test_empty_record_roundtrip_keeps_explicit_nulls() {
        let record = UnifiedWeatherRecord::new("Wiesbaden", sample_date());

        let json = serde_json::to_string(&record).expect("Failed to serialize record");
        assert!(json.contains("\"uvIndex\":null"));
        assert!(json.contains("\"warningNotice\":null"));

        let deserialized: UnifiedWeatherRecord =
            serde_json::from_str(&json).expect("Failed to deserialize record");
        assert_eq!(deserialized, record);
    }

    #[test]
    fn test_hazards_derive_categories() {
        let record = full_record();

        assert_eq!(record.uv_category(), Some(UvCategory::High));
        assert_eq!(record.ozone_category(), Some(OzoneCategory::Moderate));
        assert!(!record.uv_ozone_estimated());
        assert!(record.pollen_estimated());
    }

    #[test]
    fn test_partial_hazards_leave_missing_pair_null() {
        let record = UnifiedWeatherRecord::new("Wiesbaden", sample_date()).with_hazards(
            HazardReading {
                uv_index: Some(1.0),
                ozone: None,
                estimated: false,
            },
        );

        assert_eq!(record.uv_category(), Some(UvCategory::Low));
        assert!(record.ozone_micrograms_m3().is_none());
        assert!(record.ozone_category().is_none());
    }

    #[test]
    fn test_deserialize_rejects_unpaired_stress() {
        let json = r#"{
            "region": "Wiesbaden", "date": "2024-07-15",
            "stressLevel": "Low", "feeling": null,
            "description": null, "warningNotice": null,
            "temperatureC": null, "relativeHumidityPct": null, "pollen": null,
            "uvIndex": null, "uvCategory": null,
            "ozoneMicrogramsM3": null, "ozoneCategory": null
        }"#;

        let result: Result<UnifiedWeatherRecord, _> = serde_json::from_str(json);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("stressLevel and feeling"));
    }

    #[test]
    fn test_deserialize_rejects_uv_without_category() {
        let json = r#"{
            "region": "Wiesbaden", "date": "2024-07-15",
            "stressLevel": null, "feeling": null,
            "description": null, "warningNotice": null,
            "temperatureC": null, "relativeHumidityPct": null, "pollen": null,
            "uvIndex": 4.0, "uvCategory": null,
            "ozoneMicrogramsM3": null, "ozoneCategory": null
        }"#;

        let result: Result<UnifiedWeatherRecord, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_stress_default_feelings() {
        assert_eq!(Stress::of(StressLevel::Low).feeling, "Sehr angenehm");
        assert_eq!(Stress::of(StressLevel::Moderate).feeling, "Angenehm");
        assert_eq!(Stress::of(StressLevel::Elevated).feeling, "Etwas belastend");
        assert_eq!(Stress::of(StressLevel::High).feeling, "Belastend");
    }
}
