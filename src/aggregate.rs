//! Record aggregation
//!
//! Runs the weather, pollen and UV/ozone pipelines concurrently and merges
//! their results into one [`UnifiedWeatherRecord`].

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use chrono::{Local, NaiveDate};
use futures::FutureExt;
use thiserror::Error;

use crate::config::Config;
use crate::data::hazard::measured_or_estimate;
use crate::data::{
    HazardClient, HazardReading, PollenClient, PollenReading, Stress, StressLevel,
    UnifiedWeatherRecord, WeatherClient, WeatherError, WeatherReport,
};
use crate::source::{ProbeOptions, Prober};

const FALLBACK_DESCRIPTION: &str = "Die biometeorologischen Daten werden aktuell geladen. Falls diese Meldung länger erscheint, könnte der DWD-Server vorübergehend nicht erreichbar sein.";

const FALLBACK_WARNING: &str = "Hinweis: Fallback-Daten werden angezeigt.";

/// Unexpected faults during an acquisition cycle
#[derive(Debug, Error)]
pub enum AggregateError {
    /// The HTTP client could not be constructed
    #[error("Failed to create HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    /// A pipeline panicked
    #[error("Pipeline panicked: {0}")]
    Panicked(String),
}

struct Pipelines {
    weather: WeatherClient,
    pollen: PollenClient,
    hazard: HazardClient,
}

/// Builds unified records from the configured sources
#[derive(Debug, Clone)]
pub struct Aggregator {
    config: Config,
}

impl Aggregator {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build today's record; never fails
    pub async fn build_record(&self) -> UnifiedWeatherRecord {
        self.build_record_at(today()).await
    }

    /// Build the record for `date`; unexpected faults yield the fallback record
    pub async fn build_record_at(&self, date: NaiveDate) -> UnifiedWeatherRecord {
        match self.try_build_record_at(date).await {
            Ok(record) => record,
            Err(e) => {
                tracing::error!("Acquisition failed: {}", e);
                fallback_record(&self.config.region.name, date)
            }
        }
    }

    /// Build today's record, exposing unexpected faults
    pub async fn try_build_record(&self) -> Result<UnifiedWeatherRecord, AggregateError> {
        self.try_build_record_at(today()).await
    }

    pub async fn try_build_record_at(
        &self,
        date: NaiveDate,
    ) -> Result<UnifiedWeatherRecord, AggregateError> {
        let pipelines = self.pipelines()?;
        let region = &self.config.region.name;

        guarded(async {
            let (weather, pollen, measured) = futures::join!(
                pipelines.weather.fetch_weather(date),
                pipelines.pollen.fetch_pollen(date),
                pipelines.hazard.fetch_measured(date),
            );

            let sunshine = weather
                .as_ref()
                .ok()
                .and_then(|w| w.sunshine_minutes)
                .unwrap_or(0.0);
            let hazards = measured_or_estimate(measured, date, sunshine);

            merge(weather, pollen, hazards, region, date)
        })
        .await
    }

    /// Run only the pollen pipeline for `date`
    pub async fn pollen_at(&self, date: NaiveDate) -> Result<PollenReading, AggregateError> {
        let pipelines = self.pipelines()?;
        guarded(pipelines.pollen.fetch_pollen(date)).await
    }

    /// Run only the UV/ozone pipeline for `date`
    pub async fn hazards_at(&self, date: NaiveDate) -> Result<HazardReading, AggregateError> {
        let pipelines = self.pipelines()?;
        guarded(pipelines.hazard.fetch_hazards(date, 0.0)).await
    }

    fn pipelines(&self) -> Result<Pipelines, AggregateError> {
        let prober = Prober::new(ProbeOptions::from(&self.config.http))?;
        let region = &self.config.region;
        let endpoints = &self.config.endpoints;

        Ok(Pipelines {
            weather: WeatherClient::new(prober.clone(), region.clone(), endpoints.weather.clone()),
            pollen: PollenClient::new(prober.clone(), region.clone(), endpoints.pollen.clone()),
            hazard: HazardClient::new(prober, region.clone(), endpoints),
        })
    }
}

/// Local calendar date used as the reference for one cycle
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Merge pipeline results into one record
///
/// A failed weather pipeline yields the fallback record, and pollen and
/// UV/ozone results are then discarded.
pub fn merge(
    weather: Result<WeatherReport, WeatherError>,
    pollen: PollenReading,
    hazards: HazardReading,
    region: &str,
    date: NaiveDate,
) -> UnifiedWeatherRecord {
    match weather {
        Ok(report) => UnifiedWeatherRecord::new(region, report.date)
            .with_stress(report.stress)
            .with_description(report.description)
            .with_warning(report.warning)
            .with_temperature(report.temperature_c)
            .with_humidity(report.humidity_pct)
            .with_pollen(pollen)
            .with_hazards(hazards),
        Err(e) => {
            tracing::warn!("{}; serving fallback record", e);
            fallback_record(region, date)
        }
    }
}

/// The record served when no weather feed answers
pub fn fallback_record(region: &str, date: NaiveDate) -> UnifiedWeatherRecord {
    UnifiedWeatherRecord::new(region, date)
        .with_stress(Stress::of(StressLevel::Moderate))
        .with_description(FALLBACK_DESCRIPTION)
        .with_warning(Some(FALLBACK_WARNING.to_string()))
}

async fn guarded<T>(future: impl Future<Output = T>) -> Result<T, AggregateError> {
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|payload| AggregateError::Panicked(panic_message(payload.as_ref())))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EndpointConfig;
    use crate::data::UvCategory;
    use crate::metrics::{seasonal_pollen, seasonal_uv_ozone};
    use crate::source::ProbeError;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, 15).unwrap()
    }

    fn estimates() -> (PollenReading, HazardReading) {
        let pollen = PollenReading {
            levels: seasonal_pollen(7),
            estimated: true,
        };
        let hazards = seasonal_uv_ozone(0.0, 7, &mut StdRng::seed_from_u64(7));
        (pollen, hazards)
    }

    fn outage() -> Result<WeatherReport, WeatherError> {
        Err(WeatherError::Unavailable(ProbeError::AllCandidatesExhausted {
            attempted: 6,
        }))
    }

    fn config_for(server: &MockServer) -> Config {
        let url = |p: &str| format!("{}{}", server.uri(), p);
        let mut config = Config::default();
        config.endpoints = EndpointConfig {
            weather: vec![url("/weather.json")],
            pollen: vec![url("/pollen.json")],
            uv: vec![url("/uv.json")],
            ozone: vec![url("/ozon.json")],
            hazard_indices: vec![url("/gefahrenindizes.json")],
        };
        config
    }

    #[test]
    fn test_total_outage_yields_fallback_record() {
        let (pollen, hazards) = estimates();
        let record = merge(outage(), pollen, hazards, "Wiesbaden", sample_date());

        assert_eq!(record.region(), "Wiesbaden");
        assert_eq!(record.date(), sample_date());
        assert_eq!(record.stress_level(), Some(StressLevel::Moderate));
        assert_eq!(record.feeling(), Some("Angenehm"));
        assert_eq!(record.warning_notice(), Some(FALLBACK_WARNING));
        assert!(record.description().is_some());
        assert!(record.temperature_c().is_none());
        assert!(record.relative_humidity_pct().is_none());
        assert!(record.pollen().is_none());
        assert!(record.uv_index().is_none());
        assert!(record.ozone_micrograms_m3().is_none());
    }

    #[test]
    fn test_weather_only_overlays_seasonal_estimates() {
        let (pollen, hazards) = estimates();
        let report = WeatherReport {
            date: sample_date(),
            stress: Stress::of(StressLevel::Low),
            description: "Sonnig".to_string(),
            warning: None,
            temperature_c: Some(22.0),
            humidity_pct: Some(50.0),
            sunshine_minutes: None,
        };

        let record = merge(Ok(report), pollen, hazards.clone(), "Wiesbaden", sample_date());

        assert_eq!(record.stress_level(), Some(StressLevel::Low));
        assert_eq!(record.temperature_c(), Some(22.0));
        assert_eq!(record.pollen(), Some(&seasonal_pollen(7)));
        assert!(record.pollen_estimated());
        assert_eq!(record.uv_index(), hazards.uv_index);
        assert_eq!(record.uv_category(), Some(UvCategory::Moderate));
        assert!(record.uv_ozone_estimated());
        assert!(record.warning_notice().is_none());
    }

    #[tokio::test]
    async fn test_guarded_reports_panics() {
        let result: Result<(), AggregateError> = guarded(async { panic!("feed exploded"); }).await;
        match result {
            Err(AggregateError::Panicked(message)) => assert_eq!(message, "feed exploded"),
            other => panic!("expected a panic error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_build_record_with_every_source_down() {
        let server = MockServer::start().await;

        let aggregator = Aggregator::new(config_for(&server));
        let record = aggregator.build_record_at(sample_date()).await;

        assert_eq!(record, fallback_record("Wiesbaden", sample_date()));
    }

    #[tokio::test]
    async fn test_build_record_with_weather_only() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"weather": {"temperature": 18.0, "relative_humidity": 60, "sunshine_60": 420}}"#,
            ))
            .mount(&server)
            .await;

        let aggregator = Aggregator::new(config_for(&server));
        let record = aggregator
            .try_build_record_at(sample_date())
            .await
            .expect("Should build record");

        assert_eq!(record.stress_level(), Some(StressLevel::Low));
        assert_eq!(record.temperature_c(), Some(18.0));
        assert_eq!(record.pollen(), Some(&seasonal_pollen(7)));
        assert!(record.pollen_estimated());
        // July base 5 plus two points for 420 minutes of sunshine
        assert_eq!(record.uv_index(), Some(7.0));
        assert!(record.uv_ozone_estimated());
        assert!(record.ozone_micrograms_m3().is_some());
    }

    #[tokio::test]
    async fn test_all_sources_live() {
        let server = MockServer::start().await;
        let routes = [
            ("/weather.json", r#"[{"region": "Wiesbaden", "belastung": "hoch", "temperatur": 33}]"#),
            ("/pollen.json", r#"{"regionen": [{"name": "Hessen", "pollen": {"Gräser": 3}}]}"#),
            ("/uv.json", r#"{"uvIndex": 8.26}"#),
            ("/ozon.json", r#"{"ozon": 201.4}"#),
        ];
        for (route, body) in routes {
            Mock::given(method("GET"))
                .and(path(route))
                .respond_with(ResponseTemplate::new(200).set_body_string(body))
                .mount(&server)
                .await;
        }

        let aggregator = Aggregator::new(config_for(&server));
        let record = aggregator.build_record_at(sample_date()).await;

        assert_eq!(record.stress_level(), Some(StressLevel::High));
        assert_eq!(record.feeling(), Some("Belastend"));
        assert_eq!(record.pollen().and_then(|p| p.get("Gräser")), Some(&3));
        assert!(!record.pollen_estimated());
        assert_eq!(record.uv_index(), Some(8.3));
        assert_eq!(record.uv_category(), Some(UvCategory::VeryHigh));
        assert_eq!(record.ozone_micrograms_m3(), Some(201.0));
        assert!(!record.uv_ozone_estimated());
    }

    #[tokio::test]
    async fn test_pollen_and_hazards_alone() {
        let server = MockServer::start().await;
        let aggregator = Aggregator::new(config_for(&server));

        let pollen = aggregator.pollen_at(sample_date()).await.expect("Should run");
        assert!(pollen.estimated);

        let hazards = aggregator.hazards_at(sample_date()).await.expect("Should run");
        assert!(hazards.estimated);
        assert_eq!(hazards.uv_index, Some(5.0));
    }
}
