//! UV index and ozone client (DWD Gefahrenindizes)
//!
//! UV and ozone each have their own candidate endpoints. Combined hazard
//! index feeds are tried afterwards for whichever value is still missing.

use chrono::{Datelike, NaiveDate};

use super::HazardReading;
use crate::config::{EndpointConfig, RegionConfig};
use crate::metrics::{round_to, seasonal_uv_ozone};
use crate::source::{fields, read_payload, NumericField, ProbeError, Prober};

/// Client for the UV/ozone pipeline
#[derive(Debug, Clone)]
pub struct HazardClient {
    prober: Prober,
    region: RegionConfig,
    uv: Vec<String>,
    ozone: Vec<String>,
    combined: Vec<String>,
}

impl HazardClient {
    pub fn new(prober: Prober, region: RegionConfig, endpoints: &EndpointConfig) -> Self {
        Self {
            prober,
            region,
            uv: endpoints.uv.clone(),
            ozone: endpoints.ozone.clone(),
            combined: endpoints.hazard_indices.clone(),
        }
    }

    /// Fetch measured UV and ozone values
    ///
    /// # Returns
    /// * `Some(HazardReading)` - If at least one value was found; the other may be `None`
    /// * `None` - If no feed provided either value
    pub async fn fetch_measured(&self, date: NaiveDate) -> Option<HazardReading> {
        let uv_candidates = self.region.expand_all(&self.uv, date);
        let ozone_candidates = self.region.expand_all(&self.ozone, date);

        let (uv, ozone) = futures::join!(
            self.probe_value(&uv_candidates, &[fields::UV_INDEX, fields::UV_VALUE]),
            self.probe_value(&ozone_candidates, &[fields::OZONE, fields::OZONE_VALUE]),
        );
        let mut uv = uv.ok();
        let mut ozone = ozone.ok();

        if uv.is_none() || ozone.is_none() {
            let (need_uv, need_ozone) = (uv.is_none(), ozone.is_none());
            let candidates = self.region.expand_all(&self.combined, date);

            let combined = self
                .prober
                .probe_map(&candidates, |payload| {
                    read_payload(&payload, &self.region, |record| {
                        let found_uv = record.number(&fields::UV_INDEX);
                        let found_ozone = record.number(&fields::OZONE);
                        let useful = (need_uv && found_uv.is_some()) || (need_ozone && found_ozone.is_some());
                        useful.then_some((found_uv, found_ozone))
                    })
                })
                .await;

            if let Ok((found_uv, found_ozone)) = combined {
                uv = uv.or(found_uv);
                ozone = ozone.or(found_ozone);
            }
        }

        if uv.is_none() && ozone.is_none() {
            return None;
        }

        Some(HazardReading {
            uv_index: uv.map(|v| round_to(v, 1)),
            ozone: ozone.map(|v| round_to(v, 0)),
            estimated: false,
        })
    }

    /// Fetch UV and ozone, falling back to the seasonal estimate
    ///
    /// `sunshine_minutes` only affects the estimate.
    pub async fn fetch_hazards(&self, date: NaiveDate, sunshine_minutes: f64) -> HazardReading {
        measured_or_estimate(self.fetch_measured(date).await, date, sunshine_minutes)
    }

    async fn probe_value(
        &self,
        candidates: &[String],
        wanted: &[NumericField],
    ) -> Result<f64, ProbeError> {
        self.prober
            .probe_map(candidates, |payload| {
                read_payload(&payload, &self.region, |record| {
                    wanted.iter().find_map(|field| record.number(field))
                })
            })
            .await
    }
}

/// Measured values when any were found, otherwise the seasonal estimate for `date`
pub fn measured_or_estimate(
    measured: Option<HazardReading>,
    date: NaiveDate,
    sunshine_minutes: f64,
) -> HazardReading {
    match measured {
        Some(reading) => reading,
        None => {
            tracing::warn!("No UV or ozone feed answered; using seasonal estimate");
            seasonal_uv_ozone(sunshine_minutes, date.month(), &mut rand::thread_rng())
        }
    }
}
