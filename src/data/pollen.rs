//! DWD pollen forecast client
//!
//! Reads per-species pollen levels for the region. When no feed answers the
//! seasonal table is returned instead, flagged as estimated.

use chrono::{Datelike, NaiveDate};

use super::PollenReading;
use crate::config::RegionConfig;
use crate::metrics::seasonal_pollen;
use crate::source::{read_payload, Prober};

/// Client for the pollen pipeline
#[derive(Debug, Clone)]
pub struct PollenClient {
    prober: Prober,
    region: RegionConfig,
    endpoints: Vec<String>,
}

impl PollenClient {
    pub fn new(prober: Prober, region: RegionConfig, endpoints: Vec<String>) -> Self {
        Self {
            prober,
            region,
            endpoints,
        }
    }

    /// Fetch pollen levels, falling back to the seasonal table
    ///
    /// A feed only counts when it yields at least one species within 0-3.
    pub async fn fetch_pollen(&self, date: NaiveDate) -> PollenReading {
        let candidates = self.region.expand_all(&self.endpoints, date);

        let live = self
            .prober
            .probe_map(&candidates, |payload| {
                read_payload(&payload, &self.region, |record| {
                    let levels = record.pollen();
                    if levels.is_empty() {
                        None
                    } else {
                        Some(levels)
                    }
                })
            })
            .await;

        match live {
            Ok(levels) => PollenReading {
                levels,
                estimated: false,
            },
            Err(e) => {
                tracing::warn!("{}; using seasonal pollen estimate", e);
                PollenReading {
                    levels: seasonal_pollen(date.month()),
                    estimated: true,
                }
            }
        }
    }
}
