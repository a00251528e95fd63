//! Derived biometeorological metrics
//!
//! Pure classification rules plus the seasonal tables used when no live feed
//! answers. Nothing here reads the clock; callers pass the month in.

use rand::Rng;

use crate::data::{
    HazardReading, OzoneCategory, PollenLevels, Stress, StressLevel, UvCategory,
};

/// Upper bound of the estimated UV index
const MAX_ESTIMATED_UV: f64 = 11.0;

/// Sunshine minutes per additional UV index point in the estimate
const SUNSHINE_MINUTES_PER_UV_POINT: f64 = 200.0;

/// Maximum random jitter added to the ozone baseline (µg/m³)
const OZONE_JITTER: f64 = 30.0;

/// Classifies biometeorological stress from temperature and humidity
///
/// Temperatures outside 5..=30 °C are Elevated, and among those, values
/// outside 0..=35 °C are High. Otherwise 15..=25 °C with 40..=70 % humidity
/// is Low and everything else Moderate.
pub fn classify_stress(temperature_c: f64, humidity_pct: f64) -> Stress {
    let level = if !(5.0..=30.0).contains(&temperature_c) {
        if (0.0..=35.0).contains(&temperature_c) {
            StressLevel::Elevated
        } else {
            StressLevel::High
        }
    } else if (15.0..=25.0).contains(&temperature_c) && (40.0..=70.0).contains(&humidity_pct) {
        StressLevel::Low
    } else {
        StressLevel::Moderate
    };

    Stress::of(level)
}

/// Maps a UV index to its category
pub fn classify_uv(uv_index: f64) -> UvCategory {
    if uv_index <= 2.0 {
        UvCategory::Low
    } else if uv_index <= 5.0 {
        UvCategory::Moderate
    } else if uv_index <= 7.0 {
        UvCategory::High
    } else if uv_index <= 10.0 {
        UvCategory::VeryHigh
    } else {
        UvCategory::ExtremeHigh
    }
}

/// Maps an ozone concentration (µg/m³) to its category
pub fn classify_ozone(ozone: f64) -> OzoneCategory {
    if ozone < 120.0 {
        OzoneCategory::Low
    } else if ozone < 180.0 {
        OzoneCategory::Moderate
    } else if ozone < 240.0 {
        OzoneCategory::Elevated
    } else {
        OzoneCategory::High
    }
}

/// Seasonal pollen table for the given month (1-12)
///
/// Used only when no live pollen feed answers.
pub fn seasonal_pollen(month: u32) -> PollenLevels {
    // (Hasel, Erle, Birke, Gräser, Roggen, Beifuß, Ambrosia)
    let levels: [u8; 7] = match month {
        3..=5 => [
            if month == 3 { 2 } else { 1 },
            if month == 3 { 3 } else { 2 },
            if month >= 4 { 3 } else { 1 },
            if month == 5 { 2 } else { 1 },
            if month == 5 { 2 } else { 0 },
            0,
            0,
        ],
        6..=8 => [
            0,
            0,
            0,
            3,
            if month == 6 { 2 } else { 1 },
            if month >= 7 { 2 } else { 1 },
            if month == 8 { 2 } else { 1 },
        ],
        9 | 10 => [
            0,
            0,
            0,
            1,
            0,
            if month == 9 { 1 } else { 0 },
            if month == 9 { 1 } else { 0 },
        ],
        _ => [0; 7],
    };

    ["Hasel", "Erle", "Birke", "Gräser", "Roggen", "Beifuß", "Ambrosia"]
        .iter()
        .zip(levels)
        .map(|(name, level)| (name.to_string(), level))
        .collect()
}

/// Placeholder UV and ozone estimate for the given month (1-12)
///
/// Not measured data: the result is always flagged `estimated`.
pub fn seasonal_uv_ozone<R: Rng + ?Sized>(
    sunshine_minutes: f64,
    month: u32,
    rng: &mut R,
) -> HazardReading {
    let base_uv = match month {
        4..=9 => 5.0,
        3 | 10 => 3.0,
        _ => 1.0,
    };
    let bonus = (sunshine_minutes.max(0.0) / SUNSHINE_MINUTES_PER_UV_POINT).floor();
    let uv_index = (base_uv + bonus).min(MAX_ESTIMATED_UV);

    let base_ozone = if (5..=8).contains(&month) { 100.0 } else { 70.0 };
    let ozone = (base_ozone + rng.gen::<f64>() * OZONE_JITTER).round();

    HazardReading {
        uv_index: Some(uv_index),
        ozone: Some(ozone),
        estimated: true,
    }
}

/// Round to the given number of decimal places
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
