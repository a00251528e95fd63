//! Region matching and field extraction
//!
//! Upstream feeds disagree on layout and key names, so both are handled with
//! declarative tables: where region lists live, which keys name or code a
//! region, and the ordered synonym keys of every logical field.

use std::iter;

use chrono::NaiveDate;
use serde_json::{Map, Value};
use thiserror::Error;

use super::parse::TEXT_KEY;
use crate::config::RegionConfig;
use crate::data::{PollenLevels, StressLevel};

/// Keys under which a feed may hold its list of region records
const REGION_LIST_KEYS: &[&str] = &[
    "regionen", "regions", "Regionen", "Regions", "warnings", "Warnungen", "data", "content",
];

/// Keys naming a region inside a record
const REGION_NAME_KEYS: &[&str] = &[
    "region",
    "Region",
    "name",
    "Name",
    "region_name",
    "partregion_name",
    "regionName",
];

/// Keys holding a region code inside a record
///
/// DWD numbering schemes like `partregion_id` overlap with these codes and are
/// left out.
const REGION_CODE_KEYS: &[&str] = &["code", "Code", "id"];

/// How far single-key wrappers are descended looking for records
const MAX_WRAPPER_DEPTH: usize = 4;

/// Maximum pollen severity
const MAX_POLLEN_LEVEL: f64 = 3.0;

/// A logical text field and its synonym keys, in priority order
#[derive(Debug, Clone, Copy)]
pub struct TextField {
    pub keys: &'static [&'static str],
}

/// A logical numeric field with its synonym keys and plausible range
#[derive(Debug, Clone, Copy)]
pub struct NumericField {
    pub keys: &'static [&'static str],
    pub min: f64,
    pub max: f64,
}

impl NumericField {
    fn accepts(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }
}

/// Logical fields read from region records
pub mod fields {
    use super::{NumericField, TextField};

    pub const TEMPERATURE: NumericField = NumericField {
        keys: &["temperatur", "Temperatur", "temperature", "Temperature", "temp"],
        min: -60.0,
        max: 60.0,
    };

    pub const HUMIDITY: NumericField = NumericField {
        keys: &[
            "luftfeuchtigkeit",
            "Luftfeuchtigkeit",
            "humidity",
            "Humidity",
            "relativeHumidity",
            "relative_humidity",
        ],
        min: 0.0,
        max: 100.0,
    };

    pub const DESCRIPTION: TextField = TextField {
        keys: &["beschreibung", "Beschreibung", "description", "Description", "text", "Text"],
    };

    /// Short weather condition, e.g. Bright Sky's `condition`
    pub const CONDITION: TextField = TextField {
        keys: &["condition", "Condition", "wetterZustand", "zustand"],
    };

    pub const WARNING: TextField = TextField {
        keys: &["warnung", "Warnung", "warning", "Warning", "alert", "Alert"],
    };

    pub const DATE: TextField = TextField {
        keys: &["date", "Date", "datum", "Datum", "issued", "Issued", "timestamp"],
    };

    /// Raw stress level string, normalized with [`super::normalize_stress`]
    pub const STRESS: TextField = TextField {
        keys: &[
            "belastung",
            "Belastung",
            "stress",
            "Stress",
            "belastungstufe",
            "Belastungsstufe",
        ],
    };

    pub const FEELING: TextField = TextField {
        keys: &["gefuehl", "Gefühl", "feeling", "Feeling", "empfinden", "Empfinden"],
    };

    pub const UV_INDEX: NumericField = NumericField {
        keys: &["uvIndex", "UVIndex", "uv_index", "uv", "UV"],
        min: 0.0,
        max: 15.0,
    };

    /// Generic `value` key, only meaningful on a UV-only feed
    pub const UV_VALUE: NumericField = NumericField {
        keys: &["value", "Value"],
        ..UV_INDEX
    };

    /// Ozone concentration in µg/m³
    pub const OZONE: NumericField = NumericField {
        keys: &["ozon", "Ozon", "ozonvorhersage", "Ozonvorhersage", "ozone", "o3", "O3"],
        min: 0.0,
        max: 1000.0,
    };

    /// Generic `value` key, only meaningful on an ozone-only feed
    pub const OZONE_VALUE: NumericField = NumericField {
        keys: &["value", "Value"],
        ..OZONE
    };

    /// Sunshine duration in minutes
    pub const SUNSHINE: NumericField = NumericField {
        keys: &["sunshine", "sunshine_60", "sunshine_30", "sonnenschein", "Sonnenscheindauer"],
        min: 0.0,
        max: 1440.0,
    };

    /// Keys of the object holding per-species pollen values
    pub const POLLEN_CONTAINERS: &[&str] = &["pollen", "Pollen", "pollenflug", "Pollenflug"];
}

/// A pollen species: canonical output name and the keys it appears under
#[derive(Debug, Clone, Copy)]
pub struct PollenSpecies {
    pub name: &'static str,
    pub keys: &'static [&'static str],
}

pub const POLLEN_SPECIES: &[PollenSpecies] = &[
    PollenSpecies {
        name: "Hasel",
        keys: &["Hasel", "hasel", "HASEL", "hazel"],
    },
    PollenSpecies {
        name: "Erle",
        keys: &["Erle", "erle", "ERLE", "alder"],
    },
    PollenSpecies {
        name: "Esche",
        keys: &["Esche", "esche", "ESCHE", "ash"],
    },
    PollenSpecies {
        name: "Birke",
        keys: &["Birke", "birke", "BIRKE", "birch"],
    },
    PollenSpecies {
        name: "Gräser",
        keys: &[
            "Gräser",
            "gräser",
            "Graeser",
            "graeser",
            "Süßgräser",
            "süßgräser",
            "SÜSSGRÄSER",
            "grasses",
            "grass",
        ],
    },
    PollenSpecies {
        name: "Roggen",
        keys: &["Roggen", "roggen", "ROGGEN", "rye"],
    },
    PollenSpecies {
        name: "Beifuß",
        keys: &["Beifuß", "beifuß", "Beifuss", "beifuss", "BEIFUSS", "mugwort"],
    },
    PollenSpecies {
        name: "Ambrosia",
        keys: &["Ambrosia", "ambrosia", "AMBROSIA", "ragweed"],
    },
];

/// Stress keywords in the order they are checked
const STRESS_KEYWORDS: &[(StressLevel, &[&str])] = &[
    (StressLevel::Low, &["niedrig", "low", "gering"]),
    (StressLevel::Moderate, &["moderat", "mäßig"]),
    (StressLevel::Elevated, &["erhöht", "elevated", "increased"]),
    (StressLevel::High, &["hoch", "high", "stark"]),
];

/// Errors returned by the extractor
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    /// The document holds no region records at all
    #[error("No region records found in document")]
    NotFound,
}

/// The region record chosen from a document
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    fields: &'a Map<String, Value>,
    matched: bool,
}

impl<'a> Record<'a> {
    /// False when no record matched the region and the first one was taken
    pub fn matched(&self) -> bool {
        self.matched
    }

    /// First non-empty value among the field's keys, as text
    pub fn text(&self, field: &TextField) -> Option<String> {
        field
            .keys
            .iter()
            .filter_map(|key| self.fields.get(*key))
            .find_map(scalar_text)
    }

    /// First parsable, in-range value among the field's keys
    pub fn number(&self, field: &NumericField) -> Option<f64> {
        field
            .keys
            .iter()
            .filter_map(|key| self.fields.get(*key))
            .filter_map(scalar_number)
            .find(|v| field.accepts(*v))
    }

    /// Date of the record, accepting full timestamps
    pub fn date(&self) -> Option<NaiveDate> {
        let text = self.text(&fields::DATE)?;
        let day = text.get(..10).unwrap_or(&text);
        NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
    }

    /// Per-species pollen levels, read from a pollen container or the record itself
    pub fn pollen(&self) -> PollenLevels {
        let container = fields::POLLEN_CONTAINERS
            .iter()
            .filter_map(|key| self.fields.get(*key))
            .find_map(Value::as_object)
            .unwrap_or(self.fields);

        let mut levels = PollenLevels::new();
        for species in POLLEN_SPECIES {
            let level = species
                .keys
                .iter()
                .filter_map(|key| container.get(*key))
                .find_map(pollen_level);
            if let Some(level) = level {
                levels.insert(species.name.to_string(), level);
            }
        }
        levels
    }
}

/// Select the record describing `region` from a parsed document
///
/// # Arguments
/// * `node` - Parsed document
/// * `region` - Name, aliases and codes to match
///
/// # Returns
/// * `Ok(Record)` - The first matching record, or the first record when none matches
/// * `Err(ExtractError::NotFound)` - If the document holds no records
pub fn extract_record<'a>(node: &'a Value, region: &RegionConfig) -> Result<Record<'a>, ExtractError> {
    let records = candidate_records(node, 0);

    if let Some(fields) = records.iter().copied().find(|r| matches_region(r, region)) {
        return Ok(Record {
            fields,
            matched: true,
        });
    }

    match records.first().copied() {
        Some(fields) => {
            tracing::debug!(
                "No record matched {}, using the first of {}",
                region.name,
                records.len()
            );
            Ok(Record {
                fields,
                matched: false,
            })
        }
        None => Err(ExtractError::NotFound),
    }
}

/// Map a raw upstream stress string to a level, defaulting to Moderate
pub fn normalize_stress(raw: &str) -> StressLevel {
    let raw = raw.to_lowercase();
    STRESS_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| raw.contains(k)))
        .map(|(level, _)| *level)
        .unwrap_or(StressLevel::Moderate)
}

fn candidate_records(node: &Value, depth: usize) -> Vec<&Map<String, Value>> {
    let map = match node {
        Value::Array(items) => return items.iter().filter_map(Value::as_object).collect(),
        Value::Object(map) => map,
        _ => return Vec::new(),
    };

    for key in REGION_LIST_KEYS {
        if let Some(Value::Array(items)) = map.get(*key) {
            return items.iter().filter_map(Value::as_object).collect();
        }
    }

    if let Some(Value::Array(features)) = map.get("features") {
        return features
            .iter()
            .filter_map(|f| f.get("properties"))
            .filter_map(Value::as_object)
            .collect();
    }

    if let Some(Value::Object(weather)) = map.get("weather") {
        return vec![weather];
    }

    if depth < MAX_WRAPPER_DEPTH {
        // XML lists arrive as an object wrapping the repeated element
        let nested = REGION_LIST_KEYS
            .iter()
            .filter_map(|key| map.get(*key))
            .filter(|v| v.is_object());
        let single_wrapper = if map.len() == 1 {
            map.values().next().filter(|v| v.is_object() || v.is_array())
        } else {
            None
        };
        // Repeated elements beside attributes of their parent
        let repeated = map.values().filter(|v| map.len() > 1 && is_record_list(v));

        for inner in nested.chain(single_wrapper).chain(repeated) {
            let records = candidate_records(inner, depth + 1);
            if !records.is_empty() {
                return records;
            }
        }
    }

    vec![map]
}

fn is_record_list(value: &Value) -> bool {
    match value {
        Value::Array(items) => !items.is_empty() && items.iter().all(Value::is_object),
        _ => false,
    }
}

fn matches_region(record: &Map<String, Value>, region: &RegionConfig) -> bool {
    let needles: Vec<String> = iter::once(&region.name)
        .chain(&region.aliases)
        .map(|n| n.to_lowercase())
        .collect();

    let name_match = REGION_NAME_KEYS
        .iter()
        .filter_map(|key| record.get(*key))
        .filter_map(scalar_text)
        .any(|name| {
            let name = name.to_lowercase();
            needles.iter().any(|needle| name.contains(needle.as_str()))
        });

    name_match
        || REGION_CODE_KEYS
            .iter()
            .filter_map(|key| record.get(*key))
            .filter_map(scalar_text)
            .any(|code| region.codes.iter().any(|c| c == code.trim()))
}

/// Unwrap XML text nodes and DWD `today` cells down to a scalar
fn scalar(value: &Value) -> &Value {
    match value {
        Value::Object(map) => match map.get(TEXT_KEY).or_else(|| map.get("today")) {
            Some(inner) => scalar(inner),
            None => value,
        },
        _ => value,
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match scalar(value) {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn scalar_number(value: &Value) -> Option<f64> {
    match scalar(value) {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => leading_decimal(s),
        _ => None,
    }
}

fn pollen_level(value: &Value) -> Option<u8> {
    let level = match scalar(value) {
        Value::String(s) => parse_range(s).or_else(|| leading_decimal(s)),
        other => scalar_number(other),
    }?;

    if !(0.0..=MAX_POLLEN_LEVEL).contains(&level) {
        return None;
    }
    Some(level.round() as u8)
}

/// Midpoint of a `"low-high"` range such as DWD's `"1-2"`
fn parse_range(s: &str) -> Option<f64> {
    let (low, high) = s.trim().split_once('-')?;
    let low: f64 = low.trim().parse().ok()?;
    let high: f64 = high.trim().parse().ok()?;
    Some((low + high) / 2.0)
}

/// Parse the longest leading decimal number of a string
///
/// Trailing text is ignored (`"24.5 °C"` is 24.5) and a decimal comma is
/// accepted (`"21,5"` is 21.5). Returns `None` when no digits lead the string.
pub fn leading_decimal(s: &str) -> Option<f64> {
    let mut number = String::new();
    let mut chars = s.trim_start().chars().peekable();

    if let Some(sign) = chars.next_if(|c| *c == '-' || *c == '+') {
        number.push(sign);
    }

    let mut digits = 0;
    while let Some(d) = chars.next_if(char::is_ascii_digit) {
        number.push(d);
        digits += 1;
    }

    if chars.next_if(|c| *c == '.' || *c == ',').is_some() {
        let mut fraction = String::new();
        while let Some(d) = chars.next_if(char::is_ascii_digit) {
            fraction.push(d);
        }
        if !fraction.is_empty() {
            number.push('.');
            number.push_str(&fraction);
            digits += fraction.len();
        }
    }

    if digits == 0 {
        return None;
    }
    number.parse().ok()
}
