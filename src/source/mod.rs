//! Upstream acquisition: probing candidate endpoints, parsing whatever format
//! they answer in, and picking out the record for our region.

pub mod extract;
pub mod parse;
pub mod probe;

pub use extract::{
    extract_record, fields, normalize_stress, ExtractError, NumericField, Record, TextField,
};
pub use parse::{parse, GenericNode, ParseError, PayloadFormat};
pub use probe::{Payload, ProbeError, ProbeOptions, Prober};

use crate::config::RegionConfig;

/// Parse a payload and extract the region record, then let `read` pull the
/// values it needs out of it
///
/// Returns `None` when the payload cannot be parsed, holds no records, or
/// `read` finds nothing usable. Callers hand this to
/// [`Prober::probe_map`] so such payloads count as failed candidates.
pub fn read_payload<T, F>(payload: &Payload, region: &RegionConfig, read: F) -> Option<T>
where
    F: FnOnce(Record<'_>) -> Option<T>,
{
    let format = PayloadFormat::detect(None, payload.content_type.as_deref(), &payload.url, &payload.body);

    let node = match parse(&payload.body, format) {
        Ok(node) => node,
        Err(e) => {
            tracing::debug!("Could not parse {} as {}: {}", payload.url, format, e);
            return None;
        }
    };

    match extract_record(&node, region) {
        Ok(record) => {
            if !record.matched() {
                tracing::debug!("No record in {} names {}; using the first one", payload.url, region.name);
            }
            read(record)
        }
        Err(e) => {
            tracing::debug!("{}: {}", payload.url, e);
            None
        }
    }
}
