//! Multi-format payload parser
//!
//! JSON, XML and CSV bodies are all decoded into the same generic tree
//! (`serde_json::Value`) so the extractor never needs to know the wire format.

use std::collections::HashSet;
use std::fmt;

use csv::{ReaderBuilder, Trim};
use serde_json::{Map, Value};
use thiserror::Error;

/// Format-independent document tree
pub type GenericNode = Value;

/// Key holding an XML element's text content
pub const TEXT_KEY: &str = "_text";

/// Wire format of a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadFormat {
    Json,
    Xml,
    Csv,
}

impl fmt::Display for PayloadFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadFormat::Json => write!(f, "JSON"),
            PayloadFormat::Xml => write!(f, "XML"),
            PayloadFormat::Csv => write!(f, "CSV"),
        }
    }
}

impl PayloadFormat {
    /// Format named by a `Content-Type` header, if recognizable
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        let content_type = content_type.to_ascii_lowercase();
        if content_type.contains("json") {
            Some(PayloadFormat::Json)
        } else if content_type.contains("xml") {
            Some(PayloadFormat::Xml)
        } else if content_type.contains("csv") {
            Some(PayloadFormat::Csv)
        } else {
            None
        }
    }

    /// Format implied by the URL's file extension, ignoring any query string
    pub fn from_extension(url: &str) -> Option<Self> {
        let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
        if path.ends_with(".json") {
            Some(PayloadFormat::Json)
        } else if path.ends_with(".xml") {
            Some(PayloadFormat::Xml)
        } else if path.ends_with(".csv") {
            Some(PayloadFormat::Csv)
        } else {
            None
        }
    }

    /// Guess the format from the first meaningful character of the body
    pub fn sniff(body: &str) -> Self {
        match strip_bom(body).trim_start().chars().next() {
            Some('{') | Some('[') => PayloadFormat::Json,
            Some('<') => PayloadFormat::Xml,
            _ => PayloadFormat::Csv,
        }
    }

    /// Resolve the format of a payload
    ///
    /// The declared format wins, then the `Content-Type`, then the URL
    /// extension, then sniffing the body.
    pub fn detect(
        declared: Option<Self>,
        content_type: Option<&str>,
        url: &str,
        body: &str,
    ) -> Self {
        declared
            .or_else(|| content_type.and_then(Self::from_content_type))
            .or_else(|| Self::from_extension(url))
            .unwrap_or_else(|| Self::sniff(body))
    }
}

/// Errors that can occur when parsing a payload
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed XML: {0}")]
    Xml(#[from] roxmltree::Error),

    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Empty {0} document")]
    Empty(PayloadFormat),
}

/// Parse a payload body into a generic tree
///
/// # Arguments
/// * `body` - Raw response text
/// * `format` - Wire format to decode
///
/// # Returns
/// * `Ok(GenericNode)` - The decoded tree
/// * `Err(ParseError)` - If the body is empty or malformed
pub fn parse(body: &str, format: PayloadFormat) -> Result<GenericNode, ParseError> {
    let body = strip_bom(body);
    if body.trim().is_empty() {
        return Err(ParseError::Empty(format));
    }

    match format {
        PayloadFormat::Json => Ok(serde_json::from_str(body)?),
        PayloadFormat::Xml => parse_xml(body),
        PayloadFormat::Csv => parse_csv(body),
    }
}

fn strip_bom(body: &str) -> &str {
    body.strip_prefix('\u{feff}').unwrap_or(body)
}

fn parse_xml(body: &str) -> Result<GenericNode, ParseError> {
    let doc = roxmltree::Document::parse(body)?;
    let root = doc.root_element();

    let mut wrapper = Map::new();
    wrapper.insert(root.tag_name().name().to_string(), element_to_node(root));
    Ok(Value::Object(wrapper))
}

fn element_to_node(element: roxmltree::Node<'_, '_>) -> GenericNode {
    let mut map = Map::new();
    for attr in element.attributes() {
        map.insert(attr.name().to_string(), Value::String(attr.value().to_string()));
    }

    // Names already promoted to arrays
    let mut repeated: HashSet<String> = HashSet::new();
    let mut text = String::new();

    for child in element.children() {
        if child.is_element() {
            let name = child.tag_name().name().to_string();
            let value = element_to_node(child);

            match map.get_mut(&name) {
                Some(Value::Array(items)) if repeated.contains(&name) => items.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                    repeated.insert(name);
                }
                None => {
                    map.insert(name, value);
                }
            }
        } else if child.is_text() {
            text.push_str(child.text().unwrap_or_default());
        }
    }

    let text = text.trim();
    if !text.is_empty() {
        map.insert(TEXT_KEY.to_string(), Value::String(text.to_string()));
    }

    Value::Object(map)
}

fn sniff_delimiter(body: &str) -> u8 {
    let header = body.lines().next().unwrap_or_default();
    let semicolons = header.matches(';').count();
    let commas = header.matches(',').count();
    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

fn parse_csv(body: &str) -> Result<GenericNode, ParseError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .delimiter(sniff_delimiter(body))
        .from_reader(body.as_bytes());

    let mut rows = reader.records();
    let headers: Vec<String> = match rows.next() {
        Some(row) => row?.iter().map(str::to_string).collect(),
        None => return Err(ParseError::Empty(PayloadFormat::Csv)),
    };

    let mut records = Vec::new();
    for row in rows {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                tracing::debug!("Skipping unreadable CSV row: {}", e);
                continue;
            }
        };
        if row.iter().all(str::is_empty) {
            continue;
        }

        let mut record = Map::new();
        for (i, cell) in row.iter().enumerate() {
            let key = match headers.get(i) {
                Some(h) if !h.is_empty() => h.clone(),
                _ => format!("column{}", i),
            };
            record.insert(key, Value::String(cell.to_string()));
        }
        records.push(Value::Object(record));
    }

    Ok(Value::Array(records))
}
