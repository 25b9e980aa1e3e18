//! Lead normalization at ingestion.
//!
//! Raw wire entries are decoded one at a time and cleaned once here, so the
//! aggregator and the table pipeline only ever see typed `LeadRecord`s.

use crate::error::NormalizeError;
use crate::models::{LeadRecord, QualityTier};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, warn};

/// Placeholder shown for empty values.
pub const EMPTY_PLACEHOLDER: &str = "-";

/// Naive layouts accepted for timestamps without an offset.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// A lead as the API sends it.
///
/// Alternate spellings of the same field are separate members because
/// payloads may carry both at once; `normalize_lead` picks one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLead {
    #[serde(default, rename = "_id", deserialize_with = "lenient_string")]
    pub mongo_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub client_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub selected_car: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub selected_product: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub lead_quality: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub quality: Option<String>,
    #[serde(default)]
    pub timestamp: Option<Value>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub source: Option<String>,
}

impl RawLead {
    /// Decode a single payload entry.
    pub fn from_value(index: usize, value: Value) -> Result<Self, NormalizeError> {
        if !value.is_object() {
            return Err(NormalizeError::NotAnObject { index });
        }

        serde_json::from_value(value).map_err(|e| NormalizeError::Malformed {
            index,
            reason: e.to_string(),
        })
    }
}

/// Accept strings, numbers, booleans and `{"$oid": ...}` wrappers as text.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(value_to_string))
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Object(map) => map.get("$oid").and_then(value_to_string),
        _ => None,
    }
}

/// Result of normalizing a batch.
#[derive(Debug, Clone, Default)]
pub struct Ingested {
    /// Records that passed normalization, in payload order.
    pub records: Vec<LeadRecord>,
    /// Entries that were rejected.
    pub skipped: Vec<NormalizeError>,
}

/// Strip whitespace and stray quote characters around a text value.
pub fn clean_text(raw: Option<&str>) -> String {
    raw.map(|s| s.trim().trim_matches('"').trim().to_string())
        .unwrap_or_default()
}

/// Value to display for a possibly empty field.
pub fn display_value(value: &str) -> &str {
    if value.trim().is_empty() {
        EMPTY_PLACEHOLDER
    } else {
        value
    }
}

/// Parse a wire timestamp.
///
/// Offset-less date-times are read in `tz`; a bare date is UTC midnight;
/// numbers are epoch milliseconds. Returns `None` for anything else.
pub fn parse_timestamp<Tz: TimeZone>(value: &Value, tz: &Tz) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp_str(s, tz),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

fn parse_timestamp_str<Tz: TimeZone>(raw: &str, tz: &Tz) -> Option<DateTime<Utc>> {
    let s = raw.trim().trim_matches('"').trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return tz
                .from_local_datetime(&naive)
                .earliest()
                .map(|dt| dt.with_timezone(&Utc));
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// First candidate that is non-empty after cleaning.
fn first_present(candidates: &[Option<&str>]) -> Option<String> {
    candidates
        .iter()
        .map(|c| clean_text(*c))
        .find(|s| !s.is_empty())
}

/// Turn a raw lead into a `LeadRecord`.
pub fn normalize_lead<Tz: TimeZone>(raw: RawLead, tz: &Tz) -> Result<LeadRecord, NormalizeError> {
    let id = first_present(&[raw.mongo_id.as_deref(), raw.id.as_deref()]);
    let display_id = id.clone().unwrap_or_else(|| "<unsaved>".to_string());

    let label = first_present(&[raw.lead_quality.as_deref(), raw.quality.as_deref()])
        .unwrap_or_default();
    if label.is_empty() {
        return Err(NormalizeError::MissingQuality { id: display_id });
    }
    let quality = QualityTier::parse(&label).ok_or_else(|| NormalizeError::UnknownQuality {
        id: display_id.clone(),
        label: label.clone(),
    })?;

    let timestamp = raw.timestamp.as_ref().and_then(|v| parse_timestamp(v, tz));
    if timestamp.is_none() && raw.timestamp.as_ref().is_some_and(|v| !v.is_null()) {
        debug!("Lead {} has an unparseable timestamp, treating as unknown", display_id);
    }

    Ok(LeadRecord {
        id,
        client_name: clean_text(raw.client_name.as_deref()),
        phone: clean_text(raw.phone.as_deref()),
        selected_product: first_present(&[
            raw.selected_car.as_deref(),
            raw.selected_product.as_deref(),
        ])
        .unwrap_or_default(),
        summary: clean_text(raw.summary.as_deref()),
        quality,
        timestamp,
        source: clean_text(raw.source.as_deref()),
    })
}

/// Normalize every entry of a payload, skipping the ones that fail.
pub fn normalize_batch<Tz: TimeZone>(entries: Vec<Value>, tz: &Tz) -> Ingested {
    let mut ingested = Ingested::default();

    for (index, entry) in entries.into_iter().enumerate() {
        let result = RawLead::from_value(index, entry).and_then(|raw| normalize_lead(raw, tz));
        match result {
            Ok(record) => ingested.records.push(record),
            Err(e) => {
                warn!("Skipping lead: {}", e);
                ingested.skipped.push(e);
            }
        }
    }

    debug!(
        "Normalized {} leads ({} skipped)",
        ingested.records.len(),
        ingested.skipped.len()
    );

    ingested
}
