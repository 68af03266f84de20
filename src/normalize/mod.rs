/// Response normalizer: maps every backend payload shape onto the model.
///
/// Backends in the field disagree on field names, envelope shapes, and
/// whether redaction tags arrive as bare strings or as `{type, value}`
/// objects. This module absorbs all of that so nothing downstream ever sees
/// an alias, a `null`, or an absent count:
///
/// - counts default to `0`, rates to `0.0`, tag lists to empty
/// - aliases resolve in the fixed order defined in [`aliases`]
/// - a wrong top-level shape is a [`NormalizationError`], never coerced
use std::collections::HashSet;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};

use crate::error::NormalizationError;
use crate::model::{ChatResult, IncidentRecord, Metrics, RedactionTag, ScanResult};

pub mod aliases;

use aliases::pick;

/// Provider label used when a record does not name one.
pub const UNKNOWN_PROVIDER: &str = "unknown";

/// Epoch values above this are milliseconds rather than seconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 1e12;

type Result<T> = std::result::Result<T, NormalizationError>;

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Normalize a `/metrics` payload.
///
/// Accepts the counters at the top level or under a `metrics` envelope.
/// `flagged_count <= total_requests` is restored by raising the total.
pub fn normalize_metrics(payload: &Value) -> Result<Metrics> {
    let mut obj = expect_object(payload)?;
    if !has_any(obj, &[aliases::TOTAL_REQUESTS, aliases::FLAGGED_COUNT, aliases::FLAG_RATE])
        && let Some(Value::Object(inner)) = obj.get("metrics")
    {
        obj = inner;
    }

    let flagged_count = count_field(obj, aliases::FLAGGED_COUNT, "flagged_count")?;
    let total_requests = count_field(obj, aliases::TOTAL_REQUESTS, "total_requests")?;
    let flag_rate = match pick(obj, aliases::FLAG_RATE) {
        Some((_, v)) => rate_value(v)?,
        None => 0.0,
    };

    Ok(Metrics {
        total_requests: total_requests.max(flagged_count),
        flagged_count,
        flag_rate,
    })
}

// ---------------------------------------------------------------------------
// Incidents
// ---------------------------------------------------------------------------

/// Normalize one incident/log record.
pub fn normalize_incident(payload: &Value) -> Result<IncidentRecord> {
    let obj = expect_object(payload)?;

    let id = match pick(obj, aliases::INCIDENT_ID) {
        Some((_, v)) => id_value(v)?,
        None => return Err(NormalizationError::MissingField("id")),
    };
    let timestamp = match pick(obj, aliases::TIMESTAMP) {
        Some((_, v)) => timestamp_value(v)?,
        None => return Err(NormalizationError::MissingField("timestamp")),
    };
    let provider = match pick(obj, aliases::PROVIDER) {
        Some((_, Value::String(s))) if !s.trim().is_empty() => s.trim().to_string(),
        Some((_, Value::String(_))) | None => UNKNOWN_PROVIDER.to_string(),
        Some((_, other)) => other.to_string(),
    };
    let redactions = redactions_field(obj)?;
    let flagged = match pick(obj, aliases::FLAGGED) {
        Some((_, v)) => bool_value(v, "flagged")?,
        None => !redactions.is_empty(),
    };

    Ok(IncidentRecord {
        id,
        timestamp,
        provider,
        flagged,
        redactions,
    })
}

/// Normalize an incident list from either the `incidents` or `logs`
/// endpoint: a bare array, or an object envelope around one.
pub fn normalize_incidents(payload: &Value) -> Result<Vec<IncidentRecord>> {
    let items = match payload {
        Value::Array(items) => items,
        Value::Object(obj) => match pick(obj, aliases::INCIDENT_LIST) {
            Some((_, Value::Array(items))) => items,
            Some((_, other)) => {
                return Err(NormalizationError::UnexpectedShape {
                    expected: "array of incidents",
                    found: kind_of(other),
                });
            }
            None => {
                return Err(NormalizationError::UnexpectedShape {
                    expected: "array of incidents",
                    found: "object without an incident list",
                });
            }
        },
        other => {
            return Err(NormalizationError::UnexpectedShape {
                expected: "array of incidents",
                found: kind_of(other),
            });
        }
    };

    items.iter().map(normalize_incident).collect()
}

/// Collapse a moderation-outcome list to tags.
///
/// Items may be bare labels (`"email"`) or objects (`{"type": "email",
/// "value": "a@b.c"}`); only the type survives. A comma-separated string
/// is accepted as shorthand.
pub fn normalize_redactions(value: &Value) -> Result<Vec<RedactionTag>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items.iter().map(tag_value).collect(),
        Value::String(s) => Ok(s
            .split(',')
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .map(RedactionTag::from_label)
            .collect()),
        other => Err(NormalizationError::InvalidField {
            field: "redactions",
            reason: format!("expected a list, found {}", kind_of(other)),
        }),
    }
}

fn tag_value(item: &Value) -> Result<RedactionTag> {
    match item {
        Value::String(label) => Ok(RedactionTag::from_label(label)),
        Value::Object(obj) => Ok(match pick(obj, aliases::TAG_TYPE) {
            Some((_, Value::String(label))) => RedactionTag::from_label(label),
            _ => RedactionTag::Other,
        }),
        other => Err(NormalizationError::InvalidField {
            field: "redactions",
            reason: format!("unsupported tag {}", kind_of(other)),
        }),
    }
}

fn redactions_field(obj: &Map<String, Value>) -> Result<Vec<RedactionTag>> {
    match pick(obj, aliases::REDACTIONS) {
        Some((_, v)) => normalize_redactions(v),
        None => Ok(Vec::new()),
    }
}

// ---------------------------------------------------------------------------
// Scan / chat
// ---------------------------------------------------------------------------

/// Normalize a `POST /scan` response.
///
/// `redacted_output` is required: falling back to the raw text would show
/// unredacted content as if it were safe.
pub fn normalize_scan(payload: &Value) -> Result<ScanResult> {
    let obj = expect_object(payload)?;

    let raw_output = match pick(obj, aliases::RAW_OUTPUT) {
        Some((_, v)) => text_value(v),
        None => crate::model::EMPTY_PLACEHOLDER.to_string(),
    };
    let redacted_output = match pick(obj, aliases::REDACTED_OUTPUT) {
        Some((_, v)) => text_value(v),
        None => return Err(NormalizationError::MissingField("redacted_output")),
    };
    let incidents = match pick(obj, aliases::SCAN_INCIDENTS) {
        Some((_, v)) => normalize_incidents(v)?,
        None => Vec::new(),
    };
    let redactions = match pick(obj, aliases::REDACTIONS) {
        Some((_, v)) => normalize_redactions(v)?,
        None => union_of_tags(&incidents),
    };
    let flagged = match pick(obj, aliases::FLAGGED) {
        Some((_, v)) => bool_value(v, "flagged")?,
        None => !redactions.is_empty() || incidents.iter().any(|i| i.flagged),
    };

    Ok(ScanResult {
        raw_output,
        redacted_output,
        flagged,
        redactions,
        incidents,
    })
}

/// Normalize a `POST /chat` response.
pub fn normalize_chat(payload: &Value) -> Result<ChatResult> {
    let obj = expect_object(payload)?;

    let answer = match pick(obj, aliases::ANSWER) {
        Some((_, v)) => text_value(v),
        None => return Err(NormalizationError::MissingField("answer")),
    };
    let redactions = redactions_field(obj)?;
    let flagged = match pick(obj, aliases::FLAGGED) {
        Some((_, v)) => bool_value(v, "flagged")?,
        None => !redactions.is_empty(),
    };

    Ok(ChatResult {
        answer,
        flagged,
        redactions,
    })
}

fn union_of_tags(incidents: &[IncidentRecord]) -> Vec<RedactionTag> {
    let mut seen = HashSet::new();
    incidents
        .iter()
        .flat_map(|i| i.redactions.iter().copied())
        .filter(|tag| seen.insert(*tag))
        .collect()
}

// ---------------------------------------------------------------------------
// Value decoders
// ---------------------------------------------------------------------------

fn expect_object(payload: &Value) -> Result<&Map<String, Value>> {
    payload
        .as_object()
        .ok_or(NormalizationError::UnexpectedShape {
            expected: "object",
            found: kind_of(payload),
        })
}

fn has_any(obj: &Map<String, Value>, lists: &[&[&'static str]]) -> bool {
    lists.iter().any(|aliases| pick(obj, aliases).is_some())
}

fn count_field(obj: &Map<String, Value>, aliases: &[&'static str], field: &'static str) -> Result<u64> {
    match pick(obj, aliases) {
        Some((_, v)) => count_value(v, field),
        None => Ok(0),
    }
}

fn count_value(value: &Value, field: &'static str) -> Result<u64> {
    let invalid = |reason: String| NormalizationError::InvalidField { field, reason };

    let number = match value {
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                return Ok(u);
            }
            n.as_f64().unwrap_or(f64::NAN)
        }
        Value::String(s) => {
            let s = s.trim();
            if let Ok(u) = s.parse::<u64>() {
                return Ok(u);
            }
            s.parse::<f64>()
                .map_err(|_| invalid(format!("`{s}` is not a number")))?
        }
        other => return Err(invalid(format!("expected a count, found {}", kind_of(other)))),
    };

    if number.is_finite() && number >= 0.0 && number.fract() == 0.0 && number <= u64::MAX as f64 {
        Ok(number as u64)
    } else {
        Err(invalid(format!("{number} is not a non-negative integer")))
    }
}

fn rate_value(value: &Value) -> Result<f64> {
    let invalid = |reason: String| NormalizationError::InvalidField {
        field: "flag_rate",
        reason,
    };

    let rate = match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => {
            let s = s.trim().trim_end_matches('%');
            s.parse::<f64>()
                .map_err(|_| invalid(format!("`{s}` is not a number")))?
        }
        other => return Err(invalid(format!("expected a rate, found {}", kind_of(other)))),
    };

    if !rate.is_finite() || rate < 0.0 {
        return Err(invalid(format!("{rate} is not a valid rate")));
    }
    let rate = if rate > 1.0 && rate <= 100.0 {
        rate / 100.0
    } else {
        rate
    };
    Ok(rate.clamp(0.0, 1.0))
}

fn id_value(value: &Value) -> Result<i64> {
    let parsed = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| NormalizationError::InvalidField {
        field: "id",
        reason: format!("expected an integer id, found {value}"),
    })
}

fn bool_value(value: &Value, field: &'static str) -> Result<bool> {
    let parsed = match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    };
    parsed.ok_or_else(|| NormalizationError::InvalidField {
        field,
        reason: format!("expected a boolean, found {value}"),
    })
}

/// Parse RFC 3339, naive ISO-8601 (read as UTC), or Unix epoch seconds/millis.
fn timestamp_value(value: &Value) -> Result<DateTime<Utc>> {
    let invalid = || NormalizationError::InvalidField {
        field: "timestamp",
        reason: format!("unrecognised timestamp {value}"),
    };

    match value {
        Value::String(s) => parse_timestamp_str(s.trim()).ok_or_else(invalid),
        Value::Number(n) => n.as_f64().and_then(from_epoch).ok_or_else(invalid),
        _ => Err(invalid()),
    }
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    s.parse::<f64>().ok().and_then(from_epoch)
}

fn from_epoch(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    if value >= EPOCH_MILLIS_THRESHOLD {
        return DateTime::from_timestamp_millis(value as i64);
    }
    let secs = value.trunc() as i64;
    let nanos = (value.fract() * 1e9).round() as u32;
    DateTime::from_timestamp(secs, nanos.min(999_999_999))
}

fn text_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
