//! Field-name precedence lists for every backend concept.
//!
//! Deployments have renamed fields over time. Each list names the accepted
//! spellings, most current first; the decoder takes the first one present
//! with a non-null value and ignores the rest. Supporting a new backend
//! spelling is a one-entry edit here.

use serde_json::{Map, Value};

// Metrics
pub const TOTAL_REQUESTS: &[&str] = &["total_requests", "total", "requests"];
pub const FLAGGED_COUNT: &[&str] = &["flagged_count", "flagged_outputs", "flagged"];
pub const FLAG_RATE: &[&str] = &["flag_rate", "flagged_rate", "rate"];

// Incident records
pub const INCIDENT_ID: &[&str] = &["id", "incident_id", "log_id"];
pub const TIMESTAMP: &[&str] = &["timestamp", "created_at", "ts", "time"];
pub const PROVIDER: &[&str] = &["provider", "model", "source"];
pub const FLAGGED: &[&str] = &["flagged", "is_flagged"];
pub const REDACTIONS: &[&str] = &["redactions", "redaction_types", "pii_types", "tags"];

/// Keys under which an object envelope may carry the incident list.
pub const INCIDENT_LIST: &[&str] = &["incidents", "logs", "items", "data"];

// Tag objects (`{"type": "email", "value": "a@b.c"}`)
pub const TAG_TYPE: &[&str] = &["type", "tag", "entity_type"];

// Scan responses
pub const RAW_OUTPUT: &[&str] = &["raw_output", "raw", "output"];
pub const REDACTED_OUTPUT: &[&str] = &["redacted_output", "redacted", "safe_output"];
pub const SCAN_INCIDENTS: &[&str] = &["incidents", "logs"];

// Chat responses
pub const ANSWER: &[&str] = &["answer", "response", "reply", "output"];

/// First present, non-null value among `aliases`, with the alias that matched.
pub fn pick<'a>(obj: &'a Map<String, Value>, aliases: &[&'static str]) -> Option<(&'static str, &'a Value)> {
    aliases
        .iter()
        .find_map(|&key| obj.get(key).filter(|v| !v.is_null()).map(|v| (key, v)))
}
