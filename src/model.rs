//! Stable internal model produced by the normalizer.
//!
//! Every value here is transient: fetched from the backend, replaced
//! wholesale on the next load, never mutated in place.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Placeholder shown wherever there is nothing to display.
pub const EMPTY_PLACEHOLDER: &str = "—";

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Aggregate moderation counters for the KPI cards.
///
/// `flag_rate` is backend-computed and may be rounded; it is not required to
/// equal `flagged_count / total_requests`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Metrics {
    pub total_requests: u64,
    pub flagged_count: u64,
    pub flag_rate: f64,
}

impl Metrics {
    /// Flag rate formatted for display, e.g. `12.5%`.
    pub fn flag_rate_percent(&self) -> String {
        format!("{:.1}%", self.flag_rate * 100.0)
    }
}

// ---------------------------------------------------------------------------
// Redaction tags
// ---------------------------------------------------------------------------

/// Closed set of sensitive-content categories reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RedactionTag {
    Email,
    Phone,
    Ssn,
    CreditCard,
    Name,
    Other,
}

impl RedactionTag {
    /// Map a backend label onto the closed tag set. Unknown labels are `Other`.
    pub fn from_label(label: &str) -> Self {
        let key: String = label
            .trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                c => c.to_ascii_lowercase(),
            })
            .collect();

        match key.as_str() {
            "email" | "email_address" => Self::Email,
            "phone" | "phone_number" => Self::Phone,
            "ssn" | "us_ssn" => Self::Ssn,
            "credit_card" | "creditcard" | "card" => Self::CreditCard,
            "name" | "person" => Self::Name,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Phone => "phone",
            Self::Ssn => "ssn",
            Self::CreditCard => "credit_card",
            Self::Name => "name",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for RedactionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comma-join tags for display; an empty list renders as the placeholder.
pub fn render_redactions(tags: &[RedactionTag]) -> String {
    if tags.is_empty() {
        return EMPTY_PLACEHOLDER.to_string();
    }
    tags.iter()
        .map(RedactionTag::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

// ---------------------------------------------------------------------------
// Incidents
// ---------------------------------------------------------------------------

/// One logged exchange, as recorded by the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncidentRecord {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub provider: String,
    pub flagged: bool,
    pub redactions: Vec<RedactionTag>,
}

// ---------------------------------------------------------------------------
// Scan / chat results
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResult {
    pub raw_output: String,
    pub redacted_output: String,
    pub flagged: bool,
    pub redactions: Vec<RedactionTag>,
    pub incidents: Vec<IncidentRecord>,
}

impl ScanResult {
    /// Renderable stand-in for a scan that could not complete.
    pub fn placeholder(notice: impl Into<String>) -> Self {
        Self {
            raw_output: EMPTY_PLACEHOLDER.to_string(),
            redacted_output: notice.into(),
            flagged: false,
            redactions: Vec::new(),
            incidents: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatResult {
    pub answer: String,
    pub flagged: bool,
    pub redactions: Vec<RedactionTag>,
}

impl ChatResult {
    pub fn placeholder(notice: impl Into<String>) -> Self {
        Self {
            answer: notice.into(),
            flagged: false,
            redactions: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_comma_joined_tags() {
        let tags = [RedactionTag::Email, RedactionTag::Phone];
        assert_eq!(render_redactions(&tags), "email, phone");
    }

    #[test]
    fn renders_placeholder_for_no_tags() {
        assert_eq!(render_redactions(&[]), "—");
    }

    #[test]
    fn tag_labels_are_case_and_separator_insensitive() {
        assert_eq!(RedactionTag::from_label("EMAIL"), RedactionTag::Email);
        assert_eq!(
            RedactionTag::from_label("credit-card"),
            RedactionTag::CreditCard
        );
        assert_eq!(
            RedactionTag::from_label("Phone Number"),
            RedactionTag::Phone
        );
        assert_eq!(RedactionTag::from_label("US_SSN"), RedactionTag::Ssn);
        assert_eq!(RedactionTag::from_label("person"), RedactionTag::Name);
        assert_eq!(RedactionTag::from_label("iban"), RedactionTag::Other);
    }

    #[test]
    fn flag_rate_formats_as_percent() {
        let m = Metrics {
            total_requests: 8,
            flagged_count: 1,
            flag_rate: 0.125,
        };
        assert_eq!(m.flag_rate_percent(), "12.5%");
        assert_eq!(Metrics::default().flag_rate_percent(), "0.0%");
    }

    #[test]
    fn scan_placeholder_is_renderable() {
        let r = ScanResult::placeholder("Scan failed: backend unreachable");
        assert_eq!(r.raw_output, "—");
        assert!(!r.redacted_output.is_empty());
        assert!(!r.flagged);
        assert!(r.incidents.is_empty());
    }
}
