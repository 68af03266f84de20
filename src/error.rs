//! Error taxonomy shared by the transport, normalizer, and orchestrators.
//!
//! Transport and normalization errors are caught at the orchestrator
//! boundary. Only [`ScanError::Validation`] and [`LoadError`] ever reach a
//! caller of the public scan/chat/dashboard operations, and neither is
//! allowed to leave the UI without something to render.

use std::time::Duration;

/// Failure of a single network call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out after {}ms", after.as_millis())]
    Timeout { after: Duration },
    #[error("network error: {0}")]
    Network(String),
    #[error("backend returned HTTP {status}")]
    Http { status: u16, body: String },
}

impl TransportError {
    /// HTTP status code, if the backend answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Network(_) => "network",
            Self::Http { .. } => "http",
        }
    }
}

/// A backend payload that could not be mapped onto the internal model.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizationError {
    #[error("response body is not valid JSON")]
    NotJson,
    #[error("expected {expected}, found {found}")]
    UnexpectedShape {
        expected: &'static str,
        found: &'static str,
    },
    #[error("field `{field}` is invalid: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("required field `{0}` is missing")]
    MissingField(&'static str),
}

/// Failure of either half of the dashboard's paired fetch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Normalization(#[from] NormalizationError),
}

/// Dashboard load failure. The published snapshot is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("metrics fetch failed: {0}")]
    Metrics(FetchError),
    #[error("incident fetch failed: {0}")]
    Incidents(FetchError),
}

/// Scan or chat failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScanError {
    #[error("input is empty")]
    Validation,
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Normalization(#[from] NormalizationError),
}

impl From<FetchError> for ScanError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Transport(e) => Self::Transport(e),
            FetchError::Normalization(e) => Self::Normalization(e),
        }
    }
}

/// Deployment configuration problems.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("no backend base URL configured (set GUARDRAIL_BASE_URL or backend.base_url)")]
    Unconfigured,
    #[error("invalid backend base URL `{0}`: expected an http:// or https:// URL")]
    InvalidBaseUrl(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_reports_millis() {
        let err = TransportError::Timeout {
            after: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "request timed out after 1500ms");
        assert_eq!(err.error_code(), "timeout");
    }

    #[test]
    fn status_only_for_http_errors() {
        let http = TransportError::Http {
            status: 503,
            body: "asleep".to_string(),
        };
        assert_eq!(http.status(), Some(503));
        assert_eq!(TransportError::Network("refused".into()).status(), None);
    }

    #[test]
    fn fetch_error_converts_into_scan_error() {
        let fetch = FetchError::Normalization(NormalizationError::NotJson);
        assert_eq!(
            ScanError::from(fetch),
            ScanError::Normalization(NormalizationError::NotJson)
        );
    }
}
