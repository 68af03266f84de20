//! Scan and chat orchestrators.
//!
//! Both follow the same boundary policy: empty input is rejected locally
//! with [`ScanError::Validation`], and any transport or normalization
//! failure becomes a renderable placeholder result rather than an error.

mod chat;
mod scan;

pub use chat::{ChatOrchestrator, DEFAULT_CHAT_USER};
pub use scan::{DEFAULT_SCAN_TIMEOUT, ScanOrchestrator};

use crate::error::{ScanError, TransportError};

/// The input as typed, or `Validation` if it is only whitespace.
pub(crate) fn validate_input(input: &str) -> Result<&str, ScanError> {
    if input.trim().is_empty() {
        Err(ScanError::Validation)
    } else {
        Ok(input)
    }
}

/// Operator-facing notice for a failed exchange.
pub(crate) fn failure_notice(action: &str, err: &ScanError) -> String {
    let detail = match err {
        ScanError::Transport(TransportError::Timeout { .. }) => {
            "the backend did not answer in time (it may be waking up)".to_string()
        }
        ScanError::Transport(TransportError::Network(_)) => {
            "the backend could not be reached".to_string()
        }
        ScanError::Transport(TransportError::Http { status, .. }) => {
            format!("the backend returned HTTP {status}")
        }
        ScanError::Normalization(e) => format!("the backend response was not understood ({e})"),
        ScanError::Validation => "nothing to send".to_string(),
    };
    format!("{action} failed: {detail}.")
}
