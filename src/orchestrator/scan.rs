/// Scan orchestrator: submit a prompt, return raw vs redacted output.
///
/// A successful scan asks the dashboard to refresh so the KPI cards reflect
/// it. The refresh is fire-and-forget: the scan result is returned whether
/// or not the refresh later succeeds.
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::dashboard::Refresh;
use crate::error::ScanError;
use crate::model::ScanResult;
use crate::normalize;
use crate::transport::{BaseUrl, Request, Transport};

use super::{failure_notice, validate_input};

/// Inference is slow on a cold backend; tens of seconds is normal.
pub const DEFAULT_SCAN_TIMEOUT: Duration = Duration::from_secs(60);

pub struct ScanOrchestrator {
    transport: Arc<dyn Transport>,
    base: BaseUrl,
    timeout: Duration,
    refresh: Arc<dyn Refresh>,
}

impl ScanOrchestrator {
    pub fn new(
        transport: Arc<dyn Transport>,
        base: BaseUrl,
        timeout: Duration,
        refresh: Arc<dyn Refresh>,
    ) -> Self {
        Self {
            transport,
            base,
            timeout,
            refresh,
        }
    }

    /// Scan `prompt`.
    ///
    /// Returns `Err(Validation)` for blank input without touching the
    /// network. Every other failure comes back as
    /// [`ScanResult::placeholder`].
    pub fn scan(&self, prompt: &str) -> Result<ScanResult, ScanError> {
        match self.try_scan(prompt) {
            Ok(result) => Ok(result),
            Err(ScanError::Validation) => Err(ScanError::Validation),
            Err(err) => {
                log::warn!("scan failed: {err}");
                Ok(ScanResult::placeholder(failure_notice("Scan", &err)))
            }
        }
    }

    /// Scan `prompt`, surfacing every failure as an error.
    pub fn try_scan(&self, prompt: &str) -> Result<ScanResult, ScanError> {
        let prompt = validate_input(prompt)?;

        let request = Request::post_json(self.base.join("scan"), json!({ "prompt": prompt }))
            .with_timeout(self.timeout);
        let resp = self.transport.request(&request)?;
        let result = normalize::normalize_scan(&resp.json()?)?;

        log::debug!(
            "scan complete: flagged={} redactions={}",
            result.flagged,
            result.redactions.len()
        );
        self.refresh.request_refresh();

        Ok(result)
    }
}
