//! Operator console client for a guardrail (PII redaction) backend.
//!
//! Submits prompts for scanning, normalizes the backend's loosely-shaped
//! responses into one stable model, loads metrics and incident history as a
//! consistent snapshot, and wakes a backend that has gone to sleep.

pub mod config;
pub mod console;
pub mod dashboard;
pub mod error;
pub mod model;
pub mod normalize;
pub mod orchestrator;
pub mod transport;
pub mod wake;

pub use config::{BackendTarget, GuardrailConfig};
pub use console::Console;
pub use dashboard::{DashboardLoader, DashboardSnapshot, NoRefresh, Refresh};
pub use error::{ConfigError, FetchError, LoadError, NormalizationError, ScanError, TransportError};
pub use model::{ChatResult, IncidentRecord, Metrics, RedactionTag, ScanResult};
pub use orchestrator::{ChatOrchestrator, ScanOrchestrator};
pub use transport::{BaseUrl, HttpTransport, RawResponse, Request, Transport};
pub use wake::{WakeController, WakeOutcome, WakePhase, WakePolicy, WakeReport, WakeState};
