/// Configuration schema and defaults for the guardrail console.
///
/// Defines the TOML structure with sections `[backend]`, `[timeouts]`,
/// `[wake]`, `[dashboard]`, `[chat]`, and `[logging]`. Every field has a
/// built-in default except the backend URL, whose absence is the explicit
/// [`BackendTarget::Unconfigured`] state.
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dashboard::DEFAULT_INCIDENT_LIMIT;
use crate::error::ConfigError;
use crate::orchestrator::DEFAULT_SCAN_TIMEOUT;
use crate::transport::{BaseUrl, DEFAULT_TIMEOUT};
use crate::wake::{DEFAULT_POLL_INTERVAL, DEFAULT_PROBE_TIMEOUT, DEFAULT_WAKE_DEADLINE};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Fully resolved configuration.
///
/// Maps to `~/.guardrail/config.toml` and `.guardrail.toml`. All sections
/// are optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailConfig {
    pub backend: BackendConfig,
    pub timeouts: TimeoutConfig,
    pub wake: WakeConfig,
    pub dashboard: DashboardConfig,
    pub chat: ChatConfig,
    pub logging: LoggingConfig,
}

/// Where network features point, once validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendTarget {
    /// No base URL: network features are disabled.
    Unconfigured,
    Configured(BaseUrl),
}

impl GuardrailConfig {
    /// Validate the backend URL. A blank URL counts as unconfigured.
    pub fn backend_target(&self) -> Result<BackendTarget, ConfigError> {
        match self.backend.base_url.as_deref().map(str::trim) {
            None | Some("") => Ok(BackendTarget::Unconfigured),
            Some(raw) => BaseUrl::parse(raw).map(BackendTarget::Configured),
        }
    }

    /// Annotated default config written by `guardrail config init`.
    pub fn default_toml() -> String {
        r#"# Guardrail console configuration
#
# Configuration hierarchy (highest precedence wins):
#   1. Environment variables (GUARDRAIL_*)
#   2. Project config (.guardrail.toml in current directory)
#   3. User global config (~/.guardrail/config.toml)
#   4. Built-in defaults

[backend]
# Root URL of the guardrail backend. Leave unset to disable network features.
# base_url = "https://guardrail.example.com"

[timeouts]
request_ms = 10000    # metrics / incidents / chat
scan_ms = 60000       # scans run model inference; allow tens of seconds
probe_ms = 5000       # single health probe during wake

[wake]
deadline_ms = 75000
poll_interval_ms = 1500

[dashboard]
incident_limit = 10

[chat]
user = "operator"
# Set when the backend's incident log records chat traffic.
refresh_dashboard = false

[logging]
level = "warn"        # error | warn | info | debug | trace (RUST_LOG overrides)
"#
        .to_string()
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Per-call transport timeouts (milliseconds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub request_ms: u64,
    pub scan_ms: u64,
    pub probe_ms: u64,
}

fn millis(duration: Duration) -> u64 {
    duration.as_millis() as u64
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_ms: millis(DEFAULT_TIMEOUT),
            scan_ms: millis(DEFAULT_SCAN_TIMEOUT),
            probe_ms: millis(DEFAULT_PROBE_TIMEOUT),
        }
    }
}

impl TimeoutConfig {
    pub fn request(&self) -> Duration {
        Duration::from_millis(self.request_ms)
    }

    pub fn scan(&self) -> Duration {
        Duration::from_millis(self.scan_ms)
    }

    pub fn probe(&self) -> Duration {
        Duration::from_millis(self.probe_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WakeConfig {
    pub deadline_ms: u64,
    pub poll_interval_ms: u64,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            deadline_ms: millis(DEFAULT_WAKE_DEADLINE),
            poll_interval_ms: millis(DEFAULT_POLL_INTERVAL),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Number of most recent incidents to fetch.
    pub incident_limit: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            incident_limit: DEFAULT_INCIDENT_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub user: String,
    pub refresh_dashboard: bool,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            user: crate::orchestrator::DEFAULT_CHAT_USER.to_string(),
            refresh_dashboard: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `error`, `warn`, `info`, `debug`, or `trace`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Partial layers
// ---------------------------------------------------------------------------

/// One config file as written: only keys that are present override.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigLayer {
    pub backend: Option<BackendLayer>,
    pub timeouts: Option<TimeoutLayer>,
    pub wake: Option<WakeLayer>,
    pub dashboard: Option<DashboardLayer>,
    pub chat: Option<ChatLayer>,
    pub logging: Option<LoggingLayer>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendLayer {
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TimeoutLayer {
    pub request_ms: Option<u64>,
    pub scan_ms: Option<u64>,
    pub probe_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WakeLayer {
    pub deadline_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DashboardLayer {
    pub incident_limit: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatLayer {
    pub user: Option<String>,
    pub refresh_dashboard: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingLayer {
    pub level: Option<String>,
}

impl ConfigLayer {
    /// Merge this layer's present keys into `config`.
    pub fn apply_to(&self, config: &mut GuardrailConfig) {
        if let Some(backend) = &self.backend
            && let Some(url) = &backend.base_url
        {
            config.backend.base_url = Some(url.clone());
        }
        if let Some(t) = &self.timeouts {
            set(&mut config.timeouts.request_ms, t.request_ms);
            set(&mut config.timeouts.scan_ms, t.scan_ms);
            set(&mut config.timeouts.probe_ms, t.probe_ms);
        }
        if let Some(w) = &self.wake {
            set(&mut config.wake.deadline_ms, w.deadline_ms);
            set(&mut config.wake.poll_interval_ms, w.poll_interval_ms);
        }
        if let Some(d) = &self.dashboard {
            set(&mut config.dashboard.incident_limit, d.incident_limit);
        }
        if let Some(c) = &self.chat {
            set(&mut config.chat.user, c.user.clone());
            set(&mut config.chat.refresh_dashboard, c.refresh_dashboard);
        }
        if let Some(l) = &self.logging {
            set(&mut config.logging.level, l.level.clone());
        }
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_produces_defaults() {
        let config: GuardrailConfig = toml::from_str("").unwrap();
        assert_eq!(config, GuardrailConfig::default());
        assert_eq!(config.backend_target(), Ok(BackendTarget::Unconfigured));
        assert_eq!(config.wake.deadline_ms, 75_000);
        assert_eq!(config.wake.poll_interval_ms, 1_500);
        assert_eq!(config.dashboard.incident_limit, 10);
    }

    #[test]
    fn default_toml_parses_back() {
        let config: GuardrailConfig = toml::from_str(&GuardrailConfig::default_toml()).unwrap();
        assert_eq!(config, GuardrailConfig::default());
    }

    #[test]
    fn blank_base_url_is_unconfigured() {
        let mut config = GuardrailConfig::default();
        config.backend.base_url = Some("   ".to_string());
        assert_eq!(config.backend_target(), Ok(BackendTarget::Unconfigured));
    }

    #[test]
    fn invalid_base_url_is_rejected() {
        let mut config = GuardrailConfig::default();
        config.backend.base_url = Some("guardrail.local".to_string());
        assert_eq!(
            config.backend_target(),
            Err(ConfigError::InvalidBaseUrl("guardrail.local".to_string()))
        );
    }

    #[test]
    fn layer_overrides_only_present_keys() {
        let mut config = GuardrailConfig::default();
        let first: ConfigLayer = toml::from_str(
            r#"
[backend]
base_url = "https://one.example.com"

[timeouts]
scan_ms = 90000
"#,
        )
        .unwrap();
        let second: ConfigLayer = toml::from_str(
            r#"
[timeouts]
request_ms = 2000

[chat]
refresh_dashboard = true
"#,
        )
        .unwrap();

        first.apply_to(&mut config);
        second.apply_to(&mut config);

        assert_eq!(
            config.backend.base_url.as_deref(),
            Some("https://one.example.com")
        );
        assert_eq!(config.timeouts.scan_ms, 90_000);
        assert_eq!(config.timeouts.request_ms, 2_000);
        assert_eq!(config.timeouts.probe_ms, 5_000);
        assert!(config.chat.refresh_dashboard);
        assert_eq!(config.chat.user, "operator");
    }

    #[test]
    fn timeouts_convert_to_durations() {
        let t = TimeoutConfig::default();
        assert_eq!(t.request(), Duration::from_secs(10));
        assert_eq!(t.scan(), Duration::from_secs(60));
        assert_eq!(t.probe(), Duration::from_secs(5));
    }

    #[test]
    fn defaults_follow_component_constants() {
        let config = GuardrailConfig::default();
        assert_eq!(config.timeouts.request(), DEFAULT_TIMEOUT);
        assert_eq!(config.timeouts.scan(), DEFAULT_SCAN_TIMEOUT);
        assert_eq!(config.timeouts.probe(), DEFAULT_PROBE_TIMEOUT);
        assert_eq!(config.wake.deadline_ms, 75_000);
        assert_eq!(
            Duration::from_millis(config.wake.poll_interval_ms),
            DEFAULT_POLL_INTERVAL
        );
        assert_eq!(config.dashboard.incident_limit, DEFAULT_INCIDENT_LIMIT);
    }
}
