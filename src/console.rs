/// Console facade: one configured backend, every component wired to it.
///
/// The transport is shared by all components. The dashboard loader is the
/// refresh target for scans, wakes, and (when configured) chat.
use std::sync::Arc;
use std::time::Duration;

use crate::config::{BackendTarget, GuardrailConfig};
use crate::dashboard::{DashboardLoader, Refresh};
use crate::error::ConfigError;
use crate::orchestrator::{ChatOrchestrator, ScanOrchestrator};
use crate::transport::{BaseUrl, HttpTransport, Transport};
use crate::wake::{WakeController, WakePolicy};

pub struct Console {
    base: BaseUrl,
    transport: Arc<dyn Transport>,
    dashboard: DashboardLoader,
    scanner: ScanOrchestrator,
    chat: ChatOrchestrator,
    wake: Arc<WakeController>,
}

impl Console {
    /// Build a console over HTTP.
    ///
    /// Returns [`ConfigError::Unconfigured`] when no base URL is set.
    pub fn from_config(config: &GuardrailConfig) -> Result<Self, ConfigError> {
        Self::with_transport(config, Arc::new(HttpTransport::new()))
    }

    /// Build a console over any transport.
    pub fn with_transport(
        config: &GuardrailConfig,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ConfigError> {
        let base = match config.backend_target()? {
            BackendTarget::Configured(base) => base,
            BackendTarget::Unconfigured => return Err(ConfigError::Unconfigured),
        };

        let dashboard = DashboardLoader::new(
            Arc::clone(&transport),
            base.clone(),
            config.timeouts.request(),
            config.dashboard.incident_limit,
        );
        let refresh: Arc<dyn Refresh> = Arc::new(dashboard.clone());

        let scanner = ScanOrchestrator::new(
            Arc::clone(&transport),
            base.clone(),
            config.timeouts.scan(),
            Arc::clone(&refresh),
        );

        let mut chat = ChatOrchestrator::new(
            Arc::clone(&transport),
            base.clone(),
            config.timeouts.request(),
            config.chat.user.clone(),
        );
        if config.chat.refresh_dashboard {
            chat = chat.with_refresh(Arc::clone(&refresh));
        }

        let policy = WakePolicy {
            deadline: Duration::from_millis(config.wake.deadline_ms),
            interval: Duration::from_millis(config.wake.poll_interval_ms),
            probe_timeout: config.timeouts.probe(),
        };
        let wake = Arc::new(WakeController::new(
            Arc::clone(&transport),
            base.clone(),
            policy,
            refresh,
        ));

        log::debug!("console configured for {base}");

        Ok(Self {
            base,
            transport,
            dashboard,
            scanner,
            chat,
            wake,
        })
    }

    pub fn base_url(&self) -> &BaseUrl {
        &self.base
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn dashboard(&self) -> &DashboardLoader {
        &self.dashboard
    }

    pub fn scanner(&self) -> &ScanOrchestrator {
        &self.scanner
    }

    pub fn chat(&self) -> &ChatOrchestrator {
        &self.chat
    }

    pub fn wake(&self) -> &Arc<WakeController> {
        &self.wake
    }
}
