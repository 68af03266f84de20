/// Chat orchestrator: a single request/response exchange with the backend.
///
/// Chat traffic is exploratory and does not refresh the dashboard, unless
/// the deployment's incident log is known to record chat exchanges
/// (`chat.refresh_dashboard = true`).
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use crate::dashboard::{NoRefresh, Refresh};
use crate::error::ScanError;
use crate::model::ChatResult;
use crate::normalize;
use crate::transport::{BaseUrl, Request, Transport};

use super::{failure_notice, validate_input};

/// User label sent with chat messages when none is configured.
pub const DEFAULT_CHAT_USER: &str = "operator";

pub struct ChatOrchestrator {
    transport: Arc<dyn Transport>,
    base: BaseUrl,
    timeout: Duration,
    user: String,
    refresh: Arc<dyn Refresh>,
}

impl ChatOrchestrator {
    pub fn new(transport: Arc<dyn Transport>, base: BaseUrl, timeout: Duration, user: impl Into<String>) -> Self {
        let user = user.into();
        Self {
            transport,
            base,
            timeout,
            user: if user.trim().is_empty() {
                DEFAULT_CHAT_USER.to_string()
            } else {
                user
            },
            refresh: Arc::new(NoRefresh),
        }
    }

    /// Refresh the dashboard after each successful exchange.
    pub fn with_refresh(mut self, refresh: Arc<dyn Refresh>) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    /// Send `message`; failures come back as [`ChatResult::placeholder`].
    pub fn send(&self, message: &str) -> Result<ChatResult, ScanError> {
        self.send_as(&self.user, message)
    }

    /// Send `message` under a different user label.
    pub fn send_as(&self, user: &str, message: &str) -> Result<ChatResult, ScanError> {
        match self.try_send_as(user, message) {
            Ok(result) => Ok(result),
            Err(ScanError::Validation) => Err(ScanError::Validation),
            Err(err) => {
                log::warn!("chat failed: {err}");
                Ok(ChatResult::placeholder(failure_notice("Chat", &err)))
            }
        }
    }

    pub fn try_send_as(&self, user: &str, message: &str) -> Result<ChatResult, ScanError> {
        let message = validate_input(message)?;
        let user = match user.trim() {
            "" => self.user.as_str(),
            user => user,
        };

        let request = Request::post_json(
            self.base.join("chat"),
            json!({ "user": user, "message": message }),
        )
        .with_timeout(self.timeout);
        let resp = self.transport.request(&request)?;
        let result = normalize::normalize_chat(&resp.json()?)?;

        self.refresh.request_refresh();
        Ok(result)
    }
}
