/// Transport: one timed HTTP call per invocation.
///
/// The [`Transport`] trait is the seam between the orchestrators and the
/// network. [`HttpTransport`] is the production implementation over `ureq`;
/// tests substitute scripted fakes.
///
/// A transport never retries. Retry and poll policy belongs to the caller
/// (only the wake controller retries, and always against a deadline).
use std::fmt;
use std::time::Duration;

use serde_json::Value;

use crate::error::{ConfigError, NormalizationError, TransportError};

pub mod http;

pub use http::HttpTransport;

/// Default per-call timeout when the caller does not set one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Request / response
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
        }
    }
}

/// A single outbound call.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    /// JSON body; sent with `Content-Type: application/json`.
    pub body: Option<Value>,
    pub timeout: Duration,
}

impl Request {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            body: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn post_json(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            body: Some(body),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// A 2xx response. Non-2xx statuses are [`TransportError::Http`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn json(&self) -> Result<Value, NormalizationError> {
        serde_json::from_str(&self.body).map_err(|_| NormalizationError::NotJson)
    }
}

/// Issue exactly one network call, bounded by `request.timeout`.
pub trait Transport: Send + Sync {
    fn request(&self, request: &Request) -> Result<RawResponse, TransportError>;
}

// ---------------------------------------------------------------------------
// Base URL
// ---------------------------------------------------------------------------

/// Validated backend root, without a trailing slash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseUrl(String);

impl BaseUrl {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let trimmed = raw.trim().trim_end_matches('/');
        let has_scheme = trimmed.starts_with("http://") || trimmed.starts_with("https://");
        let has_host = trimmed
            .split_once("://")
            .is_some_and(|(_, rest)| !rest.is_empty());
        if !has_scheme || !has_host {
            return Err(ConfigError::InvalidBaseUrl(raw.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Join a path (with optional query string) onto the base.
    pub fn join(&self, path: &str) -> String {
        let path = path.trim_start_matches('/');
        if path.is_empty() {
            format!("{}/", self.0)
        } else {
            format!("{}/{}", self.0, path)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
