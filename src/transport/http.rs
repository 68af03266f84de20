/// Synchronous HTTP transport over `ureq`.
///
/// One shared [`ureq::Agent`] keeps connections pooled across the paired
/// dashboard fetch. Every call carries its own overall timeout, covering
/// connect, send, and body read, so a sleeping backend can never leave the
/// caller waiting indefinitely.
use std::error::Error as _;
use std::io;
use std::time::{Duration, Instant};

use crate::error::TransportError;

use super::{Method, RawResponse, Request, Transport};

/// HTTP error bodies are kept for diagnostics only; cap their size.
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Clone)]
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new() -> Self {
        let agent = ureq::AgentBuilder::new()
            .user_agent(concat!("guardrail-console/", env!("CARGO_PKG_VERSION")))
            .build();
        Self { agent }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    fn request(&self, request: &Request) -> Result<RawResponse, TransportError> {
        let start = Instant::now();
        let call = match request.method {
            Method::Get => self.agent.get(&request.url),
            Method::Post => self.agent.post(&request.url),
        }
        .timeout(request.timeout);

        let result = match &request.body {
            Some(body) => call.send_json(body),
            None => call.call(),
        };

        let outcome = match result {
            Ok(resp) => read_success(resp, request.timeout),
            Err(err) => Err(map_error(err, request.timeout)),
        };

        log::debug!(
            "{} {} -> {} in {}ms",
            request.method,
            request.url,
            match &outcome {
                Ok(resp) => resp.status.to_string(),
                Err(err) => err.to_string(),
            },
            start.elapsed().as_millis()
        );

        outcome
    }
}

fn read_success(resp: ureq::Response, timeout: Duration) -> Result<RawResponse, TransportError> {
    let status = resp.status();
    let body = resp.into_string().map_err(|e| map_io(&e, timeout))?;

    // ureq only reports >= 400 as errors; anything else outside 2xx still
    // means the backend is not serving us.
    if !(200..300).contains(&status) {
        return Err(TransportError::Http {
            status,
            body: truncate_body(&body),
        });
    }

    Ok(RawResponse { status, body })
}

fn map_error(err: ureq::Error, timeout: Duration) -> TransportError {
    match err {
        ureq::Error::Status(status, resp) => TransportError::Http {
            status,
            body: truncate_body(&resp.into_string().unwrap_or_default()),
        },
        ureq::Error::Transport(transport) => {
            if is_timeout(&transport) {
                TransportError::Timeout { after: timeout }
            } else {
                TransportError::Network(transport.to_string())
            }
        }
    }
}

fn map_io(err: &io::Error, timeout: Duration) -> TransportError {
    if is_timeout_kind(err.kind()) {
        TransportError::Timeout { after: timeout }
    } else {
        TransportError::Network(err.to_string())
    }
}

/// Walk the error source chain looking for an I/O timeout.
fn is_timeout(transport: &ureq::Transport) -> bool {
    let mut source = transport.source();
    while let Some(err) = source {
        if let Some(io_err) = err.downcast_ref::<io::Error>()
            && is_timeout_kind(io_err.kind())
        {
            return true;
        }
        source = err.source();
    }
    transport.to_string().contains("timed out")
}

fn is_timeout_kind(kind: io::ErrorKind) -> bool {
    matches!(kind, io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
}

fn truncate_body(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY_CHARS {
        return body.to_string();
    }
    let mut cut: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    cut.push('…');
    cut
}
