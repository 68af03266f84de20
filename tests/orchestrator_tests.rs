/// Scan and chat orchestrator tests against a scripted transport.
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use guardrail_console::model::RedactionTag;
use guardrail_console::transport::Method;
use guardrail_console::{
    BaseUrl, ChatOrchestrator, RawResponse, Refresh, Request, ScanError, ScanOrchestrator,
    Transport, TransportError,
};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Replays queued answers in order and records every request.
#[derive(Default)]
struct Scripted {
    answers: Mutex<VecDeque<Result<RawResponse, TransportError>>>,
    seen: Mutex<Vec<Request>>,
}

impl Scripted {
    fn answering(answers: Vec<Result<&str, TransportError>>) -> Arc<Self> {
        let answers = answers
            .into_iter()
            .map(|a| {
                a.map(|body| RawResponse {
                    status: 200,
                    body: body.to_string(),
                })
            })
            .collect();
        Arc::new(Self {
            answers: Mutex::new(answers),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<Request> {
        self.seen.lock().unwrap().clone()
    }
}

impl Transport for Scripted {
    fn request(&self, request: &Request) -> Result<RawResponse, TransportError> {
        self.seen.lock().unwrap().push(request.clone());
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(TransportError::Network("no scripted answer".to_string())))
    }
}

#[derive(Default)]
struct CountingRefresh(AtomicUsize);

impl CountingRefresh {
    fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl Refresh for CountingRefresh {
    fn request_refresh(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn base() -> BaseUrl {
    BaseUrl::parse("http://backend.test/").unwrap()
}

fn scanner(transport: Arc<Scripted>) -> (ScanOrchestrator, Arc<CountingRefresh>) {
    let refresh = Arc::new(CountingRefresh::default());
    let scan = ScanOrchestrator::new(transport, base(), Duration::from_secs(60), refresh.clone());
    (scan, refresh)
}

const SCAN_OK: &str = r#"{
    "raw_output": "call 555-0100",
    "redacted_output": "call [PHONE]",
    "flagged": true,
    "redactions": [{"type": "phone", "value": "555-0100"}]
}"#;

// ---------------------------------------------------------------------------
// Scan
// ---------------------------------------------------------------------------

#[test]
fn blank_prompts_never_reach_the_network() {
    let transport = Scripted::answering(vec![]);
    let (scan, refresh) = scanner(transport.clone());

    assert_eq!(scan.scan(""), Err(ScanError::Validation));
    assert_eq!(scan.scan("   "), Err(ScanError::Validation));
    assert_eq!(scan.try_scan("\n\t"), Err(ScanError::Validation));

    assert!(transport.calls().is_empty());
    assert_eq!(refresh.count(), 0);
}

#[test]
fn successful_scan_posts_prompt_and_refreshes() {
    let transport = Scripted::answering(vec![Ok(SCAN_OK)]);
    let (scan, refresh) = scanner(transport.clone());

    let result = scan.scan("  call 555-0100  ").unwrap();
    assert_eq!(result.redacted_output, "call [PHONE]");
    assert!(result.flagged);
    assert_eq!(result.redactions, vec![RedactionTag::Phone]);

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].method, Method::Post);
    assert_eq!(calls[0].url, "http://backend.test/scan");
    assert_eq!(calls[0].body, Some(serde_json::json!({ "prompt": "  call 555-0100  " })));
    assert_eq!(calls[0].timeout, Duration::from_secs(60));
    assert_eq!(refresh.count(), 1);
}

#[test]
fn transport_failure_becomes_placeholder() {
    let transport = Scripted::answering(vec![Err(TransportError::Timeout {
        after: Duration::from_secs(60),
    })]);
    let (scan, refresh) = scanner(transport);

    let result = scan.scan("hello").unwrap();
    assert_eq!(result.raw_output, "—");
    assert!(!result.redacted_output.is_empty());
    assert!(!result.flagged);
    assert!(result.incidents.is_empty());
    assert_eq!(refresh.count(), 0);
}

#[test]
fn malformed_scan_response_becomes_placeholder() {
    let transport = Scripted::answering(vec![Ok("<html>502 Bad Gateway</html>"), Ok("[]")]);
    let (scan, _refresh) = scanner(transport);

    let first = scan.scan("hello").unwrap();
    assert_eq!(first.raw_output, "—");
    assert!(first.redacted_output.contains("not understood"));

    let second = scan.scan("hello").unwrap();
    assert_eq!(second.raw_output, "—");
}

#[test]
fn try_scan_surfaces_the_error() {
    let transport = Scripted::answering(vec![Err(TransportError::Http {
        status: 503,
        body: "asleep".to_string(),
    })]);
    let (scan, _refresh) = scanner(transport);

    let err = scan.try_scan("hello").unwrap_err();
    assert!(matches!(
        err,
        ScanError::Transport(TransportError::Http { status: 503, .. })
    ));
}

// ---------------------------------------------------------------------------
// Chat
// ---------------------------------------------------------------------------

#[test]
fn chat_does_not_refresh_by_default() {
    let transport = Scripted::answering(vec![Ok(r#"{"answer": "hi there"}"#)]);
    let chat = ChatOrchestrator::new(transport.clone(), base(), Duration::from_secs(10), "");

    let result = chat.send(" hi ").unwrap();
    assert_eq!(result.answer, "hi there");
    assert!(!result.flagged);

    let calls = transport.calls();
    assert_eq!(calls[0].url, "http://backend.test/chat");
    assert_eq!(
        calls[0].body,
        Some(serde_json::json!({ "user": "operator", "message": " hi " }))
    );
}

#[test]
fn chat_refreshes_when_configured() {
    let transport = Scripted::answering(vec![Ok(r#"{"response": "ok", "flagged": true}"#)]);
    let refresh = Arc::new(CountingRefresh::default());
    let chat = ChatOrchestrator::new(transport.clone(), base(), Duration::from_secs(10), "alice")
        .with_refresh(refresh.clone());

    let result = chat.send_as("bob", "status?").unwrap();
    assert!(result.flagged);
    assert_eq!(refresh.count(), 1);
    assert_eq!(
        transport.calls()[0].body,
        Some(serde_json::json!({ "user": "bob", "message": "status?" }))
    );
}

#[test]
fn chat_failure_and_validation() {
    let transport = Scripted::answering(vec![Err(TransportError::Network(
        "connection refused".to_string(),
    ))]);
    let chat = ChatOrchestrator::new(transport.clone(), base(), Duration::from_secs(10), "alice");

    assert_eq!(chat.send("  "), Err(ScanError::Validation));
    assert!(transport.calls().is_empty());

    let result = chat.send("hello").unwrap();
    assert!(result.answer.starts_with("Chat failed"));
    assert!(result.redactions.is_empty());
}
