/// Wake controller tests.
///
/// A simulated clock stands in for the 75 s deadline so the never-responding
/// case runs instantly.
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use guardrail_console::wake::ManualClock;
use guardrail_console::{
    BaseUrl, Console, GuardrailConfig, RawResponse, Refresh, Request, Transport, TransportError,
    WakeController, WakeOutcome, WakePhase, WakePolicy,
};

#[derive(Default)]
struct CountingRefresh(AtomicU32);

impl Refresh for CountingRefresh {
    fn request_refresh(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Answers every probe with the same result.
struct Fixed {
    awake: bool,
    probes: AtomicU32,
}

impl Transport for Fixed {
    fn request(&self, request: &Request) -> Result<RawResponse, TransportError> {
        assert_eq!(request.url, "http://backend.test/");
        self.probes.fetch_add(1, Ordering::SeqCst);
        if self.awake {
            Ok(RawResponse {
                status: 204,
                body: String::new(),
            })
        } else {
            Err(TransportError::Timeout {
                after: request.timeout,
            })
        }
    }
}

fn controller(transport: Arc<dyn Transport>) -> (WakeController, Arc<ManualClock>, Arc<CountingRefresh>) {
    let clock = Arc::new(ManualClock::new());
    let refresh = Arc::new(CountingRefresh::default());
    let wake = WakeController::new(
        transport,
        BaseUrl::parse("http://backend.test").unwrap(),
        WakePolicy::default(),
        refresh.clone(),
    )
    .with_clock(clock.clone());
    (wake, clock, refresh)
}

#[test]
fn awake_backend_succeeds_on_first_probe() {
    let (wake, clock, refresh) = controller(Arc::new(Fixed {
        awake: true,
        probes: AtomicU32::new(0),
    }));

    let report = wake.start();
    assert_eq!(report.outcome, WakeOutcome::Succeeded);
    assert_eq!(report.probes, 1);
    assert_eq!(report.elapsed, Duration::ZERO);
    assert_eq!(clock.elapsed(), Duration::ZERO);
    assert_eq!(refresh.0.load(Ordering::SeqCst), 1);
    assert_eq!(wake.state().phase, WakePhase::Idle);
}

#[test]
fn silent_backend_times_out_and_still_refreshes() {
    let transport = Arc::new(Fixed {
        awake: false,
        probes: AtomicU32::new(0),
    });
    let (wake, clock, refresh) = controller(transport.clone());

    let report = wake.start();
    assert_eq!(report.outcome, WakeOutcome::TimedOut);
    // Probes at 0.0, 1.5, ..., 73.5 s.
    assert_eq!(report.probes, 50);
    assert_eq!(transport.probes.load(Ordering::SeqCst), 50);
    assert!(clock.elapsed() >= Duration::from_secs(75));
    assert_eq!(refresh.0.load(Ordering::SeqCst), 1);
    assert_eq!(wake.state().phase, WakePhase::Idle);
}

#[test]
fn controller_can_be_restarted_after_a_terminal_state() {
    let (wake, _clock, refresh) = controller(Arc::new(Fixed {
        awake: false,
        probes: AtomicU32::new(0),
    }));
    assert_eq!(wake.start().outcome, WakeOutcome::TimedOut);
    assert_eq!(wake.start().outcome, WakeOutcome::TimedOut);
    assert_eq!(refresh.0.load(Ordering::SeqCst), 2);
}

/// Holds the first probe until released, so a second `start` overlaps it.
struct Gated {
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

impl Transport for Gated {
    fn request(&self, _request: &Request) -> Result<RawResponse, TransportError> {
        self.entered.lock().unwrap().send(()).ok();
        self.release.lock().unwrap().recv().ok();
        Ok(RawResponse {
            status: 200,
            body: "ok".to_string(),
        })
    }
}

#[test]
fn second_start_while_polling_is_a_no_op() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let (wake, _clock, refresh) = controller(Arc::new(Gated {
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    }));
    let wake = Arc::new(wake);

    let first = wake.start_in_background();
    entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(wake.state().phase, WakePhase::Polling);

    let second = wake.start();
    assert_eq!(second.outcome, WakeOutcome::AlreadyPolling);
    assert_eq!(second.probes, 0);

    release_tx.send(()).unwrap();
    let report = first.join().unwrap();
    assert_eq!(report.outcome, WakeOutcome::Succeeded);
    assert_eq!(refresh.0.load(Ordering::SeqCst), 1);
}

/// Holds `GET /` until released; every dashboard path fails fast.
struct HeldRoot {
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
    roots: AtomicU32,
}

impl Transport for HeldRoot {
    fn request(&self, request: &Request) -> Result<RawResponse, TransportError> {
        if request.url != "http://backend.test/" {
            return Err(TransportError::Network("dashboard offline".to_string()));
        }
        self.roots.fetch_add(1, Ordering::SeqCst);
        self.entered.lock().unwrap().send(()).ok();
        self.release
            .lock()
            .unwrap()
            .recv_timeout(Duration::from_secs(5))
            .ok();
        Ok(RawResponse {
            status: 200,
            body: "ok".to_string(),
        })
    }
}

#[test]
fn concurrent_wakes_through_one_console_share_the_guard() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let transport = Arc::new(HeldRoot {
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
        roots: AtomicU32::new(0),
    });
    let mut cfg = GuardrailConfig::default();
    cfg.backend.base_url = Some("http://backend.test".to_string());
    let console = Console::with_transport(&cfg, transport.clone()).unwrap();

    let outcomes = std::thread::scope(|s| {
        let first = s.spawn(|| console.wake().start_observed(&|_, _| {}));
        entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

        let second = s.spawn(|| console.wake().start());
        let second = second.join().unwrap();
        release_tx.send(()).unwrap();
        [first.join().unwrap().outcome, second.outcome]
    });

    assert_eq!(outcomes, [WakeOutcome::Succeeded, WakeOutcome::AlreadyPolling]);
    assert_eq!(transport.roots.load(Ordering::SeqCst), 1);
    assert_eq!(console.wake().state().phase, WakePhase::Idle);
}

