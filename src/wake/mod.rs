/// Wake controller: bounded health-check polling for a cold backend.
///
/// Low-resource hosting tiers put the backend to sleep when idle; the first
/// requests after that fail or time out until it has started. The wake
/// controller probes `GET /` until a 2xx arrives or the deadline passes:
///
/// ```text
///            start()                 2xx
///   Idle ─────────────▶ Polling ─────────────▶ Succeeded ─┐
///    ▲                     │                               │ refresh
///    │                     │ now >= deadline               │ dashboard
///    │                     ▼                               │
///    └──────────────── TimedOut ◀──────────────────────────┘
/// ```
///
/// Probe failures are expected while the backend boots and are swallowed.
/// The deadline is checked between probes; an in-flight probe is bounded
/// only by its own transport timeout. Either terminal state triggers one
/// dashboard refresh before returning to `Idle`.
///
/// This is the only component that retries network calls.
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::dashboard::Refresh;
use crate::error::TransportError;
use crate::transport::{BaseUrl, Request, Transport};

pub mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

/// How long to keep probing before giving up.
pub const DEFAULT_WAKE_DEADLINE: Duration = Duration::from_secs(75);

/// Pause between failed probes.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1500);

/// Per-probe transport timeout.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakePhase {
    Idle,
    Polling,
    Succeeded,
    TimedOut,
}

impl fmt::Display for WakePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Polling => write!(f, "polling"),
            Self::Succeeded => write!(f, "awake"),
            Self::TimedOut => write!(f, "timed out"),
        }
    }
}

/// Transient wake state; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeState {
    pub phase: WakePhase,
    /// Deadline of the current (or most recent) wake.
    pub deadline: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeOutcome {
    Succeeded,
    TimedOut,
    /// Another wake was already polling; this call did nothing.
    AlreadyPolling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakeReport {
    pub outcome: WakeOutcome,
    pub probes: u32,
    pub elapsed: Duration,
}

/// Tuning for a [`WakeController`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WakePolicy {
    pub deadline: Duration,
    pub interval: Duration,
    pub probe_timeout: Duration,
}

impl Default for WakePolicy {
    fn default() -> Self {
        Self {
            deadline: DEFAULT_WAKE_DEADLINE,
            interval: DEFAULT_POLL_INTERVAL,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

pub struct WakeController {
    transport: Arc<dyn Transport>,
    base: BaseUrl,
    policy: WakePolicy,
    clock: Arc<dyn Clock>,
    refresh: Arc<dyn Refresh>,
    state: Mutex<WakeState>,
}

impl WakeController {
    pub fn new(
        transport: Arc<dyn Transport>,
        base: BaseUrl,
        policy: WakePolicy,
        refresh: Arc<dyn Refresh>,
    ) -> Self {
        Self {
            transport,
            base,
            policy,
            clock: Arc::new(SystemClock),
            refresh,
            state: Mutex::new(WakeState {
                phase: WakePhase::Idle,
                deadline: None,
            }),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> WakeState {
        *self.lock_state()
    }

    pub fn policy(&self) -> WakePolicy {
        self.policy
    }

    /// Poll until the backend answers or the deadline passes.
    ///
    /// Blocks the calling thread. A call made while another wake is polling
    /// returns [`WakeOutcome::AlreadyPolling`] immediately.
    pub fn start(&self) -> WakeReport {
        self.start_observed(&|_, _| {})
    }

    /// Like [`start`](Self::start), calling `observer` after each failed
    /// probe with the attempt number and error.
    pub fn start_observed(&self, observer: &dyn Fn(u32, &TransportError)) -> WakeReport {
        let started = self.clock.now();
        let deadline = started + self.policy.deadline;

        {
            let mut state = self.lock_state();
            if state.phase == WakePhase::Polling {
                return WakeReport {
                    outcome: WakeOutcome::AlreadyPolling,
                    probes: 0,
                    elapsed: Duration::ZERO,
                };
            }
            *state = WakeState {
                phase: WakePhase::Polling,
                deadline: Some(deadline),
            };
        }

        let (phase, outcome, probes) = self.poll(deadline, observer);
        let elapsed = self.clock.now().saturating_duration_since(started);

        self.lock_state().phase = phase;
        match outcome {
            WakeOutcome::Succeeded => log::info!(
                "backend awake after {probes} probe(s) in {:.1}s",
                elapsed.as_secs_f64()
            ),
            _ => log::warn!(
                "backend did not wake within {}s ({probes} probes)",
                self.policy.deadline.as_secs()
            ),
        }

        self.refresh.request_refresh();
        self.lock_state().phase = WakePhase::Idle;

        WakeReport {
            outcome,
            probes,
            elapsed,
        }
    }

    /// Run [`start`](Self::start) on a background thread.
    pub fn start_in_background(self: &Arc<Self>) -> JoinHandle<WakeReport> {
        let controller = Arc::clone(self);
        thread::spawn(move || controller.start())
    }

    fn poll(
        &self,
        deadline: Instant,
        observer: &dyn Fn(u32, &TransportError),
    ) -> (WakePhase, WakeOutcome, u32) {
        let probe = Request::get(self.base.join("/")).with_timeout(self.policy.probe_timeout);
        let mut probes = 0;

        loop {
            if self.clock.now() >= deadline {
                return (WakePhase::TimedOut, WakeOutcome::TimedOut, probes);
            }

            probes += 1;
            match self.transport.request(&probe) {
                Ok(_) => return (WakePhase::Succeeded, WakeOutcome::Succeeded, probes),
                Err(err) => {
                    log::debug!("wake probe {probes} failed: {err}");
                    observer(probes, &err);
                }
            }

            self.clock.sleep(self.policy.interval);
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, WakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
