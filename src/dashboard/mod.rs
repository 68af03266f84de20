/// Dashboard loader: paired metrics + incident fetch, published atomically.
///
/// Each [`DashboardLoader::load`] issues the metrics and incident requests
/// concurrently on two scoped threads. Each thread writes its own result
/// slot; the pair is merged only after both have joined, so a published
/// snapshot never mixes moments.
///
/// # Ordering
///
/// Loads are numbered from a monotonically increasing counter when issued.
/// A finished load replaces the published snapshot only if its number is
/// greater than the number of the snapshot already published. A slow load
/// that finishes after a later one is discarded.
///
/// # Failure
///
/// If either half fails the whole load fails, the published snapshot is
/// kept (stale but consistent), and the failure is logged.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::{FetchError, LoadError, TransportError};
use crate::model::{IncidentRecord, Metrics};
use crate::normalize;
use crate::transport::{BaseUrl, RawResponse, Request, Transport};

/// Default incident window shown on the dashboard.
pub const DEFAULT_INCIDENT_LIMIT: usize = 10;

/// One consistent view of the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    pub metrics: Metrics,
    pub incidents: Vec<IncidentRecord>,
    /// Issue order of the load that produced this snapshot.
    pub token: u64,
}

/// Something that can be asked to refresh the dashboard without waiting.
pub trait Refresh: Send + Sync {
    fn request_refresh(&self);
}

/// No-op refresh, for callers that have no dashboard attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRefresh;

impl Refresh for NoRefresh {
    fn request_refresh(&self) {}
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Cheaply clonable handle; clones share the published snapshot.
#[derive(Clone)]
pub struct DashboardLoader {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    base: BaseUrl,
    timeout: Duration,
    incident_limit: usize,
    next_token: AtomicU64,
    published: Mutex<Option<DashboardSnapshot>>,
    in_flight: Mutex<usize>,
    idle: Condvar,
}

impl DashboardLoader {
    pub fn new(transport: Arc<dyn Transport>, base: BaseUrl, timeout: Duration, incident_limit: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                base,
                timeout,
                incident_limit: incident_limit.max(1),
                next_token: AtomicU64::new(0),
                published: Mutex::new(None),
                in_flight: Mutex::new(0),
                idle: Condvar::new(),
            }),
        }
    }

    /// Fetch metrics and incidents concurrently and publish the pair.
    ///
    /// Safe to call while another load is in flight. The returned snapshot
    /// is this call's result whether or not it was published.
    pub fn load(&self) -> Result<DashboardSnapshot, LoadError> {
        self.inner.begin_flight();
        let _flight = FlightGuard(&self.inner);
        self.inner.load()
    }

    /// Run [`load`](Self::load) on a background thread.
    ///
    /// The load counts as in flight from the moment this returns, so a
    /// following [`wait_idle`](Self::wait_idle) will wait for it.
    pub fn refresh_in_background(&self) -> JoinHandle<()> {
        self.inner.begin_flight();
        let inner = Arc::clone(&self.inner);
        thread::spawn(move || {
            let _flight = FlightGuard(&inner);
            // Failures are logged inside load; nothing to hand back.
            let _ = inner.load();
        })
    }

    /// Most recently published snapshot, if any load has succeeded.
    pub fn current(&self) -> Option<DashboardSnapshot> {
        self.inner.published().clone()
    }

    /// Published metrics, or zeros while nothing has loaded yet.
    pub fn metrics_or_zero(&self) -> Metrics {
        self.inner
            .published()
            .as_ref()
            .map(|s| s.metrics)
            .unwrap_or_default()
    }

    /// Block until no load is in flight or `timeout` passes. Returns `true`
    /// if the loader went idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut count = self
            .inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while *count > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            count = self
                .inner
                .idle
                .wait_timeout(count, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    pub fn incident_limit(&self) -> usize {
        self.inner.incident_limit
    }

    /// Take the next issue token. Exposed for ordering tests.
    #[doc(hidden)]
    pub fn issue_token(&self) -> u64 {
        self.inner.issue_token()
    }

    /// Publish `snapshot` unless a later-issued one is already published.
    #[doc(hidden)]
    pub fn publish(&self, snapshot: DashboardSnapshot) -> bool {
        self.inner.publish(snapshot)
    }
}

impl Refresh for DashboardLoader {
    fn request_refresh(&self) {
        self.refresh_in_background();
    }
}

impl Inner {
    fn load(&self) -> Result<DashboardSnapshot, LoadError> {
        let token = self.issue_token();

        let (metrics, incidents) = thread::scope(|scope| {
            let metrics = scope.spawn(|| self.fetch_metrics());
            let incidents = scope.spawn(|| self.fetch_incidents());
            (join(metrics), join(incidents))
        });

        let snapshot = match (metrics, incidents) {
            (Ok(metrics), Ok(incidents)) => DashboardSnapshot {
                metrics,
                incidents,
                token,
            },
            (Err(err), _) => return Err(self.fail(token, LoadError::Metrics(err))),
            (_, Err(err)) => return Err(self.fail(token, LoadError::Incidents(err))),
        };

        if self.publish(snapshot.clone()) {
            log::info!(
                "dashboard snapshot #{token} applied: {} requests, {} flagged, {} incidents",
                snapshot.metrics.total_requests,
                snapshot.metrics.flagged_count,
                snapshot.incidents.len()
            );
        } else {
            log::debug!("dashboard snapshot #{token} discarded: a later load already applied");
        }
        Ok(snapshot)
    }

    fn fail(&self, token: u64, err: LoadError) -> LoadError {
        log::warn!("dashboard load #{token} failed, keeping previous data: {err}");
        err
    }

    fn fetch_metrics(&self) -> Result<Metrics, FetchError> {
        let resp = self.get("metrics")?;
        Ok(normalize::normalize_metrics(&resp.json()?)?)
    }

    /// `/incidents` first; older deployments only serve `/logs`.
    fn fetch_incidents(&self) -> Result<Vec<IncidentRecord>, FetchError> {
        let limit = self.incident_limit;
        let resp = match self.get(&format!("incidents?limit={limit}")) {
            Err(TransportError::Http {
                status: status @ (404 | 405),
                ..
            }) => {
                log::debug!("/incidents returned {status}, falling back to /logs");
                self.get(&format!("logs?limit={limit}"))?
            }
            other => other?,
        };

        let mut incidents = normalize::normalize_incidents(&resp.json()?)?;
        incidents.truncate(limit);
        Ok(incidents)
    }

    fn get(&self, path: &str) -> Result<RawResponse, TransportError> {
        let request = Request::get(self.base.join(path)).with_timeout(self.timeout);
        self.transport.request(&request)
    }

    fn issue_token(&self) -> u64 {
        self.next_token.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn publish(&self, snapshot: DashboardSnapshot) -> bool {
        let mut published = self.published();
        let newer = published
            .as_ref()
            .is_none_or(|current| snapshot.token > current.token);
        if newer {
            *published = Some(snapshot);
        }
        newer
    }

    fn published(&self) -> MutexGuard<'_, Option<DashboardSnapshot>> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_flight(&self) {
        *self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner) += 1;
    }

    fn end_flight(&self) {
        let mut count = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.idle.notify_all();
        }
    }
}

/// Ends an in-flight load on drop, including on panic.
struct FlightGuard<'a>(&'a Inner);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.end_flight();
    }
}

fn join<T>(handle: thread::ScopedJoinHandle<'_, T>) -> T {
    handle
        .join()
        .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
