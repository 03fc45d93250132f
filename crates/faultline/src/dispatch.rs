//! Delivery: enrichment, transport selection, and the outbound send path.
//!
//! [`Dispatcher::submit`] never panics back into the caller and never
//! suspends, so every capture hook — including the panic hook — can call
//! it directly. Delivery failures are logged through `tracing` and
//! absorbed; a reporting failure must never become a host-visible failure.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use faultline_types::{FaultEvent, Report};
use tracing::{debug, warn};

/// Sink every capture component submits through. [`Dispatcher`] is the one
/// real implementation; tests substitute their own.
pub trait ReportSink: Send + Sync {
    fn submit(&self, event: FaultEvent);
}

// ── Enrichment ───────────────────────────────────────────

/// Environment attributes merged into every outbound report.
#[derive(Debug, Clone)]
pub struct Enrichment {
    /// Agent identification string, `faultline/<version> (<os> <arch>)`.
    pub user_agent: String,
    /// Executable name of the host process.
    pub process_name: String,
    /// Host process id.
    pub pid: u32,
}

impl Enrichment {
    /// Describe the current process and platform.
    pub fn detect() -> Self {
        let process_name = std::env::current_exe()
            .ok()
            .and_then(|path| {
                path.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .unwrap_or_else(|| "unknown".to_owned());
        Self {
            user_agent: format!(
                "faultline/{} ({} {})",
                env!("CARGO_PKG_VERSION"),
                std::env::consts::OS,
                std::env::consts::ARCH,
            ),
            process_name,
            pid: std::process::id(),
        }
    }
}

/// Produce the outbound record from an event plus enrichment. The event is
/// consumed into a new `Report`; nothing is mutated in place.
fn enrich(event: FaultEvent, enrichment: &Enrichment) -> Report {
    Report {
        message: event.message,
        error_type: event.kind.as_str().to_owned(),
        stack: event.stack,
        source: event.source,
        line: event.line,
        column: event.column,
        project_name: event.project_name,
        environment: event.environment,
        timestamp: event.timestamp,
        user_agent: enrichment.user_agent.clone(),
        process_name: enrichment.process_name.clone(),
        pid: enrichment.pid,
    }
}

// ── Dispatcher ───────────────────────────────────────────

/// Owns the collector endpoint and the outbound transports.
///
/// Transport selection: a long-lived beacon thread drains a channel of
/// serialized reports, so a submission is a cheap handoff that survives the
/// submitting context's teardown. When the beacon is unavailable, delivery
/// happens from a detached one-off thread instead. Either way there is
/// exactly one delivery attempt per event, no retry, and no ordering
/// guarantee across events.
pub struct Dispatcher {
    endpoint: String,
    enrichment: Enrichment,
    beacon: Option<mpsc::Sender<String>>,
}

impl Dispatcher {
    /// Build a dispatcher delivering to `endpoint`, starting the beacon
    /// thread.
    pub fn new(endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        let beacon = start_beacon_thread(endpoint.clone());
        Self {
            endpoint,
            enrichment: Enrichment::detect(),
            beacon,
        }
    }

    /// Build a dispatcher without a beacon thread; every submission takes
    /// the detached-delivery path.
    pub fn without_beacon(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            enrichment: Enrichment::detect(),
            beacon: None,
        }
    }

    /// Collector endpoint this dispatcher delivers to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Merge `event` with environment enrichment and attempt delivery
    /// exactly once.
    pub fn submit(&self, event: FaultEvent) {
        let report = enrich(event, &self.enrichment);
        let body = match facet_json::to_string(&report) {
            Ok(body) => body,
            Err(e) => {
                warn!(%e, "failed to serialize fault report");
                return;
            }
        };
        if let Some(beacon) = &self.beacon {
            match beacon.send(body) {
                Ok(()) => return,
                Err(mpsc::SendError(body)) => {
                    // Beacon thread is gone; the payload was never attempted.
                    debug!("beacon transport unavailable, using detached delivery");
                    deliver_detached(self.endpoint.clone(), body);
                    return;
                }
            }
        }
        deliver_detached(self.endpoint.clone(), body);
    }
}

impl ReportSink for Dispatcher {
    fn submit(&self, event: FaultEvent) {
        Dispatcher::submit(self, event);
    }
}

// ── Transports ───────────────────────────────────────────

fn start_beacon_thread(endpoint: String) -> Option<mpsc::Sender<String>> {
    let (tx, rx) = mpsc::channel::<String>();
    let spawned = thread::Builder::new()
        .name("faultline-beacon".to_owned())
        .spawn(move || {
            while let Ok(body) = rx.recv() {
                post(&endpoint, &body);
            }
        });
    match spawned {
        Ok(_handle) => Some(tx),
        Err(e) => {
            warn!(%e, "failed to start beacon thread; reports will use detached delivery");
            None
        }
    }
}

/// Deliver from a detached thread so the attempt can complete even while
/// the submitting context unwinds.
fn deliver_detached(endpoint: String, body: String) {
    let spawned = thread::Builder::new()
        .name("faultline-delivery".to_owned())
        .spawn(move || post(&endpoint, &body));
    if let Err(e) = spawned {
        warn!(%e, "failed to spawn delivery thread; fault report dropped");
    }
}

/// One delivery attempt. Every failure mode ends here, logged and absorbed.
fn post(endpoint: &str, body: &str) {
    match ureq::post(endpoint)
        .set("content-type", "application/json")
        .send_string(body)
    {
        Ok(response) => {
            debug!(status = response.status(), "fault report delivered");
        }
        Err(ureq::Error::Status(code, _)) => {
            warn!(code, endpoint, "collector rejected fault report");
        }
        Err(e) => {
            warn!(%e, endpoint, "fault report delivery failed");
        }
    }
}

/// Convenience coercion used by the wiring layer.
pub(crate) fn sink_from(dispatcher: &Arc<Dispatcher>) -> Arc<dyn ReportSink> {
    Arc::clone(dispatcher) as Arc<dyn ReportSink>
}
