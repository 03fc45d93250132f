//! Client-side fault telemetry for Rust applications.
//!
//! Faultline observes uncaught faults in a host application — panics,
//! failures escaping spawned tasks, failed network calls, failed
//! sub-resource loads — normalizes each one into a single event shape, and
//! delivers it to a remote collector. The host's own error handling is
//! preserved: every hook chains the handler that was installed before it,
//! network wrappers return the inner outcome unchanged, and delivery
//! failures are absorbed into local logging instead of surfacing anywhere.
//!
//! # Using this crate
//!
//! ```rust,no_run
//! let monitor = faultline::init(faultline::Config::new(
//!     "http://127.0.0.1:9219/error-report",
//!     "demo",
//!     "production",
//! ));
//!
//! // Route HTTP traffic through the monitored decorators:
//! // let client = monitor.wrap_exchange(my_http_stack);
//!
//! // Spawned work whose failures should be reported:
//! // monitor.spawn_monitored(async { run_job().await });
//! ```
//!
//! Run `faultline-collector` to receive reports during manual testing.
//!
//! # What is hooked
//!
//! `init` installs handlers on the process-wide error and rejection
//! surfaces and chains onto the current `std::panic` hook. This is a
//! visible side effect: anything relying on being the *only* panic hook
//! will now run after faultline's reporting. The previous handlers keep
//! running, with their original arguments, after each fault is reported.
//!
//! `init` is guarded: the first configuration wins and later calls return
//! the existing monitor without installing duplicate hooks.
//!
//! # Environment variables
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `FAULTLINE_REPORT_URL` | Overrides the configured collector endpoint. |
//! | `RUST_BACKTRACE` | Enables backtrace capture for `RuntimeError` events. |

use std::sync::{Arc, OnceLock};

use tracing::warn;

mod config;
pub mod dispatch;
pub mod net;
mod resource;
mod runtime;
pub mod surfaces;

#[cfg(test)]
pub(crate) mod testing;

pub use crate::config::{Config, REPORT_URL_ENV};
pub use crate::dispatch::{Dispatcher, Enrichment, ReportSink};
pub use faultline_types::{FaultEvent, FaultKind, Identity, Report};

use crate::net::{EventedHttp, HttpExchange, MonitoredEvented, MonitoredExchange};
use crate::surfaces::{FaultSurfaces, InterceptionState};

/// Handle returned by [`init`]: access to the dispatcher, the wired
/// surfaces, and the monitored wrapper constructors.
pub struct Monitor {
    surfaces: Arc<FaultSurfaces>,
    state: Arc<InterceptionState>,
    dispatcher: Arc<Dispatcher>,
    identity: Arc<Identity>,
}

static MONITOR: OnceLock<Monitor> = OnceLock::new();

/// Initialize fault monitoring against the process-wide surfaces.
///
/// Guarded: the first call wires everything and later calls return the
/// existing monitor unchanged, so hooks are never installed twice.
pub fn init(config: Config) -> &'static Monitor {
    if let Some(monitor) = MONITOR.get() {
        warn!("faultline::init called more than once; keeping the first configuration");
        return monitor;
    }
    MONITOR.get_or_init(|| {
        let monitor = Monitor::install(
            config,
            Arc::clone(surfaces::global()),
            Arc::new(InterceptionState::new()),
        );
        // Only the process-wide entry bridges the real panic hook; wiring
        // injected surfaces (tests, embedders) leaves `std::panic` alone.
        runtime::install_panic_bridge(Arc::clone(&monitor.surfaces));
        monitor
    })
}

impl Monitor {
    /// Wire every capture component against `surfaces` with `config`.
    ///
    /// [`init`] calls this against the process-wide surfaces; tests and
    /// embedders may wire their own instances.
    pub fn install(
        config: Config,
        surfaces: Arc<FaultSurfaces>,
        state: Arc<InterceptionState>,
    ) -> Self {
        let endpoint = config.resolved_report_url();
        let identity = Arc::new(config.identity());
        let dispatcher = Arc::new(Dispatcher::new(endpoint));
        let sink = dispatch::sink_from(&dispatcher);

        runtime::install(&surfaces, &state, Arc::clone(&sink), Arc::clone(&identity));
        resource::install(&surfaces, sink, Arc::clone(&identity));

        Self {
            surfaces,
            state,
            dispatcher,
            identity,
        }
    }

    /// The surfaces this monitor is wired against.
    pub fn surfaces(&self) -> &Arc<FaultSurfaces> {
        &self.surfaces
    }

    /// Saved prior handlers for the hooked surfaces.
    pub fn interception_state(&self) -> &Arc<InterceptionState> {
        &self.state
    }

    /// Direct dispatcher access, for framework adapters.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Wrap an awaited HTTP primitive in the monitored decorator.
    pub fn wrap_exchange<E: HttpExchange>(&self, inner: E) -> MonitoredExchange<E> {
        MonitoredExchange::new(
            inner,
            self.dispatcher.endpoint(),
            Arc::clone(&self.identity),
            dispatch::sink_from(&self.dispatcher),
        )
    }

    /// Wrap a callback-configured HTTP primitive in the monitored
    /// decorator.
    pub fn wrap_evented<C: EventedHttp>(&self, inner: C) -> MonitoredEvented<C> {
        MonitoredEvented::new(
            inner,
            self.dispatcher.endpoint(),
            Arc::clone(&self.identity),
            dispatch::sink_from(&self.dispatcher),
        )
    }

    /// Spawn a task whose `Err` outcome is raised on this monitor's
    /// rejection surface. The join handle yields the original output.
    pub fn spawn_monitored<F, T, E>(&self, future: F) -> tokio::task::JoinHandle<Result<T, E>>
    where
        F: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: std::error::Error + Send + 'static,
    {
        runtime::spawn_monitored(Arc::clone(&self.surfaces), future)
    }

    /// Submit a framework-tagged fault directly. This is the hook the
    /// framework adapter contract builds on: the adapter reports here,
    /// then re-invokes whatever framework hook it displaced.
    pub fn report_framework_fault(&self, message: impl Into<String>, stack: Option<String>) {
        self.dispatcher.submit(
            FaultEvent::new(FaultKind::Framework, message, &self.identity).with_stack(stack),
        );
    }
}
