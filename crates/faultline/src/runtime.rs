//! Uncaught-error and unhandled-rejection capture.
//!
//! Installation replaces the two hook slots on the target
//! [`FaultSurfaces`], saving whatever was there into the
//! [`InterceptionState`]. Each installed hook reports first, then invokes
//! the prior handler with the original arguments and propagates its
//! verdict, so monitoring layers stack without displacing each other.
//!
//! The panic bridge connects the real process-wide surface: it chains onto
//! the current `std::panic` hook (the default hook keeps printing panics)
//! and raises the error surface with the panic's message, location, and
//! any platform-captured backtrace.

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::panic::{self, PanicHookInfo};
use std::sync::Arc;

use faultline_types::{FaultEvent, FaultKind, Identity};

use crate::dispatch::ReportSink;
use crate::surfaces::{
    ErrorHook, FaultSurfaces, InterceptionState, RejectionHook, RejectionReason, UncaughtFault,
};

/// Attach to the uncaught-error surface and the unhandled-rejection
/// surface of `surfaces`.
pub(crate) fn install(
    surfaces: &FaultSurfaces,
    state: &InterceptionState,
    sink: Arc<dyn ReportSink>,
    identity: Arc<Identity>,
) {
    install_error_hook(surfaces, state, Arc::clone(&sink), Arc::clone(&identity));
    install_rejection_hook(surfaces, state, sink, identity);
}

fn install_error_hook(
    surfaces: &FaultSurfaces,
    state: &InterceptionState,
    sink: Arc<dyn ReportSink>,
    identity: Arc<Identity>,
) {
    let prior = surfaces.current_error_hook();
    state.record_prior_error_hook(prior.clone());

    let hook: ErrorHook = Arc::new(move |fault: &UncaughtFault| {
        let event = FaultEvent::new(FaultKind::Runtime, fault.message.clone(), &identity)
            .with_stack(fault.backtrace.clone())
            .with_location(fault.source.clone(), fault.line, fault.column);
        sink.submit(event);

        match &prior {
            Some(prior) => prior(fault),
            None => false,
        }
    });
    surfaces.swap_error_hook(hook);
}

fn install_rejection_hook(
    surfaces: &FaultSurfaces,
    state: &InterceptionState,
    sink: Arc<dyn ReportSink>,
    identity: Arc<Identity>,
) {
    let prior = surfaces.current_rejection_hook();
    state.record_prior_rejection_hook(prior.clone());

    let hook: RejectionHook = Arc::new(move |reason: &RejectionReason| {
        let event = FaultEvent::new(FaultKind::UnhandledRejection, reason.message(), &identity)
            .with_stack(reason.backtrace().map(str::to_owned));
        sink.submit(event);

        match &prior {
            Some(prior) => prior(reason),
            None => false,
        }
    });
    surfaces.swap_rejection_hook(hook);
}

// ── Panic bridge ─────────────────────────────────────────

/// Forward uncaught panics into the error surface of `surfaces`, chaining
/// the `std::panic` hook that was installed before.
pub(crate) fn install_panic_bridge(surfaces: Arc<FaultSurfaces>) {
    let prev = panic::take_hook();
    panic::set_hook(Box::new(move |info: &PanicHookInfo<'_>| {
        surfaces.raise_error(&uncaught_from_panic(info));
        prev(info);
    }));
}

fn uncaught_from_panic(info: &PanicHookInfo<'_>) -> UncaughtFault {
    let (source, line, column) = match info.location() {
        Some(location) => (
            Some(location.file().to_owned()),
            Some(location.line()),
            Some(location.column()),
        ),
        None => (None, None, None),
    };
    UncaughtFault {
        message: panic_message(info.payload()),
        source,
        line,
        column,
        backtrace: captured_backtrace(),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_owned()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        // FaultEvent::new synthesizes the placeholder.
        String::new()
    }
}

/// The platform backtrace when one was actually captured; never
/// synthesized.
fn captured_backtrace() -> Option<String> {
    let backtrace = Backtrace::capture();
    match backtrace.status() {
        BacktraceStatus::Captured => Some(backtrace.to_string()),
        _ => None,
    }
}

/// Spawn a task whose `Err` outcome is raised on the unhandled-rejection
/// surface of `surfaces`. The join handle still yields the task's original
/// output; observation never consumes the failure.
pub fn spawn_monitored<F, T, E>(
    surfaces: Arc<FaultSurfaces>,
    future: F,
) -> tokio::task::JoinHandle<Result<T, E>>
where
    F: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: std::error::Error + Send + 'static,
{
    tokio::spawn(async move {
        let result = future.await;
        if let Err(error) = &result {
            surfaces.raise_rejection(&RejectionReason::from_error(error));
        }
        result
    })
}
