//! Process-wide fault surfaces and the saved-handler interception state.
//!
//! The host application raises faults against a [`FaultSurfaces`] instance;
//! capture components install hooks on it, chaining whatever handler was
//! already there. One process-wide default instance backs
//! [`crate::init`]; tests construct their own instances and never touch
//! real global state.

use std::any::Any;
use std::sync::{Arc, LazyLock, OnceLock};

use parking_lot::Mutex;

// ── Error surface ────────────────────────────────────────

/// An uncaught error raised on the error surface. Carries whatever the
/// fault source knew: the panic bridge fills location and backtrace, other
/// producers may only have a message.
#[derive(Debug, Clone)]
pub struct UncaughtFault {
    /// Description of the fault. May be empty; the capture layer
    /// synthesizes a placeholder in that case.
    pub message: String,
    /// Source file, when known.
    pub source: Option<String>,
    /// Source line, when known.
    pub line: Option<u32>,
    /// Source column, when known.
    pub column: Option<u32>,
    /// Backtrace text, when the platform captured one. Never synthesized.
    pub backtrace: Option<String>,
}

/// Hook invoked for uncaught errors. The return value reports whether the
/// hook considered the fault handled; chained hooks propagate the verdict
/// of the handler that was installed before them.
pub type ErrorHook = Arc<dyn Fn(&UncaughtFault) -> bool + Send + Sync>;

// ── Rejection surface ────────────────────────────────────

/// The reason attached to an unhandled rejection, resolved once into a
/// closed shape instead of being probed ad hoc at every use site.
#[derive(Debug, Clone)]
pub enum RejectionReason {
    /// The reason carried a message, and possibly a backtrace.
    Fault {
        message: String,
        backtrace: Option<String>,
    },
    /// The reason was plain text.
    Text(String),
    /// The reason carried neither a message nor a usable string form.
    Opaque,
}

impl RejectionReason {
    /// Resolve an error value: its display form is the message.
    pub fn from_error(err: &dyn std::error::Error) -> Self {
        RejectionReason::Fault {
            message: err.to_string(),
            backtrace: None,
        }
    }

    /// Resolve a panic payload: string payloads keep their text, anything
    /// else is opaque.
    pub fn from_panic_payload(payload: &(dyn Any + Send)) -> Self {
        if let Some(text) = payload.downcast_ref::<&str>() {
            RejectionReason::Text((*text).to_owned())
        } else if let Some(text) = payload.downcast_ref::<String>() {
            RejectionReason::Text(text.clone())
        } else {
            RejectionReason::Opaque
        }
    }

    /// Message per the ordered fallback: the reason's own message, else its
    /// string form, else the fixed placeholder.
    pub fn message(&self) -> String {
        match self {
            RejectionReason::Fault { message, .. } => message.clone(),
            RejectionReason::Text(text) => text.clone(),
            RejectionReason::Opaque => {
                faultline_types::UNKNOWN_REJECTION_MESSAGE.to_owned()
            }
        }
    }

    /// Backtrace text, when the reason carried one.
    pub fn backtrace(&self) -> Option<&str> {
        match self {
            RejectionReason::Fault { backtrace, .. } => backtrace.as_deref(),
            _ => None,
        }
    }
}

/// Hook invoked for unhandled rejections, chained like [`ErrorHook`].
pub type RejectionHook = Arc<dyn Fn(&RejectionReason) -> bool + Send + Sync>;

// ── Load-fault notice bus ────────────────────────────────

/// Element tags a load-fault notice can originate from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementTag {
    Img,
    Script,
    Link,
    Audio,
    Video,
    Iframe,
}

impl ElementTag {
    pub fn as_str(self) -> &'static str {
        match self {
            ElementTag::Img => "IMG",
            ElementTag::Script => "SCRIPT",
            ElementTag::Link => "LINK",
            ElementTag::Audio => "AUDIO",
            ElementTag::Video => "VIDEO",
            ElementTag::Iframe => "IFRAME",
        }
    }
}

/// A failed sub-resource load published on the notice bus.
#[derive(Debug, Clone)]
pub struct LoadFault {
    /// Tag of the element whose load failed.
    pub tag: ElementTag,
    /// Resolved source/reference attribute, when the element carried one.
    pub source: Option<String>,
}

/// Listener registration phase. Load faults do not bubble: they are
/// delivered to capture-phase listeners only, which is why resource
/// observation must register in the capture phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Capture,
    Bubble,
}

/// Listener on the load-fault notice bus.
pub type LoadListener = Arc<dyn Fn(&LoadFault) + Send + Sync>;

// ── Surfaces ─────────────────────────────────────────────

/// The injectable bundle of host fault surfaces: the error hook slot, the
/// rejection hook slot, and the load-fault notice bus.
///
/// Hook slots are guarded by non-poisoning locks so they stay readable on a
/// thread that is currently panicking.
#[derive(Default)]
pub struct FaultSurfaces {
    error_hook: Mutex<Option<ErrorHook>>,
    rejection_hook: Mutex<Option<RejectionHook>>,
    capture_listeners: Mutex<Vec<LoadListener>>,
    bubble_listeners: Mutex<Vec<LoadListener>>,
}

static GLOBAL_SURFACES: LazyLock<Arc<FaultSurfaces>> =
    LazyLock::new(|| Arc::new(FaultSurfaces::new()));

/// Process-wide default surfaces, the instance [`crate::init`] wires.
pub fn global() -> &'static Arc<FaultSurfaces> {
    &GLOBAL_SURFACES
}

impl FaultSurfaces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current error hook, if one is installed.
    pub fn current_error_hook(&self) -> Option<ErrorHook> {
        self.error_hook.lock().clone()
    }

    /// Install `hook` as the error handler, returning the previous one.
    pub fn swap_error_hook(&self, hook: ErrorHook) -> Option<ErrorHook> {
        self.error_hook.lock().replace(hook)
    }

    /// Current rejection hook, if one is installed.
    pub fn current_rejection_hook(&self) -> Option<RejectionHook> {
        self.rejection_hook.lock().clone()
    }

    /// Install `hook` as the rejection handler, returning the previous one.
    pub fn swap_rejection_hook(&self, hook: RejectionHook) -> Option<RejectionHook> {
        self.rejection_hook.lock().replace(hook)
    }

    /// Raise an uncaught error. Returns the installed hook's verdict,
    /// `false` when no hook is installed. The hook runs outside the slot
    /// lock, so it may itself raise further faults.
    pub fn raise_error(&self, fault: &UncaughtFault) -> bool {
        let hook = self.error_hook.lock().clone();
        match hook {
            Some(hook) => hook(fault),
            None => false,
        }
    }

    /// Raise an unhandled rejection, like [`FaultSurfaces::raise_error`].
    pub fn raise_rejection(&self, reason: &RejectionReason) -> bool {
        let hook = self.rejection_hook.lock().clone();
        match hook {
            Some(hook) => hook(reason),
            None => false,
        }
    }

    /// Register a listener on the load-fault notice bus.
    pub fn add_load_listener(&self, phase: Phase, listener: LoadListener) {
        match phase {
            Phase::Capture => self.capture_listeners.lock().push(listener),
            Phase::Bubble => self.bubble_listeners.lock().push(listener),
        }
    }

    /// Publish a failed sub-resource load. Load faults do not bubble, so
    /// only capture-phase listeners are notified.
    pub fn publish_load_fault(&self, fault: &LoadFault) {
        let listeners: Vec<LoadListener> = self.capture_listeners.lock().clone();
        for listener in listeners {
            listener(fault);
        }
    }
}

// ── Interception state ───────────────────────────────────

/// Saved prior handlers for the hooked hook slots. Written once at first
/// installation, read-only thereafter; there is no reset. The network
/// primitives have no entry here: each monitored wrapper owns the original
/// primitive it decorates.
#[derive(Default)]
pub struct InterceptionState {
    prior_error_hook: OnceLock<Option<ErrorHook>>,
    prior_rejection_hook: OnceLock<Option<RejectionHook>>,
}

impl InterceptionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the error hook that was installed before ours. First write
    /// wins.
    pub(crate) fn record_prior_error_hook(&self, prior: Option<ErrorHook>) {
        let _ = self.prior_error_hook.set(prior);
    }

    /// Record the rejection hook that was installed before ours. First
    /// write wins.
    pub(crate) fn record_prior_rejection_hook(&self, prior: Option<RejectionHook>) {
        let _ = self.prior_rejection_hook.set(prior);
    }

    /// The error hook that was installed before ours, if any.
    pub fn prior_error_hook(&self) -> Option<&ErrorHook> {
        self.prior_error_hook.get().and_then(|prior| prior.as_ref())
    }

    /// The rejection hook that was installed before ours, if any.
    pub fn prior_rejection_hook(&self) -> Option<&RejectionHook> {
        self.prior_rejection_hook
            .get()
            .and_then(|prior| prior.as_ref())
    }
}
