//! Core record types for faultline: the normalized fault event, its closed
//! kind taxonomy, and the enriched outbound report.
//!
//! Capture components build [`FaultEvent`]s; the dispatcher merges each one
//! with environment enrichment into a [`Report`], the record that actually
//! goes on the wire. Events are immutable once constructed — enrichment
//! always produces a new `Report`, it never rewrites the event.

use chrono::{SecondsFormat, Utc};
use facet::Facet;

/// Message used when the underlying fault source gives no description at
/// all. A report with an empty message is useless to a reader, so one is
/// always synthesized.
pub const UNKNOWN_FAULT_MESSAGE: &str = "Unknown Error";

/// Message used when a rejection reason carries neither a message nor a
/// usable string form. Part of the wire contract.
pub const UNKNOWN_REJECTION_MESSAGE: &str = "Unknown Promise Error";

// ── Kind taxonomy ────────────────────────────────────────

/// Closed set of fault categories. Every category is terminal: observed and
/// reported, never recovered or retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Uncaught error on the process-wide error surface.
    Runtime,
    /// Failure escaping spawned asynchronous work.
    UnhandledRejection,
    /// Transport-level failure of the callback-configured request primitive.
    Network,
    /// Transport failure or non-success status of the awaited request
    /// primitive.
    Fetch,
    /// Failed load of an embedded sub-resource (image, script).
    ResourceLoad,
    /// Fault forwarded by a framework adapter.
    Framework,
}

impl FaultKind {
    /// Wire tag for this kind. These exact strings are the collector
    /// contract.
    pub fn as_str(self) -> &'static str {
        match self {
            FaultKind::Runtime => "RuntimeError",
            FaultKind::UnhandledRejection => "UnhandledRejection",
            FaultKind::Network => "NetworkError",
            FaultKind::Fetch => "FetchError",
            FaultKind::ResourceLoad => "ResourceLoadError",
            FaultKind::Framework => "FrameworkError",
        }
    }
}

// ── Identity ─────────────────────────────────────────────

/// Caller-supplied identifiers stamped on every event. Immutable for the
/// process lifetime.
#[derive(Debug, Clone)]
pub struct Identity {
    /// Project identifier, distinguishing fault sources at the collector.
    pub project_name: String,
    /// Environment tag (e.g. "production", "development").
    pub environment: String,
}

impl Identity {
    pub fn new(project_name: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            project_name: project_name.into(),
            environment: environment.into(),
        }
    }
}

// ── Fault event ──────────────────────────────────────────

/// One observed fault, normalized and ready for delivery.
///
/// The timestamp is assigned when the event is constructed, i.e. at the
/// moment the fault is observed, not at delivery time.
#[derive(Debug, Clone)]
pub struct FaultEvent {
    /// Fault category.
    pub kind: FaultKind,
    /// Human-readable description. Never empty.
    pub message: String,
    /// Raw backtrace text as the fault source provided it. `None` when the
    /// source had none; never synthesized.
    pub stack: Option<String>,
    /// Source file of the fault. Populated only for [`FaultKind::Runtime`].
    pub source: Option<String>,
    /// Source line of the fault. Populated only for [`FaultKind::Runtime`].
    pub line: Option<u32>,
    /// Source column of the fault. Populated only for [`FaultKind::Runtime`].
    pub column: Option<u32>,
    /// Project identifier from the monitor configuration.
    pub project_name: String,
    /// Environment tag from the monitor configuration.
    pub environment: String,
    /// Capture-time instant, ISO-8601 UTC with millisecond precision.
    pub timestamp: String,
}

impl FaultEvent {
    /// Build an event observed now. An empty `message` is replaced with
    /// [`UNKNOWN_FAULT_MESSAGE`].
    pub fn new(kind: FaultKind, message: impl Into<String>, identity: &Identity) -> Self {
        let message = message.into();
        let message = if message.is_empty() {
            UNKNOWN_FAULT_MESSAGE.to_owned()
        } else {
            message
        };
        Self {
            kind,
            message,
            stack: None,
            source: None,
            line: None,
            column: None,
            project_name: identity.project_name.clone(),
            environment: identity.environment.clone(),
            timestamp: now_iso8601(),
        }
    }

    /// Attach backtrace text, when the fault source provided one.
    pub fn with_stack(mut self, stack: Option<String>) -> Self {
        self.stack = stack;
        self
    }

    /// Attach source location fields.
    pub fn with_location(
        mut self,
        source: Option<String>,
        line: Option<u32>,
        column: Option<u32>,
    ) -> Self {
        self.source = source;
        self.line = line;
        self.column = column;
        self
    }
}

fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ── Outbound report ──────────────────────────────────────

/// The outbound wire record: a [`FaultEvent`] merged with environment
/// enrichment. Field names here are the collector contract.
#[derive(Facet, Debug, Clone)]
pub struct Report {
    pub message: String,
    #[facet(rename = "errorType")]
    pub error_type: String,
    pub stack: Option<String>,
    pub source: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
    #[facet(rename = "projectName")]
    pub project_name: String,
    pub environment: String,
    pub timestamp: String,
    #[facet(rename = "userAgent")]
    pub user_agent: String,
    #[facet(rename = "processName")]
    pub process_name: String,
    pub pid: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity::new("demo", "test")
    }

    #[test]
    fn kind_wire_tags_are_fixed() {
        assert_eq!(FaultKind::Runtime.as_str(), "RuntimeError");
        assert_eq!(FaultKind::UnhandledRejection.as_str(), "UnhandledRejection");
        assert_eq!(FaultKind::Network.as_str(), "NetworkError");
        assert_eq!(FaultKind::Fetch.as_str(), "FetchError");
        assert_eq!(FaultKind::ResourceLoad.as_str(), "ResourceLoadError");
        assert_eq!(FaultKind::Framework.as_str(), "FrameworkError");
    }

    #[test]
    fn empty_message_gets_placeholder() {
        let event = FaultEvent::new(FaultKind::Runtime, "", &identity());
        assert_eq!(event.message, UNKNOWN_FAULT_MESSAGE);
    }

    #[test]
    fn event_is_stamped_at_construction() {
        let event = FaultEvent::new(FaultKind::Network, "Network Error: GET /x", &identity());
        assert!(
            event.timestamp.contains('T') && event.timestamp.ends_with('Z'),
            "expected ISO-8601 UTC timestamp, got {}",
            event.timestamp
        );
        assert_eq!(event.project_name, "demo");
        assert_eq!(event.environment, "test");
        assert!(event.stack.is_none());
    }

    #[test]
    fn report_uses_wire_field_names() {
        let report = Report {
            message: "Network Error: GET /api/widgets".to_owned(),
            error_type: FaultKind::Network.as_str().to_owned(),
            stack: None,
            source: None,
            line: None,
            column: None,
            project_name: "demo".to_owned(),
            environment: "production".to_owned(),
            timestamp: "2024-01-01T00:00:00.000Z".to_owned(),
            user_agent: "faultline/0.1.0 (linux x86_64)".to_owned(),
            process_name: "demo-app".to_owned(),
            pid: 4242,
        };
        let json = facet_json::to_string(&report).expect("report serializes");
        assert!(json.contains("\"errorType\""), "missing errorType in {json}");
        assert!(json.contains("\"projectName\""), "missing projectName in {json}");
        assert!(json.contains("\"userAgent\""), "missing userAgent in {json}");
        assert!(json.contains("\"processName\""), "missing processName in {json}");

        // The collector parses this same shape back.
        let parsed: Report = facet_json::from_str(&json).expect("report parses");
        assert_eq!(parsed.error_type, "NetworkError");
        assert_eq!(parsed.pid, 4242);
        assert!(parsed.stack.is_none());
    }
}
