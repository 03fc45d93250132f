//! Shared helpers for in-crate tests.

use std::sync::{Arc, Mutex};

use faultline_types::{FaultEvent, Identity};

use crate::dispatch::ReportSink;

/// Sink collecting every submitted event for later assertions.
#[derive(Default)]
pub(crate) struct RecordingSink {
    events: Mutex<Vec<FaultEvent>>,
}

impl RecordingSink {
    pub(crate) fn events(&self) -> Vec<FaultEvent> {
        self.events.lock().expect("recording sink poisoned").clone()
    }
}

impl ReportSink for RecordingSink {
    fn submit(&self, event: FaultEvent) {
        self.events
            .lock()
            .expect("recording sink poisoned")
            .push(event);
    }
}

pub(crate) fn test_identity() -> Arc<Identity> {
    Arc::new(Identity::new("demo", "test"))
}
