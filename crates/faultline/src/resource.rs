//! Failed sub-resource load capture.
//!
//! Registers one capture-phase listener on the load-fault notice bus —
//! load faults never reach bubble-phase listeners — and reports failures
//! of image and script elements. Everything else on the bus is ignored.

use std::sync::Arc;

use faultline_types::{FaultEvent, FaultKind, Identity};

use crate::dispatch::ReportSink;
use crate::surfaces::{ElementTag, FaultSurfaces, LoadFault, Phase};

pub(crate) fn install(
    surfaces: &FaultSurfaces,
    sink: Arc<dyn ReportSink>,
    identity: Arc<Identity>,
) {
    surfaces.add_load_listener(
        Phase::Capture,
        Arc::new(move |fault: &LoadFault| {
            if !matches!(fault.tag, ElementTag::Img | ElementTag::Script) {
                return;
            }
            let source = fault.source.as_deref().unwrap_or("unknown");
            sink.submit(FaultEvent::new(
                FaultKind::ResourceLoad,
                format!("Resource Load Error: {} {}", fault.tag.as_str(), source),
                &identity,
            ));
        }),
    );
}
