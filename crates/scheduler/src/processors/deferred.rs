//! Deferred redelivery — placeholder.
//!
//! Quiet-hour suppressions are recorded as SUPPRESSED send-log rows with a
//! `redeliver_after` stamp, which gives this pass its future candidate set,
//! but re-delivery after the quiet window is not built yet. Until then this
//! processor is an explicit no-op success so the tick loop treats it
//! uniformly.

use pulse_common::types::ProcessorReport;

use crate::context::SchedulerContext;

pub struct DeferredRedeliveryProcessor;

impl DeferredRedeliveryProcessor {
    pub async fn run(_ctx: &mut SchedulerContext) -> ProcessorReport {
        tracing::debug!("Deferred redelivery not implemented; skipping");
        ProcessorReport::ok(0, 0, "deferred redelivery not implemented")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_reports_noop_success() {
        // The report shape is load-bearing: the tick loop logs it like any
        // other processor's
        let report = ProcessorReport::ok(0, 0, "deferred redelivery not implemented");
        assert!(report.success);
        assert_eq!(report.processed, 0);
        assert_eq!(report.skipped, 0);
    }
}
