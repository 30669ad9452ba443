use crate::evaluate::IterationRecord;

/// Observer for reporting incremental progress while the resampling loop runs.
///
/// Methods take `&self` and the trait is `Sync` because the parallel runner
/// reports from worker threads.
pub trait IterationObserver: Sync {
    fn on_start(&self, total_iterations: usize) {
        let _ = total_iterations;
    }
    fn on_iteration(&self, record: &IterationRecord) {
        let _ = record;
    }
    fn on_finish(&self) {}
}

#[derive(Default)]
pub struct NoopObserver;

impl IterationObserver for NoopObserver {}
