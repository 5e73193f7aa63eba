/// Receives progress from long-running scans: extraction, brute force and
/// reconstruction passes.
pub trait Progress {
    fn set_total(&mut self, _total: u64) {}

    fn report_add(&mut self, _delta: u64) {}

    fn log_message(&mut self, message: &str) {
        tracing::info!("{}", message);
    }
}

/// Discards counts; messages still go to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {}
