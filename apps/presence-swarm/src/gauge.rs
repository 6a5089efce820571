use std::sync::{
    atomic::{AtomicI64, Ordering},
    Arc,
};

/// Process-wide viewer count, last write wins.
///
/// Any worker may overwrite it after a successful count refresh. It is only
/// read for logging, so relaxed ordering is enough.
#[derive(Debug, Clone, Default)]
pub struct ViewerCountGauge {
    value: Arc<AtomicI64>,
}

impl ViewerCountGauge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, count: i64) {
        self.value.store(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}
