use serde::Serialize;
use std::sync::Mutex;

/// Shared counters for acquisition and processing health.
#[derive(Debug)]
pub struct MetricsRecorder {
    inner: Mutex<MetricsSnapshot>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub frames_acquired: usize,
    pub frames_unavailable: usize,
    pub transient_failures: usize,
    pub cooldowns: usize,
    pub processed: usize,
    pub errors: usize,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MetricsSnapshot::default()),
        }
    }

    fn update(&self, apply: impl FnOnce(&mut MetricsSnapshot)) {
        if let Ok(mut metrics) = self.inner.lock() {
            apply(&mut metrics);
        }
    }

    pub fn record_acquired(&self) {
        self.update(|m| m.frames_acquired += 1);
    }

    pub fn record_unavailable(&self) {
        self.update(|m| m.frames_unavailable += 1);
    }

    pub fn record_transient_failure(&self) {
        self.update(|m| m.transient_failures += 1);
    }

    pub fn record_cooldown(&self) {
        self.update(|m| m.cooldowns += 1);
    }

    pub fn record_processed(&self) {
        self.update(|m| m.processed += 1);
    }

    pub fn record_error(&self) {
        self.update(|m| m.errors += 1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        if let Ok(metrics) = self.inner.lock() {
            *metrics
        } else {
            MetricsSnapshot::default()
        }
    }
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}
