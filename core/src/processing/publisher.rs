use crate::interface::DetectionReport;
use std::sync::Arc;
use tokio::sync::watch;

/// Latest-value hand-off of detection reports to presentation consumers.
///
/// Publishing replaces the previous report; a slow consumer only ever sees
/// the newest one.
#[derive(Debug, Clone)]
pub struct ReportPublisher {
    sender: Arc<watch::Sender<Option<DetectionReport>>>,
}

impl ReportPublisher {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn publish(&self, report: DetectionReport) {
        self.sender.send_replace(Some(report));
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<DetectionReport>> {
        self.sender.subscribe()
    }

    pub fn latest(&self) -> Option<DetectionReport> {
        self.sender.borrow().clone()
    }
}

impl Default for ReportPublisher {
    fn default() -> Self {
        Self::new()
    }
}
