use crate::interface::RawFrame;
use std::sync::{Arc, Mutex, PoisonError};

/// Single-slot cell holding the most recently acquired frame.
///
/// Writers overwrite the slot; readers clone the `Arc`. The lock is held only
/// for the swap, so neither side waits on acquisition or processing.
#[derive(Debug, Default)]
pub struct LatestFrame {
    slot: Mutex<Option<Arc<RawFrame>>>,
}

impl LatestFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the stored frame, returning the one it displaced.
    pub fn publish(&self, frame: Arc<RawFrame>) -> Option<Arc<RawFrame>> {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        slot.replace(frame)
    }

    pub fn latest(&self) -> Option<Arc<RawFrame>> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}
