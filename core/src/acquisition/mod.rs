//! Resilient frame acquisition and the single-slot hand-off to processing.

pub mod frame_source;
pub mod latest;
pub mod producer;

pub use frame_source::{Clock, FrameOutcome, FrameSource, SystemClock};
pub use latest::LatestFrame;
pub use producer::FrameProducer;

/// Errors that end acquisition. Transient misses never surface here; they
/// become [`FrameOutcome::Unavailable`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquisitionError {
    #[error("fatal sensor fault: {0}")]
    Fatal(String),
    #[error("acquisition thread failure: {0}")]
    Thread(String),
}

pub type AcquisitionResult<T> = Result<T, AcquisitionError>;
