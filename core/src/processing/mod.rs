//! Per-frame processing stages and the pipeline that chains them.

pub mod beamforming;
pub mod cluster;
pub mod detector;
pub mod history;
pub mod motion;
pub mod peaks;
pub mod pipeline;
pub mod posture;
pub mod publisher;
pub mod range_doppler;

pub use beamforming::{BeamCube, BeamformingStage, EnergyTracker};
pub use cluster::{ClusterTracker, TrackedTarget};
pub use detector::{AdaptiveDetector, DetectorOutput, DetectorState};
pub use history::{MajorityVote, MovingAverage, SegmentSmoother, TrackHistory};
pub use motion::{FallDetector, MotionEstimate};
pub use peaks::{extract_peaks, PeakAndAngleEstimator, Target};
pub use pipeline::{Pipeline, PipelineError, PipelineResult};
pub use posture::{classify_position, PostureClassifier, PostureEstimate};
pub use publisher::ReportPublisher;
pub use range_doppler::{FrameSpectra, RangeDopplerTransform};
