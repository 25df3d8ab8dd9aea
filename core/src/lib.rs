//! Processing core for FMCW multi-antenna radar frames.
//!
//! Raw chirp matrices are turned into range-Doppler spectra, steered into
//! beams and fed to an adaptive presence detector. Detected reflectors are
//! located in range and angle, clustered, and summarised in a
//! [`interface::DetectionReport`] per frame.

pub mod acquisition;
pub mod config;
pub mod interface;
pub mod math;
pub mod prelude;
pub mod processing;
pub mod telemetry;

pub use config::PipelineConfig;
pub use interface::{DetectionReport, RawFrame, Sensor, SensorError};
pub use prelude::{ProcessingStage, StageError, StageResult};
pub use processing::{Pipeline, PipelineError, PipelineResult, ReportPublisher};
