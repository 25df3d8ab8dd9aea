use crate::config::RadarConfig;
use crate::interface::frame::RawFrame;

/// Errors raised by a sensor driver.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SensorError {
    /// A transient miss; the next acquisition may succeed.
    #[error("frame acquisition failed")]
    AcquisitionFailed,
    #[error("sensor fault: {0}")]
    Fault(String),
}

/// Driver boundary for the physical (or simulated) FMCW sensor.
pub trait Sensor: Send {
    fn configure_acquisition(&mut self, config: &RadarConfig) -> Result<(), SensorError>;

    /// Blocks until the next frame is available.
    fn next_raw_frame(&mut self) -> Result<RawFrame, SensorError>;

    fn close(&mut self) {}
}

impl<S: Sensor + ?Sized> Sensor for Box<S> {
    fn configure_acquisition(&mut self, config: &RadarConfig) -> Result<(), SensorError> {
        (**self).configure_acquisition(config)
    }

    fn next_raw_frame(&mut self) -> Result<RawFrame, SensorError> {
        (**self).next_raw_frame()
    }

    fn close(&mut self) {
        (**self).close()
    }
}
