use crate::generator::profile::FrameSynthesizer;
use fmcwcore::config::RadarConfig;
use fmcwcore::interface::{RawFrame, Sensor, SensorError};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::thread;
use std::time::Duration;

/// [`Sensor`] backed by a [`FrameSynthesizer`], with injectable transient
/// misses and an optional fatal fault.
pub struct SimulatedSensor {
    synthesizer: FrameSynthesizer,
    failure_rate: f32,
    fault_after: Option<u64>,
    frame_interval: Option<Duration>,
    rng: StdRng,
    delivered: u64,
    configured: bool,
    closed: bool,
}

impl SimulatedSensor {
    pub fn new(synthesizer: FrameSynthesizer, failure_rate: f32, seed: u64) -> Self {
        Self {
            synthesizer,
            failure_rate: failure_rate.clamp(0.0, 1.0),
            fault_after: None,
            frame_interval: None,
            rng: StdRng::seed_from_u64(seed ^ 0x5eed),
            delivered: 0,
            configured: false,
            closed: false,
        }
    }

    /// Raises a fatal fault once `frames` frames were delivered.
    pub fn with_fault_after(mut self, frames: u64) -> Self {
        self.fault_after = Some(frames);
        self
    }

    /// Blocks each acquisition for `interval`, like hardware waiting on the
    /// next frame trigger.
    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = Some(interval);
        self
    }

    #[cfg(test)]
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    #[cfg(test)]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Sensor for SimulatedSensor {
    fn configure_acquisition(&mut self, config: &RadarConfig) -> Result<(), SensorError> {
        let radar = self.synthesizer.radar();
        if config.num_samples != radar.num_samples
            || config.num_chirps != radar.num_chirps
            || config.rx_mask != radar.rx_mask
        {
            return Err(SensorError::Fault(format!(
                "requested {} chirps x {} samples on rx mask {:#b}, scene renders {} x {} on {:#b}",
                config.num_chirps,
                config.num_samples,
                config.rx_mask,
                radar.num_chirps,
                radar.num_samples,
                radar.rx_mask
            )));
        }
        self.configured = true;
        Ok(())
    }

    fn next_raw_frame(&mut self) -> Result<RawFrame, SensorError> {
        if !self.configured || self.closed {
            return Err(SensorError::Fault("sensor is not acquiring".into()));
        }
        if self.fault_after == Some(self.delivered) {
            return Err(SensorError::Fault("simulated device fault".into()));
        }
        if let Some(interval) = self.frame_interval {
            thread::sleep(interval);
        }
        if self.failure_rate > 0.0 && self.rng.gen::<f32>() < self.failure_rate {
            return Err(SensorError::AcquisitionFailed);
        }
        self.delivered += 1;
        Ok(self.synthesizer.next_frame())
    }

    fn close(&mut self) {
        self.closed = true;
    }
}
