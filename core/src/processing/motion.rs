use crate::config::{FallConfig, RadarConfig};
use crate::math::StatsHelper;
use crate::prelude::{ensure_shape, ProcessingStage, StageResult};
use ndarray::{Array3, Axis};
use num_complex::Complex32;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionEstimate {
    pub radial_velocity_mps: f32,
    pub fall_detected: bool,
}

/// Flags falls from the dominant radial velocity of a frame.
///
/// The Doppler spectrum is the range-Doppler magnitude summed over range bins
/// and antennas, with `zero_doppler_guard` bins on either side of zero
/// Doppler suppressed so static clutter cannot win.
#[derive(Debug, Clone)]
pub struct FallDetector {
    config: FallConfig,
    radar: RadarConfig,
}

impl FallDetector {
    pub fn new(config: &FallConfig, radar: &RadarConfig) -> Self {
        Self {
            config: config.clone(),
            radar: radar.clone(),
        }
    }

    /// Velocity of the strongest non-static Doppler bin, `0.0` for a frame
    /// without any moving energy.
    pub fn dominant_velocity(&self, range_doppler: &Array3<Complex32>) -> StageResult<f32> {
        let doppler_bins = self.radar.doppler_bins();
        let (range_bins, _, antennas) = range_doppler.dim();
        ensure_shape(
            "range-doppler spectrum",
            &[range_bins, doppler_bins, antennas],
            range_doppler.shape(),
        )?;

        let zero = self.radar.zero_doppler_bin();
        let guard = zero.saturating_sub(self.config.zero_doppler_guard)
            ..=(zero + self.config.zero_doppler_guard);
        let spectrum: Vec<f32> = range_doppler
            .axis_iter(Axis(1))
            .enumerate()
            .map(|(bin, plane)| {
                if guard.contains(&bin) {
                    0.0
                } else {
                    plane.iter().map(|value| value.norm()).sum()
                }
            })
            .collect();

        Ok(match StatsHelper::argmax(&spectrum) {
            Some(bin) if spectrum[bin] > 0.0 => {
                self.radar.doppler_bin_velocity_mps(bin) as f32
            }
            _ => 0.0,
        })
    }

    pub fn evaluate(&self, range_doppler: &Array3<Complex32>) -> StageResult<MotionEstimate> {
        let radial_velocity_mps = self.dominant_velocity(range_doppler)?;
        Ok(MotionEstimate {
            radial_velocity_mps,
            fall_detected: radial_velocity_mps.abs() > self.config.velocity_threshold_mps,
        })
    }
}

impl ProcessingStage for FallDetector {
    type Input = Array3<Complex32>;
    type Output = MotionEstimate;

    fn execute(&mut self, range_doppler: &Array3<Complex32>) -> StageResult<MotionEstimate> {
        self.evaluate(range_doppler)
    }
}
