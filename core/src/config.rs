//! Static configuration supplied once when a pipeline is constructed.
//!
//! Every struct carries serde defaults so partial YAML/JSON documents can be
//! loaded. The detector rates and thresholds default to the values used by the
//! presence use case; other deployments are expected to override them.

use crate::prelude::{StageError, StageResult};
use serde::{Deserialize, Serialize};
use std::ops::Range;

pub const SPEED_OF_LIGHT: f64 = 299_792_458.0;

/// Acquisition sequence handed to the sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RadarConfig {
    pub frame_repetition_time_s: f64,
    pub chirp_repetition_time_s: f64,
    pub num_chirps: usize,
    pub num_samples: usize,
    pub start_frequency_hz: f64,
    pub end_frequency_hz: f64,
    pub sample_rate_hz: f64,
    pub rx_mask: u32,
    pub tx_mask: u32,
    pub tx_power_level: u32,
    pub if_gain_db: u32,
    pub lp_cutoff_hz: u32,
    pub hp_cutoff_hz: u32,
}

impl Default for RadarConfig {
    fn default() -> Self {
        Self {
            frame_repetition_time_s: 0.5,
            chirp_repetition_time_s: 0.001,
            num_chirps: 64,
            num_samples: 128,
            start_frequency_hz: 60e9,
            end_frequency_hz: 61.5e9,
            sample_rate_hz: 2e6,
            rx_mask: 0b101,
            tx_mask: 0b1,
            tx_power_level: 31,
            if_gain_db: 33,
            lp_cutoff_hz: 500_000,
            hp_cutoff_hz: 80_000,
        }
    }
}

impl RadarConfig {
    /// Number of active receive antennas, i.e. the population count of `rx_mask`.
    pub fn num_rx_antennas(&self) -> usize {
        self.rx_mask.count_ones() as usize
    }

    pub fn bandwidth_hz(&self) -> f64 {
        (self.end_frequency_hz - self.start_frequency_hz).abs()
    }

    pub fn center_frequency_hz(&self) -> f64 {
        (self.start_frequency_hz + self.end_frequency_hz) / 2.0
    }

    pub fn wavelength_m(&self) -> f64 {
        SPEED_OF_LIGHT / self.center_frequency_hz()
    }

    /// Range covered by one bin of the one-sided, 2x zero-padded range FFT.
    pub fn range_bin_length_m(&self) -> f64 {
        let fft_size = (self.num_samples * 2) as f64;
        SPEED_OF_LIGHT / (2.0 * self.bandwidth_hz() * fft_size / self.num_samples as f64)
    }

    pub fn max_range_m(&self) -> f64 {
        self.range_bin_length_m() * self.num_samples as f64
    }

    /// Length of the oversampled Doppler axis.
    pub fn doppler_bins(&self) -> usize {
        self.num_chirps * 2
    }

    /// Index of the zero-Doppler bin after the spectrum is shifted.
    pub fn zero_doppler_bin(&self) -> usize {
        self.num_chirps
    }

    pub fn doppler_step_hz(&self) -> f64 {
        1.0 / (self.chirp_repetition_time_s * self.doppler_bins() as f64)
    }

    /// Radial velocity for a shifted Doppler bin index.
    pub fn doppler_bin_velocity_mps(&self, doppler_bin: usize) -> f64 {
        let offset = doppler_bin as f64 - self.zero_doppler_bin() as f64;
        offset * self.doppler_step_hz() * self.wavelength_m() / 2.0
    }

    pub fn validate(&self) -> StageResult<()> {
        if self.num_samples < 4 {
            return Err(invalid("num_samples must be at least 4"));
        }
        if self.num_chirps == 0 {
            return Err(invalid("num_chirps must be positive"));
        }
        if self.rx_mask == 0 {
            return Err(invalid("rx_mask selects no antenna"));
        }
        if self.bandwidth_hz() <= 0.0 {
            return Err(invalid("start and end frequency must differ"));
        }
        if self.sample_rate_hz <= 0.0
            || self.chirp_repetition_time_s <= 0.0
            || self.frame_repetition_time_s <= 0.0
        {
            return Err(invalid("sample rate and repetition times must be positive"));
        }
        Ok(())
    }
}

/// Steered beam layout for delay-and-sum beamforming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeamformingConfig {
    pub num_beams: usize,
    pub max_angle_deg: f32,
    /// Antenna spacing expressed in wavelengths.
    pub spacing_wavelengths: f32,
    /// Half-width, in Doppler bins around zero Doppler, of the window used to
    /// reduce beam energy. `None` uses the whole Doppler axis.
    pub energy_doppler_half_width: Option<usize>,
}

impl Default for BeamformingConfig {
    fn default() -> Self {
        Self {
            num_beams: 27,
            max_angle_deg: 45.0,
            spacing_wavelengths: 0.5,
            energy_doppler_half_width: None,
        }
    }
}

impl BeamformingConfig {
    pub fn validate(&self) -> StageResult<()> {
        if self.num_beams == 0 {
            return Err(invalid("num_beams must be positive"));
        }
        if !(0.0..=90.0).contains(&self.max_angle_deg) {
            return Err(invalid("max_angle_deg must lie in [0, 90]"));
        }
        if self.spacing_wavelengths <= 0.0 {
            return Err(invalid("spacing_wavelengths must be positive"));
        }
        Ok(())
    }
}

/// Half-open window over range bins, expressed as fractions of the profile length.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinWindow {
    pub start: f32,
    pub end: f32,
}

impl BinWindow {
    pub fn new(start: f32, end: f32) -> Self {
        Self { start, end }
    }

    /// Resolves the window against a profile of `len` bins.
    pub fn bins(&self, len: usize) -> StageResult<Range<usize>> {
        if !(0.0..=1.0).contains(&self.start) || !(0.0..=1.0).contains(&self.end) {
            return Err(invalid("bin window fractions must lie in [0, 1]"));
        }
        let start = (len as f32 * self.start).floor() as usize;
        let end = ((len as f32 * self.end).floor() as usize).min(len);
        if start >= end {
            return Err(StageError::InvalidConfig(format!(
                "bin window {:?} is empty for {} bins",
                self, len
            )));
        }
        Ok(start..end)
    }
}

/// Secondary ("peeking") detector scoped to its own window and threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeekingConfig {
    pub threshold: f32,
    pub window: BinWindow,
}

impl Default for PeekingConfig {
    fn default() -> Self {
        Self {
            threshold: 0.0006,
            window: BinWindow::new(0.5, 1.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub alpha_slow: f32,
    pub alpha_med: f32,
    pub alpha_fast: f32,
    pub presence_threshold: f32,
    pub window: BinWindow,
    pub peeking: Option<PeekingConfig>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            alpha_slow: 0.001,
            alpha_med: 0.05,
            alpha_fast: 0.6,
            presence_threshold: 0.0007,
            window: BinWindow::new(0.125, 0.5),
            peeking: Some(PeekingConfig::default()),
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> StageResult<()> {
        for (name, alpha) in [
            ("alpha_slow", self.alpha_slow),
            ("alpha_med", self.alpha_med),
            ("alpha_fast", self.alpha_fast),
        ] {
            if !(0.0..=1.0).contains(&alpha) {
                return Err(StageError::InvalidConfig(format!(
                    "{} must lie in [0, 1], got {}",
                    name, alpha
                )));
            }
        }
        Ok(())
    }
}

/// How candidate targets are extracted from a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMode {
    /// Peaks of the adaptive detector's difference signal.
    Adaptive,
    /// Every beam-cube cell above `mean + k·sigma` of the cube magnitude.
    Statistical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AngleMethod {
    BeamArgmax,
    PhaseDifference,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    pub mode: DetectionMode,
    pub angle_method: AngleMethod,
    /// Physical spacing between receive antennas. Derived from the beamforming
    /// spacing and the carrier wavelength when unset.
    pub antenna_spacing_m: Option<f64>,
    /// Minimum peak height. Defaults to the presence threshold.
    pub min_peak_height: Option<f32>,
    pub statistical_sigma: f32,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            mode: DetectionMode::Adaptive,
            angle_method: AngleMethod::BeamArgmax,
            antenna_spacing_m: None,
            min_peak_height: None,
            statistical_sigma: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Neighbourhood radius in metres.
    pub epsilon_m: f32,
    pub min_points: usize,
    pub history_len: usize,
    /// Entries averaged by the angle-segment and energy smoothers.
    pub smoothing_len: usize,
    pub num_segments: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            epsilon_m: 0.5,
            min_points: 1,
            history_len: 20,
            smoothing_len: 7,
            num_segments: 8,
        }
    }
}

impl ClusterConfig {
    pub fn validate(&self) -> StageResult<()> {
        if self.epsilon_m <= 0.0 {
            return Err(invalid("epsilon_m must be positive"));
        }
        if self.min_points == 0 || self.history_len == 0 || self.smoothing_len == 0 {
            return Err(invalid(
                "min_points, history_len and smoothing_len must be positive",
            ));
        }
        if self.num_segments == 0 {
            return Err(invalid("num_segments must be positive"));
        }
        Ok(())
    }
}

/// Retry and cooldown policy of the frame source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub failure_threshold: u32,
    pub cooldown_ms: u64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_backoff_ms: 50,
            failure_threshold: 5,
            cooldown_ms: 1000,
        }
    }
}

impl ResilienceConfig {
    pub fn validate(&self) -> StageResult<()> {
        if self.max_attempts == 0 || self.failure_threshold == 0 {
            return Err(invalid("max_attempts and failure_threshold must be positive"));
        }
        Ok(())
    }
}

/// Distance limits for one angular segment; a distance above `sleeping_m`
/// classifies as walking.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SegmentThresholds {
    pub standing_m: f32,
    pub sitting_m: f32,
    pub sleeping_m: f32,
}

impl SegmentThresholds {
    pub fn new(standing_m: f32, sitting_m: f32, sleeping_m: f32) -> Self {
        Self {
            standing_m,
            sitting_m,
            sleeping_m,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostureConfig {
    pub max_angle_deg: f32,
    pub segments: Vec<SegmentThresholds>,
    pub history_len: usize,
}

impl Default for PostureConfig {
    fn default() -> Self {
        Self {
            max_angle_deg: 60.0,
            segments: vec![
                SegmentThresholds::new(1.70, 2.10, 2.90),
                SegmentThresholds::new(1.50, 1.90, 2.70),
                SegmentThresholds::new(1.50, 1.90, 2.70),
                SegmentThresholds::new(1.70, 2.10, 2.90),
            ],
            history_len: 3,
        }
    }
}

impl PostureConfig {
    pub fn validate(&self) -> StageResult<()> {
        if self.segments.is_empty() {
            return Err(invalid("posture needs at least one segment"));
        }
        if self.history_len == 0 {
            return Err(invalid("posture history_len must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FallConfig {
    pub velocity_threshold_mps: f32,
    /// Doppler bins on each side of zero Doppler ignored when searching for
    /// the dominant velocity.
    pub zero_doppler_guard: usize,
}

impl Default for FallConfig {
    fn default() -> Self {
        Self {
            velocity_threshold_mps: 0.6,
            zero_doppler_guard: 2,
        }
    }
}

/// Everything a [`crate::processing::Pipeline`] needs, supplied once.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub radar: RadarConfig,
    pub beamforming: BeamformingConfig,
    pub detector: DetectorConfig,
    pub estimator: EstimatorConfig,
    pub cluster: ClusterConfig,
    pub resilience: ResilienceConfig,
    pub posture: Option<PostureConfig>,
    pub fall: Option<FallConfig>,
}

impl PipelineConfig {
    pub fn validate(&self) -> StageResult<()> {
        self.radar.validate()?;
        self.beamforming.validate()?;
        self.detector.validate()?;
        self.cluster.validate()?;
        self.resilience.validate()?;
        if let Some(posture) = &self.posture {
            posture.validate()?;
        }
        if self.estimator.statistical_sigma < 0.0 {
            return Err(invalid("statistical_sigma must be non-negative"));
        }
        Ok(())
    }

    /// Antenna spacing used by phase-difference angle estimation.
    pub fn antenna_spacing_m(&self) -> f64 {
        self.estimator.antenna_spacing_m.unwrap_or_else(|| {
            f64::from(self.beamforming.spacing_wavelengths) * self.radar.wavelength_m()
        })
    }
}

fn invalid(message: &str) -> StageError {
    StageError::InvalidConfig(message.to_string())
}
