use crate::config::{AngleMethod, PipelineConfig};
use crate::math::{MatrixHelper, StatsHelper};
use crate::processing::beamforming::BeamCube;
use crate::processing::range_doppler::FrameSpectra;
use ndarray::{Array2, Axis};
use std::ops::Range;

/// A candidate reflector extracted from one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Target {
    pub range_bin: usize,
    pub range_m: f32,
    pub doppler_bin: usize,
    pub velocity_mps: f32,
    pub angle_rad: f32,
    pub magnitude: f32,
}

/// Local maxima of `signal` inside `window` whose height is at least `min_height`.
///
/// A sample is a peak when it rises above its left neighbour and is not
/// exceeded by the right one; flat tops report their middle sample. The window
/// edges are never peaks. Returned indices are absolute bins of `signal`.
pub fn extract_peaks(signal: &[f32], window: Range<usize>, min_height: f32) -> Vec<usize> {
    let end = window.end.min(signal.len());
    if window.start >= end {
        return Vec::new();
    }
    let slice = &signal[window.start..end];
    let mut peaks = Vec::new();
    let mut i = 1;
    while i + 1 < slice.len() {
        if slice[i] > slice[i - 1] {
            let mut plateau_end = i;
            while plateau_end + 1 < slice.len() && slice[plateau_end + 1] == slice[i] {
                plateau_end += 1;
            }
            if plateau_end + 1 < slice.len() && slice[plateau_end + 1] < slice[i] {
                let peak = (i + plateau_end) / 2;
                if slice[peak] >= min_height {
                    peaks.push(window.start + peak);
                }
                i = plateau_end + 1;
                continue;
            }
            i = plateau_end;
        }
        i += 1;
    }
    peaks
}

/// Converts peaks or beam-cube cells into [`Target`]s with range, Doppler and
/// angle-of-arrival.
#[derive(Debug, Clone)]
pub struct PeakAndAngleEstimator {
    method: AngleMethod,
    range_bin_length_m: f32,
    zero_doppler_bin: usize,
    velocity_per_bin_mps: f32,
    wavelength_m: f32,
    antenna_spacing_m: f32,
    beam_angles_rad: Vec<f32>,
}

impl PeakAndAngleEstimator {
    pub fn new(config: &PipelineConfig, beam_angles_deg: &[f32]) -> Self {
        let radar = &config.radar;
        Self {
            method: config.estimator.angle_method,
            range_bin_length_m: radar.range_bin_length_m() as f32,
            zero_doppler_bin: radar.zero_doppler_bin(),
            velocity_per_bin_mps: (radar.doppler_step_hz() * radar.wavelength_m() / 2.0) as f32,
            wavelength_m: radar.wavelength_m() as f32,
            antenna_spacing_m: config.antenna_spacing_m() as f32,
            beam_angles_rad: beam_angles_deg.iter().map(|a| a.to_radians()).collect(),
        }
    }

    pub fn range_m(&self, bin: usize) -> f32 {
        bin as f32 * self.range_bin_length_m
    }

    pub fn velocity_mps(&self, doppler_bin: usize) -> f32 {
        (doppler_bin as f32 - self.zero_doppler_bin as f32) * self.velocity_per_bin_mps
    }

    /// Beam of maximum energy at `range_bin` and its steering angle.
    pub fn beam_argmax(&self, energy: &Array2<f32>, range_bin: usize) -> Option<(usize, f32)> {
        if range_bin >= energy.nrows() {
            return None;
        }
        let row = energy.row(range_bin);
        let beam = StatsHelper::argmax(row.as_slice()?)?;
        Some((beam, *self.beam_angles_rad.get(beam)?))
    }

    /// Angle from the inter-antenna phase of the range spectrum at `range_bin`.
    ///
    /// Antenna `i` is compared with antenna 0; the wrapped phase differences
    /// are averaged across chirps and scaled by the element distance `i·d`.
    /// `None` with fewer than two antennas.
    pub fn phase_difference_angle(&self, spectra: &FrameSpectra, range_bin: usize) -> Option<f32> {
        let (antennas, chirps, bins) = spectra.range.dim();
        if antennas < 2 || chirps == 0 || range_bin >= bins {
            return None;
        }
        let reference = spectra.range.index_axis(Axis(0), 0);
        let mut angles = Vec::with_capacity(antennas - 1);
        for antenna in 1..antennas {
            let channel = spectra.range.index_axis(Axis(0), antenna);
            let mean_difference = (0..chirps)
                .map(|chirp| {
                    MatrixHelper::wrap_phase(
                        channel[[chirp, range_bin]].arg() - reference[[chirp, range_bin]].arg(),
                    )
                })
                .sum::<f32>()
                / chirps as f32;
            let spacing = self.antenna_spacing_m * antenna as f32;
            let sin_theta = (mean_difference * self.wavelength_m
                / (2.0 * std::f32::consts::PI * spacing))
                .clamp(-1.0, 1.0);
            angles.push(sin_theta.asin());
        }
        Some(StatsHelper::mean(&angles))
    }

    /// One target per peak. The Doppler bin is the strongest cell of the chosen
    /// beam at the peak's range bin.
    pub fn estimate(
        &self,
        peaks: &[usize],
        spectra: &FrameSpectra,
        cube: &BeamCube,
        energy: &Array2<f32>,
    ) -> Vec<Target> {
        peaks
            .iter()
            .filter_map(|&range_bin| {
                let (beam, beam_angle) = self.beam_argmax(energy, range_bin)?;
                let angle_rad = match self.method {
                    AngleMethod::BeamArgmax => beam_angle,
                    AngleMethod::PhaseDifference => self
                        .phase_difference_angle(spectra, range_bin)
                        .unwrap_or(beam_angle),
                };
                let target = self.target_at(cube, range_bin, beam)?;
                Some(Target {
                    angle_rad,
                    magnitude: energy[[range_bin, beam]],
                    ..target
                })
            })
            .collect()
    }

    /// Target at `(range_bin, beam)` of the cube, with its Doppler bin taken
    /// from the strongest cell along the Doppler axis.
    pub fn target_at(&self, cube: &BeamCube, range_bin: usize, beam: usize) -> Option<Target> {
        let (range_bins, _, beams) = cube.dim();
        if range_bin >= range_bins || beam >= beams {
            return None;
        }
        let doppler: Vec<f32> = cube
            .index_axis(Axis(0), range_bin)
            .index_axis(Axis(1), beam)
            .iter()
            .map(|value| value.norm())
            .collect();
        let doppler_bin = StatsHelper::argmax(&doppler)?;
        Some(Target {
            range_bin,
            range_m: self.range_m(range_bin),
            doppler_bin,
            velocity_mps: self.velocity_mps(doppler_bin),
            angle_rad: *self.beam_angles_rad.get(beam)?,
            magnitude: doppler[doppler_bin],
        })
    }

    /// Every cube cell whose magnitude exceeds `mean + sigma · std` of the
    /// whole cube. A zero-energy cube yields no targets.
    pub fn statistical_targets(&self, cube: &BeamCube, sigma: f32) -> Vec<Target> {
        let magnitudes: Vec<f32> = cube.iter().map(|value| value.norm()).collect();
        let threshold = StatsHelper::mean(&magnitudes) + sigma * StatsHelper::std_dev(&magnitudes);
        if StatsHelper::max(&magnitudes).map_or(true, |max| max <= 0.0) {
            return Vec::new();
        }

        cube.indexed_iter()
            .filter_map(|((range_bin, doppler_bin, beam), value)| {
                let magnitude = value.norm();
                (magnitude > threshold).then(|| Target {
                    range_bin,
                    range_m: self.range_m(range_bin),
                    doppler_bin,
                    velocity_mps: self.velocity_mps(doppler_bin),
                    angle_rad: self.beam_angles_rad[beam],
                    magnitude,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EstimatorConfig, RadarConfig};
    use ndarray::Array3;
    use num_complex::Complex32;

    #[test]
    fn peaks_respect_window_and_height() {
        let signal = [0.0, 0.5, 0.0, 2.0, 1.0, 0.0, 3.0, 0.0, 0.2, 0.1];
        assert_eq!(extract_peaks(&signal, 0..10, 1.0), vec![3, 6]);
        assert_eq!(extract_peaks(&signal, 0..10, 0.1), vec![1, 3, 6, 8]);
        assert_eq!(extract_peaks(&signal, 4..10, 1.0), vec![6]);
        // bin 6 sits on the window edge, so it cannot be a peak
        assert_eq!(extract_peaks(&signal, 6..10, 1.0), Vec::<usize>::new());
    }

    #[test]
    fn plateau_reports_middle_sample() {
        let signal = [0.0, 1.0, 1.0, 1.0, 0.0, 1.0, 1.0];
        assert_eq!(extract_peaks(&signal, 0..7, 0.5), vec![2]);
    }

    #[test]
    fn empty_or_flat_signal_has_no_peaks() {
        assert!(extract_peaks(&[], 0..4, 0.0).is_empty());
        assert!(extract_peaks(&[1.0; 16], 0..16, 0.0).is_empty());
        assert!(extract_peaks(&[0.0, 1.0, 0.0], 2..1, 0.0).is_empty());
    }

    fn estimator(method: AngleMethod) -> (PeakAndAngleEstimator, PipelineConfig) {
        let config = PipelineConfig {
            radar: RadarConfig {
                num_samples: 16,
                num_chirps: 4,
                ..Default::default()
            },
            estimator: EstimatorConfig {
                angle_method: method,
                ..Default::default()
            },
            ..Default::default()
        };
        let angles = MatrixHelper::linspace(-45.0, 45.0, 27);
        (PeakAndAngleEstimator::new(&config, &angles), config)
    }

    fn spectra_with_phase(delta: f32) -> FrameSpectra {
        let mut range = Array3::zeros((2, 4, 16));
        for chirp in 0..4 {
            range[[0, chirp, 5]] = Complex32::from_polar(1.0, 0.3);
            range[[1, chirp, 5]] = Complex32::from_polar(1.0, 0.3 + delta);
        }
        FrameSpectra {
            range,
            range_doppler: Array3::zeros((16, 8, 2)),
            profile: vec![0.0; 16],
        }
    }

    #[test]
    fn phase_difference_recovers_arrival_angle() {
        let (estimator, config) = estimator(AngleMethod::PhaseDifference);
        let theta = 20f32.to_radians();
        let spacing = config.antenna_spacing_m() as f32;
        let wavelength = config.radar.wavelength_m() as f32;
        let delta = 2.0 * std::f32::consts::PI * spacing * theta.sin() / wavelength;
        let angle = estimator
            .phase_difference_angle(&spectra_with_phase(delta), 5)
            .unwrap();
        assert!((angle - theta).abs() < 1e-3);
    }

    #[test]
    fn phase_difference_clips_impossible_arrivals() {
        let (estimator, _) = estimator(AngleMethod::PhaseDifference);
        // a phase step of 3 rad at an eighth-wavelength spacing puts |sin| past one
        let wide = PeakAndAngleEstimator {
            antenna_spacing_m: estimator.wavelength_m / 8.0,
            ..estimator
        };
        let angle = wide
            .phase_difference_angle(&spectra_with_phase(3.0), 5)
            .unwrap();
        assert!((angle - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
    }

    #[test]
    fn single_antenna_has_no_phase_estimate() {
        let (estimator, _) = estimator(AngleMethod::PhaseDifference);
        let spectra = FrameSpectra {
            range: Array3::zeros((1, 4, 16)),
            range_doppler: Array3::zeros((16, 8, 1)),
            profile: vec![0.0; 16],
        };
        assert!(estimator.phase_difference_angle(&spectra, 5).is_none());
    }

    #[test]
    fn estimate_uses_beam_argmax_and_strongest_doppler() {
        let (estimator, config) = estimator(AngleMethod::BeamArgmax);
        let mut cube = BeamCube::zeros((16, 8, 27));
        cube[[5, 6, 20]] = Complex32::new(2.0, 0.0);
        let mut energy = Array2::zeros((16, 27));
        energy[[5, 20]] = 2.0;
        energy[[5, 19]] = 1.0;
        let targets = estimator.estimate(&[5], &spectra_with_phase(0.0), &cube, &energy);
        assert_eq!(targets.len(), 1);
        let target = targets[0];
        assert_eq!(target.range_bin, 5);
        assert!((target.range_m - 5.0 * config.radar.range_bin_length_m() as f32).abs() < 1e-6);
        assert!((target.angle_rad - MatrixHelper::linspace(-45.0, 45.0, 27)[20].to_radians()).abs() < 1e-6);
        assert_eq!(target.doppler_bin, 6);
        assert!(target.velocity_mps > 0.0);
    }

    #[test]
    fn statistical_targets_skip_empty_cubes() {
        let (estimator, _) = estimator(AngleMethod::BeamArgmax);
        assert!(estimator
            .statistical_targets(&BeamCube::zeros((16, 8, 27)), 3.0)
            .is_empty());

        let mut cube = BeamCube::zeros((16, 8, 27));
        cube[[3, 4, 13]] = Complex32::new(10.0, 0.0);
        let targets = estimator.statistical_targets(&cube, 3.0);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].range_bin, 3);
        assert!(targets[0].angle_rad.abs() < 1e-6);
        assert_eq!(targets[0].velocity_mps, 0.0);
    }
}
