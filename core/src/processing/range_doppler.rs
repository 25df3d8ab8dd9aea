use crate::config::RadarConfig;
use crate::interface::RawFrame;
use crate::math::{blackman_harris, FftHelper, MatrixHelper};
use crate::prelude::{ensure_shape, ProcessingStage, StageError, StageResult};
use ndarray::{Array2, Array3, ArrayView2, Axis};
use num_complex::Complex32;
use rustfft::num_traits::Zero;

/// Per-frame spectra shared by the downstream stages.
#[derive(Debug, Clone)]
pub struct FrameSpectra {
    /// One-sided range spectra indexed `[antenna, chirp, range-bin]`.
    pub range: Array3<Complex32>,
    /// Range-Doppler spectra indexed `[range-bin, doppler-bin, antenna]`.
    pub range_doppler: Array3<Complex32>,
    /// Chirp-averaged range magnitude, averaged over antennas.
    pub profile: Vec<f32>,
}

/// Windowed two-stage FFT from raw chirps to a range-Doppler spectrum.
///
/// Range: chirp mean removed, Blackman-Harris taper, 2x zero padding, first
/// `num_samples` bins kept and scaled by `2 / num_samples`. Doppler: taper
/// across chirps, 2x zero padding, scaled by `1 / num_chirps` and shifted so
/// zero Doppler sits at index `num_chirps`.
pub struct RangeDopplerTransform {
    num_samples: usize,
    num_chirps: usize,
    num_antennas: usize,
    range_window: Vec<f32>,
    doppler_window: Vec<f32>,
    range_fft: FftHelper,
    doppler_fft: FftHelper,
    range_buffer: Vec<Complex32>,
    doppler_buffer: Vec<Complex32>,
}

impl RangeDopplerTransform {
    pub fn new(config: &RadarConfig) -> StageResult<Self> {
        config.validate()?;
        let num_samples = config.num_samples;
        let num_chirps = config.num_chirps;
        Ok(Self {
            num_samples,
            num_chirps,
            num_antennas: config.num_rx_antennas(),
            range_window: blackman_harris(num_samples),
            doppler_window: blackman_harris(num_chirps),
            range_fft: FftHelper::new(num_samples * 2),
            doppler_fft: FftHelper::new(num_chirps * 2),
            range_buffer: vec![Complex32::zero(); num_samples * 2],
            doppler_buffer: vec![Complex32::zero(); num_chirps * 2],
        })
    }

    /// `(range bins, doppler bins)` of every per-antenna output.
    pub fn output_shape(&self) -> (usize, usize) {
        (self.num_samples, self.num_chirps * 2)
    }

    /// Range spectrum of a `num_chirps x num_samples` matrix, shape
    /// `num_chirps x num_samples`.
    pub fn range_spectrum(&mut self, chirps: ArrayView2<'_, f32>) -> StageResult<Array2<Complex32>> {
        ensure_shape(
            "chirp matrix",
            &[self.num_chirps, self.num_samples],
            chirps.shape(),
        )?;

        let scale = 2.0 / self.num_samples as f32;
        let mut spectrum = Array2::zeros((self.num_chirps, self.num_samples));
        for (chirp, mut out) in chirps.rows().into_iter().zip(spectrum.rows_mut()) {
            let mean = chirp.sum() / self.num_samples as f32;
            self.range_buffer.fill(Complex32::zero());
            for ((slot, &sample), &weight) in self
                .range_buffer
                .iter_mut()
                .zip(chirp.iter())
                .zip(&self.range_window)
            {
                *slot = Complex32::new((sample - mean) * weight, 0.0);
            }
            self.range_fft.process(&mut self.range_buffer);
            for (dst, src) in out.iter_mut().zip(&self.range_buffer[..self.num_samples]) {
                *dst = *src * scale;
            }
        }
        Ok(spectrum)
    }

    /// Mean magnitude over chirps for every range bin.
    pub fn range_profile(range: &Array2<Complex32>) -> Vec<f32> {
        let chirps = range.len_of(Axis(0)).max(1) as f32;
        range
            .columns()
            .into_iter()
            .map(|bin| bin.iter().map(|value| value.norm()).sum::<f32>() / chirps)
            .collect()
    }

    /// Range-Doppler spectrum of one antenna, shape `num_samples x 2·num_chirps`.
    pub fn compute_range_doppler(
        &mut self,
        antenna_index: usize,
        chirps: ArrayView2<'_, f32>,
    ) -> StageResult<Array2<Complex32>> {
        if antenna_index >= self.num_antennas {
            return Err(StageError::InvalidInput(format!(
                "antenna index {} outside {} configured antennas",
                antenna_index, self.num_antennas
            )));
        }
        let range = self.range_spectrum(chirps)?;
        Ok(self.doppler_from_range(&range))
    }

    fn doppler_from_range(&mut self, range: &Array2<Complex32>) -> Array2<Complex32> {
        let scale = 1.0 / self.num_chirps as f32;
        let mut spectrum = Array2::zeros((self.num_samples, self.num_chirps * 2));
        for (bin, mut out) in spectrum.rows_mut().into_iter().enumerate() {
            self.doppler_buffer.fill(Complex32::zero());
            for (chirp, slot) in self.doppler_buffer[..self.num_chirps].iter_mut().enumerate() {
                *slot = range[[chirp, bin]] * self.doppler_window[chirp];
            }
            self.doppler_fft.process(&mut self.doppler_buffer);
            MatrixHelper::fftshift(&mut self.doppler_buffer);
            for (dst, src) in out.iter_mut().zip(&self.doppler_buffer) {
                *dst = *src * scale;
            }
        }
        spectrum
    }
}

impl ProcessingStage for RangeDopplerTransform {
    type Input = RawFrame;
    type Output = FrameSpectra;

    fn execute(&mut self, frame: &RawFrame) -> StageResult<FrameSpectra> {
        ensure_shape(
            "frame",
            &[self.num_antennas, self.num_chirps, self.num_samples],
            frame.data().shape(),
        )?;

        let (range_bins, doppler_bins) = self.output_shape();
        let mut range = Array3::zeros((self.num_antennas, self.num_chirps, self.num_samples));
        let mut range_doppler = Array3::zeros((range_bins, doppler_bins, self.num_antennas));
        let mut profile = vec![0.0f32; range_bins];

        for antenna in 0..self.num_antennas {
            let chirps = frame.data().index_axis(Axis(0), antenna);
            let antenna_range = self.range_spectrum(chirps)?;
            for (acc, value) in profile.iter_mut().zip(Self::range_profile(&antenna_range)) {
                *acc += value;
            }
            let antenna_rd = self.doppler_from_range(&antenna_range);
            range_doppler
                .index_axis_mut(Axis(2), antenna)
                .assign(&antenna_rd);
            range.index_axis_mut(Axis(0), antenna).assign(&antenna_range);
        }

        let antennas = self.num_antennas as f32;
        profile.iter_mut().for_each(|value| *value /= antennas);

        Ok(FrameSpectra {
            range,
            range_doppler,
            profile,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::StatsHelper;
    use std::f32::consts::PI;

    fn config() -> RadarConfig {
        RadarConfig {
            num_samples: 64,
            num_chirps: 32,
            rx_mask: 0b1,
            ..Default::default()
        }
    }

    /// Tone landing on `range_bin` whose phase advances `doppler_bins` padded
    /// Doppler bins per chirp.
    fn tone(config: &RadarConfig, range_bin: usize, doppler_bins: isize) -> Array2<f32> {
        let n = config.num_samples;
        let per_chirp = 2.0 * PI * doppler_bins as f32 / config.doppler_bins() as f32;
        Array2::from_shape_fn((config.num_chirps, n), |(c, s)| {
            let omega = 2.0 * PI * range_bin as f32 / (2 * n) as f32;
            (omega * s as f32 + per_chirp * c as f32).cos()
        })
    }

    fn peak(spectrum: &Array2<Complex32>) -> (usize, usize) {
        let magnitudes: Vec<f32> = spectrum.iter().map(|v| v.norm()).collect();
        let idx = StatsHelper::argmax(&magnitudes).unwrap();
        (idx / spectrum.ncols(), idx % spectrum.ncols())
    }

    #[test]
    fn output_is_oversampled_along_doppler() {
        let config = config();
        let mut transform = RangeDopplerTransform::new(&config).unwrap();
        let rd = transform
            .compute_range_doppler(0, tone(&config, 10, 0).view())
            .unwrap();
        assert_eq!(rd.dim(), (64, 64));
        assert_eq!(transform.output_shape(), (64, 64));
    }

    #[test]
    fn static_tone_lands_on_its_range_bin_at_zero_doppler() {
        let config = config();
        let mut transform = RangeDopplerTransform::new(&config).unwrap();
        let rd = transform
            .compute_range_doppler(0, tone(&config, 20, 0).view())
            .unwrap();
        assert_eq!(peak(&rd), (20, config.zero_doppler_bin()));
    }

    #[test]
    fn moving_tone_is_offset_from_zero_doppler() {
        let config = config();
        let mut transform = RangeDopplerTransform::new(&config).unwrap();
        let rd = transform
            .compute_range_doppler(0, tone(&config, 20, 8).view())
            .unwrap();
        assert_eq!(peak(&rd), (20, config.zero_doppler_bin() + 8));
    }

    #[test]
    fn transform_is_deterministic() {
        let config = config();
        let mut transform = RangeDopplerTransform::new(&config).unwrap();
        let input = tone(&config, 12, 3);
        let first = transform.compute_range_doppler(0, input.view()).unwrap();
        let second = transform.compute_range_doppler(0, input.view()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn constant_input_yields_flat_zero_profile() {
        let config = config();
        let mut transform = RangeDopplerTransform::new(&config).unwrap();
        let flat = Array2::from_elem((config.num_chirps, config.num_samples), 0.25f32);
        let range = transform.range_spectrum(flat.view()).unwrap();
        let profile = RangeDopplerTransform::range_profile(&range);
        assert_eq!(profile.len(), config.num_samples);
        assert!(profile.iter().all(|v| v.abs() < 1e-6));
    }

    #[test]
    fn malformed_input_fails_fast() {
        let config = config();
        let mut transform = RangeDopplerTransform::new(&config).unwrap();
        let wrong = Array2::<f32>::zeros((config.num_chirps, config.num_samples + 1));
        assert!(matches!(
            transform.compute_range_doppler(0, wrong.view()),
            Err(StageError::InvalidInput(_))
        ));
        let fine = tone(&config, 4, 0);
        assert!(transform.compute_range_doppler(1, fine.view()).is_err());
    }

    #[test]
    fn stage_averages_profile_over_antennas() {
        let config = RadarConfig {
            rx_mask: 0b11,
            ..config()
        };
        let mut transform = RangeDopplerTransform::new(&config).unwrap();
        let single = tone(&config, 16, 0);
        let data = Array3::from_shape_fn((2, config.num_chirps, config.num_samples), |(a, c, s)| {
            single[[c, s]] * (a + 1) as f32
        });
        let spectra = transform.execute(&RawFrame::new(0, 0.0, data)).unwrap();
        assert_eq!(spectra.range.dim(), (2, 32, 64));
        assert_eq!(spectra.range_doppler.dim(), (64, 64, 2));
        let reference = RangeDopplerTransform::range_profile(
            &transform.range_spectrum(single.view()).unwrap(),
        );
        assert!((spectra.profile[16] - 1.5 * reference[16]).abs() < 1e-4);
    }
}
