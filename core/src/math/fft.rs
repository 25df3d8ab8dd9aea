use num_complex::Complex32;
use rustfft::{num_traits::Zero, Fft, FftPlanner};
use std::sync::Arc;

/// Helper that wraps a planned forward FFT and its scratch buffer for reuse.
pub struct FftHelper {
    fft: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex32>,
}

impl FftHelper {
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);
        let scratch = vec![Complex32::zero(); fft.get_inplace_scratch_len()];
        Self { fft, scratch }
    }

    pub fn len(&self) -> usize {
        self.fft.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fft.len() == 0
    }

    /// Transforms `buffer` in place. The buffer length must equal [`Self::len`].
    pub fn process(&mut self, buffer: &mut [Complex32]) {
        debug_assert_eq!(buffer.len(), self.len());
        self.fft.process_with_scratch(buffer, &mut self.scratch);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planned_length_is_reported() {
        let helper = FftHelper::new(16);
        assert_eq!(helper.len(), 16);
        assert!(!helper.is_empty());
    }

    #[test]
    fn in_place_transform_of_an_impulse_is_flat() {
        let mut helper = FftHelper::new(8);
        let mut buffer = vec![Complex32::zero(); 8];
        buffer[0] = Complex32::new(1.0, 0.0);
        helper.process(&mut buffer);
        assert!(buffer
            .iter()
            .all(|v| (v.re - 1.0).abs() < 1e-6 && v.im.abs() < 1e-6));
    }

    #[test]
    fn tone_lands_on_its_bin() {
        let mut helper = FftHelper::new(8);
        let mut buffer: Vec<Complex32> = (0..8)
            .map(|n| Complex32::from_polar(1.0, 2.0 * std::f32::consts::PI * 3.0 * n as f32 / 8.0))
            .collect();
        helper.process(&mut buffer);
        assert!((buffer[3].norm() - 8.0).abs() < 1e-4);
        assert!(buffer[5].norm() < 1e-4);
    }
}
