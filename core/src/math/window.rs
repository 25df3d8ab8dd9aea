use std::f32::consts::PI;

/// Symmetric four-term Blackman-Harris taper.
pub fn blackman_harris(length: usize) -> Vec<f32> {
    if length == 0 {
        return Vec::new();
    }
    if length == 1 {
        return vec![1.0];
    }

    const A0: f32 = 0.35875;
    const A1: f32 = 0.48829;
    const A2: f32 = 0.14128;
    const A3: f32 = 0.01168;

    let n_minus_1 = (length - 1) as f32;
    (0..length)
        .map(|n| {
            let x = 2.0 * PI * n as f32 / n_minus_1;
            A0 - A1 * x.cos() + A2 * (2.0 * x).cos() - A3 * (3.0 * x).cos()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blackman_harris_is_symmetric_and_peaks_at_centre() {
        let window = blackman_harris(65);
        assert_eq!(window.len(), 65);
        for (left, right) in window.iter().zip(window.iter().rev()) {
            assert!((left - right).abs() < 1e-6);
        }
        assert!((window[32] - 1.0).abs() < 1e-5);
        assert!(window[0] < 1e-4);
    }

    #[test]
    fn degenerate_lengths() {
        assert!(blackman_harris(0).is_empty());
        assert_eq!(blackman_harris(1), vec![1.0]);
    }
}
