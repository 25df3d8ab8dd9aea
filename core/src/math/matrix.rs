use std::f32::consts::PI;

pub struct MatrixHelper;

impl MatrixHelper {
    /// Moves the zero-frequency element to the centre of `values` (numpy `fftshift`).
    pub fn fftshift<T>(values: &mut [T]) {
        let mid = values.len() / 2;
        values.rotate_right(mid);
    }

    /// `count` evenly spaced values over `[start, end]`, both ends included.
    pub fn linspace(start: f32, end: f32, count: usize) -> Vec<f32> {
        match count {
            0 => Vec::new(),
            1 => vec![start],
            _ => {
                let step = (end - start) / (count - 1) as f32;
                (0..count).map(|i| start + step * i as f32).collect()
            }
        }
    }

    /// Wraps a phase into `(-PI, PI]`.
    pub fn wrap_phase(phase: f32) -> f32 {
        let wrapped = (phase + PI).rem_euclid(2.0 * PI) - PI;
        if wrapped <= -PI {
            wrapped + 2.0 * PI
        } else {
            wrapped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fftshift_matches_numpy_for_even_and_odd_lengths() {
        let mut even = [0, 1, 2, 3, 4, 5];
        MatrixHelper::fftshift(&mut even);
        assert_eq!(even, [3, 4, 5, 0, 1, 2]);

        let mut odd = [0, 1, 2, 3, 4];
        MatrixHelper::fftshift(&mut odd);
        assert_eq!(odd, [3, 4, 0, 1, 2]);
    }

    #[test]
    fn linspace_includes_endpoints() {
        let grid = MatrixHelper::linspace(-45.0, 45.0, 27);
        assert_eq!(grid.len(), 27);
        assert_eq!(grid[0], -45.0);
        assert!((grid[26] - 45.0).abs() < 1e-4);
        assert!((grid[13]).abs() < 1e-4);
    }

    #[test]
    fn wrap_phase_stays_in_half_open_interval() {
        assert!((MatrixHelper::wrap_phase(3.0 * PI) - PI).abs() < 1e-5);
        assert!((MatrixHelper::wrap_phase(-PI / 2.0) + PI / 2.0).abs() < 1e-6);
        assert!((MatrixHelper::wrap_phase(2.0 * PI + 0.25) - 0.25).abs() < 1e-5);
    }
}
