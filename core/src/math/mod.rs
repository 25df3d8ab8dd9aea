pub mod fft;
pub mod matrix;
pub mod stats;
pub mod window;

pub use fft::FftHelper;
pub use matrix::MatrixHelper;
pub use stats::StatsHelper;
pub use window::blackman_harris;
