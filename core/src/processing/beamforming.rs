use crate::config::BeamformingConfig;
use crate::math::MatrixHelper;
use crate::prelude::{ProcessingStage, StageError, StageResult};
use crate::processing::history::TrackHistory;
use ndarray::{Array2, Array3, Axis, Zip};
use num_complex::Complex32;
use std::f32::consts::PI;

/// Range-Doppler-beam cube indexed `[range-bin, doppler-bin, beam]`.
pub type BeamCube = Array3<Complex32>;

/// Delay-and-sum digital beamformer over a uniform linear array.
///
/// Beam `b` points at `linspace(-max_angle, max_angle, num_beams)[b]`.
#[derive(Debug, Clone)]
pub struct BeamformingStage {
    num_antennas: usize,
    angles_deg: Vec<f32>,
    /// Steering weights indexed `[antenna, beam]`.
    weights: Array2<Complex32>,
    energy_doppler_half_width: Option<usize>,
}

impl BeamformingStage {
    pub fn new(config: &BeamformingConfig, num_antennas: usize) -> StageResult<Self> {
        config.validate()?;
        if num_antennas == 0 {
            return Err(StageError::InvalidConfig(
                "beamforming needs at least one antenna".into(),
            ));
        }

        let angles_deg =
            MatrixHelper::linspace(-config.max_angle_deg, config.max_angle_deg, config.num_beams);
        let spacing = config.spacing_wavelengths;
        let weights = Array2::from_shape_fn((num_antennas, config.num_beams), |(antenna, beam)| {
            let phase = 2.0 * PI * antenna as f32 * spacing * angles_deg[beam].to_radians().sin();
            Complex32::from_polar(1.0, phase)
        });

        Ok(Self {
            num_antennas,
            angles_deg,
            weights,
            energy_doppler_half_width: config.energy_doppler_half_width,
        })
    }

    pub fn num_beams(&self) -> usize {
        self.angles_deg.len()
    }

    pub fn num_antennas(&self) -> usize {
        self.num_antennas
    }

    pub fn angles_deg(&self) -> &[f32] {
        &self.angles_deg
    }

    pub fn beam_angle_deg(&self, beam: usize) -> Option<f32> {
        self.angles_deg.get(beam).copied()
    }

    /// Steers every beam over a `[range, doppler, antenna]` spectrum.
    pub fn run(&self, spectrum: &Array3<Complex32>) -> StageResult<BeamCube> {
        let (range_bins, doppler_bins, antennas) = spectrum.dim();
        if antennas != self.num_antennas {
            return Err(StageError::InvalidInput(format!(
                "spectrum carries {} antennas, beamformer configured for {}",
                antennas, self.num_antennas
            )));
        }

        let mut cube = BeamCube::zeros((range_bins, doppler_bins, self.num_beams()));
        if self.num_antennas == 1 {
            let single = spectrum.index_axis(Axis(2), 0);
            for mut beam in cube.axis_iter_mut(Axis(2)) {
                beam.assign(&single);
            }
            return Ok(cube);
        }

        for (beam_index, mut beam) in cube.axis_iter_mut(Axis(2)).enumerate() {
            for antenna in 0..self.num_antennas {
                let weight = self.weights[[antenna, beam_index]];
                let channel = spectrum.index_axis(Axis(2), self.num_antennas - antenna - 1);
                Zip::from(&mut beam)
                    .and(&channel)
                    .for_each(|out, &value| *out += value * weight);
            }
        }
        Ok(cube)
    }

    /// Per `(range, beam)` energy: Euclidean norm over the Doppler window,
    /// divided by `sqrt(num_beams)`.
    pub fn beam_range_energy(&self, cube: &BeamCube) -> Array2<f32> {
        let (range_bins, doppler_bins, beams) = cube.dim();
        let doppler = match self.energy_doppler_half_width {
            Some(half_width) => {
                let centre = doppler_bins / 2;
                centre.saturating_sub(half_width)..(centre + half_width + 1).min(doppler_bins)
            }
            None => 0..doppler_bins,
        };
        let norm = (beams as f32).sqrt();
        Array2::from_shape_fn((range_bins, beams), |(range, beam)| {
            let energy: f32 = doppler
                .clone()
                .map(|bin| cube[[range, bin, beam]].norm_sqr())
                .sum();
            energy.sqrt() / norm
        })
    }
}

/// Averages the last `len` beam-range energy maps and reports the strongest
/// cell as a single `(range bin, beam)` estimate.
#[derive(Debug, Clone)]
pub struct EnergyTracker {
    history: TrackHistory<Array2<f32>>,
}

impl EnergyTracker {
    pub fn new(len: usize) -> Self {
        Self {
            history: TrackHistory::with_capacity(len),
        }
    }

    /// Records `energy` and returns the strongest cell of the averaged map,
    /// or `None` when the averaged map carries no energy. A map whose shape
    /// differs from the recorded ones restarts the history.
    pub fn push(&mut self, energy: Array2<f32>) -> Option<(usize, usize)> {
        if self
            .history
            .latest()
            .map_or(false, |previous| previous.dim() != energy.dim())
        {
            self.history.clear();
        }
        self.history.push(energy);

        let mut average = Array2::<f32>::zeros(self.history.latest()?.dim());
        for map in self.history.iter() {
            average += map;
        }
        average /= self.history.len() as f32;

        let (index, &peak) = average
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))?;
        if peak <= 0.0 {
            return None;
        }
        let beams = average.ncols();
        Some((index / beams, index % beams))
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}

impl ProcessingStage for BeamformingStage {
    type Input = Array3<Complex32>;
    type Output = BeamCube;

    fn execute(&mut self, spectrum: &Array3<Complex32>) -> StageResult<BeamCube> {
        self.run(spectrum)
    }
}
