use anyhow::{ensure, Context};
use fmcwcore::config::{BeamformingConfig, RadarConfig};
use fmcwcore::interface::RawFrame;
use ndarray::Array3;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// A point reflector in the synthetic scene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reflector {
    pub range_m: f32,
    pub angle_deg: f32,
    #[serde(default)]
    pub velocity_mps: f32,
    #[serde(default = "default_amplitude")]
    pub amplitude: f32,
}

fn default_amplitude() -> f32 {
    1.0
}

impl Reflector {
    pub fn new(range_m: f32, angle_deg: f32, velocity_mps: f32) -> Self {
        Self {
            range_m,
            angle_deg,
            velocity_mps,
            amplitude: default_amplitude(),
        }
    }

    /// Parses `range_m,angle_deg[,velocity_mps]`.
    pub fn parse(spec: &str) -> anyhow::Result<Self> {
        let fields: Vec<&str> = spec.split(',').map(str::trim).collect();
        ensure!(
            (2..=3).contains(&fields.len()),
            "reflector '{}' must be range_m,angle_deg[,velocity_mps]",
            spec
        );
        let value = |index: usize, name: &str| -> anyhow::Result<f32> {
            fields[index]
                .parse::<f32>()
                .with_context(|| format!("parsing {} of reflector '{}'", name, spec))
        };
        let velocity_mps = if fields.len() == 3 {
            value(2, "velocity")?
        } else {
            0.0
        };
        Ok(Self::new(value(0, "range")?, value(1, "angle")?, velocity_mps))
    }
}

/// Configuration of the synthetic scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub reflectors: Vec<Reflector>,
    /// Half-width of the uniform noise added to every sample.
    pub noise: f32,
    pub seed: u64,
    /// Frames before the reflectors appear; lets the detector settle on an
    /// empty room first.
    pub empty_frames: u64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            reflectors: vec![Reflector::new(1.5, 15.0, 0.0)],
            noise: 0.01,
            seed: 0,
            empty_frames: 2,
        }
    }
}

/// Renders [`SceneConfig`] into raw IF frames for a given radar layout.
///
/// Each reflector contributes a real beat tone per antenna whose frequency
/// follows its range, whose phase advances across chirps with its velocity
/// and whose inter-antenna phase follows its arrival angle.
pub struct FrameSynthesizer {
    radar: RadarConfig,
    spacing_wavelengths: f32,
    scene: SceneConfig,
    rng: StdRng,
    sequence: u64,
}

impl FrameSynthesizer {
    pub fn new(
        radar: &RadarConfig,
        beamforming: &BeamformingConfig,
        scene: SceneConfig,
    ) -> anyhow::Result<Self> {
        radar.validate().context("validating radar configuration")?;
        ensure!(scene.noise >= 0.0, "scene noise must be non-negative");
        Ok(Self {
            radar: radar.clone(),
            spacing_wavelengths: beamforming.spacing_wavelengths,
            rng: StdRng::seed_from_u64(scene.seed),
            scene,
            sequence: 0,
        })
    }

    pub fn radar(&self) -> &RadarConfig {
        &self.radar
    }

    pub fn next_frame(&mut self) -> RawFrame {
        let sequence = self.sequence;
        self.sequence += 1;
        let active = sequence >= self.scene.empty_frames;
        self.render(sequence, active)
    }

    fn render(&mut self, sequence: u64, active: bool) -> RawFrame {
        let radar = &self.radar;
        let antennas = radar.num_rx_antennas();
        let samples = radar.num_samples;
        let range_bin_length = radar.range_bin_length_m() as f32;
        let wavelength = radar.wavelength_m() as f32;
        let chirp_time = radar.chirp_repetition_time_s as f32;

        let tones: Vec<(f32, f32, Vec<f32>, f32)> = if active {
            self.scene
                .reflectors
                .iter()
                .map(|reflector| {
                    let range_bin = reflector.range_m / range_bin_length;
                    let omega = 2.0 * PI * range_bin / (2 * samples) as f32;
                    let per_chirp =
                        2.0 * PI * (2.0 * reflector.velocity_mps / wavelength) * chirp_time;
                    let sin_theta = reflector.angle_deg.to_radians().sin();
                    let phases = (0..antennas)
                        .map(|antenna| {
                            -2.0 * PI
                                * (antennas - 1 - antenna) as f32
                                * self.spacing_wavelengths
                                * sin_theta
                        })
                        .collect();
                    (omega, per_chirp, phases, reflector.amplitude)
                })
                .collect()
        } else {
            Vec::new()
        };

        let noise = self.scene.noise;
        let rng = &mut self.rng;
        let data = Array3::from_shape_fn(
            (antennas, radar.num_chirps, samples),
            |(antenna, chirp, sample)| {
                let signal: f32 = tones
                    .iter()
                    .map(|(omega, per_chirp, phases, amplitude)| {
                        amplitude
                            * (omega * sample as f32 + per_chirp * chirp as f32 + phases[antenna])
                                .cos()
                    })
                    .sum();
                let jitter = if noise > 0.0 {
                    rng.gen_range(-noise..noise)
                } else {
                    0.0
                };
                signal + jitter
            },
        );

        RawFrame::new(
            sequence,
            sequence as f64 * radar.frame_repetition_time_s,
            data,
        )
    }
}
