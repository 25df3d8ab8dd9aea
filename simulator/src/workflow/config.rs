use crate::generator::profile::{Reflector, SceneConfig};
use anyhow::Context;
use fmcwcore::config::PipelineConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub pipeline: PipelineConfig,
    pub scene: SceneConfig,
    /// Frames to process before the run ends.
    pub frames: u64,
    /// Probability that one acquisition attempt fails transiently.
    pub failure_rate: f32,
    /// Raise a fatal sensor fault after this many delivered frames.
    pub fault_after: Option<u64>,
    /// Sleep out the rest of the frame repetition time after each frame.
    pub pacing: bool,
    /// Append the first antenna matrix of every processed frame here.
    pub dump: Option<PathBuf>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            scene: SceneConfig::default(),
            frames: 20,
            failure_rate: 0.0,
            fault_after: None,
            pacing: true,
            dump: None,
        }
    }
}

/// Command-line overrides applied on top of a default or loaded workflow.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub frames: Option<u64>,
    pub samples: Option<usize>,
    pub chirps: Option<usize>,
    pub rx_mask: Option<u32>,
    pub reflectors: Vec<Reflector>,
    pub failure_rate: Option<f32>,
    pub seed: Option<u64>,
    pub dump: Option<PathBuf>,
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        config
            .pipeline
            .validate()
            .with_context(|| format!("validating workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn apply(mut self, overrides: Overrides) -> Self {
        let radar = &mut self.pipeline.radar;
        if let Some(samples) = overrides.samples {
            radar.num_samples = samples;
        }
        if let Some(chirps) = overrides.chirps {
            radar.num_chirps = chirps;
        }
        if let Some(mask) = overrides.rx_mask {
            radar.rx_mask = mask;
        }
        if let Some(frames) = overrides.frames {
            self.frames = frames;
        }
        if !overrides.reflectors.is_empty() {
            self.scene.reflectors = overrides.reflectors;
        }
        if let Some(rate) = overrides.failure_rate {
            self.failure_rate = rate;
        }
        if let Some(seed) = overrides.seed {
            self.scene.seed = seed;
        }
        if overrides.dump.is_some() {
            self.dump = overrides.dump;
        }
        self
    }
}
