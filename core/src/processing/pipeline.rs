use crate::acquisition::{AcquisitionError, FrameProducer, LatestFrame};
use crate::config::{DetectionMode, PipelineConfig};
use crate::interface::{DetectionReport, PostureLabel, RawFrame, ReportTarget};
use crate::prelude::{ProcessingStage, StageError};
use crate::processing::beamforming::{BeamformingStage, EnergyTracker};
use crate::processing::cluster::{cartesian, ClusterTracker, TrackedTarget};
use crate::processing::detector::AdaptiveDetector;
use crate::processing::history::SegmentSmoother;
use crate::processing::motion::FallDetector;
use crate::processing::peaks::{extract_peaks, PeakAndAngleEstimator, Target};
use crate::processing::posture::PostureClassifier;
use crate::processing::range_doppler::RangeDopplerTransform;
use crate::telemetry::{LogManager, MetricsRecorder};
use std::sync::Arc;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PipelineError {
    #[error(transparent)]
    Stage(#[from] StageError),
    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),
}

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Frame-to-report processing chain.
///
/// Each frame runs through the range-Doppler transform, the beamformer and
/// the presence detector; targets come either from peaks of the detector
/// difference or from the statistical cube threshold, and are clustered
/// before the optional posture and fall stages see them.
pub struct Pipeline {
    mode: DetectionMode,
    min_peak_height: f32,
    statistical_sigma: f32,
    transform: RangeDopplerTransform,
    beamformer: BeamformingStage,
    detector: AdaptiveDetector,
    estimator: PeakAndAngleEstimator,
    tracker: ClusterTracker,
    energy: EnergyTracker,
    segments: SegmentSmoother,
    posture: Option<PostureClassifier>,
    fall: Option<FallDetector>,
    last_sequence: Option<u64>,
    last_presence: bool,
    metrics: Arc<MetricsRecorder>,
    logger: LogManager,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, metrics: Arc<MetricsRecorder>) -> PipelineResult<Self> {
        config.validate()?;
        let transform = RangeDopplerTransform::new(&config.radar)?;
        let beamformer =
            BeamformingStage::new(&config.beamforming, config.radar.num_rx_antennas())?;
        let detector = AdaptiveDetector::new(&config.detector, config.radar.num_samples)?;
        let estimator = PeakAndAngleEstimator::new(&config, beamformer.angles_deg());
        let tracker = ClusterTracker::new(&config.cluster)?;
        let posture = config
            .posture
            .as_ref()
            .map(PostureClassifier::new)
            .transpose()?;
        let fall = config
            .fall
            .as_ref()
            .map(|fall| FallDetector::new(fall, &config.radar));

        let logger = LogManager::new("pipeline");
        logger.record(&format!(
            "configured {} antennas, {} beams, {:?} detection, max range {:.2} m",
            config.radar.num_rx_antennas(),
            beamformer.num_beams(),
            config.estimator.mode,
            config.radar.max_range_m()
        ));

        Ok(Self {
            mode: config.estimator.mode,
            min_peak_height: config
                .estimator
                .min_peak_height
                .unwrap_or(config.detector.presence_threshold),
            statistical_sigma: config.estimator.statistical_sigma,
            transform,
            beamformer,
            detector,
            estimator,
            tracker,
            energy: EnergyTracker::new(config.cluster.smoothing_len),
            segments: SegmentSmoother::new(
                config.beamforming.max_angle_deg,
                config.cluster.num_segments,
                config.cluster.smoothing_len,
            ),
            posture,
            fall,
            last_sequence: None,
            last_presence: false,
            metrics,
            logger,
        })
    }

    /// Runs every stage over `frame` and builds its report.
    pub fn process_frame(&mut self, frame: &RawFrame) -> PipelineResult<DetectionReport> {
        match self.run(frame) {
            Ok(report) => {
                self.metrics.record_processed();
                Ok(report)
            }
            Err(err) => {
                self.metrics.record_error();
                self.logger
                    .error(&format!("frame {} rejected: {}", frame.sequence, err));
                Err(err)
            }
        }
    }

    /// Processes the frame in `frames` if it is newer than the last one seen.
    pub fn poll(&mut self, frames: &LatestFrame) -> PipelineResult<Option<DetectionReport>> {
        let Some(frame) = frames.latest() else {
            return Ok(None);
        };
        if self.last_sequence == Some(frame.sequence) {
            return Ok(None);
        }
        self.last_sequence = Some(frame.sequence);
        self.process_frame(&frame).map(Some)
    }

    /// Polls the producer's frame slot. Once the acquisition loop has ended
    /// and its last frame was processed, the error that ended it comes back as
    /// [`PipelineError::Acquisition`].
    pub fn poll_producer(
        &mut self,
        producer: &mut FrameProducer,
    ) -> PipelineResult<Option<DetectionReport>> {
        if let Some(report) = self.poll(&producer.frames())? {
            return Ok(Some(report));
        }
        if producer.is_finished() {
            producer.stop()?;
            self.logger.warn("acquisition loop ended without a fault");
            return Err(AcquisitionError::Thread("acquisition loop ended".into()).into());
        }
        Ok(None)
    }

    /// Drops all detector, tracker and smoothing state.
    pub fn reset(&mut self) {
        self.detector.cleanup();
        self.tracker.cleanup();
        self.energy.clear();
        self.segments.clear();
        if let Some(posture) = self.posture.as_mut() {
            posture.reset();
        }
        self.last_sequence = None;
        self.last_presence = false;
        self.logger.record("state reset");
    }

    fn run(&mut self, frame: &RawFrame) -> PipelineResult<DetectionReport> {
        let spectra = self.transform.execute(frame)?;
        let cube = self.beamformer.run(&spectra.range_doppler)?;
        let energy = self.beamformer.beam_range_energy(&cube);
        let detection = self.detector.update(&spectra.profile)?;

        let targets: Vec<Target> = match self.mode {
            DetectionMode::Adaptive if detection.presence => {
                let peaks = extract_peaks(
                    &detection.difference,
                    self.detector.detection_bins(),
                    self.min_peak_height,
                );
                self.estimator.estimate(&peaks, &spectra, &cube, &energy)
            }
            DetectionMode::Adaptive => Vec::new(),
            DetectionMode::Statistical => {
                self.estimator.statistical_targets(&cube, self.statistical_sigma)
            }
        };
        let clusters = self.tracker.update(&targets);
        let presence = match self.mode {
            DetectionMode::Adaptive => detection.presence,
            DetectionMode::Statistical => !clusters.is_empty(),
        };

        let strongest_cell = self.energy.push(energy);
        let strongest = if presence {
            strongest_cell
                .and_then(|(range_bin, beam)| self.estimator.target_at(&cube, range_bin, beam))
                .map(|target| report_from_target(&target))
        } else {
            None
        };

        let dominant = clusters
            .iter()
            .max_by(|a, b| a.magnitude.total_cmp(&b.magnitude));
        let segment = dominant.map(|target| self.segments.push_angle(target.angle_deg()));
        let posture = self.posture.as_mut().map(|classifier| match dominant {
            Some(target) if presence => {
                classifier
                    .update(target.range_m, target.angle_deg())
                    .label
            }
            _ => PostureLabel::NoPresence,
        });

        let motion = match &self.fall {
            Some(fall) => Some(fall.evaluate(&spectra.range_doppler)?),
            None => None,
        };

        if presence != self.last_presence {
            self.logger.record(&format!(
                "frame {}: presence {}",
                frame.sequence,
                if presence { "detected" } else { "cleared" }
            ));
            self.last_presence = presence;
        }
        if let Some(motion) = motion.filter(|m| m.fall_detected) {
            self.logger.warn(&format!(
                "frame {}: fall detected at {:.2} m/s",
                frame.sequence, motion.radial_velocity_mps
            ));
        }
        self.logger.detail(&format!(
            "frame {}: {} targets, {} clusters, peeking {}",
            frame.sequence,
            targets.len(),
            clusters.len(),
            detection.peeking
        ));

        let targets: Vec<ReportTarget> = clusters.iter().map(ReportTarget::from).collect();
        Ok(DetectionReport {
            sequence: frame.sequence,
            timestamp_s: frame.timestamp_s,
            presence,
            peeking: detection.peeking,
            target_count: targets.len(),
            targets,
            strongest,
            segment,
            posture,
            radial_velocity_mps: motion.map(|m| m.radial_velocity_mps),
            fall_detected: motion.map(|m| m.fall_detected),
        })
    }
}

impl From<&TrackedTarget> for ReportTarget {
    fn from(target: &TrackedTarget) -> Self {
        Self {
            range_m: target.range_m,
            angle_deg: target.angle_deg(),
            velocity_mps: target.velocity_mps,
            x_m: target.x_m,
            y_m: target.y_m,
            members: target.members,
        }
    }
}

fn report_from_target(target: &Target) -> ReportTarget {
    let (x_m, y_m) = cartesian(target.range_m, target.angle_rad);
    ReportTarget {
        range_m: target.range_m,
        angle_deg: target.angle_rad.to_degrees(),
        velocity_mps: target.velocity_mps,
        x_m,
        y_m,
        members: 1,
    }
}
