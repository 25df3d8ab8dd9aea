use crate::generator::profile::FrameSynthesizer;
use crate::generator::sensor::SimulatedSensor;
use crate::workflow::config::WorkflowConfig;
use anyhow::Context;
use fmcwcore::acquisition::{FrameProducer, FrameSource};
use fmcwcore::interface::{DetectionReport, RawFrame};
use fmcwcore::processing::{Pipeline, ReportPublisher};
use fmcwcore::telemetry::{MetricsRecorder, MetricsSnapshot};
use log::{debug, info};
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct WorkflowResult {
    pub reports: Vec<DetectionReport>,
    pub metrics: MetricsSnapshot,
}

impl WorkflowResult {
    pub fn presence_frames(&self) -> usize {
        self.reports.iter().filter(|report| report.presence).count()
    }

    pub fn max_targets(&self) -> usize {
        self.reports
            .iter()
            .map(|report| report.target_count)
            .max()
            .unwrap_or(0)
    }
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
    publisher: ReportPublisher,
}

impl Runner {
    pub fn new(config: WorkflowConfig, publisher: ReportPublisher) -> Self {
        Self { config, publisher }
    }

    /// Processes synthesized frames directly on the calling thread. Every
    /// frame is processed exactly once and nothing sleeps.
    pub fn execute_offline(&self) -> anyhow::Result<WorkflowResult> {
        let metrics = Arc::new(MetricsRecorder::new());
        let mut pipeline = self.pipeline(&metrics)?;
        let mut synthesizer = self.synthesizer()?;
        let mut dump = self.open_dump()?;

        let mut reports = Vec::new();
        for _ in 0..self.config.frames {
            let frame = synthesizer.next_frame();
            metrics.record_acquired();
            let report = pipeline
                .process_frame(&frame)
                .with_context(|| format!("processing frame {}", frame.sequence))?;
            self.finish_frame(&frame, &report, dump.as_mut())?;
            reports.push(report);
        }

        Ok(WorkflowResult {
            reports,
            metrics: metrics.snapshot(),
        })
    }

    /// Runs acquisition on its own thread and processes the latest frame at
    /// the processing cadence until `frames` reports were produced. A fatal
    /// sensor fault ends the run with an error.
    pub fn execute(&self) -> anyhow::Result<WorkflowResult> {
        let metrics = Arc::new(MetricsRecorder::new());
        let radar = &self.config.pipeline.radar;
        let mut pipeline = self.pipeline(&metrics)?;
        let mut dump = self.open_dump()?;

        let mut sensor =
            SimulatedSensor::new(self.synthesizer()?, self.config.failure_rate, self.config.scene.seed);
        if let Some(frames) = self.config.fault_after {
            sensor = sensor.with_fault_after(frames);
        }
        let frame_time = Duration::from_secs_f64(radar.frame_repetition_time_s);
        if self.config.pacing {
            sensor = sensor.with_frame_interval(frame_time);
        }

        let source = FrameSource::new(
            sensor,
            radar,
            self.config.pipeline.resilience.clone(),
            metrics.clone(),
        )
        .context("opening simulated sensor")?;
        let mut producer = FrameProducer::spawn(source).context("starting acquisition")?;
        let frames = producer.frames();

        let mut reports = Vec::new();
        while (reports.len() as u64) < self.config.frames {
            let started = Instant::now();
            let polled = pipeline
                .poll_producer(&mut producer)
                .with_context(|| format!("polling frames after {} reports", reports.len()))?;
            match polled {
                Some(report) => {
                    let frame = frames
                        .latest()
                        .filter(|frame| frame.sequence == report.sequence);
                    if let Some(frame) = frame {
                        self.finish_frame(&frame, &report, dump.as_mut())?;
                    } else {
                        self.publisher.publish(report.clone());
                    }
                    reports.push(report);
                    if self.config.pacing {
                        if let Some(rest) = frame_time.checked_sub(started.elapsed()) {
                            thread::sleep(rest);
                        }
                    }
                }
                None => thread::sleep(Duration::from_millis(1)),
            }
        }

        producer.stop().context("stopping acquisition")?;
        Ok(WorkflowResult {
            reports,
            metrics: metrics.snapshot(),
        })
    }

    fn pipeline(&self, metrics: &Arc<MetricsRecorder>) -> anyhow::Result<Pipeline> {
        Pipeline::new(self.config.pipeline.clone(), metrics.clone())
            .context("building processing pipeline")
    }

    fn synthesizer(&self) -> anyhow::Result<FrameSynthesizer> {
        FrameSynthesizer::new(
            &self.config.pipeline.radar,
            &self.config.pipeline.beamforming,
            self.config.scene.clone(),
        )
        .context("building scene synthesizer")
    }

    fn open_dump(&self) -> anyhow::Result<Option<File>> {
        self.config
            .dump
            .as_deref()
            .map(|path: &Path| {
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("opening matrix dump {}", path.display()))
            })
            .transpose()
    }

    fn finish_frame(
        &self,
        frame: &RawFrame,
        report: &DetectionReport,
        dump: Option<&mut File>,
    ) -> anyhow::Result<()> {
        if let Some(file) = dump {
            frame
                .dump_matrix(0, file)
                .with_context(|| format!("dumping frame {}", frame.sequence))?;
        }
        debug!(
            "frame {} presence {} targets {}",
            report.sequence, report.presence, report.target_count
        );
        if report.fall_detected == Some(true) {
            info!("frame {}: fall detected", report.sequence);
        }
        self.publisher.publish(report.clone());
        Ok(())
    }
}
