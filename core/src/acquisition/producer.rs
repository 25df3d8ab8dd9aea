use crate::acquisition::frame_source::{Clock, FrameOutcome, FrameSource};
use crate::acquisition::latest::LatestFrame;
use crate::acquisition::{AcquisitionError, AcquisitionResult};
use crate::interface::Sensor;
use crate::telemetry::LogManager;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Background acquisition thread feeding a [`LatestFrame`] slot.
///
/// The thread runs until [`FrameProducer::stop`] is called or the source
/// reports a fatal error. The sensor is closed when the loop ends.
pub struct FrameProducer {
    frames: Arc<LatestFrame>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<AcquisitionResult<()>>>,
    logger: LogManager,
}

impl FrameProducer {
    pub fn spawn<S, C>(source: FrameSource<S, C>) -> AcquisitionResult<Self>
    where
        S: Sensor + 'static,
        C: Clock + 'static,
    {
        let frames = Arc::new(LatestFrame::new());
        let stop = Arc::new(AtomicBool::new(false));
        let logger = LogManager::new("frame-producer");

        let thread_frames = frames.clone();
        let thread_stop = stop.clone();
        let handle = thread::Builder::new()
            .name("frame-acquisition".into())
            .spawn(move || acquisition_loop(source, &thread_frames, &thread_stop))
            .map_err(|err| AcquisitionError::Thread(err.to_string()))?;

        logger.record("acquisition thread started");
        Ok(Self {
            frames,
            stop,
            handle: Some(handle),
            logger,
        })
    }

    /// Shared handle to the latest-frame slot.
    pub fn frames(&self) -> Arc<LatestFrame> {
        self.frames.clone()
    }

    /// True once the acquisition loop has exited, normally or on a fatal error.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Signals the loop to stop, joins it and returns the error that ended it, if any.
    pub fn stop(&mut self) -> AcquisitionResult<()> {
        self.stop.store(true, Ordering::SeqCst);
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        let result = handle
            .join()
            .map_err(|_| AcquisitionError::Thread("acquisition thread panicked".into()))?;
        self.logger.record("acquisition thread stopped");
        result
    }
}

impl Drop for FrameProducer {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            self.logger.error(&format!("acquisition ended with error: {}", err));
        }
    }
}

fn acquisition_loop<S: Sensor, C: Clock>(
    mut source: FrameSource<S, C>,
    frames: &LatestFrame,
    stop: &AtomicBool,
) -> AcquisitionResult<()> {
    let idle = Duration::from_millis(source.policy().retry_backoff_ms.max(1));
    let result = loop {
        if stop.load(Ordering::SeqCst) {
            break Ok(());
        }
        match source.next_frame() {
            Ok(FrameOutcome::Frame(frame)) => {
                frames.publish(frame);
            }
            Ok(FrameOutcome::Unavailable) => thread::sleep(idle),
            Err(err) => break Err(err),
        }
    };
    source.close();
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RadarConfig, ResilienceConfig};
    use crate::interface::{RawFrame, SensorError};
    use crate::telemetry::MetricsRecorder;
    use ndarray::Array3;
    use std::time::Instant;

    struct CountingSensor {
        sequence: u64,
        fault_at: Option<u64>,
    }

    impl Sensor for CountingSensor {
        fn configure_acquisition(&mut self, _config: &RadarConfig) -> Result<(), SensorError> {
            Ok(())
        }

        fn next_raw_frame(&mut self) -> Result<RawFrame, SensorError> {
            thread::sleep(Duration::from_millis(1));
            self.sequence += 1;
            if Some(self.sequence) == self.fault_at {
                return Err(SensorError::Fault("sensor unplugged".into()));
            }
            Ok(RawFrame::new(self.sequence, 0.0, Array3::zeros((1, 2, 4))))
        }
    }

    fn spawn(fault_at: Option<u64>) -> FrameProducer {
        let source = FrameSource::new(
            CountingSensor {
                sequence: 0,
                fault_at,
            },
            &RadarConfig::default(),
            ResilienceConfig::default(),
            Arc::new(MetricsRecorder::new()),
        )
        .unwrap();
        FrameProducer::spawn(source).unwrap()
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn producer_keeps_only_the_latest_frame() {
        let mut producer = spawn(None);
        let frames = producer.frames();
        assert!(wait_until(|| frames
            .latest()
            .map_or(false, |frame| frame.sequence >= 5)));
        let first = frames.latest().unwrap().sequence;
        assert!(wait_until(|| frames.latest().unwrap().sequence > first));
        producer.stop().unwrap();
        assert!(producer.is_finished());
    }

    #[test]
    fn fatal_fault_ends_the_loop_and_is_surfaced() {
        let mut producer = spawn(Some(3));
        assert!(wait_until(|| producer.is_finished()));
        let err = producer.stop().unwrap_err();
        assert_eq!(err, AcquisitionError::Fatal("sensor unplugged".into()));
        assert_eq!(producer.frames().latest().unwrap().sequence, 2);
    }
}
