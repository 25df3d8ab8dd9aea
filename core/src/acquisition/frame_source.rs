use crate::acquisition::{AcquisitionError, AcquisitionResult};
use crate::config::{RadarConfig, ResilienceConfig};
use crate::interface::{RawFrame, Sensor, SensorError};
use crate::telemetry::{LogManager, MetricsRecorder};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Time source used for backoff sleeps and cooldown bookkeeping.
pub trait Clock: Send {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Result of a single [`FrameSource::next_frame`] call.
#[derive(Debug, Clone)]
pub enum FrameOutcome {
    Frame(Arc<RawFrame>),
    /// No frame this time: retries were exhausted or the source is cooling down.
    Unavailable,
}

impl FrameOutcome {
    pub fn into_frame(self) -> Option<Arc<RawFrame>> {
        match self {
            FrameOutcome::Frame(frame) => Some(frame),
            FrameOutcome::Unavailable => None,
        }
    }
}

/// Wraps a [`Sensor`] with bounded retries and a cooldown after repeated misses.
pub struct FrameSource<S: Sensor, C: Clock = SystemClock> {
    sensor: S,
    clock: C,
    policy: ResilienceConfig,
    consecutive_failures: u32,
    cooldown_until: Option<Instant>,
    metrics: Arc<MetricsRecorder>,
    logger: LogManager,
}

impl<S: Sensor> FrameSource<S, SystemClock> {
    pub fn new(
        sensor: S,
        config: &RadarConfig,
        policy: ResilienceConfig,
        metrics: Arc<MetricsRecorder>,
    ) -> AcquisitionResult<Self> {
        Self::with_clock(sensor, SystemClock, config, policy, metrics)
    }
}

impl<S: Sensor, C: Clock> FrameSource<S, C> {
    /// Configures the sensor's acquisition sequence and builds the source.
    pub fn with_clock(
        mut sensor: S,
        clock: C,
        config: &RadarConfig,
        policy: ResilienceConfig,
        metrics: Arc<MetricsRecorder>,
    ) -> AcquisitionResult<Self> {
        policy
            .validate()
            .map_err(|err| AcquisitionError::Fatal(format!("resilience policy: {}", err)))?;
        sensor
            .configure_acquisition(config)
            .map_err(|err| AcquisitionError::Fatal(format!("configuring acquisition: {}", err)))?;
        let logger = LogManager::new("frame-source");
        logger.record(&format!(
            "acquisition configured: {} rx antennas, {} chirps x {} samples",
            config.num_rx_antennas(),
            config.num_chirps,
            config.num_samples
        ));
        Ok(Self {
            sensor,
            clock,
            policy,
            consecutive_failures: 0,
            cooldown_until: None,
            metrics,
            logger,
        })
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn in_cooldown(&self) -> bool {
        self.cooldown_until
            .map_or(false, |until| self.clock.now() < until)
    }

    pub fn policy(&self) -> &ResilienceConfig {
        &self.policy
    }

    pub fn next_frame(&mut self) -> AcquisitionResult<FrameOutcome> {
        if let Some(until) = self.cooldown_until {
            if self.clock.now() < until {
                self.metrics.record_unavailable();
                return Ok(FrameOutcome::Unavailable);
            }
            self.cooldown_until = None;
            self.consecutive_failures = 0;
            self.logger.record("cooldown elapsed, resuming acquisition");
        }

        let backoff = Duration::from_millis(self.policy.retry_backoff_ms);
        for attempt in 1..=self.policy.max_attempts {
            match self.sensor.next_raw_frame() {
                Ok(frame) => {
                    self.consecutive_failures = 0;
                    self.metrics.record_acquired();
                    return Ok(FrameOutcome::Frame(Arc::new(frame)));
                }
                Err(SensorError::AcquisitionFailed) => {
                    self.consecutive_failures += 1;
                    self.metrics.record_transient_failure();
                    self.logger.warn(&format!(
                        "frame acquisition failed, attempt {}/{}",
                        attempt, self.policy.max_attempts
                    ));

                    if self.consecutive_failures >= self.policy.failure_threshold {
                        let cooldown = Duration::from_millis(self.policy.cooldown_ms);
                        self.cooldown_until = Some(self.clock.now() + cooldown);
                        self.metrics.record_cooldown();
                        self.metrics.record_unavailable();
                        self.logger.warn(&format!(
                            "{} consecutive failures, cooling down for {:?}",
                            self.consecutive_failures, cooldown
                        ));
                        return Ok(FrameOutcome::Unavailable);
                    }
                    if attempt < self.policy.max_attempts {
                        self.clock.sleep(backoff);
                    }
                }
                Err(SensorError::Fault(message)) => {
                    self.logger.error(&format!("sensor fault: {}", message));
                    return Err(AcquisitionError::Fatal(message));
                }
            }
        }

        self.metrics.record_unavailable();
        Ok(FrameOutcome::Unavailable)
    }

    pub fn close(&mut self) {
        self.sensor.close();
        self.logger.record("sensor closed");
    }

    pub fn sensor(&self) -> &S {
        &self.sensor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Clone)]
    struct ManualClock {
        now: Arc<Mutex<Instant>>,
    }

    impl ManualClock {
        fn new() -> Self {
            Self {
                now: Arc::new(Mutex::new(Instant::now())),
            }
        }

        fn advance(&self, duration: Duration) {
            *self.now.lock().unwrap() += duration;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.now.lock().unwrap()
        }

        fn sleep(&self, duration: Duration) {
            self.advance(duration);
        }
    }

    /// Replays scripted results, then succeeds forever.
    struct ScriptedSensor {
        script: VecDeque<Result<(), SensorError>>,
        calls: Arc<Mutex<usize>>,
        closed: bool,
    }

    impl ScriptedSensor {
        fn new(script: Vec<Result<(), SensorError>>) -> (Self, Arc<Mutex<usize>>) {
            let calls = Arc::new(Mutex::new(0));
            let sensor = Self {
                script: script.into(),
                calls: calls.clone(),
                closed: false,
            };
            (sensor, calls)
        }
    }

    impl Sensor for ScriptedSensor {
        fn configure_acquisition(&mut self, _config: &RadarConfig) -> Result<(), SensorError> {
            Ok(())
        }

        fn next_raw_frame(&mut self) -> Result<RawFrame, SensorError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            match self.script.pop_front().unwrap_or(Ok(())) {
                Ok(()) => Ok(RawFrame::new(*calls as u64, 0.0, Array3::zeros((1, 2, 4)))),
                Err(err) => Err(err),
            }
        }

        fn close(&mut self) {
            self.closed = true;
        }
    }

    fn failures(count: usize) -> Vec<Result<(), SensorError>> {
        vec![Err(SensorError::AcquisitionFailed); count]
    }

    fn source(
        script: Vec<Result<(), SensorError>>,
    ) -> (FrameSource<ScriptedSensor, ManualClock>, ManualClock, Arc<Mutex<usize>>) {
        let (sensor, calls) = ScriptedSensor::new(script);
        let clock = ManualClock::new();
        let source = FrameSource::with_clock(
            sensor,
            clock.clone(),
            &RadarConfig::default(),
            ResilienceConfig::default(),
            Arc::new(MetricsRecorder::new()),
        )
        .unwrap();
        (source, clock, calls)
    }

    #[test]
    fn retries_transient_failures_within_one_call() {
        let (mut source, _clock, calls) = source(failures(2));
        let outcome = source.next_frame().unwrap();
        assert!(matches!(outcome, FrameOutcome::Frame(_)));
        assert_eq!(*calls.lock().unwrap(), 3);
        assert_eq!(source.consecutive_failures(), 0);
    }

    #[test]
    fn exhausted_retries_report_unavailable() {
        let (mut source, _clock, calls) = source(failures(3));
        assert!(matches!(source.next_frame().unwrap(), FrameOutcome::Unavailable));
        assert_eq!(*calls.lock().unwrap(), 3);
        assert_eq!(source.consecutive_failures(), 3);
        assert!(!source.in_cooldown());
    }

    #[test]
    fn cooldown_skips_sensor_until_elapsed() {
        let (mut source, clock, calls) = source(failures(6));

        // 3 misses, then 2 more reach the threshold of 5.
        assert!(matches!(source.next_frame().unwrap(), FrameOutcome::Unavailable));
        assert!(matches!(source.next_frame().unwrap(), FrameOutcome::Unavailable));
        assert_eq!(*calls.lock().unwrap(), 5);
        assert!(source.in_cooldown());

        assert!(matches!(source.next_frame().unwrap(), FrameOutcome::Unavailable));
        assert_eq!(*calls.lock().unwrap(), 5);

        clock.advance(Duration::from_millis(1000));
        assert!(!source.in_cooldown());
        // One scripted miss remains, then the retry succeeds.
        let outcome = source.next_frame().unwrap();
        assert!(outcome.into_frame().is_some());
        assert_eq!(*calls.lock().unwrap(), 7);
        assert_eq!(source.consecutive_failures(), 0);
    }

    #[test]
    fn success_resets_failure_counter() {
        let mut script = failures(2);
        script.push(Ok(()));
        script.extend(failures(2));
        let (mut source, _clock, _calls) = source(script);
        assert!(source.next_frame().unwrap().into_frame().is_some());
        assert!(source.next_frame().unwrap().into_frame().is_some());
        assert!(!source.in_cooldown());
    }

    #[test]
    fn faults_are_fatal_and_not_retried() {
        let (mut source, _clock, calls) =
            source(vec![Err(SensorError::Fault("usb link lost".into()))]);
        let err = source.next_frame().unwrap_err();
        assert_eq!(err, AcquisitionError::Fatal("usb link lost".into()));
        assert_eq!(*calls.lock().unwrap(), 1);
    }

    #[test]
    fn degenerate_policy_is_rejected_before_configuring() {
        for policy in [
            ResilienceConfig {
                max_attempts: 0,
                ..Default::default()
            },
            ResilienceConfig {
                failure_threshold: 0,
                ..Default::default()
            },
        ] {
            let (sensor, calls) = ScriptedSensor::new(Vec::new());
            let result = FrameSource::with_clock(
                sensor,
                ManualClock::new(),
                &RadarConfig::default(),
                policy,
                Arc::new(MetricsRecorder::new()),
            );
            assert!(matches!(result, Err(AcquisitionError::Fatal(_))));
            assert_eq!(*calls.lock().unwrap(), 0);
        }
    }

    #[test]
    fn close_reaches_the_sensor() {
        let (mut source, _clock, _calls) = source(Vec::new());
        source.close();
        assert!(source.sensor().closed);
    }
}
