use crate::config::DetectorConfig;
use crate::math::StatsHelper;
use crate::prelude::{ProcessingStage, StageError, StageResult};
use std::ops::Range;

/// Decision of one detector update.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorOutput {
    pub presence: bool,
    pub peeking: bool,
    /// `fast_average - slow_average` over every range bin.
    pub difference: Vec<f32>,
    /// `fast_average - peek_slow_average`, when peeking is enabled.
    pub peek_difference: Option<Vec<f32>>,
}

/// Mutable per-instance detector state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectorState {
    pub slow_average: Vec<f32>,
    pub fast_average: Vec<f32>,
    pub presence_status: bool,
    pub peek_slow_average: Vec<f32>,
    pub peek_status: bool,
    pub first_run: bool,
}

struct PeekWindow {
    bins: Range<usize>,
    threshold: f32,
}

/// Dual-rate exponential averaging presence detector with hysteresis.
///
/// The slow baseline adapts at `alpha_med` while nothing is present and at
/// `alpha_slow` once presence is flagged; the fast average always adapts at
/// `alpha_fast`. Presence is raised when the largest `fast - slow` value in the
/// detection window exceeds the threshold.
pub struct AdaptiveDetector {
    config: DetectorConfig,
    bins: usize,
    detect: Range<usize>,
    peek: Option<PeekWindow>,
    state: DetectorState,
}

impl AdaptiveDetector {
    pub fn new(config: &DetectorConfig, bins: usize) -> StageResult<Self> {
        config.validate()?;
        let detect = config.window.bins(bins)?;
        let peek = match &config.peeking {
            Some(peeking) => {
                let peek_bins = peeking.window.bins(bins)?;
                if peek_bins.start < detect.end && detect.start < peek_bins.end {
                    return Err(StageError::InvalidConfig(format!(
                        "peeking window {:?} overlaps detection window {:?}",
                        peek_bins, detect
                    )));
                }
                Some(PeekWindow {
                    bins: peek_bins,
                    threshold: peeking.threshold,
                })
            }
            None => None,
        };

        Ok(Self {
            config: config.clone(),
            bins,
            detect,
            peek,
            state: DetectorState {
                first_run: true,
                ..Default::default()
            },
        })
    }

    pub fn state(&self) -> &DetectorState {
        &self.state
    }

    pub fn detection_bins(&self) -> Range<usize> {
        self.detect.clone()
    }

    pub fn presence_threshold(&self) -> f32 {
        self.config.presence_threshold
    }

    /// Feeds one normalised range profile.
    pub fn update(&mut self, current: &[f32]) -> StageResult<DetectorOutput> {
        if current.len() != self.bins {
            return Err(StageError::InvalidInput(format!(
                "profile has {} bins, detector configured for {}",
                current.len(),
                self.bins
            )));
        }

        if self.state.first_run {
            self.state.slow_average = current.to_vec();
            self.state.fast_average = current.to_vec();
            if self.peek.is_some() {
                self.state.peek_slow_average = current.to_vec();
            }
            self.state.presence_status = false;
            self.state.peek_status = false;
            self.state.first_run = false;
            return Ok(DetectorOutput {
                presence: false,
                peeking: false,
                difference: vec![0.0; self.bins],
                peek_difference: self.peek.as_ref().map(|_| vec![0.0; self.bins]),
            });
        }

        let alpha = self.slow_rate(self.state.presence_status);
        blend(&mut self.state.slow_average, current, alpha);
        blend(&mut self.state.fast_average, current, self.config.alpha_fast);

        let difference = subtract(&self.state.fast_average, &self.state.slow_average);
        self.state.presence_status = exceeds(&difference[self.detect.clone()], self.config.presence_threshold);

        let peek_difference = match &self.peek {
            Some(peek) => {
                let alpha = self.slow_rate(self.state.peek_status);
                blend(&mut self.state.peek_slow_average, current, alpha);
                let peek_difference =
                    subtract(&self.state.fast_average, &self.state.peek_slow_average);
                self.state.peek_status = exceeds(&peek_difference[peek.bins.clone()], peek.threshold);
                Some(peek_difference)
            }
            None => None,
        };

        Ok(DetectorOutput {
            presence: self.state.presence_status,
            peeking: self.state.peek_status,
            difference,
            peek_difference,
        })
    }

    fn slow_rate(&self, active: bool) -> f32 {
        if active {
            self.config.alpha_slow
        } else {
            self.config.alpha_med
        }
    }

    pub fn reset(&mut self) {
        self.state = DetectorState {
            first_run: true,
            ..Default::default()
        };
    }
}

impl ProcessingStage for AdaptiveDetector {
    type Input = [f32];
    type Output = DetectorOutput;

    fn execute(&mut self, profile: &[f32]) -> StageResult<DetectorOutput> {
        self.update(profile)
    }

    fn cleanup(&mut self) {
        self.reset();
    }
}

fn blend(average: &mut [f32], current: &[f32], alpha: f32) {
    for (avg, &value) in average.iter_mut().zip(current) {
        *avg = *avg * (1.0 - alpha) + value * alpha;
    }
}

fn subtract(lhs: &[f32], rhs: &[f32]) -> Vec<f32> {
    lhs.iter().zip(rhs).map(|(a, b)| a - b).collect()
}

fn exceeds(window: &[f32], threshold: f32) -> bool {
    StatsHelper::max(window).map_or(false, |max| max > threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BinWindow, PeekingConfig};

    fn detector(peeking: bool) -> AdaptiveDetector {
        let config = DetectorConfig {
            presence_threshold: 0.05,
            peeking: peeking.then(|| PeekingConfig {
                threshold: 0.05,
                window: BinWindow::new(0.5, 1.0),
            }),
            ..Default::default()
        };
        AdaptiveDetector::new(&config, 32).unwrap()
    }

    fn profile(level: f32, bump: Option<(usize, f32)>) -> Vec<f32> {
        let mut profile = vec![level; 32];
        if let Some((bin, amplitude)) = bump {
            profile[bin] += amplitude;
        }
        profile
    }

    #[test]
    fn first_frame_only_seeds_the_averages() {
        let mut detector = detector(true);
        let output = detector.update(&profile(0.0, Some((8, 100.0)))).unwrap();
        assert!(!output.presence);
        assert!(!output.peeking);
        assert!(!detector.state().first_run);
        assert_eq!(detector.state().slow_average[8], 100.0);
        assert_eq!(detector.state().fast_average, detector.state().slow_average);
    }

    #[test]
    fn sustained_change_raises_presence() {
        let mut detector = detector(false);
        detector.update(&profile(0.1, None)).unwrap();
        detector.update(&profile(0.1, None)).unwrap();
        let mut raised = false;
        for _ in 0..5 {
            raised |= detector.update(&profile(0.1, Some((8, 1.0)))).unwrap().presence;
        }
        assert!(raised);
        assert!(detector.state().presence_status);
    }

    #[test]
    fn constant_scene_never_raises_presence() {
        let mut detector = detector(true);
        for _ in 0..500 {
            let output = detector.update(&profile(0.3, Some((8, 0.7)))).unwrap();
            assert!(!output.presence);
            assert!(!output.peeking);
            assert!(output.difference.iter().all(|d| d.abs() < 1e-4));
        }
    }

    #[test]
    fn presence_slows_baseline_adaptation() {
        let mut detector = detector(false);
        detector.update(&profile(0.0, None)).unwrap();
        detector.update(&profile(0.0, Some((8, 1.0)))).unwrap();
        assert!(detector.state().presence_status);
        let before = detector.state().slow_average[8];
        detector.update(&profile(0.0, Some((8, 1.0)))).unwrap();
        let after = detector.state().slow_average[8];
        // alpha_slow = 0.001 while present
        assert!((after - (before * 0.999 + 0.001)).abs() < 1e-6);
    }

    #[test]
    fn change_outside_the_window_is_ignored_by_presence_but_seen_by_peeking() {
        let mut detector = detector(true);
        detector.update(&profile(0.0, None)).unwrap();
        let output = detector.update(&profile(0.0, Some((24, 1.0)))).unwrap();
        assert!(!output.presence);
        assert!(output.peeking);
        assert!(output.peek_difference.is_some());
    }

    #[test]
    fn mismatched_profile_length_is_rejected() {
        let mut detector = detector(false);
        assert!(matches!(
            detector.update(&[0.0; 8]),
            Err(StageError::InvalidInput(_))
        ));
    }

    #[test]
    fn overlapping_windows_are_rejected() {
        let config = DetectorConfig {
            window: BinWindow::new(0.0, 0.6),
            peeking: Some(PeekingConfig {
                threshold: 0.1,
                window: BinWindow::new(0.5, 1.0),
            }),
            ..Default::default()
        };
        assert!(AdaptiveDetector::new(&config, 32).is_err());
    }

    #[test]
    fn cleanup_restarts_seeding() {
        let mut detector = detector(false);
        detector.update(&profile(0.0, None)).unwrap();
        detector.cleanup();
        assert!(detector.state().first_run);
        assert!(!detector.update(&profile(0.0, Some((8, 5.0)))).unwrap().presence);
    }
}
