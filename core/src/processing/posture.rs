use crate::config::{PostureConfig, SegmentThresholds};
use crate::interface::PostureLabel;
use crate::prelude::StageResult;
use crate::processing::history::{MajorityVote, MovingAverage, SegmentSmoother};

/// Label for `distance_m` under one segment's thresholds. Limits are
/// inclusive; anything beyond `sleeping_m` is walking.
pub fn classify_position(distance_m: f32, thresholds: &SegmentThresholds) -> PostureLabel {
    if distance_m <= thresholds.standing_m {
        PostureLabel::Standing
    } else if distance_m <= thresholds.sitting_m {
        PostureLabel::Sitting
    } else if distance_m <= thresholds.sleeping_m {
        PostureLabel::Sleeping
    } else {
        PostureLabel::Walking
    }
}

/// Posture decision of one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PostureEstimate {
    pub label: PostureLabel,
    pub segment: usize,
    pub distance_m: f32,
}

/// Smooths the dominant target's distance, angular segment and label over a
/// short history before classifying against per-segment thresholds.
#[derive(Debug, Clone)]
pub struct PostureClassifier {
    segments: Vec<SegmentThresholds>,
    smoother: SegmentSmoother,
    distance: MovingAverage,
    vote: MajorityVote<PostureLabel>,
}

impl PostureClassifier {
    pub fn new(config: &PostureConfig) -> StageResult<Self> {
        config.validate()?;
        Ok(Self {
            segments: config.segments.clone(),
            smoother: SegmentSmoother::new(
                config.max_angle_deg,
                config.segments.len(),
                config.history_len,
            ),
            distance: MovingAverage::new(config.history_len),
            vote: MajorityVote::new(config.history_len),
        })
    }

    pub fn update(&mut self, distance_m: f32, angle_deg: f32) -> PostureEstimate {
        let segment = self.smoother.push_angle(angle_deg);
        let distance_m = self.distance.push(distance_m);
        let label = classify_position(distance_m, &self.segments[segment]);
        PostureEstimate {
            label: self.vote.push(label),
            segment,
            distance_m,
        }
    }

    pub fn reset(&mut self) {
        self.smoother.clear();
        self.distance.clear();
        self.vote.clear();
    }
}
