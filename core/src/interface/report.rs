use serde::{Deserialize, Serialize};

/// Posture classes reported by the posture use case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostureLabel {
    Standing,
    Sitting,
    Sleeping,
    Walking,
    NoPresence,
}

/// A tracked target as seen by presentation consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportTarget {
    pub range_m: f32,
    pub angle_deg: f32,
    pub velocity_mps: f32,
    pub x_m: f32,
    pub y_m: f32,
    pub members: usize,
}

/// Immutable record emitted once per processed frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionReport {
    pub sequence: u64,
    pub timestamp_s: f64,
    pub presence: bool,
    pub peeking: bool,
    pub target_count: usize,
    pub targets: Vec<ReportTarget>,
    /// Strongest reflector of the history-averaged beam energy map.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strongest: Option<ReportTarget>,
    /// Smoothed angular segment of the strongest tracked target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub posture: Option<PostureLabel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radial_velocity_mps: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fall_detected: Option<bool>,
}

impl DetectionReport {
    /// Report for a frame where nothing was detected.
    pub fn empty(sequence: u64, timestamp_s: f64) -> Self {
        Self {
            sequence,
            timestamp_s,
            presence: false,
            peeking: false,
            target_count: 0,
            targets: Vec::new(),
            strongest: None,
            segment: None,
            posture: None,
            radial_velocity_mps: None,
            fall_detected: None,
        }
    }
}
