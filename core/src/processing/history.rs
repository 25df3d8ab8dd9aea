use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// Fixed-capacity FIFO; pushing onto a full history evicts the oldest entry.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackHistory<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> TrackHistory<T> {
    /// A capacity of zero is raised to one.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends `entry`, returning the evicted oldest entry when full.
    pub fn push(&mut self, entry: T) -> Option<T> {
        let evicted = if self.entries.len() == self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        evicted
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&T> {
        self.entries.back()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.entries.iter()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Mean of the last `len` values.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    history: TrackHistory<f32>,
}

impl MovingAverage {
    pub fn new(len: usize) -> Self {
        Self {
            history: TrackHistory::with_capacity(len),
        }
    }

    pub fn push(&mut self, value: f32) -> f32 {
        self.history.push(value);
        self.history.iter().sum::<f32>() / self.history.len() as f32
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}

/// Maps angles onto equal segments of `[-max_angle, max_angle]` and smooths
/// the segment index with an integer-rounded moving average.
#[derive(Debug, Clone)]
pub struct SegmentSmoother {
    max_angle_deg: f32,
    num_segments: usize,
    history: TrackHistory<usize>,
}

impl SegmentSmoother {
    pub fn new(max_angle_deg: f32, num_segments: usize, len: usize) -> Self {
        Self {
            max_angle_deg,
            num_segments: num_segments.max(1),
            history: TrackHistory::with_capacity(len),
        }
    }

    pub fn num_segments(&self) -> usize {
        self.num_segments
    }

    /// Segment containing `angle_deg`, clamped to the outer segments.
    pub fn segment_of(&self, angle_deg: f32) -> usize {
        let span = 2.0 * self.max_angle_deg;
        if span <= 0.0 {
            return 0;
        }
        let position = (angle_deg + self.max_angle_deg) / span * self.num_segments as f32;
        (position.floor().max(0.0) as usize).min(self.num_segments - 1)
    }

    /// Records `angle_deg` and returns the smoothed segment index.
    pub fn push_angle(&mut self, angle_deg: f32) -> usize {
        let segment = self.segment_of(angle_deg);
        self.history.push(segment);
        let mean = self.history.iter().sum::<usize>() as f32 / self.history.len() as f32;
        (mean.round() as usize).min(self.num_segments - 1)
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}

/// Most frequent label over the last `len` entries. Ties go to the oldest of
/// the tied labels, so a lone new label never wins a split window.
#[derive(Debug, Clone)]
pub struct MajorityVote<T> {
    history: TrackHistory<T>,
}

impl<T: Clone + Eq + Hash> MajorityVote<T> {
    pub fn new(len: usize) -> Self {
        Self {
            history: TrackHistory::with_capacity(len),
        }
    }

    pub fn push(&mut self, label: T) -> T {
        self.history.push(label.clone());
        let mut counts: HashMap<&T, usize> = HashMap::new();
        for entry in self.history.iter() {
            *counts.entry(entry).or_insert(0) += 1;
        }
        let best = counts.values().copied().max().unwrap_or(0);
        self.history
            .iter()
            .find(|entry| counts.get(entry).copied() == Some(best))
            .cloned()
            .unwrap_or(label)
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_never_exceeds_capacity() {
        let mut history = TrackHistory::with_capacity(3);
        for value in 0..10 {
            history.push(value);
            assert!(history.len() <= 3);
        }
        assert!(history.is_full());
        assert_eq!(history.iter().copied().collect::<Vec<_>>(), vec![7, 8, 9]);
    }

    #[test]
    fn overflow_evicts_exactly_the_oldest_entry() {
        let mut history = TrackHistory::with_capacity(3);
        assert_eq!(history.push('a'), None);
        assert_eq!(history.push('b'), None);
        assert_eq!(history.push('c'), None);
        assert_eq!(history.push('d'), Some('a'));
        assert_eq!(history.iter().copied().collect::<String>(), "bcd");
        assert_eq!(history.latest(), Some(&'d'));
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut history = TrackHistory::with_capacity(0);
        history.push(1);
        assert_eq!(history.push(2), Some(1));
        assert_eq!(history.capacity(), 1);
    }

    #[test]
    fn moving_average_covers_recent_values_only() {
        let mut average = MovingAverage::new(3);
        assert_eq!(average.push(3.0), 3.0);
        assert_eq!(average.push(6.0), 4.5);
        assert_eq!(average.push(9.0), 6.0);
        assert_eq!(average.push(12.0), 9.0);
    }

    #[test]
    fn segments_cover_the_field_of_view() {
        let smoother = SegmentSmoother::new(60.0, 4, 3);
        assert_eq!(smoother.segment_of(-60.0), 0);
        assert_eq!(smoother.segment_of(-31.0), 0);
        assert_eq!(smoother.segment_of(-29.0), 1);
        assert_eq!(smoother.segment_of(10.0), 2);
        assert_eq!(smoother.segment_of(60.0), 3);
        assert_eq!(smoother.segment_of(75.0), 3);
        assert_eq!(smoother.segment_of(-80.0), 0);
    }

    #[test]
    fn segment_smoothing_suppresses_single_frame_jitter() {
        let mut smoother = SegmentSmoother::new(60.0, 8, 7);
        for _ in 0..5 {
            assert_eq!(smoother.push_angle(20.0), 5);
        }
        // one outlier frame pulls the mean one segment, not onto the outlier
        assert_eq!(smoother.push_angle(-55.0), 4);
        assert_eq!(smoother.push_angle(20.0), 4);
    }

    #[test]
    fn majority_vote_prefers_frequent_then_oldest() {
        let mut vote = MajorityVote::new(3);
        assert_eq!(vote.push("standing"), "standing");
        assert_eq!(vote.push("sitting"), "standing");
        assert_eq!(vote.push("standing"), "standing");
        assert_eq!(vote.push("sitting"), "sitting");
        assert_eq!(vote.push("walking"), "standing");
    }

    #[test]
    fn single_outlier_label_does_not_flip_the_vote() {
        let mut vote = MajorityVote::new(3);
        vote.push("sitting");
        vote.push("sleeping");
        assert_eq!(vote.push("walking"), "sitting");
        vote.clear();
        assert_eq!(vote.push("walking"), "walking");
    }
}
