use crate::config::ClusterConfig;
use crate::prelude::{ProcessingStage, StageResult};
use crate::processing::history::TrackHistory;
use crate::processing::peaks::Target;

/// Centroid of one DBSCAN cluster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedTarget {
    pub range_m: f32,
    pub angle_rad: f32,
    pub velocity_mps: f32,
    pub x_m: f32,
    pub y_m: f32,
    /// Radial velocity, used as the third Cartesian axis.
    pub z: f32,
    pub members: usize,
    pub magnitude: f32,
}

impl TrackedTarget {
    pub fn angle_deg(&self) -> f32 {
        self.angle_rad.to_degrees()
    }
}

/// Groups per-frame targets with DBSCAN over their `(x, y)` position and
/// keeps a bounded history of the emitted clusters.
#[derive(Debug, Clone)]
pub struct ClusterTracker {
    epsilon_m: f32,
    min_points: usize,
    history: TrackHistory<Vec<TrackedTarget>>,
}

impl ClusterTracker {
    pub fn new(config: &ClusterConfig) -> StageResult<Self> {
        config.validate()?;
        Ok(Self {
            epsilon_m: config.epsilon_m,
            min_points: config.min_points,
            history: TrackHistory::with_capacity(config.history_len),
        })
    }

    /// Clusters `targets`, records the result and returns it. Noise points
    /// are dropped; an empty input yields an empty result.
    pub fn update(&mut self, targets: &[Target]) -> Vec<TrackedTarget> {
        let points: Vec<(f32, f32)> = targets
            .iter()
            .map(|target| cartesian(target.range_m, target.angle_rad))
            .collect();
        let labels = dbscan(&points, self.epsilon_m, self.min_points);
        let clusters = labels.iter().flatten().max().map_or(0, |max| max + 1);

        let mut tracked = Vec::with_capacity(clusters);
        for cluster in 0..clusters {
            let members: Vec<&Target> = targets
                .iter()
                .zip(&labels)
                .filter(|(_, label)| **label == Some(cluster))
                .map(|(target, _)| target)
                .collect();
            tracked.push(centroid(&members));
        }

        self.history.push(tracked.clone());
        tracked
    }

    pub fn history(&self) -> &TrackHistory<Vec<TrackedTarget>> {
        &self.history
    }

    /// Clusters of the most recent update.
    pub fn recent_targets(&self) -> &[TrackedTarget] {
        self.history.latest().map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }
}

impl ProcessingStage for ClusterTracker {
    type Input = [Target];
    type Output = Vec<TrackedTarget>;

    fn execute(&mut self, targets: &[Target]) -> StageResult<Vec<TrackedTarget>> {
        Ok(self.update(targets))
    }

    fn cleanup(&mut self) {
        self.reset();
    }
}

/// `(x, y)` with `x` along boresight.
pub fn cartesian(range_m: f32, angle_rad: f32) -> (f32, f32) {
    (range_m * angle_rad.cos(), range_m * angle_rad.sin())
}

/// Cluster label per point; `None` marks noise.
///
/// A point is core when at least `min_points` points (itself included) lie
/// within `epsilon`. Clusters grow from core points through their
/// neighbourhoods; border points join the first cluster that reaches them.
pub fn dbscan(points: &[(f32, f32)], epsilon: f32, min_points: usize) -> Vec<Option<usize>> {
    let eps_sq = epsilon * epsilon;
    let neighbours = |index: usize| -> Vec<usize> {
        let (px, py) = points[index];
        points
            .iter()
            .enumerate()
            .filter(|(_, (x, y))| (x - px).powi(2) + (y - py).powi(2) <= eps_sq)
            .map(|(other, _)| other)
            .collect()
    };

    let mut labels: Vec<Option<usize>> = vec![None; points.len()];
    let mut visited = vec![false; points.len()];
    let mut next_cluster = 0;

    for start in 0..points.len() {
        if visited[start] {
            continue;
        }
        visited[start] = true;
        let seeds = neighbours(start);
        if seeds.len() < min_points {
            continue;
        }

        let cluster = next_cluster;
        next_cluster += 1;
        labels[start] = Some(cluster);
        let mut queue = seeds;
        while let Some(point) = queue.pop() {
            if labels[point].is_none() {
                labels[point] = Some(cluster);
            }
            if visited[point] {
                continue;
            }
            visited[point] = true;
            let reach = neighbours(point);
            if reach.len() >= min_points {
                queue.extend(reach.into_iter().filter(|&p| !visited[p]));
            }
        }
    }
    labels
}

fn centroid(members: &[&Target]) -> TrackedTarget {
    let count = members.len().max(1) as f32;
    let mean = |f: &dyn Fn(&Target) -> f32| members.iter().map(|t| f(t)).sum::<f32>() / count;
    let range_m = mean(&|t| t.range_m);
    let angle_rad = mean(&|t| t.angle_rad);
    let velocity_mps = mean(&|t| t.velocity_mps);
    let x_m = mean(&|t| cartesian(t.range_m, t.angle_rad).0);
    let y_m = mean(&|t| cartesian(t.range_m, t.angle_rad).1);
    TrackedTarget {
        range_m,
        angle_rad,
        velocity_mps,
        x_m,
        y_m,
        z: velocity_mps,
        members: members.len(),
        magnitude: members.iter().map(|t| t.magnitude).fold(0.0, f32::max),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(range_m: f32, angle_deg: f32) -> Target {
        Target {
            range_bin: 0,
            range_m,
            doppler_bin: 0,
            velocity_mps: 0.0,
            angle_rad: angle_deg.to_radians(),
            magnitude: 1.0,
        }
    }

    fn tracker(min_points: usize) -> ClusterTracker {
        ClusterTracker::new(&ClusterConfig {
            min_points,
            history_len: 3,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn nearby_targets_merge_into_one_centroid() {
        let mut tracker = tracker(1);
        let clusters = tracker.update(&[target(2.0, 0.0), target(2.2, 0.0), target(5.0, 0.0)]);
        assert_eq!(clusters.len(), 2);
        let near = clusters.iter().find(|c| c.members == 2).unwrap();
        assert!((near.range_m - 2.1).abs() < 1e-5);
        assert!((near.x_m - 2.1).abs() < 1e-5);
        assert!(near.y_m.abs() < 1e-6);
    }

    #[test]
    fn sparse_points_are_noise_under_min_points() {
        let mut tracker = tracker(3);
        let clusters = tracker.update(&[
            target(2.0, 0.0),
            target(2.1, 0.0),
            target(2.2, 0.0),
            target(6.0, 30.0),
        ]);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members, 3);
    }

    #[test]
    fn chained_points_join_through_core_neighbours() {
        let labels = dbscan(&[(0.0, 0.0), (0.4, 0.0), (0.8, 0.0), (1.2, 0.0)], 0.5, 2);
        assert!(labels.iter().all(|label| *label == Some(0)));
    }

    #[test]
    fn repeating_a_target_set_does_not_grow_the_cluster_count() {
        let mut tracker = tracker(1);
        let targets = [target(1.0, -20.0), target(3.0, 25.0)];
        let first = tracker.update(&targets).len();
        for _ in 0..10 {
            assert_eq!(tracker.update(&targets).len(), first);
        }
        assert_eq!(tracker.history().len(), 3);
    }

    #[test]
    fn empty_input_yields_empty_clusters() {
        let mut tracker = tracker(1);
        assert!(tracker.update(&[]).is_empty());
        assert!(tracker.recent_targets().is_empty());
        assert_eq!(tracker.history().len(), 1);
    }

    #[test]
    fn angle_sets_the_lateral_offset() {
        let (x, y) = cartesian(2.0, 30f32.to_radians());
        assert!((x - 3f32.sqrt()).abs() < 1e-5);
        assert!((y - 1.0).abs() < 1e-5);
    }
}
