//! Throttling of outbound position updates.

use glam::Vec3;
use std::time::Duration;

/// Decides when the local position is worth a `playerMove`.
///
/// A report goes out on the first observation and afterwards only when the
/// body moved farther than `min_distance` since the last report and at least
/// `min_interval` has passed.
#[derive(Debug, Clone)]
pub struct PositionReporter {
    min_distance: f32,
    min_interval: Duration,
    last_reported: Option<Vec3>,
    since_last: Duration,
}

impl Default for PositionReporter {
    fn default() -> Self {
        Self::new(0.01, Duration::from_millis(50))
    }
}

impl PositionReporter {
    pub fn new(min_distance: f32, min_interval: Duration) -> Self {
        Self {
            min_distance,
            min_interval,
            last_reported: None,
            since_last: Duration::ZERO,
        }
    }

    /// Records `position` after `dt` elapsed; returns whether to report it.
    pub fn observe(&mut self, position: Vec3, dt: Duration) -> bool {
        self.since_last += dt;
        let due = match self.last_reported {
            None => true,
            Some(last) => {
                self.since_last >= self.min_interval && last.distance(position) > self.min_distance
            }
        };
        if due {
            self.last_reported = Some(position);
            self.since_last = Duration::ZERO;
        }
        due
    }

    pub fn last_reported(&self) -> Option<Vec3> {
        self.last_reported
    }
}
