use time::OffsetDateTime;

use crate::geo::{bearing_deg, distance_m, Coordinate};
use crate::gnss::LocationFix;

/// Fixes closer together in time than this never yield a derived course.
const MIN_ELAPSED_S: f64 = 0.5;

/// Direction-of-travel estimate from successive fixes.
///
/// Prefers the receiver's course over ground when it reports enough speed,
/// otherwise derives a bearing from the displacement since the last fix.
#[derive(Debug, Clone)]
pub struct CourseEstimator {
    min_speed_mps: f64,
    min_distance_m: f64,
    previous: Option<(Coordinate, OffsetDateTime)>,
}

impl CourseEstimator {
    pub fn new(min_speed_mps: f64, min_distance_m: f64) -> Self {
        Self { min_speed_mps, min_distance_m, previous: None }
    }

    /// Returns the course for `fix`, or `None` when it cannot be told.
    /// Always remembers `fix` as the previous one.
    pub fn update(&mut self, fix: &LocationFix) -> Option<f64> {
        let course = self.estimate(fix);
        self.previous = Some((fix.coord, fix.ts));
        course
    }

    fn estimate(&self, fix: &LocationFix) -> Option<f64> {
        if let (Some(heading), Some(speed)) = (fix.heading_deg, fix.speed_mps) {
            if speed > self.min_speed_mps {
                return Some(heading);
            }
        }

        let (prev, prev_ts) = self.previous?;
        let moved = distance_m(&prev, &fix.coord);
        let elapsed = (fix.ts - prev_ts).as_seconds_f64();
        if moved >= self.min_distance_m && elapsed > MIN_ELAPSED_S && moved / elapsed >= self.min_speed_mps {
            return Some(bearing_deg(&prev, &fix.coord));
        }
        None
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }
}
