use serde::{Deserialize, Serialize};

/// Coarse classification of the navigation status, used by renderers to
/// pick a colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StatusClass {
    Idle,
    InRoute,
    Warning,
    OffRoute,
}

impl StatusClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusClass::Idle => "idle",
            StatusClass::InRoute => "in-route",
            StatusClass::Warning => "warning",
            StatusClass::OffRoute => "off-route",
        }
    }
}

/// Audio triggers. Carries no parameters; tone and timing belong to the notifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cue {
    OffRoute,
    WaypointReached,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaypointView {
    pub order: u32,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavSnapshot {
    /// Timestamp of the fix the snapshot was computed from.
    pub ts_unix_ms: Option<i64>,
    /// `None` once the route is complete or before navigation starts.
    pub target: Option<WaypointView>,
    pub current_index: usize,
    pub complete: bool,
    pub distance_m: Option<f64>,
    pub bearing_deg: Option<f64>,
    pub orientation_deg: f64,
    pub course_deg: Option<f64>,
    pub in_corridor: bool,
    pub status: String,
    pub status_class: StatusClass,
    pub visited: Vec<WaypointView>,
}

impl NavSnapshot {
    /// Rotation of the pointer to the target relative to the device.
    pub fn pointer_rotation_deg(&self) -> Option<f64> {
        self.bearing_deg.map(|b| b - self.orientation_deg)
    }

    /// Rotation of the compass dial so north stays put.
    pub fn dial_rotation_deg(&self) -> f64 {
        -self.orientation_deg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(bearing: Option<f64>, orientation: f64) -> NavSnapshot {
        NavSnapshot {
            ts_unix_ms: None,
            target: None,
            current_index: 0,
            complete: false,
            distance_m: None,
            bearing_deg: bearing,
            orientation_deg: orientation,
            course_deg: None,
            in_corridor: false,
            status: String::new(),
            status_class: StatusClass::Idle,
            visited: Vec::new(),
        }
    }

    #[test]
    fn pointer_is_bearing_minus_orientation() {
        let s = snapshot(Some(90.0), 30.0);
        assert_eq!(s.pointer_rotation_deg(), Some(60.0));
        assert_eq!(s.dial_rotation_deg(), -30.0);
    }

    #[test]
    fn pointer_absent_without_bearing() {
        assert_eq!(snapshot(None, 10.0).pointer_rotation_deg(), None);
    }

    #[test]
    fn status_class_serializes_kebab_case() {
        let json = serde_json::to_string(&StatusClass::OffRoute).unwrap();
        assert_eq!(json, "\"off-route\"");
        assert_eq!(StatusClass::InRoute.as_str(), "in-route");
    }
}
