use std::fmt;

use waymark_proto::StatusClass;

use crate::corridor::Corridor;
use crate::error::NavError;
use crate::geo::{angular_difference_deg, distance_m, Coordinate};
use crate::route::Waypoint;

#[derive(Debug, Clone, PartialEq)]
pub enum NavStatus {
    /// Navigation not started yet.
    Idle,
    AwaitingSignal,
    SensorError(NavError),
    ConfigError(NavError),
    /// In the corridor, direction of travel unknown.
    InCorridor { target: String },
    OnTrack { target: String },
    AdjustDirection { target: String },
    Drifting { target: String },
    FarOffRoute { target: String },
    Complete,
}

impl NavStatus {
    pub fn class(&self) -> StatusClass {
        match self {
            NavStatus::Idle => StatusClass::Idle,
            NavStatus::AwaitingSignal
            | NavStatus::AdjustDirection { .. }
            | NavStatus::Drifting { .. } => StatusClass::Warning,
            NavStatus::SensorError(_) | NavStatus::ConfigError(_) | NavStatus::FarOffRoute { .. } => {
                StatusClass::OffRoute
            }
            NavStatus::InCorridor { .. } | NavStatus::OnTrack { .. } | NavStatus::Complete => StatusClass::InRoute,
        }
    }
}

impl fmt::Display for NavStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavStatus::Idle => write!(f, "Press start to activate the compass."),
            NavStatus::AwaitingSignal => write!(f, "Waiting for GPS signal..."),
            NavStatus::SensorError(e) | NavStatus::ConfigError(e) => write!(f, "{}", e),
            NavStatus::InCorridor { target } => write!(f, "In the corridor toward {}.", target),
            NavStatus::OnTrack { target } => write!(f, "Excellent! Heading straight to {}.", target),
            NavStatus::AdjustDirection { target } => {
                write!(f, "In the corridor, but adjust your direction toward {}.", target)
            }
            NavStatus::Drifting { target } => write!(f, "You are drifting off route! Head toward {}.", target),
            NavStatus::FarOffRoute { target } => write!(f, "FAR OFF ROUTE! Head back toward {}.", target),
            NavStatus::Complete => write!(f, "Congratulations, you have completed the route!"),
        }
    }
}

/// Thresholds the composer needs; see `NavParams`.
#[derive(Debug, Clone, Copy)]
pub struct FeedbackLimits {
    pub alignment_threshold_deg: f64,
    pub far_off_route_m: f64,
}

pub struct FeedbackInput<'a> {
    pub target: &'a Waypoint,
    pub location: Option<Coordinate>,
    pub location_error: Option<&'a NavError>,
    pub bearing_deg: f64,
    pub course_deg: Option<f64>,
    pub in_corridor: bool,
    pub corridor: Option<&'a Corridor>,
}

pub fn compose(input: &FeedbackInput<'_>, limits: FeedbackLimits) -> NavStatus {
    let Some(here) = input.location else {
        return match input.location_error {
            Some(e) => NavStatus::SensorError(e.clone()),
            None => NavStatus::AwaitingSignal,
        };
    };
    let target = input.target.name.clone();

    if input.in_corridor {
        return match input.course_deg {
            None => NavStatus::InCorridor { target },
            Some(course) if angular_difference_deg(course, input.bearing_deg) < limits.alignment_threshold_deg => {
                NavStatus::OnTrack { target }
            }
            Some(_) => NavStatus::AdjustDirection { target },
        };
    }

    // without a corridor the start-end segment collapses onto the only waypoint
    let offset = match input.corridor {
        Some(c) => c.offset_m(&here),
        None => distance_m(&here, &input.target.coord),
    };
    if offset > limits.far_off_route_m {
        NavStatus::FarOffRoute { target }
    } else {
        NavStatus::Drifting { target }
    }
}
