use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use waymark_proto::{Cue, NavSnapshot};

use crate::corridor::Corridor;
use crate::course::CourseEstimator;
use crate::error::NavError;
use crate::feedback::{self, FeedbackInput, FeedbackLimits, NavStatus};
use crate::geo::{bearing_deg, distance_m, normalize_deg, Coordinate};
use crate::gnss::LocationFix;
use crate::route::{EventConfig, Route, Waypoint};
use crate::sensor::SensorEvent;

/// Tunables of the engine. Defaults match the field-tested values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NavParams {
    pub corridor_width_m: f64,
    /// Arrival radius around a waypoint.
    pub proximity_m: f64,
    /// Time a user must stay inside the arrival radius.
    pub confirm_delay_ms: u64,
    pub min_speed_for_course_mps: f64,
    pub min_distance_for_course_m: f64,
    pub alignment_threshold_deg: f64,
    /// "Far off route" starts at this many corridor widths from the center line.
    pub far_off_route_factor: f64,
}

impl Default for NavParams {
    fn default() -> Self {
        Self {
            corridor_width_m: 40.0,
            proximity_m: 15.0,
            confirm_delay_ms: 1_000,
            min_speed_for_course_mps: 0.3,
            min_distance_for_course_m: 3.0,
            alignment_threshold_deg: 35.0,
            far_off_route_factor: 2.5,
        }
    }
}

impl NavParams {
    pub fn confirm_delay(&self) -> Duration {
        Duration::from_millis(self.confirm_delay_ms)
    }

    pub fn far_off_route_m(&self) -> f64 {
        self.corridor_width_m * self.far_off_route_factor
    }

    fn feedback_limits(&self) -> FeedbackLimits {
        FeedbackLimits {
            alignment_threshold_deg: self.alignment_threshold_deg,
            far_off_route_m: self.far_off_route_m(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    AwaitingStart,
    Tracking(usize),
    Complete,
}

/// Handle for one deferred arrival check.
///
/// A ticket is honored while its generation and waypoint index are still
/// current. Tickets from before a reset or for an already passed waypoint
/// are stale and ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationTicket {
    pub generation: u64,
    pub index: usize,
}

/// Side effects requested by one engine transition.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NavOutput {
    pub cues: Vec<Cue>,
    /// Call `NavEngine::confirm` with this ticket after `NavParams::confirm_delay`.
    pub schedule: Option<ConfirmationTicket>,
    pub advanced: bool,
    /// The last waypoint was confirmed; sensors may be released.
    pub completed: bool,
}

pub struct NavEngine {
    route: Route,
    params: NavParams,
    corridor: Option<Corridor>,
    config_error: Option<NavError>,

    progress: Progress,
    generation: u64,
    // route indices, in confirmation order
    visited: Vec<usize>,

    estimator: CourseEstimator,
    location: Option<Coordinate>,
    location_error: Option<NavError>,
    last_fix_at: Option<OffsetDateTime>,
    orientation_deg: f64,
    course_deg: Option<f64>,

    distance_m: Option<f64>,
    bearing_deg: Option<f64>,
    in_corridor: bool,
    off_route_signaled: bool,
    status: NavStatus,
}

impl NavEngine {
    pub fn new(route: Route, params: NavParams) -> Self {
        let corridor = Corridor::from_route(&route, params.corridor_width_m);
        let estimator = CourseEstimator::new(params.min_speed_for_course_mps, params.min_distance_for_course_m);
        Self {
            route,
            params,
            corridor,
            config_error: None,
            progress: Progress::AwaitingStart,
            generation: 0,
            visited: Vec::new(),
            estimator,
            location: None,
            location_error: None,
            last_fix_at: None,
            orientation_deg: 0.0,
            course_deg: None,
            distance_m: None,
            bearing_deg: None,
            in_corridor: false,
            off_route_signaled: false,
            status: NavStatus::Idle,
        }
    }

    /// An engine that can never start; it only reports `err`.
    pub fn unconfigured(err: NavError, params: NavParams) -> Self {
        let mut engine = Self::new(Route::default(), params);
        engine.status = NavStatus::ConfigError(err.clone());
        engine.config_error = Some(err);
        engine
    }

    pub fn from_event(event: Option<&EventConfig>, params: NavParams) -> Self {
        match event.map(|ev| Route::new(&ev.route)) {
            None => Self::unconfigured(NavError::NoRouteConfigured, params),
            Some(Err(e)) => Self::unconfigured(e, params),
            Some(Ok(route)) => Self::new(route, params),
        }
    }

    pub fn params(&self) -> &NavParams {
        &self.params
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    pub fn status(&self) -> &NavStatus {
        &self.status
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn in_corridor(&self) -> bool {
        self.in_corridor
    }

    pub fn distance_m(&self) -> Option<f64> {
        self.distance_m
    }

    pub fn bearing_deg(&self) -> Option<f64> {
        self.bearing_deg
    }

    pub fn course_deg(&self) -> Option<f64> {
        self.course_deg
    }

    pub fn orientation_deg(&self) -> f64 {
        self.orientation_deg
    }

    pub fn target(&self) -> Option<&Waypoint> {
        match self.progress {
            Progress::Tracking(i) => self.route.get(i),
            _ => None,
        }
    }

    pub fn current_index(&self) -> usize {
        match self.progress {
            Progress::AwaitingStart => 0,
            Progress::Tracking(i) => i,
            Progress::Complete => self.route.len().saturating_sub(1),
        }
    }

    pub fn visited(&self) -> impl Iterator<Item = &Waypoint> {
        self.visited.iter().filter_map(|&i| self.route.get(i))
    }

    /// Begins tracking the first waypoint.
    ///
    /// Fails without side effects on the host when no valid route was
    /// configured; the caller should not activate sensors in that case.
    pub fn start(&mut self) -> Result<NavOutput, NavError> {
        if let Some(e) = &self.config_error {
            warn!("nav: refusing to start: {}", e);
            self.status = NavStatus::ConfigError(e.clone());
            return Err(e.clone());
        }

        let mut out = NavOutput::default();
        if self.progress == Progress::AwaitingStart {
            self.progress = Progress::Tracking(0);
            self.status = NavStatus::AwaitingSignal;
            info!("nav: started, {} waypoints", self.route.len());
            self.refresh(&mut out);
        }
        Ok(out)
    }

    /// Back to `AwaitingStart` with a clean slate. Any outstanding
    /// confirmation ticket becomes stale.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.progress = Progress::AwaitingStart;
        self.visited.clear();
        self.route.clear_reached();
        self.estimator.reset();
        self.location = None;
        self.location_error = None;
        self.last_fix_at = None;
        self.course_deg = None;
        self.distance_m = None;
        self.bearing_deg = None;
        self.in_corridor = false;
        self.off_route_signaled = false;
        self.status = match &self.config_error {
            Some(e) => NavStatus::ConfigError(e.clone()),
            None => NavStatus::Idle,
        };
        info!("nav: reset (generation {})", self.generation);
    }

    pub fn apply(&mut self, event: SensorEvent) -> NavOutput {
        match event {
            SensorEvent::Fix(fix) => self.on_fix(&fix),
            SensorEvent::Orientation(deg) => self.on_orientation(deg),
            SensorEvent::Error(e) => self.on_sensor_error(e),
        }
    }

    pub fn on_fix(&mut self, fix: &LocationFix) -> NavOutput {
        let mut out = NavOutput::default();
        if self.progress == Progress::Complete {
            return out;
        }
        self.course_deg = self.estimator.update(fix);
        self.location = Some(fix.coord);
        self.location_error = None;
        self.last_fix_at = Some(fix.ts);
        self.refresh(&mut out);
        out
    }

    pub fn on_orientation(&mut self, deg: f64) -> NavOutput {
        let mut out = NavOutput::default();
        self.orientation_deg = normalize_deg(deg);
        self.refresh(&mut out);
        out
    }

    /// The fix is lost; status shows the error until the next valid fix.
    pub fn on_sensor_error(&mut self, err: NavError) -> NavOutput {
        let mut out = NavOutput::default();
        if self.progress == Progress::Complete {
            return out;
        }
        warn!("nav: sensor error: {}", err);
        self.location = None;
        self.location_error = Some(err);
        self.course_deg = None;
        self.refresh(&mut out);
        out
    }

    /// Deferred arrival check for `ticket`.
    ///
    /// Advances when the ticket is still current and the latest location is
    /// inside the arrival radius; otherwise re-arms the waypoint. Leaving the
    /// radius in between does not void the ticket, only the state at fire
    /// time counts.
    pub fn confirm(&mut self, ticket: ConfirmationTicket) -> NavOutput {
        let mut out = NavOutput::default();
        if ticket.generation != self.generation || self.progress != Progress::Tracking(ticket.index) {
            debug!(?ticket, "nav: stale confirmation ignored");
            return out;
        }

        let index = ticket.index;
        let still_close = match (self.location, self.route.get(index)) {
            (Some(here), Some(target)) => distance_m(&here, &target.coord) < self.params.proximity_m,
            _ => false,
        };
        if !still_close {
            if let Some(target) = self.route.get_mut(index) {
                target.reached = false;
                info!("nav: arrival at {} not confirmed", target.name);
            }
            return out;
        }

        self.advance(index, &mut out);
        // show the new target right away instead of waiting for the next fix
        self.refresh(&mut out);
        out
    }

    pub fn snapshot(&self) -> NavSnapshot {
        NavSnapshot {
            ts_unix_ms: self.last_fix_at.map(|t| (t.unix_timestamp_nanos() / 1_000_000) as i64),
            target: self.target().map(Waypoint::view),
            current_index: self.current_index(),
            complete: self.progress == Progress::Complete,
            distance_m: self.distance_m,
            bearing_deg: self.bearing_deg,
            orientation_deg: self.orientation_deg,
            course_deg: self.course_deg,
            in_corridor: self.in_corridor,
            status: self.status.to_string(),
            status_class: self.status.class(),
            visited: self.visited().map(Waypoint::view).collect(),
        }
    }

    fn advance(&mut self, index: usize, out: &mut NavOutput) {
        let last = self.route.len().saturating_sub(1);
        let Some(reached) = self.route.get_mut(index) else { return };
        reached.reached = false;
        let name = reached.name.clone();

        // the first waypoint is the start line, not a milestone
        if index != 0 {
            out.cues.push(Cue::WaypointReached);
        }
        if !self.visited.contains(&index) {
            self.visited.push(index);
        }
        out.advanced = true;

        if index >= last {
            self.progress = Progress::Complete;
            out.completed = true;
            info!("nav: last waypoint {} reached, route complete", name);
            return;
        }

        self.progress = Progress::Tracking(index + 1);
        if let Some(next) = self.route.get_mut(index + 1) {
            next.reached = false;
            info!("nav: {} reached, next is {} (index {})", name, next.name, index + 1);
        }
    }

    fn refresh(&mut self, out: &mut NavOutput) {
        let index = match self.progress {
            Progress::AwaitingStart => return,
            Progress::Complete => {
                self.distance_m = None;
                self.bearing_deg = None;
                self.status = NavStatus::Complete;
                return;
            }
            Progress::Tracking(i) => i,
        };

        let Some(here) = self.location else {
            self.distance_m = None;
            self.bearing_deg = None;
            self.status = match &self.location_error {
                Some(e) => NavStatus::SensorError(e.clone()),
                None => NavStatus::AwaitingSignal,
            };
            return;
        };
        let Some(target) = self.route.get(index) else { return };
        let distance = distance_m(&here, &target.coord);
        let bearing = bearing_deg(&here, &target.coord);
        self.distance_m = Some(distance);
        self.bearing_deg = Some(bearing);

        let was_in = self.in_corridor;
        self.in_corridor = self.corridor.as_ref().is_some_and(|c| c.contains(&here));
        if was_in && !self.in_corridor && !self.off_route_signaled {
            info!("nav: left the corridor");
            out.cues.push(Cue::OffRoute);
            self.off_route_signaled = true;
        } else if self.in_corridor {
            self.off_route_signaled = false;
        }

        let status = feedback::compose(
            &FeedbackInput {
                target,
                location: Some(here),
                location_error: self.location_error.as_ref(),
                bearing_deg: bearing,
                course_deg: self.course_deg,
                in_corridor: self.in_corridor,
                corridor: self.corridor.as_ref(),
            },
            self.params.feedback_limits(),
        );
        self.status = status;

        self.check_arrival(index, distance, out);
    }

    fn check_arrival(&mut self, index: usize, distance: f64, out: &mut NavOutput) {
        let Some(target) = self.route.get_mut(index) else { return };
        if distance < self.params.proximity_m {
            if !target.reached {
                target.reached = true;
                let ticket = ConfirmationTicket { generation: self.generation, index };
                out.schedule = Some(ticket);
                info!("nav: near {} ({:.1} m), confirming in {} ms", target.name, distance, self.params.confirm_delay_ms);
            }
        } else if target.reached {
            target.reached = false;
            debug!("nav: left {} before arrival was confirmed", target.name);
        }
    }
}
