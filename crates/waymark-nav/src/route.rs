use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::NavError;
use crate::geo::Coordinate;
use waymark_proto::WaypointView;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaypointCfg {
    pub order: u32,
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

/// The event document: metadata plus the route to walk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventConfig {
    pub name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub starts_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub ends_at: OffsetDateTime,
    #[serde(default)]
    pub teams: Vec<String>,
    pub route: Vec<WaypointCfg>,
}

impl EventConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .with_context(|| format!("read event config {}", path.display()))?;
        Self::from_json(&s)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s).context("parse event config json")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Waypoint {
    pub order: u32,
    pub name: String,
    pub coord: Coordinate,
    /// Set while an arrival is awaiting confirmation.
    pub reached: bool,
}

impl Waypoint {
    pub fn view(&self) -> WaypointView {
        WaypointView {
            order: self.order,
            name: self.name.clone(),
            lat: self.coord.lat,
            lon: self.coord.lon,
        }
    }
}

/// Non-empty, strictly ordered list of waypoints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Route {
    waypoints: Vec<Waypoint>,
}

impl Route {
    pub fn new(cfg: &[WaypointCfg]) -> Result<Self, NavError> {
        if cfg.is_empty() {
            return Err(NavError::EmptyRoute);
        }
        if let Some(w) = cfg.windows(2).find(|w| w[0].order >= w[1].order) {
            return Err(NavError::UnorderedRoute { prev: w[0].order, next: w[1].order });
        }
        let waypoints = cfg
            .iter()
            .map(|w| Waypoint {
                order: w.order,
                name: w.name.clone(),
                coord: Coordinate::new(w.lat, w.lon),
                reached: false,
            })
            .collect();
        Ok(Self { waypoints })
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Waypoint> {
        self.waypoints.get(index)
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut Waypoint> {
        self.waypoints.get_mut(index)
    }

    pub fn first(&self) -> Option<&Waypoint> {
        self.waypoints.first()
    }

    pub fn last(&self) -> Option<&Waypoint> {
        self.waypoints.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Waypoint> {
        self.waypoints.iter()
    }

    pub(crate) fn clear_reached(&mut self) {
        for w in &mut self.waypoints {
            w.reached = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENT: &str = r#"{
        "name": "Spring rally",
        "starts_at": "2025-05-10T09:00:00+02:00",
        "ends_at": "2025-05-10T13:00:00+02:00",
        "teams": ["Otters", "Falcons"],
        "route": [
            {"order": 1, "name": "Gate", "lat": 40.4168, "lon": -3.7038},
            {"order": 2, "name": "Fountain", "lat": 40.4180, "lon": -3.7038},
            {"order": 5, "name": "Oak", "lat": 40.4195, "lon": -3.7038}
        ]
    }"#;

    fn wp(order: u32) -> WaypointCfg {
        WaypointCfg { order, name: format!("W{order}"), lat: 40.0, lon: -3.0 }
    }

    #[test]
    fn loads_event_json() {
        let ev = EventConfig::from_json(EVENT).unwrap();
        assert_eq!(ev.teams.len(), 2);
        assert!(ev.starts_at < ev.ends_at);
        let route = Route::new(&ev.route).unwrap();
        assert_eq!(route.len(), 3);
        assert_eq!(route.last().unwrap().name, "Oak");
        assert!(route.iter().all(|w| !w.reached));
    }

    #[test]
    fn rejects_empty_route() {
        assert_eq!(Route::new(&[]), Err(NavError::EmptyRoute));
    }

    #[test]
    fn rejects_unordered_route() {
        let err = Route::new(&[wp(1), wp(3), wp(3)]).unwrap_err();
        assert_eq!(err, NavError::UnorderedRoute { prev: 3, next: 3 });
        assert!(Route::new(&[wp(2), wp(1)]).is_err());
    }

    #[test]
    fn rejects_malformed_json() {
        assert!(EventConfig::from_json("{\"name\": \"x\"}").is_err());
    }
}
