use crate::geo::{distance_to_segment_m, Coordinate};
use crate::route::Route;

/// Band of fixed width around the straight line from the first to the last
/// waypoint. A coarse off-route detector; it ignores the shape of the legs.
#[derive(Debug, Clone, PartialEq)]
pub struct Corridor {
    start: Coordinate,
    end: Coordinate,
    width_m: f64,
}

impl Corridor {
    /// `None` for routes with fewer than two waypoints.
    pub fn from_route(route: &Route, width_m: f64) -> Option<Self> {
        if route.len() < 2 {
            return None;
        }
        let start = route.first()?.coord;
        let end = route.last()?.coord;
        Some(Self { start, end, width_m })
    }

    pub fn half_width_m(&self) -> f64 {
        self.width_m / 2.0
    }

    /// Distance from `p` to the corridor's center line.
    pub fn offset_m(&self, p: &Coordinate) -> f64 {
        distance_to_segment_m(p, &self.start, &self.end)
    }

    pub fn contains(&self, p: &Coordinate) -> bool {
        self.offset_m(p) <= self.half_width_m()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::destination;
    use crate::route::WaypointCfg;

    fn route_north(legs: usize) -> Route {
        let origin = Coordinate::new(40.4168, -3.7038);
        let cfg: Vec<WaypointCfg> = (0..=legs)
            .map(|i| {
                let c = destination(&origin, 0.0, 200.0 * i as f64);
                WaypointCfg { order: i as u32 + 1, name: format!("P{}", i + 1), lat: c.lat, lon: c.lon }
            })
            .collect();
        Route::new(&cfg).unwrap()
    }

    #[test]
    fn inside_and_outside() {
        let route = route_north(2);
        let c = Corridor::from_route(&route, 40.0).unwrap();
        let mid = destination(&route.first().unwrap().coord, 0.0, 150.0);

        assert!(c.contains(&mid));
        assert!(c.contains(&destination(&mid, 90.0, 19.0)));
        assert!(!c.contains(&destination(&mid, 270.0, 21.0)));
    }

    #[test]
    fn beyond_the_end_is_measured_to_the_endpoint() {
        let route = route_north(1);
        let c = Corridor::from_route(&route, 40.0).unwrap();
        let past = destination(&route.last().unwrap().coord, 0.0, 30.0);
        assert!((c.offset_m(&past) - 30.0).abs() < 0.5);
        assert!(!c.contains(&past));
    }

    #[test]
    fn single_waypoint_has_no_corridor() {
        let route = route_north(0);
        assert!(Corridor::from_route(&route, 40.0).is_none());
    }
}
