use time::macros::datetime;
use time::{Duration, OffsetDateTime};

use waymark_nav::geo::{destination, Coordinate};
use waymark_nav::gnss::LocationFix;
use waymark_nav::nav::ConfirmationTicket;
use waymark_nav::route::EventConfig;
use waymark_nav::{NavEngine, NavParams, Progress};
use waymark_proto::{Cue, StatusClass};

const EVENT: &str = r#"{
    "name": "Old town walk",
    "starts_at": "2025-05-10T09:00:00Z",
    "ends_at": "2025-05-10T12:00:00Z",
    "teams": ["Otters", "Falcons"],
    "route": [
        {"order": 1, "name": "Town hall", "lat": 40.4168, "lon": -3.7038},
        {"order": 2, "name": "Market",    "lat": 40.4186, "lon": -3.7036},
        {"order": 3, "name": "Cathedral", "lat": 40.4204, "lon": -3.7034}
    ]
}"#;

const T0: OffsetDateTime = datetime!(2025-05-10 09:05:00 UTC);

struct Walk {
    engine: NavEngine,
    clock: i64,
    cues: Vec<Cue>,
    pending: Option<ConfirmationTicket>,
    max_index: usize,
}

impl Walk {
    fn new() -> Self {
        let event = EventConfig::from_json(EVENT).unwrap();
        let mut engine = NavEngine::from_event(Some(&event), NavParams::default());
        engine.start().unwrap();
        Self { engine, clock: 0, cues: Vec::new(), pending: None, max_index: 0 }
    }

    fn waypoint(&self, index: usize) -> Coordinate {
        self.engine.route().get(index).unwrap().coord
    }

    fn step_to(&mut self, c: Coordinate) {
        self.clock += 3;
        let out = self.engine.on_fix(&LocationFix::new(c, T0 + Duration::seconds(self.clock)));
        self.cues.extend(out.cues);
        if out.schedule.is_some() {
            self.pending = out.schedule;
        }
        self.track_index();
    }

    /// One second of standing still: the confirmation timer fires.
    fn wait(&mut self) {
        if let Some(t) = self.pending.take() {
            let out = self.engine.confirm(t);
            self.cues.extend(out.cues);
            if out.schedule.is_some() {
                self.pending = out.schedule;
            }
        }
        self.track_index();
    }

    fn track_index(&mut self) {
        let idx = self.engine.current_index();
        assert!(idx >= self.max_index, "index went backwards: {} -> {}", self.max_index, idx);
        self.max_index = idx;
    }
}

#[test]
fn three_waypoint_route_end_to_end() {
    let mut walk = Walk::new();

    for index in 0..3 {
        let wp = walk.waypoint(index);
        // approach from the south
        walk.step_to(destination(&wp, 180.0, 60.0));
        walk.step_to(destination(&wp, 180.0, 30.0));
        walk.step_to(destination(&wp, 180.0, 10.0));
        walk.step_to(destination(&wp, 180.0, 8.0));
        walk.wait();
    }

    let e = &walk.engine;
    assert_eq!(e.progress(), Progress::Complete);
    let names: Vec<_> = e.visited().map(|w| w.name.as_str()).collect();
    assert_eq!(names, ["Town hall", "Market", "Cathedral"]);

    let snap = e.snapshot();
    assert_eq!(snap.status, "Congratulations, you have completed the route!");
    assert_eq!(snap.status_class, StatusClass::InRoute);
    assert!(snap.target.is_none());
    assert_eq!(snap.distance_m, None);

    // the start line is silent
    assert_eq!(walk.cues.iter().filter(|c| **c == Cue::WaypointReached).count(), 2);
}

#[test]
fn detour_triggers_single_off_route_cue() {
    let mut walk = Walk::new();
    let start = walk.waypoint(0);
    walk.step_to(start);
    walk.wait();
    assert_eq!(walk.engine.progress(), Progress::Tracking(1));

    let mid = destination(&start, 0.0, 100.0);
    walk.step_to(mid);
    assert!(walk.engine.in_corridor());

    walk.step_to(destination(&mid, 270.0, 60.0));
    walk.step_to(destination(&mid, 270.0, 120.0));
    assert_eq!(walk.engine.snapshot().status_class, StatusClass::OffRoute);
    walk.step_to(destination(&mid, 270.0, 80.0));
    assert_eq!(walk.engine.snapshot().status_class, StatusClass::Warning);

    assert_eq!(walk.cues, vec![Cue::OffRoute]);
}

#[test]
fn single_waypoint_route_end_to_end() {
    let event = EventConfig::from_json(
        r#"{
            "name": "Meet point",
            "starts_at": "2025-05-10T09:00:00Z",
            "ends_at": "2025-05-10T10:00:00Z",
            "teams": ["Otters"],
            "route": [{"order": 1, "name": "Fountain", "lat": 40.4168, "lon": -3.7038}]
        }"#,
    )
    .unwrap();
    let mut engine = NavEngine::from_event(Some(&event), NavParams::default());
    engine.start().unwrap();
    let fountain = engine.route().get(0).unwrap().coord;
    let at = |secs: i64, c: Coordinate| LocationFix::new(c, T0 + Duration::seconds(secs));

    engine.on_fix(&at(0, destination(&fountain, 90.0, 500.0)));
    let snap = engine.snapshot();
    assert_eq!(snap.status_class, StatusClass::OffRoute);
    assert!(!snap.in_corridor);

    engine.on_fix(&at(60, destination(&fountain, 90.0, 50.0)));
    assert_eq!(engine.snapshot().status_class, StatusClass::Warning);

    let out = engine.on_fix(&at(120, destination(&fountain, 90.0, 4.0)));
    let done = engine.confirm(out.schedule.unwrap());
    assert!(done.completed);
    assert!(done.cues.is_empty());
    assert_eq!(engine.progress(), Progress::Complete);
    assert_eq!(engine.visited().map(|w| w.name.as_str()).collect::<Vec<_>>(), ["Fountain"]);
}
