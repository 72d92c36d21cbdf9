pub mod snapshot;

pub use snapshot::{Cue, NavSnapshot, StatusClass, WaypointView};
