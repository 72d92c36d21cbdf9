use anyhow::Result;
use tracing::warn;

use crate::geo::Coordinate;
use crate::nav::NavParams;
use crate::route::{EventConfig, Route};
use crate::sensor::GnssConfig;

pub fn check_event(event: &EventConfig) -> Result<()> {
    Route::new(&event.route)?;
    for w in &event.route {
        anyhow::ensure!(
            Coordinate::new(w.lat, w.lon).is_valid(),
            "waypoint {} ({}) has invalid coordinates",
            w.order,
            w.name
        );
    }
    anyhow::ensure!(event.starts_at < event.ends_at, "event ends before it starts");
    if event.teams.is_empty() {
        warn!("doctor: event has no teams configured");
    }
    if event.route.len() < 2 {
        warn!("doctor: single-waypoint route, no corridor to follow");
    }
    Ok(())
}

pub fn check_params(p: &NavParams) -> Result<()> {
    anyhow::ensure!(p.corridor_width_m > 0.0, "nav.corridor_width_m must be positive");
    anyhow::ensure!(p.proximity_m > 0.0, "nav.proximity_m must be positive");
    anyhow::ensure!(p.confirm_delay_ms >= 100 && p.confirm_delay_ms <= 10_000, "nav.confirm_delay_ms should be 100..10000");
    anyhow::ensure!(p.min_speed_for_course_mps >= 0.0, "nav.min_speed_for_course_mps must not be negative");
    anyhow::ensure!(p.min_distance_for_course_m >= 0.0, "nav.min_distance_for_course_m must not be negative");
    anyhow::ensure!(
        p.alignment_threshold_deg > 0.0 && p.alignment_threshold_deg <= 180.0,
        "nav.alignment_threshold_deg should be in (0, 180]"
    );
    anyhow::ensure!(p.far_off_route_factor >= 0.5, "nav.far_off_route_factor too small");
    Ok(())
}

pub fn check_gnss(cfg: &GnssConfig) -> Result<()> {
    match cfg.source.as_str() {
        "nmea-serial" => {
            anyhow::ensure!(cfg.nmea_device.as_ref().is_some_and(|d| !d.is_empty()), "gnss.nmea_device missing");
            anyhow::ensure!(cfg.baud > 0, "gnss.baud invalid");
        }
        "nmea-file" => {
            let path = cfg.nmea_file.as_deref().unwrap_or_default();
            anyhow::ensure!(std::path::Path::new(path).is_file(), "gnss.nmea_file {:?} not found", path);
        }
        other => anyhow::bail!("unknown gnss.source: {}", other),
    }
    anyhow::ensure!(cfg.fix_timeout_s >= 1 && cfg.fix_timeout_s <= 120, "gnss.fix_timeout_s should be 1..120");
    Ok(())
}
