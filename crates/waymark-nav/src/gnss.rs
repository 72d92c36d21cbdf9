use std::time::Duration;

use anyhow::Result;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Instant;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, warn};

use crate::error::NavError;
use crate::geo::{normalize_deg, Coordinate};

const KNOTS_TO_MPS: f64 = 0.514_444;
/// Upper bound on the pause between replayed fixes.
const MAX_REPLAY_GAP: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub struct LocationFix {
    pub coord: Coordinate,
    /// Course over ground reported by the receiver.
    pub heading_deg: Option<f64>,
    pub speed_mps: Option<f64>,
    pub accuracy_m: Option<f64>,
    pub ts: OffsetDateTime,
}

impl LocationFix {
    pub fn new(coord: Coordinate, ts: OffsetDateTime) -> Self {
        Self { coord, heading_deg: None, speed_mps: None, accuracy_m: None, ts }
    }

    pub fn with_motion(mut self, heading_deg: f64, speed_mps: f64) -> Self {
        self.heading_deg = Some(heading_deg);
        self.speed_mps = Some(speed_mps);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reading {
    Fix(LocationFix),
    /// True heading of the device, from HDT.
    Heading(f64),
}

enum Input {
    Serial(BufReader<SerialStream>),
    File(BufReader<File>),
}

/// NMEA reader. `next_reading` keeps its partial line and any paced-out
/// reading on `self`, so dropping the future (a timeout, a `select!`) loses
/// nothing.
pub struct GnssSource {
    input: Input,
    parser: NmeaParser,
    line: Vec<u8>,
    held: Option<(Reading, Instant)>,
    last_replayed: Option<OffsetDateTime>,
}

impl GnssSource {
    pub fn serial(dev: &str, baud: u32) -> Result<Self, NavError> {
        let port = tokio_serial::new(dev, baud).open_native_async().map_err(|e| {
            warn!("gnss: open serial {} failed: {}", dev, e);
            match e.kind {
                tokio_serial::ErrorKind::Io(std::io::ErrorKind::PermissionDenied) => NavError::SensorPermissionDenied,
                _ => NavError::SensorUnavailable,
            }
        })?;
        Ok(Self::from_input(Input::Serial(BufReader::new(port))))
    }

    /// Replays a recorded NMEA log, paced by the fix timestamps.
    pub fn file(path: &str) -> Result<Self, NavError> {
        let f = std::fs::File::open(path).map_err(|e| {
            warn!("gnss: open nmea file {} failed: {}", path, e);
            io_error_to_nav(&e)
        })?;
        Ok(Self::from_input(Input::File(BufReader::new(File::from_std(f)))))
    }

    fn from_input(input: Input) -> Self {
        Self { input, parser: NmeaParser::default(), line: Vec::new(), held: None, last_replayed: None }
    }

    /// Next parsed reading. `Ok(None)` means the replay file is exhausted.
    pub async fn next_reading(&mut self) -> Result<Option<Reading>> {
        loop {
            if let Some(due) = self.held.as_ref().map(|(_, due)| *due) {
                tokio::time::sleep_until(due).await;
                return Ok(self.held.take().map(|(reading, _)| reading));
            }

            let n = match &mut self.input {
                Input::Serial(r) => r.read_until(b'\n', &mut self.line).await?,
                Input::File(r) => r.read_until(b'\n', &mut self.line).await?,
            };
            if n == 0 && self.line.is_empty() {
                if let Input::File(_) = self.input {
                    debug!("gnss: end of replay file");
                    return Ok(None);
                }
                continue;
            }
            let line = String::from_utf8_lossy(&self.line).trim().to_owned();
            self.line.clear();
            let Some(reading) = self.parser.parse_line(&line) else { continue };

            let mut due = Instant::now();
            if let (Input::File(_), Reading::Fix(fix)) = (&self.input, &reading) {
                if let Some(prev) = self.last_replayed {
                    let gap = (fix.ts - prev).clamp(time::Duration::ZERO, time::Duration::try_from(MAX_REPLAY_GAP)?);
                    due += Duration::try_from(gap)?;
                }
                self.last_replayed = Some(fix.ts);
            }
            self.held = Some((reading, due));
        }
    }
}

pub(crate) fn io_error_to_nav(e: &std::io::Error) -> NavError {
    match e.kind() {
        std::io::ErrorKind::PermissionDenied => NavError::SensorPermissionDenied,
        _ => NavError::SensorUnavailable,
    }
}

/// Line-oriented NMEA 0183 decoder.
///
/// - RMC: position, speed and course over ground, UTC date/time
/// - GST: position error estimate, attached to subsequent fixes
/// - HDT: true heading
///
/// Sentences with a checksum that does not match are dropped.
#[derive(Debug, Default)]
pub struct NmeaParser {
    accuracy_m: Option<f64>,
}

impl NmeaParser {
    pub fn parse_line(&mut self, s: &str) -> Option<Reading> {
        let body = match s.strip_prefix('$')?.split_once('*') {
            Some((body, sum)) => {
                if u8::from_str_radix(sum.trim(), 16).ok()? != checksum(body) {
                    debug!("gnss: checksum mismatch: {}", s);
                    return None;
                }
                body
            }
            None => s.strip_prefix('$')?,
        };
        let parts: Vec<&str> = body.split(',').collect();
        match parts[0].get(2..)? {
            "RMC" => self.parse_rmc(&parts),
            "GST" => {
                if parts.len() > 7 {
                    let lat_sd: Option<f64> = parts[6].parse().ok();
                    let lon_sd: Option<f64> = parts[7].parse().ok();
                    self.accuracy_m = match (lat_sd, lon_sd) {
                        (Some(a), Some(b)) => Some(a.hypot(b)),
                        _ => None,
                    };
                }
                None
            }
            "HDT" => parts.get(1)?.parse::<f64>().ok().map(|h| Reading::Heading(normalize_deg(h))),
            _ => None,
        }
    }

    fn parse_rmc(&self, parts: &[&str]) -> Option<Reading> {
        if parts.len() < 10 {
            return None;
        }
        // V = receiver warning, no usable fix yet
        if parts[2] != "A" {
            return None;
        }
        let lat = parse_deg_min(parts[3], parts[4])?;
        let lon = parse_deg_min(parts[5], parts[6])?;
        let coord = Coordinate::new(lat, lon);
        if !coord.is_valid() {
            return None;
        }
        let ts = parse_utc(parts[1], parts[9]).unwrap_or_else(OffsetDateTime::now_utc);

        Some(Reading::Fix(LocationFix {
            coord,
            heading_deg: parts[8].parse().ok(),
            speed_mps: parts[7].parse::<f64>().ok().map(|kn| kn * KNOTS_TO_MPS),
            accuracy_m: self.accuracy_m,
            ts,
        }))
    }
}

fn checksum(body: &str) -> u8 {
    body.bytes().fold(0, |acc, b| acc ^ b)
}

fn parse_deg_min(v: &str, hemi: &str) -> Option<f64> {
    if v.is_empty() { return None; }
    // lat: ddmm.mmmm, lon: dddmm.mmmm
    let dot = v.find('.').unwrap_or(v.len());
    let deg_len = if dot > 4 { 3 } else { 2 };
    let deg: f64 = v.get(..deg_len)?.parse().ok()?;
    let min: f64 = v.get(deg_len..)?.parse().ok()?;
    let mut out = deg + (min / 60.0);
    if hemi == "S" || hemi == "W" { out = -out; }
    Some(out)
}

// time: hhmmss[.sss], date: ddmmyy
fn parse_utc(t: &str, d: &str) -> Option<OffsetDateTime> {
    let hour: u8 = t.get(0..2)?.parse().ok()?;
    let minute: u8 = t.get(2..4)?.parse().ok()?;
    let secs: f64 = t.get(4..)?.parse().ok()?;
    let day: u8 = d.get(0..2)?.parse().ok()?;
    let month: u8 = d.get(2..4)?.parse().ok()?;
    let year: i32 = d.get(4..6)?.parse().ok()?;

    let date = Date::from_calendar_date(2000 + year, Month::try_from(month).ok()?, day).ok()?;
    let millis = ((secs.fract() * 1000.0).round() as u16).min(999);
    let time = Time::from_hms_milli(hour, minute, secs.trunc() as u8, millis).ok()?;
    Some(PrimitiveDateTime::new(date, time).assume_utc())
}
