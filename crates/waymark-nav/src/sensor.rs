use std::time::Duration;

use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::NavError;
use crate::gnss::{GnssSource, LocationFix, Reading};

/// Normalized sample handed to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorEvent {
    Fix(LocationFix),
    /// Compass heading of the device, degrees.
    Orientation(f64),
    Error(NavError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct GnssConfig {
    /// "nmea-serial" or "nmea-file"
    pub source: String,
    pub nmea_device: Option<String>,
    pub nmea_file: Option<String>,
    #[serde(default = "default_baud")]
    pub baud: u32,
    /// No fix within this window is reported as a timeout.
    #[serde(default = "default_fix_timeout_s")]
    pub fix_timeout_s: u64,
}

fn default_baud() -> u32 {
    9600
}

fn default_fix_timeout_s() -> u64 {
    20
}

impl GnssConfig {
    fn open(&self) -> Result<GnssSource, NavError> {
        match self.source.as_str() {
            "nmea-serial" => {
                let dev = self.nmea_device.as_deref().ok_or(NavError::SensorUnavailable)?;
                GnssSource::serial(dev, self.baud)
            }
            "nmea-file" => {
                let path = self.nmea_file.as_deref().ok_or(NavError::SensorUnavailable)?;
                GnssSource::file(path)
            }
            other => {
                warn!("sensor: unknown gnss.source {}", other);
                Err(NavError::SensorUnsupported)
            }
        }
    }
}

const CHANNEL_DEPTH: usize = 32;

/// Owns the background reader feeding `SensorEvent`s to one consumer.
#[derive(Default)]
pub struct SensorSession {
    task: Option<JoinHandle<()>>,
}

impl SensorSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Starts reading from the configured source. A running reader is
    /// stopped first. Failures to open are delivered as `SensorEvent::Error`.
    pub fn start(&mut self, cfg: &GnssConfig) -> mpsc::Receiver<SensorEvent> {
        self.stop();
        let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
        let cfg = cfg.clone();
        self.task = Some(tokio::spawn(async move {
            match cfg.open() {
                Ok(src) => pump(src, Duration::from_secs(cfg.fix_timeout_s.max(1)), tx).await,
                Err(e) => {
                    let _ = tx.send(SensorEvent::Error(e)).await;
                }
            }
        }));
        info!("sensor: session started");
        rx
    }

    /// Idempotent.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("sensor: session stopped");
        }
    }
}

impl Drop for SensorSession {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn pump(mut src: GnssSource, fix_timeout: Duration, tx: mpsc::Sender<SensorEvent>) {
    let mut waited = Duration::ZERO;
    loop {
        let started = tokio::time::Instant::now();
        let reading = match tokio::time::timeout(fix_timeout.saturating_sub(waited), src.next_reading()).await {
            Ok(Ok(Some(r))) => r,
            Ok(Ok(None)) => {
                info!("sensor: replay finished");
                return;
            }
            Ok(Err(e)) => {
                warn!("sensor: read failed: {:#}", e);
                let _ = tx.send(SensorEvent::Error(NavError::SensorUnavailable)).await;
                return;
            }
            Err(_) => {
                waited = Duration::ZERO;
                if tx.send(SensorEvent::Error(NavError::SensorTimeout)).await.is_err() {
                    return;
                }
                continue;
            }
        };

        let event = match reading {
            Reading::Fix(fix) => {
                waited = Duration::ZERO;
                SensorEvent::Fix(fix)
            }
            Reading::Heading(h) => {
                // headings do not reset the fix timeout
                waited += started.elapsed();
                SensorEvent::Orientation(h)
            }
        };
        if tx.send(event).await.is_err() {
            return;
        }
    }
}
