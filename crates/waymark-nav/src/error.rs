use thiserror::Error;

/// Conditions the engine reports through its status channel.
///
/// Sensor variants are transient: navigation resumes with the next valid
/// fix. Route variants refuse `NavEngine::start` but never abort the host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavError {
    #[error("Location error: permission denied.")]
    SensorPermissionDenied,
    #[error("Location error: position unavailable.")]
    SensorUnavailable,
    #[error("Location error: timed out waiting for a fix.")]
    SensorTimeout,
    #[error("Location error: geolocation not supported.")]
    SensorUnsupported,
    #[error("Error: no route configured.")]
    NoRouteConfigured,
    #[error("Error: the route has no waypoints.")]
    EmptyRoute,
    #[error("Error: route order must be strictly increasing ({prev} is followed by {next}).")]
    UnorderedRoute { prev: u32, next: u32 },
}
