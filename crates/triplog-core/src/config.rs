//! Engine configuration.

use std::env;
use std::time::Duration;

/// Tunables for the recorder and the sync engine.
///
/// Defaults mirror the behavior of the production service; everything is
/// overridable for tests and constrained deployments.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Trip upload endpoint
    pub server_url: String,
    /// Upper bound on traces per upload payload
    pub batch_upload_count: usize,
    /// Consecutive failures after which the scheduler goes dormant
    pub failure_threshold: u32,
    /// Trips shorter than this are deleted instead of finalized (meters)
    pub min_trip_distance_m: f64,
    /// Trips shorter than this are deleted instead of finalized (ms)
    pub min_trip_duration_ms: i64,
    /// Inactivity signal threshold for a live trip (ms)
    pub inactive_threshold_ms: i64,
    /// Fixed transport timeout; requests are never retried at this level
    pub request_timeout: Duration,
    /// Bound on the recorder's trace channel
    pub channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            server_url: "https://api.triplog.io/updateTrip".to_string(),
            batch_upload_count: 5000,
            failure_threshold: 10,
            min_trip_distance_m: 500.0,
            min_trip_duration_ms: 60_000,
            inactive_threshold_ms: 300_000,
            request_timeout: Duration::from_secs(10),
            channel_capacity: 256,
        }
    }
}

impl EngineConfig {
    /// Defaults with the upload endpoint taken from `TRIPLOG_SERVER_URL`
    /// when set and non-empty.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(url) = env::var("TRIPLOG_SERVER_URL")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
        {
            config.server_url = url;
        }
        config
    }

    /// Override the upload endpoint.
    #[must_use]
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.batch_upload_count, 5000);
        assert_eq!(config.failure_threshold, 10);
        assert_eq!(config.min_trip_distance_m, 500.0);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_with_server_url() {
        let config = EngineConfig::default().with_server_url("http://localhost:8080/updateTrip");
        assert_eq!(config.server_url, "http://localhost:8080/updateTrip");
    }
}
