//! Configuration for the coordination engines

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Main configuration for a party session
///
/// The defaults reproduce the tuning the protocol was designed around:
/// 5 s presence heartbeats filtered through a 10 s liveness window, a
/// 500 ms feedback-loop guard on playback reconciliation, and a speaking
/// threshold of 10 on the 0-255 magnitude scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartyConfig {
    /// Interval between voice-participant heartbeat upserts
    pub presence_heartbeat: Duration,

    /// Liveness window: participants whose last ping is older than this
    /// are excluded from the active set regardless of their `active` flag
    pub presence_window: Duration,

    /// Suppression window around each playback reconciliation, during
    /// which locally generated player events must not be written back
    pub sync_guard: Duration,

    /// Interval between room `lastActive` pings
    pub room_activity_interval: Duration,

    /// Sampling cadence of the audio level monitors
    pub level_poll_interval: Duration,

    /// Mean frequency-domain magnitude (0-255) above which a stream
    /// counts as speaking
    pub speaking_threshold: u8,

    /// Number of frequency bins sampled per tick
    pub frequency_bins: usize,

    /// ICE configuration handed to the peer connector
    pub ice: IceConfig,
}

/// ICE server configuration for the platform peer connector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceConfig {
    /// STUN server URLs (at least one required)
    pub stun_servers: Vec<String>,
}

impl Default for PartyConfig {
    fn default() -> Self {
        Self {
            presence_heartbeat: Duration::from_secs(5),
            presence_window: Duration::from_secs(10),
            sync_guard: Duration::from_millis(500),
            room_activity_interval: Duration::from_secs(60),
            level_poll_interval: Duration::from_millis(16),
            speaking_threshold: 10,
            frequency_bins: 128,
            ice: IceConfig::default(),
        }
    }
}

impl Default for IceConfig {
    fn default() -> Self {
        Self {
            stun_servers: vec![
                "stun:stun.l.google.com:19302".to_string(),
                "stun:stun1.l.google.com:19302".to_string(),
            ],
        }
    }
}

impl PartyConfig {
    /// Validate configuration parameters
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `presence_window` is not longer than `presence_heartbeat`
    /// - `frequency_bins` is zero
    /// - `level_poll_interval` or `sync_guard` is zero
    /// - `ice.stun_servers` is empty
    pub fn validate(&self) -> crate::Result<()> {
        use crate::Error;

        if self.presence_window <= self.presence_heartbeat {
            return Err(Error::InvalidConfig(format!(
                "presence_window ({:?}) must be longer than presence_heartbeat ({:?})",
                self.presence_window, self.presence_heartbeat
            )));
        }

        if self.frequency_bins == 0 {
            return Err(Error::InvalidConfig(
                "frequency_bins must be non-zero".to_string(),
            ));
        }

        if self.level_poll_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "level_poll_interval must be non-zero".to_string(),
            ));
        }

        if self.sync_guard.is_zero() {
            return Err(Error::InvalidConfig(
                "sync_guard must be non-zero".to_string(),
            ));
        }

        if self.ice.stun_servers.is_empty() {
            return Err(Error::InvalidConfig(
                "At least one STUN server is required".to_string(),
            ));
        }

        Ok(())
    }

    /// Replace the STUN server list
    ///
    /// Useful for chaining on `PartyConfig::default()`.
    pub fn with_stun_servers(mut self, stun_servers: Vec<String>) -> Self {
        self.ice.stun_servers = stun_servers;
        self
    }

    /// Set the speaking threshold
    pub fn with_speaking_threshold(mut self, threshold: u8) -> Self {
        self.speaking_threshold = threshold;
        self
    }

    /// Set the presence heartbeat interval and liveness window together
    pub fn with_presence_timing(mut self, heartbeat: Duration, window: Duration) -> Self {
        self.presence_heartbeat = heartbeat;
        self.presence_window = window;
        self
    }
}
