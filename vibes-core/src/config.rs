use std::{env, str::FromStr, time::Duration};

use log::warn;

/// Timing and limits used by the room engine
#[derive(Debug, Clone)]
pub struct Config {
    /// Added to the remaining duration of a track before advancing, absorbs network and seek jitter
    pub track_end_slack: Duration,
    /// How often the authoritative position is broadcast while playing
    pub sync_interval: Duration,
    /// How long a disconnected listener is kept before leave processing
    pub reconnect_grace: Duration,
    /// How long an empty room is kept before it is deleted
    pub room_deletion_grace: Duration,
    /// Upper bound on a single track lookup
    pub resolve_timeout: Duration,
    /// Chat messages are truncated to this many characters
    pub max_message_length: usize,
}

impl Config {
    /// Returns the default config with any `VIBES_*` environment overrides applied.
    /// Durations are given in milliseconds.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            track_end_slack: duration_var("VIBES_TRACK_END_SLACK_MS", defaults.track_end_slack),
            sync_interval: duration_var("VIBES_SYNC_INTERVAL_MS", defaults.sync_interval),
            reconnect_grace: duration_var("VIBES_RECONNECT_GRACE_MS", defaults.reconnect_grace),
            room_deletion_grace: duration_var(
                "VIBES_ROOM_DELETION_GRACE_MS",
                defaults.room_deletion_grace,
            ),
            resolve_timeout: duration_var("VIBES_RESOLVE_TIMEOUT_MS", defaults.resolve_timeout),
            max_message_length: number_var("VIBES_MAX_MESSAGE_LENGTH", defaults.max_message_length),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            track_end_slack: Duration::from_millis(1500),
            sync_interval: Duration::from_millis(4000),
            reconnect_grace: Duration::from_secs(10),
            room_deletion_grace: Duration::from_secs(30),
            // yt-dlp can be slow on playlists
            resolve_timeout: Duration::from_secs(20),
            max_message_length: 500,
        }
    }
}

fn duration_var(name: &str, default: Duration) -> Duration {
    parse_var(name, "a number of milliseconds")
        .map(Duration::from_millis)
        .unwrap_or(default)
}

fn number_var(name: &str, default: usize) -> usize {
    parse_var(name, "a positive number").unwrap_or(default)
}

/// Reads and parses a variable, warning if it is set but unreadable.
fn parse_var<T: FromStr>(name: &str, expected: &str) -> Option<T> {
    let value = env::var(name).ok()?;

    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!("{} must be {}, got {:?}", name, expected, value);
            None
        }
    }
}
