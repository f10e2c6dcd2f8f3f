use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::Track;

/// The triple the current playback position is derived from.
///
/// Instead of a counter that is updated on every tick, the anchor stores the instant playback
/// was last (re)started together with the position at that instant. The logical start time of
/// the track is `resumed_at - position`, so the elapsed position is always
/// `position + (now - resumed_at)` while playing, and the frozen `position` while paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    resumed_at: Instant,
    position: Duration,
    is_playing: bool,
}

impl Anchor {
    /// An anchor playing from the very start.
    pub fn start(now: Instant) -> Self {
        Self {
            resumed_at: now,
            position: Duration::ZERO,
            is_playing: true,
        }
    }

    /// Returns the playback position at the given instant.
    pub fn position_at(&self, now: Instant) -> Duration {
        if self.is_playing {
            self.position + now.saturating_duration_since(self.resumed_at)
        } else {
            self.position
        }
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    /// Moves the anchor to `position` and forces playback on.
    pub fn seek(&mut self, position: Duration, now: Instant) {
        self.position = position;
        self.resumed_at = now;
        self.is_playing = true;
    }

    /// Resumes from the frozen position. Does nothing if already playing.
    pub fn resume(&mut self, now: Instant) {
        if !self.is_playing {
            self.resumed_at = now;
            self.is_playing = true;
        }
    }

    /// Freezes the position at `now`. Does nothing if already paused.
    pub fn pause(&mut self, now: Instant) {
        if self.is_playing {
            self.position = self.position_at(now);
            self.is_playing = false;
        }
    }
}

/// The representation of "now playing" handed to clients.
///
/// Computed on demand from the anchor, never cached.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub track: Track,
    pub is_playing: bool,
    pub position: Duration,
    pub now_playing_index: usize,
    /// Wall clock time of the computation, lets clients estimate broadcast latency
    pub server_timestamp: DateTime<Utc>,
}
