use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

mod anchor;

pub use anchor::*;

use crate::Track;

/// The currently selected track of a playlist and its anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct NowPlaying {
    pub index: usize,
    pub track: Track,
    pub anchor: Anchor,
}

/// A host issued scrub, pause or resume.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackChange {
    pub position: Option<Duration>,
    pub is_playing: Option<bool>,
}

/// What happened to the playback when a track was removed from the playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// The playing track was removed and playback was re-anchored at the same index
    Current,
    /// A track before the playing one was removed, the index moved with it
    BeforeCurrent,
    /// The playing track is unaffected
    Unaffected,
}

/// The playlist of a room and the single authoritative "now playing" state derived from it.
///
/// "Nothing selected" is represented by `now_playing` being [None], which is what an index of -1
/// means on the wire. Every transition takes the current instant so it can be driven by any clock.
#[derive(Debug, Clone, Default)]
pub struct Playback {
    playlist: Vec<Track>,
    now_playing: Option<NowPlaying>,
}

impl Playback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn playlist(&self) -> &[Track] {
        &self.playlist
    }

    pub fn now_playing(&self) -> Option<&NowPlaying> {
        self.now_playing.as_ref()
    }

    pub fn now_playing_index(&self) -> Option<usize> {
        self.now_playing.as_ref().map(|n| n.index)
    }

    /// Returns true if a track is selected and its anchor is running.
    pub fn is_playing(&self) -> bool {
        self.now_playing
            .as_ref()
            .map(|n| n.anchor.is_playing())
            .unwrap_or(false)
    }

    /// Returns the authoritative snapshot at the given instant, or [None] if nothing is selected.
    ///
    /// This has no side effects and can be called at any time.
    pub fn snapshot_at(&self, now: Instant, timestamp: DateTime<Utc>) -> Option<Snapshot> {
        self.now_playing.as_ref().map(|n| Snapshot {
            track: n.track.clone(),
            is_playing: n.anchor.is_playing(),
            position: n.anchor.position_at(now),
            now_playing_index: n.index,
            server_timestamp: timestamp,
        })
    }

    /// Returns the authoritative snapshot right now.
    pub fn snapshot(&self) -> Option<Snapshot> {
        self.snapshot_at(Instant::now(), Utc::now())
    }

    /// Starts the track at `index` from the beginning.
    ///
    /// An index outside the playlist clears the selection, the queue is then exhausted.
    pub fn play_track_at_index(&mut self, index: usize, now: Instant) -> Option<&NowPlaying> {
        self.now_playing = self.playlist.get(index).map(|track| NowPlaying {
            index,
            track: track.clone(),
            anchor: Anchor::start(now),
        });

        self.now_playing.as_ref()
    }

    /// Plays the track after the current one. With nothing selected this starts at the first track.
    pub fn play_next(&mut self, now: Instant) -> Option<&NowPlaying> {
        let next = self.now_playing_index().map(|i| i + 1).unwrap_or(0);
        self.play_track_at_index(next, now)
    }

    /// Plays the track before the current one.
    /// Returns false and leaves everything as is if there is no previous track.
    pub fn play_previous(&mut self, now: Instant) -> bool {
        let previous = self
            .now_playing_index()
            .and_then(|index| index.checked_sub(1));

        match previous {
            Some(index) => {
                self.play_track_at_index(index, now);
                true
            }
            None => false,
        }
    }

    /// Clears the selection.
    pub fn stop(&mut self) {
        self.now_playing = None;
    }

    /// Applies a host scrub, pause or resume.
    /// Returns false if there is nothing selected to apply it to.
    pub fn apply_change(&mut self, change: PlaybackChange, now: Instant) -> bool {
        let Some(now_playing) = self.now_playing.as_mut() else {
            return false;
        };

        match (change.position, change.is_playing) {
            (Some(position), _) => now_playing.anchor.seek(position, now),
            (None, Some(true)) => now_playing.anchor.resume(now),
            (None, Some(false)) => now_playing.anchor.pause(now),
            (None, None) => {}
        }

        true
    }

    /// Returns how long until the current track ends, if it is playing.
    pub fn remaining_at(&self, now: Instant) -> Option<Duration> {
        self.now_playing
            .as_ref()
            .filter(|n| n.anchor.is_playing())
            .map(|n| n.track.duration.saturating_sub(n.anchor.position_at(now)))
    }

    /// Appends tracks to the playlist and returns the index of the first one.
    pub fn push(&mut self, tracks: impl IntoIterator<Item = Track>) -> usize {
        let first_index = self.playlist.len();
        self.playlist.extend(tracks);

        first_index
    }

    /// Removes the track at `index` while keeping the selection pointed at the same logical track.
    ///
    /// Removing the selected track re-anchors playback at the same index, which now holds the
    /// following track, or exhausts the queue if there is none.
    pub fn remove(&mut self, index: usize, now: Instant) -> Option<(Track, Removal)> {
        if index >= self.playlist.len() {
            return None;
        }

        let track = self.playlist.remove(index);

        let removal = match self.now_playing.as_mut() {
            Some(n) if n.index == index => Removal::Current,
            Some(n) if n.index > index => {
                n.index -= 1;
                Removal::BeforeCurrent
            }
            _ => Removal::Unaffected,
        };

        if removal == Removal::Current {
            self.play_track_at_index(index, now);
        }

        Some((track, removal))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::TrackSource;

    pub fn track(id: &str, seconds: u64) -> Track {
        Track {
            id: id.to_string(),
            title: format!("Track {}", id),
            artist: "Artist".to_string(),
            artwork: None,
            duration: Duration::from_secs(seconds),
            locator: format!("https://youtube.com/watch?v={}", id),
            source: TrackSource::YouTube,
        }
    }

    fn playback_with(count: usize) -> Playback {
        let mut playback = Playback::new();
        playback.push((0..count).map(|i| track(&i.to_string(), 180)));
        playback
    }

    fn assert_index_invariant(playback: &Playback) {
        match playback.now_playing() {
            Some(n) => assert!(n.index < playback.playlist().len()),
            None => assert_eq!(playback.now_playing_index(), None),
        }
    }

    #[test]
    fn test_play_starts_at_zero() {
        let now = Instant::now();
        let mut playback = playback_with(3);

        playback.play_track_at_index(1, now);
        let snapshot = playback.snapshot_at(now, Utc::now()).unwrap();

        assert_eq!(snapshot.position, Duration::ZERO);
        assert_eq!(snapshot.now_playing_index, 1);
        assert_eq!(snapshot.track.id, "1");
        assert!(snapshot.is_playing);
        assert_index_invariant(&playback);
    }

    #[test]
    fn test_snapshot_is_pure_and_monotonic() {
        let t0 = Instant::now();
        let mut playback = playback_with(1);
        playback.play_track_at_index(0, t0);

        let at = t0 + Duration::from_millis(1234);
        let first = playback.snapshot_at(at, Utc::now()).unwrap();
        let second = playback.snapshot_at(at, Utc::now()).unwrap();
        let later = playback
            .snapshot_at(at + Duration::from_millis(10), Utc::now())
            .unwrap();

        assert_eq!(first.position, second.position);
        assert!(later.position >= first.position);
    }

    #[test]
    fn test_out_of_range_exhausts_queue() {
        let now = Instant::now();
        let mut playback = playback_with(2);
        playback.play_track_at_index(1, now);

        assert!(playback.play_next(now).is_none());
        assert!(playback.snapshot().is_none());
        assert!(!playback.is_playing());
        assert_index_invariant(&playback);
    }

    #[test]
    fn test_next_from_nothing_starts_at_first() {
        let now = Instant::now();
        let mut playback = playback_with(2);

        assert_eq!(playback.play_next(now).map(|n| n.index), Some(0));
    }

    #[test]
    fn test_previous_only_acts_with_a_previous_track() {
        let now = Instant::now();
        let mut playback = playback_with(3);

        assert!(!playback.play_previous(now));

        playback.play_track_at_index(0, now);
        assert!(!playback.play_previous(now));
        assert_eq!(playback.now_playing_index(), Some(0));

        playback.play_track_at_index(2, now);
        assert!(playback.play_previous(now));
        assert_eq!(playback.now_playing_index(), Some(1));
    }

    #[test]
    fn test_pause_then_resume_keeps_position() {
        let t0 = Instant::now();
        let mut playback = playback_with(1);
        playback.play_track_at_index(0, t0);

        let paused_at = t0 + Duration::from_secs(10);
        playback.apply_change(
            PlaybackChange {
                is_playing: Some(false),
                ..Default::default()
            },
            paused_at,
        );

        let resumed_at = paused_at + Duration::from_secs(1);
        playback.apply_change(
            PlaybackChange {
                is_playing: Some(true),
                ..Default::default()
            },
            resumed_at,
        );

        let snapshot = playback.snapshot_at(resumed_at, Utc::now()).unwrap();
        assert_eq!(snapshot.position, Duration::from_secs(10));
        assert!(snapshot.is_playing);
    }

    #[test]
    fn test_paused_has_no_remaining_time() {
        let t0 = Instant::now();
        let mut playback = playback_with(1);
        playback.play_track_at_index(0, t0);

        playback.apply_change(
            PlaybackChange {
                is_playing: Some(false),
                ..Default::default()
            },
            t0,
        );

        assert_eq!(playback.remaining_at(t0), None);
    }

    #[test]
    fn test_scrub_measures_remaining_from_scrub_instant() {
        let t0 = Instant::now();
        let mut playback = playback_with(1);
        playback.play_track_at_index(0, t0);

        let scrubbed_at = t0 + Duration::from_secs(100);
        playback.apply_change(
            PlaybackChange {
                position: Some(Duration::from_secs(30)),
                is_playing: None,
            },
            scrubbed_at,
        );

        assert_eq!(
            playback.remaining_at(scrubbed_at),
            Some(Duration::from_secs(150))
        );
    }

    #[test]
    fn test_change_without_selection_is_rejected() {
        let mut playback = playback_with(1);

        assert!(!playback.apply_change(PlaybackChange::default(), Instant::now()));
    }

    #[test]
    fn test_removing_current_promotes_following_track() {
        let now = Instant::now();
        let mut playback = playback_with(5);
        playback.play_track_at_index(2, now);

        let (removed, removal) = playback.remove(2, now).unwrap();

        assert_eq!(removed.id, "2");
        assert_eq!(removal, Removal::Current);
        assert_eq!(playback.now_playing_index(), Some(2));
        assert_eq!(playback.now_playing().unwrap().track.id, "3");
        assert_index_invariant(&playback);
    }

    #[test]
    fn test_removing_last_current_exhausts() {
        let now = Instant::now();
        let mut playback = playback_with(2);
        playback.play_track_at_index(1, now);

        playback.remove(1, now);

        assert!(playback.now_playing().is_none());
        assert_index_invariant(&playback);
    }

    #[test]
    fn test_removing_before_current_keeps_logical_track() {
        let now = Instant::now();
        let mut playback = playback_with(5);
        playback.play_track_at_index(3, now);

        let (_, removal) = playback.remove(0, now).unwrap();

        assert_eq!(removal, Removal::BeforeCurrent);
        assert_eq!(playback.now_playing_index(), Some(2));
        assert_eq!(playback.now_playing().unwrap().track.id, "3");
    }

    #[test]
    fn test_removing_out_of_bounds_does_nothing() {
        let now = Instant::now();
        let mut playback = playback_with(2);

        assert!(playback.remove(2, now).is_none());
        assert_eq!(playback.playlist().len(), 2);
    }
}
