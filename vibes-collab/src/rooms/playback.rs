use chrono::Utc;
use log::info;
use tokio::time::Instant;
use vibes_core::{PlaybackChange, TimerToken};

use crate::{CollabEvent, PrimaryKey};

use super::{Room, RoomState, TimerKind};

impl Room {
    /// Applies a host scrub, pause or resume and broadcasts the new position right away.
    pub fn change_playback(&self, user_id: PrimaryKey, change: PlaybackChange) {
        let mut state = self.state.lock();

        if !self.check_host(&state, user_id, "playback change") {
            return;
        }

        let now = Instant::now();

        if !state.playback.apply_change(change, now) {
            return;
        }

        self.reschedule(&mut state, now);

        if let Some(snapshot) = state.playback.snapshot() {
            self.emit(&state, CollabEvent::SyncPulse(snapshot));
        }
    }

    pub fn skip(&self, user_id: PrimaryKey) {
        let mut state = self.state.lock();

        if !self.check_host(&state, user_id, "skip") {
            return;
        }

        let now = Instant::now();
        state.playback.play_next(now);
        self.track_changed(&mut state, now);
    }

    /// Plays the previous track, if there is one.
    pub fn play_previous(&self, user_id: PrimaryKey) {
        let mut state = self.state.lock();

        if !self.check_host(&state, user_id, "previous track") {
            return;
        }

        let now = Instant::now();

        if state.playback.play_previous(now) {
            self.track_changed(&mut state, now);
        }
    }

    /// Plays the track at `index`. [None] or an index past the end clears the selection.
    pub fn play_track_at_index(&self, user_id: PrimaryKey, index: Option<usize>) {
        let mut state = self.state.lock();

        if !self.check_host(&state, user_id, "play at index") {
            return;
        }

        let now = Instant::now();

        match index {
            Some(index) => {
                state.playback.play_track_at_index(index, now);
            }
            None => state.playback.stop(),
        }

        self.track_changed(&mut state, now);
    }

    /// Starts playback at `index` if nothing is selected yet.
    pub(super) fn start_if_idle(&self, state: &mut RoomState, index: usize) {
        if state.playback.now_playing().is_some() {
            return;
        }

        let now = Instant::now();
        state.playback.play_track_at_index(index, now);
        self.track_changed(state, now);
    }

    /// Called after the selected track changed: restarts the timers and announces the new track.
    pub(super) fn track_changed(&self, state: &mut RoomState, now: Instant) {
        self.reschedule(state, now);

        match state.playback.now_playing() {
            Some(now_playing) => info!(
                "Room {} is now playing {} at index {}",
                self.name(),
                now_playing.track,
                now_playing.index
            ),
            None => info!("Room {} has nothing left to play", self.name()),
        }

        let snapshot = state.playback.snapshot_at(now, Utc::now());
        self.emit(state, CollabEvent::NewSongPlaying(snapshot));
    }

    /// Replaces the track end and sync timers to match the current playback.
    /// Nothing is scheduled while paused or with nothing selected.
    pub(super) fn reschedule(&self, state: &mut RoomState, now: Instant) {
        state.timers.cancel(TimerKind::TrackEnd);
        state.timers.cancel(TimerKind::Sync);

        let Some(remaining) = state.playback.remaining_at(now) else {
            return;
        };

        let config = &self.context.config;
        let room = self.weak();

        state.timers.schedule(
            TimerKind::TrackEnd,
            remaining + config.track_end_slack,
            move |token| async move {
                if let Some(room) = room.upgrade() {
                    room.on_track_end(token)
                }
            },
        );

        let room = self.weak();

        state
            .timers
            .schedule_repeating(TimerKind::Sync, config.sync_interval, move |token| {
                let room = room.clone();

                async move {
                    if let Some(room) = room.upgrade() {
                        room.on_sync(token)
                    }
                }
            });
    }

    fn on_track_end(&self, token: TimerToken) {
        let mut state = self.state.lock();

        if !state.timers.claim(TimerKind::TrackEnd, token) {
            return;
        }

        let now = Instant::now();
        state.playback.play_next(now);
        self.track_changed(&mut state, now);
    }

    fn on_sync(&self, token: TimerToken) {
        let state = self.state.lock();

        if !state.timers.is_current(TimerKind::Sync, token) {
            return;
        }

        if let Some(snapshot) = state.playback.snapshot().filter(|s| s.is_playing) {
            self.emit(&state, CollabEvent::SyncPulse(snapshot));
        }
    }
}
