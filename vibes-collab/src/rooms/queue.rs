use log::info;
use tokio::time::Instant;
use vibes_core::{Removal, Track};

use crate::{CollabEvent, PrimaryKey, UserData};

use super::{Room, RoomState, Suggestion, SuggestionId};

impl Room {
    /// Adds resolved tracks on behalf of a listener.
    ///
    /// The host's tracks go straight into the playlist and start playing if nothing is selected.
    /// Everyone else's become suggestions for the host to approve.
    pub fn add_tracks(&self, requester: &UserData, tracks: Vec<Track>) {
        let mut state = self.state.lock();

        if state.closed || !state.is_listener(requester.id) || tracks.is_empty() {
            return;
        }

        if state.host_id == Some(requester.id) {
            info!(
                "{} added {} track(s) to room {}",
                requester.display_name,
                tracks.len(),
                self.name()
            );

            let first_index = state.playback.push(tracks);
            self.emit_playlist(&state);
            self.start_if_idle(&mut state, first_index);
        } else {
            state
                .suggestions
                .extend(tracks.into_iter().map(|track| Suggestion {
                    id: SuggestionId::new(),
                    track,
                    suggested_by: requester.clone(),
                }));

            self.emit_suggestions(&state);
        }
    }

    /// Removes the track at `index`. Removing the playing track moves on to the one after it.
    pub fn delete_track(&self, user_id: PrimaryKey, index: usize) {
        let mut state = self.state.lock();

        if !self.check_host(&state, user_id, "delete track") {
            return;
        }

        let now = Instant::now();

        let Some((track, removal)) = state.playback.remove(index, now) else {
            return;
        };

        info!("Removed {} from room {}", track, self.name());
        self.emit_playlist(&state);

        if removal == Removal::Current {
            self.track_changed(&mut state, now);
        }
    }

    /// Moves a suggestion into the playlist.
    pub fn approve_suggestion(&self, user_id: PrimaryKey, suggestion_id: SuggestionId) {
        let mut state = self.state.lock();

        if !self.check_host(&state, user_id, "approve suggestion") {
            return;
        }

        let Some(suggestion) = take_suggestion(&mut state, suggestion_id) else {
            return;
        };

        let index = state.playback.push([suggestion.track]);

        self.emit_suggestions(&state);
        self.emit_playlist(&state);
        self.start_if_idle(&mut state, index);
    }

    pub fn reject_suggestion(&self, user_id: PrimaryKey, suggestion_id: SuggestionId) {
        let mut state = self.state.lock();

        if !self.check_host(&state, user_id, "reject suggestion") {
            return;
        }

        if take_suggestion(&mut state, suggestion_id).is_some() {
            self.emit_suggestions(&state);
        }
    }

    pub fn suggestions(&self) -> Vec<Suggestion> {
        self.state.lock().suggestions.clone()
    }

    pub fn playlist(&self) -> Vec<Track> {
        self.state.lock().playback.playlist().to_vec()
    }

    fn emit_playlist(&self, state: &RoomState) {
        self.emit(
            state,
            CollabEvent::PlaylistUpdated {
                playlist: state.playback.playlist().to_vec(),
                now_playing_index: state.playback.now_playing_index(),
            },
        )
    }

    fn emit_suggestions(&self, state: &RoomState) {
        self.emit(
            state,
            CollabEvent::SuggestionsUpdated(state.suggestions.clone()),
        )
    }
}

fn take_suggestion(state: &mut RoomState, suggestion_id: SuggestionId) -> Option<Suggestion> {
    let position = state
        .suggestions
        .iter()
        .position(|s| s.id == suggestion_id)?;

    Some(state.suggestions.remove(position))
}
