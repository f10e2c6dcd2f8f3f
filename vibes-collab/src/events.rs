use crossbeam::channel::{Receiver, Sender};
use vibes_core::{Snapshot, Track};

use crate::{ConnectionId, Lobby, RoomSnapshot, Suggestion, UserData};

pub type EventSender = Sender<Dispatch>;
pub type EventReceiver = Receiver<Dispatch>;

/// Who an event is delivered to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipients {
    /// The given connections, resolved when the event was emitted
    Connections(Vec<ConnectionId>),
    /// Every open connection, used for the lobby
    Everyone,
}

/// An event together with its recipients
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub recipients: Recipients,
    pub event: CollabEvent,
}

/// A chat line in a room. System messages have no user.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub user: Option<UserData>,
    pub text: String,
    pub system: bool,
}

/// Events emitted by the collab system, to be delivered to clients
#[derive(Debug, Clone)]
pub enum CollabEvent {
    /// The full state of a room, sent to a connection when it joins
    RoomState(Box<RoomSnapshot>),
    /// A new track started, or the queue was exhausted
    NewSongPlaying(Option<Snapshot>),
    /// The authoritative position, sent periodically and after host changes
    SyncPulse(Snapshot),
    PlaylistUpdated {
        playlist: Vec<Track>,
        now_playing_index: Option<usize>,
    },
    SuggestionsUpdated(Vec<Suggestion>),
    UpdateUserList(Vec<UserData>),
    UpdateListenerCount(usize),
    NewChatMessage(ChatMessage),
    /// The receiving connection's user is now the host
    HostAssigned,
    /// A join was requested for a slug that doesn't exist
    RoomNotFound,
    LobbyUpdate(Lobby),
    SearchResults {
        query: String,
        tracks: Vec<Track>,
    },
    /// A user facing message, e.g. when a track could not be resolved
    Notice {
        message: String,
    },
}

impl CollabEvent {
    /// A short name for logging
    pub fn name(&self) -> &'static str {
        match self {
            CollabEvent::RoomState(_) => "roomState",
            CollabEvent::NewSongPlaying(_) => "newSongPlaying",
            CollabEvent::SyncPulse(_) => "syncPulse",
            CollabEvent::PlaylistUpdated { .. } => "playlistUpdated",
            CollabEvent::SuggestionsUpdated(_) => "suggestionsUpdated",
            CollabEvent::UpdateUserList(_) => "updateUserList",
            CollabEvent::UpdateListenerCount(_) => "updateListenerCount",
            CollabEvent::NewChatMessage(_) => "newChatMessage",
            CollabEvent::HostAssigned => "hostAssigned",
            CollabEvent::RoomNotFound => "roomNotFound",
            CollabEvent::LobbyUpdate(_) => "lobbyUpdate",
            CollabEvent::SearchResults { .. } => "searchResults",
            CollabEvent::Notice { .. } => "notice",
        }
    }
}
