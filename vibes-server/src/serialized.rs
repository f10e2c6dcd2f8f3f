//! All schemas that are sent to clients are defined here
//! along with the ToSerialized impls

use serde::Serialize;
use vibes_collab::{
    ChatMessage as CollabChatMessage, CollabEvent, Lobby as CollabLobby, RoomSnapshot,
    RoomSummary as CollabRoomSummary, Suggestion as CollabSuggestion, UserData,
    Vibe as CollabVibe,
};
use vibes_core::{Snapshot, Track as CoreTrack};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    id: i32,
    display_name: String,
    avatar: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    id: String,
    title: String,
    artist: String,
    artwork: Option<String>,
    /// Length of the track, in milliseconds
    duration: u64,
    locator: String,
    source: &'static str,
}

/// The authoritative playback state of a room at `server_timestamp`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NowPlaying {
    track: Track,
    is_playing: bool,
    /// Position in milliseconds
    position: u64,
    now_playing_index: usize,
    /// Unix time in milliseconds, for latency compensation
    server_timestamp: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    id: u64,
    track: Track,
    suggested_by: User,
}

#[derive(Debug, Clone, Serialize)]
pub struct Vibe {
    name: String,
    kind: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    id: i32,
    slug: String,
    name: String,
    vibe: Vibe,
    host_id: Option<i32>,
    listeners: Vec<User>,
    playlist: Vec<Track>,
    /// -1 if nothing is selected
    now_playing_index: i64,
    now_playing: Option<NowPlaying>,
    suggestions: Vec<Suggestion>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSummary {
    id: i32,
    slug: String,
    name: String,
    vibe: Vibe,
    listener_count: usize,
    now_playing: Option<Track>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Lobby {
    rooms: Vec<RoomSummary>,
    vibes: Vec<Vibe>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    user: Option<User>,
    text: String,
    system: bool,
}

/// Events sent to clients over the gateway
#[derive(Debug, Clone, Serialize)]
#[serde(
    tag = "type",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    /// The full room, sent to a connection when it joins
    RoomState(Room),
    /// A new track started, null when the queue ran out
    NewSongPlaying(Option<NowPlaying>),
    SyncPulse(NowPlaying),
    PlaylistUpdated {
        playlist: Vec<Track>,
        now_playing_index: i64,
    },
    SuggestionsUpdated(Vec<Suggestion>),
    UpdateUserList(Vec<User>),
    UpdateListenerCount(usize),
    NewChatMessage(ChatMessage),
    HostAssigned,
    RoomNotFound,
    LobbyUpdate(Lobby),
    SearchResults {
        query: String,
        tracks: Vec<Track>,
    },
    Notice {
        message: String,
    },
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl<I, O> ToSerialized<Option<O>> for Option<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Option<O> {
        self.as_ref().map(|x| x.to_serialized())
    }
}

impl ToSerialized<User> for UserData {
    fn to_serialized(&self) -> User {
        User {
            id: self.id,
            display_name: self.display_name.clone(),
            avatar: self.avatar.clone(),
        }
    }
}

impl ToSerialized<Track> for CoreTrack {
    fn to_serialized(&self) -> Track {
        Track {
            id: self.id.clone(),
            title: self.title.clone(),
            artist: self.artist.clone(),
            artwork: self.artwork.clone(),
            duration: self.duration.as_millis() as u64,
            locator: self.locator.clone(),
            source: self.source.as_str(),
        }
    }
}

impl ToSerialized<NowPlaying> for Snapshot {
    fn to_serialized(&self) -> NowPlaying {
        NowPlaying {
            track: self.track.to_serialized(),
            is_playing: self.is_playing,
            position: self.position.as_millis() as u64,
            now_playing_index: self.now_playing_index,
            server_timestamp: self.server_timestamp.timestamp_millis(),
        }
    }
}

impl ToSerialized<Suggestion> for CollabSuggestion {
    fn to_serialized(&self) -> Suggestion {
        Suggestion {
            id: self.id.value(),
            track: self.track.to_serialized(),
            suggested_by: self.suggested_by.to_serialized(),
        }
    }
}

impl ToSerialized<Vibe> for CollabVibe {
    fn to_serialized(&self) -> Vibe {
        Vibe {
            name: self.name.clone(),
            kind: self.kind.as_str(),
        }
    }
}

impl ToSerialized<Room> for RoomSnapshot {
    fn to_serialized(&self) -> Room {
        Room {
            id: self.id,
            slug: self.slug.clone(),
            name: self.name.clone(),
            vibe: self.vibe.to_serialized(),
            host_id: self.host_id,
            listeners: self.listeners.to_serialized(),
            playlist: self.playlist.to_serialized(),
            now_playing_index: index_or_none(self.now_playing_index),
            now_playing: self.now_playing.to_serialized(),
            suggestions: self.suggestions.to_serialized(),
        }
    }
}

impl ToSerialized<RoomSummary> for CollabRoomSummary {
    fn to_serialized(&self) -> RoomSummary {
        RoomSummary {
            id: self.id,
            slug: self.slug.clone(),
            name: self.name.clone(),
            vibe: self.vibe.to_serialized(),
            listener_count: self.listener_count,
            now_playing: self.now_playing.to_serialized(),
        }
    }
}

impl ToSerialized<Lobby> for CollabLobby {
    fn to_serialized(&self) -> Lobby {
        Lobby {
            rooms: self.rooms.to_serialized(),
            vibes: self.vibes.to_serialized(),
        }
    }
}

impl ToSerialized<ChatMessage> for CollabChatMessage {
    fn to_serialized(&self) -> ChatMessage {
        ChatMessage {
            user: self.user.to_serialized(),
            text: self.text.clone(),
            system: self.system,
        }
    }
}

impl From<CollabEvent> for ServerEvent {
    fn from(value: CollabEvent) -> Self {
        match value {
            CollabEvent::RoomState(snapshot) => Self::RoomState(snapshot.to_serialized()),
            CollabEvent::NewSongPlaying(snapshot) => {
                Self::NewSongPlaying(snapshot.to_serialized())
            }
            CollabEvent::SyncPulse(snapshot) => Self::SyncPulse(snapshot.to_serialized()),
            CollabEvent::PlaylistUpdated {
                playlist,
                now_playing_index,
            } => Self::PlaylistUpdated {
                playlist: playlist.to_serialized(),
                now_playing_index: index_or_none(now_playing_index),
            },
            CollabEvent::SuggestionsUpdated(suggestions) => {
                Self::SuggestionsUpdated(suggestions.to_serialized())
            }
            CollabEvent::UpdateUserList(users) => Self::UpdateUserList(users.to_serialized()),
            CollabEvent::UpdateListenerCount(count) => Self::UpdateListenerCount(count),
            CollabEvent::NewChatMessage(message) => Self::NewChatMessage(message.to_serialized()),
            CollabEvent::HostAssigned => Self::HostAssigned,
            CollabEvent::RoomNotFound => Self::RoomNotFound,
            CollabEvent::LobbyUpdate(lobby) => Self::LobbyUpdate(lobby.to_serialized()),
            CollabEvent::SearchResults { query, tracks } => Self::SearchResults {
                query,
                tracks: tracks.to_serialized(),
            },
            CollabEvent::Notice { message } => Self::Notice { message },
        }
    }
}

/// Clients expect -1 when nothing is selected
fn index_or_none(index: Option<usize>) -> i64 {
    index.map(|i| i as i64).unwrap_or(-1)
}
