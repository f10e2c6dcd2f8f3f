use std::sync::{Arc, Weak};

use log::{debug, error};
use parking_lot::Mutex;
use vibes_core::{Id, Playback, Scheduler, Snapshot, Track};

use crate::{
    ChatMessage, CollabContext, CollabEvent, ConnectionId, PrimaryKey, RoomData, Subscribers,
    UserData, Vibe,
};

pub type RoomId = PrimaryKey;
pub type SuggestionId = Id<Suggestion>;

/// A vibes room: listeners, a host, a playlist and the suggestions awaiting approval.
///
/// All state lives behind a single mutex. Handlers lock it, mutate, emit and release it without
/// awaiting in between, so one room never sees two handlers interleave.
pub struct Room {
    me: Weak<Room>,
    pub(super) context: CollabContext,

    id: RoomId,
    slug: String,
    name: String,
    vibe: Vibe,

    pub(super) state: Mutex<RoomState>,
}

pub struct RoomState {
    pub host_id: Option<PrimaryKey>,
    /// In order of joining
    pub listeners: Vec<Listener>,
    pub playback: Playback,
    pub suggestions: Vec<Suggestion>,
    pub subscribers: Subscribers,
    pub timers: Scheduler<TimerKind>,
    /// Set once the room is removed from the store, late joiners must not revive it
    pub closed: bool,
}

/// A user present in a room, through their most recent connection
#[derive(Debug, Clone)]
pub struct Listener {
    pub user: UserData,
    pub connection_id: ConnectionId,
}

/// A track a guest wants in the playlist
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub id: SuggestionId,
    pub track: Track,
    pub suggested_by: UserData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Advances to the next track once the current one ends
    TrackEnd,
    /// Periodically broadcasts the authoritative position
    Sync,
    /// Deletes the room once it has been empty for a while
    RoomDeletion,
    /// Removes a disconnected listener who didn't come back
    Reconnect(PrimaryKey),
}

/// Everything a client needs to render a room it just joined
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    pub id: RoomId,
    pub slug: String,
    pub name: String,
    pub vibe: Vibe,
    pub host_id: Option<PrimaryKey>,
    pub listeners: Vec<UserData>,
    pub playlist: Vec<Track>,
    pub now_playing_index: Option<usize>,
    pub now_playing: Option<Snapshot>,
    pub suggestions: Vec<Suggestion>,
}

impl Room {
    pub fn new(context: &CollabContext, data: RoomData) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            context: context.clone(),
            id: data.id,
            slug: data.slug,
            name: data.name,
            vibe: data.vibe,
            state: Mutex::new(RoomState {
                host_id: data.host_id,
                listeners: vec![],
                playback: Playback::new(),
                suggestions: vec![],
                subscribers: Subscribers::default(),
                timers: Scheduler::new(),
                closed: false,
            }),
        })
    }

    pub fn id(&self) -> RoomId {
        self.id
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn vibe(&self) -> &Vibe {
        &self.vibe
    }

    pub fn host_id(&self) -> Option<PrimaryKey> {
        self.state.lock().host_id
    }

    /// A closed room is being deleted and takes no more listeners.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    pub fn listener_count(&self) -> usize {
        self.state.lock().listeners.len()
    }

    pub fn listeners(&self) -> Vec<UserData> {
        self.state.lock().listeners()
    }

    /// The currently selected track, if any
    pub fn now_playing(&self) -> Option<Track> {
        self.state
            .lock()
            .playback
            .now_playing()
            .map(|n| n.track.clone())
    }

    /// Returns the authoritative playback snapshot, computed right now.
    pub fn playback_snapshot(&self) -> Option<Snapshot> {
        self.state.lock().playback.snapshot()
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        self.snapshot_of(&self.state.lock())
    }

    /// Returns the kinds of timers currently pending.
    pub fn pending_timers(&self) -> Vec<TimerKind> {
        self.state.lock().timers.scheduled()
    }

    /// A weak handle to this room for timer callbacks, which must not keep it alive.
    pub(super) fn weak(&self) -> Weak<Room> {
        self.me.clone()
    }

    pub(super) fn snapshot_of(&self, state: &RoomState) -> RoomSnapshot {
        RoomSnapshot {
            id: self.id,
            slug: self.slug.clone(),
            name: self.name.clone(),
            vibe: self.vibe.clone(),
            host_id: state.host_id,
            listeners: state.listeners(),
            playlist: state.playback.playlist().to_vec(),
            now_playing_index: state.playback.now_playing_index(),
            now_playing: state.playback.snapshot(),
            suggestions: state.suggestions.clone(),
        }
    }

    /// Sends an event to every connection subscribed to the room.
    pub(super) fn emit(&self, state: &RoomState, event: CollabEvent) {
        self.context.broadcast.to_many(state.subscribers.all(), event)
    }

    pub(super) fn emit_to(&self, connection: ConnectionId, event: CollabEvent) {
        self.context.broadcast.to(connection, event)
    }

    pub(super) fn announce(&self, state: &RoomState, text: String) {
        self.emit(
            state,
            CollabEvent::NewChatMessage(ChatMessage {
                user: None,
                text,
                system: true,
            }),
        )
    }

    pub(super) fn emit_roster(&self, state: &RoomState, except: Option<ConnectionId>) {
        let recipients = match except {
            Some(connection) => state.subscribers.except(connection),
            None => state.subscribers.all(),
        };

        self.context
            .broadcast
            .to_many(recipients.clone(), CollabEvent::UpdateUserList(state.listeners()));
        self.context.broadcast.to_many(
            recipients,
            CollabEvent::UpdateListenerCount(state.listeners.len()),
        );
    }

    /// Returns true if the user may perform host-only actions.
    /// Requests from anyone else are ignored without telling them.
    pub(super) fn check_host(&self, state: &RoomState, user_id: PrimaryKey, action: &str) -> bool {
        let is_host = !state.closed && state.host_id == Some(user_id);

        if !is_host {
            debug!(
                "Ignored {} from user {} in room {}, they are not the host",
                action, user_id, self.name
            );
        }

        is_host
    }

    pub(super) async fn persist_host(&self, user_id: PrimaryKey) {
        if let Err(e) = self.context.database.update_room_host(self.id, user_id).await {
            error!(
                "Failed to persist host {} of room {}: {}",
                user_id, self.name, e
            );
        }
    }
}

impl RoomState {
    pub fn listeners(&self) -> Vec<UserData> {
        self.listeners.iter().map(|l| l.user.clone()).collect()
    }

    pub fn listener(&self, user_id: PrimaryKey) -> Option<&Listener> {
        self.listeners.iter().find(|l| l.user.id == user_id)
    }

    pub fn is_listener(&self, user_id: PrimaryKey) -> bool {
        self.listener(user_id).is_some()
    }
}
