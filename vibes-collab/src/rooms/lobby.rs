use std::sync::Arc;

use log::error;
use vibes_core::Track;

use crate::{CollabContext, CollabEvent, DatabaseError, Vibe};

use super::{Room, RoomId};

/// What the lobby shows: every active room and the vibes to pick from
#[derive(Debug, Clone)]
pub struct Lobby {
    pub rooms: Vec<RoomSummary>,
    pub vibes: Vec<Vibe>,
}

#[derive(Debug, Clone)]
pub struct RoomSummary {
    pub id: RoomId,
    pub slug: String,
    pub name: String,
    pub vibe: Vibe,
    pub listener_count: usize,
    pub now_playing: Option<Track>,
}

impl CollabContext {
    /// Returns the rooms resident in memory, leaving out rooms being deleted.
    pub fn active_rooms(&self) -> Vec<Arc<Room>> {
        // Collected first, a room must never be locked while the store is
        let mut rooms: Vec<_> = self.rooms.iter().map(|r| r.value().clone()).collect();
        rooms.retain(|r| !r.is_closed());
        rooms.sort_by_key(|r| r.id());

        rooms
    }

    pub async fn lobby(&self) -> Result<Lobby, DatabaseError> {
        let vibes = self.database.list_vibes().await?;

        let rooms = self
            .active_rooms()
            .iter()
            .map(|room| room.summary())
            .collect();

        Ok(Lobby { rooms, vibes })
    }

    /// Sends the current lobby to every connection.
    pub async fn refresh_lobby(&self) {
        match self.lobby().await {
            Ok(lobby) => self.broadcast.everyone(CollabEvent::LobbyUpdate(lobby)),
            Err(e) => error!("Failed to refresh the lobby: {}", e),
        }
    }
}

impl Room {
    pub fn summary(&self) -> RoomSummary {
        let state = self.state.lock();

        RoomSummary {
            id: self.id(),
            slug: self.slug().to_string(),
            name: self.name().to_string(),
            vibe: self.vibe().clone(),
            listener_count: state.listeners.len(),
            now_playing: state.playback.now_playing().map(|n| n.track.clone()),
        }
    }
}
