mod chat;
mod connection;
mod lobby;
mod playback;
mod queue;
mod room;
mod roster;

#[cfg(test)]
mod test;

use std::sync::Arc;

use log::{debug, error, info, warn};
use thiserror::Error;
use tokio::time::timeout;
use vibes_core::{PlaybackChange, Track};

use crate::{
    util::slugify, CollabContext, CollabEvent, DatabaseError, InputError, NewRoom, RoomData,
    UserData, Vibe,
};

pub use connection::*;
pub use lobby::*;
pub use room::*;

/// The entry point for everything clients do: connecting, joining rooms and acting in them.
///
/// Handlers addressed to a room require the connection to have joined that room.
pub struct RoomManager {
    context: CollabContext,
}

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("Room does not exist")]
    RoomNotFound,
    #[error("Connection is not in this room")]
    NotInRoom,
    #[error("Connection does not exist")]
    UnknownConnection,
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl RoomManager {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    pub fn context(&self) -> &CollabContext {
        &self.context
    }

    /// Registers a new connection for an authenticated user.
    pub fn connect(&self, user: UserData) -> ConnectionId {
        let connection = Connection::new(user);
        let id = connection.id;

        debug!("{} opened connection {}", connection.user.display_name, id);
        self.context.connections.insert(id, connection);

        id
    }

    /// Forgets a connection. If it was in a room, its listener gets the reconnect grace.
    pub fn disconnect(&self, connection_id: ConnectionId) {
        let Some((_, connection)) = self.context.connections.remove(&connection_id) else {
            return;
        };

        debug!(
            "{} closed connection {}",
            connection.user.display_name, connection_id
        );

        if let Some(room) = connection.room_id.and_then(|id| self.room_by_id(id)) {
            room.disconnect(connection_id, connection.user.id)
        }
    }

    pub fn connection(&self, connection_id: ConnectionId) -> Result<Connection, RoomError> {
        self.context
            .connections
            .get(&connection_id)
            .map(|c| c.value().clone())
            .ok_or(RoomError::UnknownConnection)
    }

    pub fn room_by_id(&self, room_id: RoomId) -> Option<Arc<Room>> {
        self.context.rooms.get(&room_id).map(|r| r.value().clone())
    }

    /// Returns the room with the given slug, if it is in memory. This includes a room that is
    /// still being deleted.
    pub fn room_by_slug(&self, slug: &str) -> Option<Arc<Room>> {
        self.context
            .rooms
            .iter()
            .find(|r| r.slug() == slug)
            .map(|r| r.value().clone())
    }

    /// Get all rooms in memory
    pub fn list_all(&self) -> Vec<Arc<Room>> {
        self.context.active_rooms()
    }

    pub async fn lobby(&self) -> Result<Lobby, DatabaseError> {
        self.context.lobby().await
    }

    /// Returns the room with the given slug, loading it from the database if needed.
    ///
    /// Two concurrent loads of the same room end up with the same instance.
    pub async fn get_or_load(&self, slug: &str) -> Result<Arc<Room>, RoomError> {
        if let Some(room) = self.room_by_slug(slug) {
            return Ok(room);
        }

        let data = self
            .context
            .database
            .room_by_slug(slug)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound { .. } => RoomError::RoomNotFound,
                e => RoomError::Database(e),
            })?;

        Ok(self.activate(data))
    }

    /// Creates and persists a new room, then joins the creator into it as host.
    /// Nothing is kept in memory if persisting fails.
    pub async fn create_room(
        &self,
        connection_id: ConnectionId,
        name: &str,
        vibe: Vibe,
    ) -> Result<Arc<Room>, RoomError> {
        let connection = self.connection(connection_id)?;

        let new_room = NewRoom {
            slug: slugify(name),
            name: name.trim().to_string(),
            vibe,
            host_id: connection.user.id,
        };

        let data = self
            .context
            .database
            .create_room(new_room)
            .await
            .map_err(|e| {
                error!("Failed to create room {:?}: {}", name, e);
                e
            })?;

        info!(
            "{} created room {} ({})",
            connection.user.display_name, data.name, data.slug
        );

        let room = self.activate(data);
        self.join(connection_id, room.slug()).await?;

        Ok(room)
    }

    /// Joins the connection into the room with the given slug, leaving its current room first.
    /// An unknown slug is reported to the connection with [CollabEvent::RoomNotFound].
    pub async fn join(&self, connection_id: ConnectionId, slug: &str) -> Result<(), RoomError> {
        let connection = self.connection(connection_id)?;

        if let Some(current) = connection.room_id.and_then(|id| self.room_by_id(id)) {
            if current.slug() != slug {
                self.leave(connection_id, current.id()).await?;
            }
        }

        let joined = match self.get_or_load(slug).await {
            Ok(room) => room
                .join(connection_id, connection.user.clone())
                .map(|outcome| (room, outcome)),
            Err(e) => Err(e),
        };

        let (room, outcome) = match joined {
            Ok(joined) => joined,
            Err(RoomError::RoomNotFound) => {
                info!(
                    "{} tried to join unknown room {}",
                    connection.user.display_name, slug
                );
                self.context
                    .broadcast
                    .to(connection_id, CollabEvent::RoomNotFound);

                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let still_connected = match self.context.connections.get_mut(&connection_id) {
            Some(mut connection) => {
                connection.room_id = Some(room.id());
                true
            }
            None => false,
        };

        // The connection closed while the room was loading
        if !still_connected {
            room.disconnect(connection_id, connection.user.id);
        }

        if let Some(host) = outcome.new_host {
            room.persist_host(host).await;
        }

        // Listener counts only change for fresh joins
        if !outcome.reconnected {
            self.context.refresh_lobby().await;
        }

        Ok(())
    }

    /// Leaves a room right away, without any grace. Does nothing if not in that room.
    pub async fn leave(
        &self,
        connection_id: ConnectionId,
        room_id: RoomId,
    ) -> Result<(), RoomError> {
        let connection = self.connection(connection_id)?;

        if connection.room_id != Some(room_id) {
            return Ok(());
        }

        if let Some(mut connection) = self.context.connections.get_mut(&connection_id) {
            connection.room_id = None;
        }

        if let Some(room) = self.room_by_id(room_id) {
            room.unsubscribe(connection_id);
            room.leave(connection.user.id).await;
        }

        Ok(())
    }

    pub fn send_message(
        &self,
        connection_id: ConnectionId,
        room_id: RoomId,
        text: &str,
    ) -> Result<(), RoomError> {
        let (room, user) = self.membership(connection_id, room_id)?;
        room.send_message(&user, text);

        Ok(())
    }

    pub fn change_playback(
        &self,
        connection_id: ConnectionId,
        room_id: RoomId,
        change: PlaybackChange,
    ) -> Result<(), RoomError> {
        let (room, user) = self.membership(connection_id, room_id)?;
        room.change_playback(user.id, change);

        Ok(())
    }

    pub fn skip(&self, connection_id: ConnectionId, room_id: RoomId) -> Result<(), RoomError> {
        let (room, user) = self.membership(connection_id, room_id)?;
        room.skip(user.id);

        Ok(())
    }

    pub fn play_previous(
        &self,
        connection_id: ConnectionId,
        room_id: RoomId,
    ) -> Result<(), RoomError> {
        let (room, user) = self.membership(connection_id, room_id)?;
        room.play_previous(user.id);

        Ok(())
    }

    pub fn play_track_at_index(
        &self,
        connection_id: ConnectionId,
        room_id: RoomId,
        index: Option<usize>,
    ) -> Result<(), RoomError> {
        let (room, user) = self.membership(connection_id, room_id)?;
        room.play_track_at_index(user.id, index);

        Ok(())
    }

    /// Resolves a URL or search query and adds the result to the room.
    /// Resolution failures are reported to the requesting connection with a notice.
    pub async fn add_track(
        &self,
        connection_id: ConnectionId,
        room_id: RoomId,
        query: &str,
    ) -> Result<(), RoomError> {
        let (_, user) = self.membership(connection_id, room_id)?;

        let tracks = match self.resolve(query).await {
            Ok(tracks) => tracks,
            Err(e) => {
                warn!(
                    "Could not resolve {:?} for {}: {}",
                    query, user.display_name, e
                );

                self.context.broadcast.to(
                    connection_id,
                    CollabEvent::Notice {
                        message: format!("Could not add \"{}\": {}", query, e),
                    },
                );

                return Ok(());
            }
        };

        // The room may have been deleted while resolving
        if let Some(room) = self.room_by_id(room_id) {
            room.add_tracks(&user, tracks);
        }

        Ok(())
    }

    pub fn delete_track(
        &self,
        connection_id: ConnectionId,
        room_id: RoomId,
        index: usize,
    ) -> Result<(), RoomError> {
        let (room, user) = self.membership(connection_id, room_id)?;
        room.delete_track(user.id, index);

        Ok(())
    }

    pub fn approve_suggestion(
        &self,
        connection_id: ConnectionId,
        room_id: RoomId,
        suggestion_id: SuggestionId,
    ) -> Result<(), RoomError> {
        let (room, user) = self.membership(connection_id, room_id)?;
        room.approve_suggestion(user.id, suggestion_id);

        Ok(())
    }

    pub fn reject_suggestion(
        &self,
        connection_id: ConnectionId,
        room_id: RoomId,
        suggestion_id: SuggestionId,
    ) -> Result<(), RoomError> {
        let (room, user) = self.membership(connection_id, room_id)?;
        room.reject_suggestion(user.id, suggestion_id);

        Ok(())
    }

    /// Searches for tracks and sends the results to the requesting connection only.
    pub async fn search(&self, connection_id: ConnectionId, query: &str) -> Result<(), RoomError> {
        self.connection(connection_id)?;

        let event = match self.find_tracks(query).await {
            Ok(tracks) => CollabEvent::SearchResults {
                query: query.to_string(),
                tracks,
            },
            Err(e) => {
                warn!("Search for {:?} failed: {}", query, e);

                CollabEvent::Notice {
                    message: format!("Search failed: {}", e),
                }
            }
        };

        self.context.broadcast.to(connection_id, event);
        Ok(())
    }

    /// Searches the track sources, bounded by the resolution timeout.
    pub async fn find_tracks(&self, query: &str) -> Result<Vec<Track>, InputError> {
        timeout(
            self.context.config.resolve_timeout,
            self.context.resolver.search(query),
        )
        .await
        .unwrap_or(Err(InputError::Timeout))
    }

    async fn resolve(&self, query: &str) -> Result<Vec<Track>, InputError> {
        timeout(
            self.context.config.resolve_timeout,
            self.context.resolver.resolve(query),
        )
        .await
        .unwrap_or(Err(InputError::Timeout))
    }

    /// Puts a loaded room in memory, unless another load got there first.
    fn activate(&self, data: RoomData) -> Arc<Room> {
        self.context
            .rooms
            .entry(data.id)
            .or_insert_with(|| {
                info!("Activating room {} ({})", data.name, data.slug);
                Room::new(&self.context, data)
            })
            .value()
            .clone()
    }

    fn membership(
        &self,
        connection_id: ConnectionId,
        room_id: RoomId,
    ) -> Result<(Arc<Room>, UserData), RoomError> {
        let connection = self.connection(connection_id)?;

        if connection.room_id != Some(room_id) {
            return Err(RoomError::NotInRoom);
        }

        let room = self.room_by_id(room_id).ok_or(RoomError::RoomNotFound)?;
        Ok((room, connection.user))
    }
}
