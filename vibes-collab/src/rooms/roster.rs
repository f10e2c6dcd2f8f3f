use std::sync::Arc;

use log::{error, info};
use vibes_core::TimerToken;

use crate::{CollabEvent, ConnectionId, PrimaryKey, UserData};

use super::{Listener, Room, RoomError, RoomState, TimerKind};

/// What a join changed that still has to be persisted
#[derive(Debug, Default)]
pub(super) struct JoinOutcome {
    pub new_host: Option<PrimaryKey>,
    pub reconnected: bool,
}

#[derive(Debug, Default)]
struct LeaveOutcome {
    left: bool,
    new_host: Option<PrimaryKey>,
}

impl Room {
    /// Adds the user to the room through the given connection, or moves them to it if they are
    /// already listening. A user coming back within the reconnect grace is not announced.
    pub(super) fn join(
        &self,
        connection_id: ConnectionId,
        user: UserData,
    ) -> Result<JoinOutcome, RoomError> {
        let mut state = self.state.lock();

        if state.closed {
            return Err(RoomError::RoomNotFound);
        }

        state.timers.cancel(TimerKind::RoomDeletion);

        let grace_cancelled = state.timers.cancel(TimerKind::Reconnect(user.id));
        let was_empty = state.listeners.is_empty();

        let existing = state.listeners.iter().position(|l| l.user.id == user.id);
        let reconnected = grace_cancelled || existing.is_some();

        match existing {
            Some(index) => state.listeners[index].connection_id = connection_id,
            None => state.listeners.push(Listener {
                user: user.clone(),
                connection_id,
            }),
        }

        let mut outcome = JoinOutcome {
            new_host: None,
            reconnected,
        };

        if was_empty && state.host_id != Some(user.id) {
            state.host_id = Some(user.id);
            outcome.new_host = Some(user.id);
        }

        state.subscribers.subscribe(connection_id);

        if reconnected {
            info!("{} reconnected to room {}", user.display_name, self.name());
        } else {
            info!("{} joined room {}", user.display_name, self.name());
        }

        self.emit_to(
            connection_id,
            CollabEvent::RoomState(Box::new(self.snapshot_of(&state))),
        );

        if outcome.new_host.is_some() {
            self.emit_to(connection_id, CollabEvent::HostAssigned);
        }

        self.emit_roster(&state, Some(connection_id));

        if !reconnected {
            self.announce(&state, format!("{} joined the room", user.display_name));
        }

        Ok(outcome)
    }

    /// Handles a connection going away. The listener is kept for the reconnect grace,
    /// unless they already moved on to a newer connection.
    pub(super) fn disconnect(&self, connection_id: ConnectionId, user_id: PrimaryKey) {
        let mut state = self.state.lock();
        state.subscribers.unsubscribe(connection_id);

        let is_active = state
            .listener(user_id)
            .map(|l| l.connection_id == connection_id)
            .unwrap_or(false);

        if !is_active {
            return;
        }

        let grace = self.context.config.reconnect_grace;
        let room = self.weak();

        state
            .timers
            .schedule(TimerKind::Reconnect(user_id), grace, move |token| async move {
                if let Some(room) = room.upgrade() {
                    room.on_reconnect_expired(user_id, token).await
                }
            });
    }

    pub(super) fn unsubscribe(&self, connection_id: ConnectionId) {
        self.state.lock().subscribers.unsubscribe(connection_id);
    }

    /// Removes the user from the room. Leaving twice is harmless.
    pub(super) async fn leave(&self, user_id: PrimaryKey) {
        let outcome = {
            let mut state = self.state.lock();
            self.remove_listener(&mut state, user_id)
        };

        self.after_leave(outcome).await
    }

    async fn on_reconnect_expired(&self, user_id: PrimaryKey, token: TimerToken) {
        let outcome = {
            let mut state = self.state.lock();

            if !state.timers.claim(TimerKind::Reconnect(user_id), token) {
                return;
            }

            self.remove_listener(&mut state, user_id)
        };

        self.after_leave(outcome).await
    }

    fn remove_listener(&self, state: &mut RoomState, user_id: PrimaryKey) -> LeaveOutcome {
        let Some(position) = state.listeners.iter().position(|l| l.user.id == user_id) else {
            return LeaveOutcome::default();
        };

        let listener = state.listeners.remove(position);
        state.subscribers.unsubscribe(listener.connection_id);
        state.timers.cancel(TimerKind::Reconnect(user_id));

        let mut outcome = LeaveOutcome {
            left: true,
            new_host: None,
        };

        info!("{} left room {}", listener.user.display_name, self.name());

        if state.host_id == Some(user_id) {
            // Earliest joined listener takes over
            if let Some(next) = state.listeners.first().cloned() {
                state.host_id = Some(next.user.id);
                outcome.new_host = Some(next.user.id);

                info!(
                    "{} is now the host of room {}",
                    next.user.display_name,
                    self.name()
                );

                self.emit_to(next.connection_id, CollabEvent::HostAssigned);
                self.announce(state, format!("{} is now the host", next.user.display_name));
            }
        }

        self.announce(state, format!("{} left the room", listener.user.display_name));
        self.emit_roster(state, None);

        if state.listeners.is_empty() {
            self.schedule_deletion(state);
        }

        outcome
    }

    async fn after_leave(&self, outcome: LeaveOutcome) {
        if !outcome.left {
            return;
        }

        if let Some(host) = outcome.new_host {
            self.persist_host(host).await;
        }

        self.context.refresh_lobby().await;
    }

    fn schedule_deletion(&self, state: &mut RoomState) {
        let grace = self.context.config.room_deletion_grace;
        let room = self.weak();

        state
            .timers
            .schedule(TimerKind::RoomDeletion, grace, move |token| async move {
                if let Some(room) = room.upgrade() {
                    room.on_deletion_due(token).await
                }
            });
    }

    async fn on_deletion_due(self: Arc<Self>, token: TimerToken) {
        {
            let mut state = self.state.lock();

            if !state.timers.claim(TimerKind::RoomDeletion, token) || !state.listeners.is_empty() {
                return;
            }

            state.timers.cancel_all();
            state.closed = true;
        }

        info!("Room {} was empty for too long and is deleted", self.name());

        // The closed room stays in the store until the row is gone, so joins
        // answer roomNotFound instead of loading the row again
        if let Err(e) = self.context.database.delete_room(self.id()).await {
            error!("Failed to delete room {}: {}", self.name(), e);
        }

        self.context
            .rooms
            .remove_if(&self.id(), |_, room| Arc::ptr_eq(room, &self));

        self.context.refresh_lobby().await;
    }
}
