use crossbeam::channel::unbounded;
use log::debug;

use crate::{CollabEvent, ConnectionId, Dispatch, EventReceiver, EventSender, Recipients};

/// The fan-out side of the collab system.
///
/// Rooms emit while holding their own lock, so events of one room leave in the order they happened.
#[derive(Debug, Clone)]
pub struct Broadcast {
    sender: EventSender,
}

/// The connections subscribed to a room, in subscription order
#[derive(Debug, Clone, Default)]
pub struct Subscribers {
    connections: Vec<ConnectionId>,
}

impl Broadcast {
    pub fn channel() -> (Self, EventReceiver) {
        let (sender, receiver) = unbounded();
        (Self { sender }, receiver)
    }

    pub fn to(&self, connection: ConnectionId, event: CollabEvent) {
        self.to_many(vec![connection], event)
    }

    pub fn to_many(&self, connections: Vec<ConnectionId>, event: CollabEvent) {
        if connections.is_empty() {
            return;
        }

        self.send(Dispatch {
            recipients: Recipients::Connections(connections),
            event,
        })
    }

    pub fn everyone(&self, event: CollabEvent) {
        self.send(Dispatch {
            recipients: Recipients::Everyone,
            event,
        })
    }

    fn send(&self, dispatch: Dispatch) {
        let name = dispatch.event.name();

        // Only fails when the receiving end is gone, i.e. during shutdown
        if self.sender.send(dispatch).is_err() {
            debug!("Dropped {} event, nobody is receiving", name);
        }
    }
}

impl Subscribers {
    /// Returns false if the connection was already subscribed.
    pub fn subscribe(&mut self, connection: ConnectionId) -> bool {
        if self.contains(connection) {
            return false;
        }

        self.connections.push(connection);
        true
    }

    /// Returns false if the connection wasn't subscribed.
    pub fn unsubscribe(&mut self, connection: ConnectionId) -> bool {
        let before = self.connections.len();
        self.connections.retain(|c| *c != connection);

        before != self.connections.len()
    }

    pub fn contains(&self, connection: ConnectionId) -> bool {
        self.connections.contains(&connection)
    }

    pub fn all(&self) -> Vec<ConnectionId> {
        self.connections.clone()
    }

    pub fn except(&self, connection: ConnectionId) -> Vec<ConnectionId> {
        self.connections
            .iter()
            .copied()
            .filter(|c| *c != connection)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
