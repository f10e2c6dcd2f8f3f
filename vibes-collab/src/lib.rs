mod auth;
mod broadcast;
mod db;
mod events;
mod input;
mod rooms;
mod util;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use dashmap::DashMap;
use vibes_core::Config;

pub use auth::*;
pub use broadcast::*;
pub use db::*;
pub use events::*;
pub use input::*;
pub use rooms::*;

/// The vibes collab system: rooms, listeners, queues and the events flowing out of them.
pub struct Collab {
    pub auth: Auth,
    pub rooms: RoomManager,
    pub database: Arc<dyn Database>,

    events: EventReceiver,
}

/// A type passed to various components of the collab system, to access state and emit events.
#[derive(Clone)]
pub struct CollabContext {
    pub config: Arc<Config>,
    pub database: Arc<dyn Database>,
    pub resolver: Arc<dyn Resolver>,
    pub broadcast: Broadcast,

    /// The rooms resident in memory
    pub rooms: Arc<DashMap<RoomId, Arc<Room>>>,
    /// Every open connection and the room it is in
    pub connections: Arc<DashMap<ConnectionId, Connection>>,
}

impl Collab {
    pub fn new<Db, R>(config: Config, database: Arc<Db>, resolver: Arc<R>) -> Self
    where
        Db: Database + 'static,
        R: Resolver + 'static,
    {
        let (broadcast, events) = Broadcast::channel();
        let database: Arc<dyn Database> = database;
        let resolver: Arc<dyn Resolver> = resolver;

        let context = CollabContext {
            config: Arc::new(config),
            database: database.clone(),
            resolver,
            broadcast,
            rooms: Default::default(),
            connections: Default::default(),
        };

        Self {
            auth: Auth::new(&database),
            rooms: RoomManager::new(&context),
            database,
            events,
        }
    }

    /// Returns a receiver for events that need to be delivered to connections.
    pub fn events(&self) -> EventReceiver {
        self.events.clone()
    }
}
