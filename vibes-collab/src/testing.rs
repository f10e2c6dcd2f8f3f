//! Fakes and helpers shared by the collab tests.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use parking_lot::Mutex;
use vibes_core::{Config, Track, TrackSource};

use crate::{
    Collab, CollabEvent, ConnectionId, Dispatch, EventReceiver, InputError, MemoryDatabase,
    PrimaryKey, Recipients, Resolver, UserData,
};

/// A resolver answering from a fixed table, optionally taking its time.
#[derive(Default)]
pub struct FakeResolver {
    tracks: Mutex<HashMap<String, Vec<Track>>>,
    delay: Mutex<Duration>,
}

impl FakeResolver {
    pub fn add(&self, query: &str, tracks: Vec<Track>) {
        self.tracks.lock().insert(query.to_string(), tracks);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    async fn wait(&self) {
        let delay = *self.delay.lock();

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl Resolver for FakeResolver {
    async fn resolve(&self, query: &str) -> Result<Vec<Track>, InputError> {
        self.wait().await;
        self.tracks
            .lock()
            .get(query)
            .cloned()
            .ok_or(InputError::NotFound)
    }

    async fn search(&self, query: &str) -> Result<Vec<Track>, InputError> {
        self.wait().await;
        Ok(self.tracks.lock().get(query).cloned().unwrap_or_default())
    }
}

pub fn track(id: &str, seconds: u64) -> Track {
    Track {
        id: id.to_string(),
        title: format!("Track {}", id),
        artist: "Artist".to_string(),
        artwork: None,
        duration: Duration::from_secs(seconds),
        locator: format!("https://www.youtube.com/watch?v={}", id),
        source: TrackSource::YouTube,
    }
}

pub fn user(id: PrimaryKey, name: &str) -> UserData {
    UserData {
        id,
        display_name: name.to_string(),
        avatar: None,
    }
}

/// Lets spawned timer tasks run after the clock moved.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

/// A collab system wired to fakes, with access to everything it emits.
pub struct Harness {
    pub collab: Arc<Collab>,
    pub db: Arc<MemoryDatabase>,
    pub resolver: Arc<FakeResolver>,
    events: EventReceiver,
}

/// The events emitted since the last drain
pub struct Outbox {
    dispatches: Vec<Dispatch>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        let db = Arc::new(MemoryDatabase::new());
        let resolver = Arc::new(FakeResolver::default());
        let collab = Collab::new(config, db.clone(), resolver.clone());
        let events = collab.events();

        Self {
            collab: Arc::new(collab),
            db,
            resolver,
            events,
        }
    }

    pub fn connect(&self, id: PrimaryKey, name: &str) -> (ConnectionId, UserData) {
        let user = user(id, name);
        (self.collab.rooms.connect(user.clone()), user)
    }

    /// Takes everything emitted so far.
    pub fn drain(&self) -> Outbox {
        Outbox {
            dispatches: self.events.try_iter().collect(),
        }
    }
}

impl Outbox {
    /// The events a connection would have received, in order.
    pub fn received(&self, connection: ConnectionId) -> Vec<CollabEvent> {
        self.dispatches
            .iter()
            .filter(|d| match &d.recipients {
                Recipients::Everyone => true,
                Recipients::Connections(connections) => connections.contains(&connection),
            })
            .map(|d| d.event.clone())
            .collect()
    }

    pub fn names(&self, connection: ConnectionId) -> Vec<&'static str> {
        self.received(connection).iter().map(|e| e.name()).collect()
    }

    pub fn count(&self, connection: ConnectionId, name: &str) -> usize {
        self.names(connection).iter().filter(|n| **n == name).count()
    }

    pub fn all(&self) -> &[Dispatch] {
        &self.dispatches
    }

    /// System chat lines sent to a connection.
    pub fn announcements(&self, connection: ConnectionId) -> Vec<String> {
        self.received(connection)
            .into_iter()
            .filter_map(|e| match e {
                CollabEvent::NewChatMessage(message) if message.system => Some(message.text),
                _ => None,
            })
            .collect()
    }
}
