use async_trait::async_trait;
use chrono::{Duration, Utc};
use parking_lot::Mutex;

use crate::{
    Database, DatabaseError, NewRoom, PrimaryKey, Result, RoomData, SessionData, UserData, Vibe,
    VibeKind,
};

/// An in-process database, used in tests and when embedding the collab system without postgres.
pub struct MemoryDatabase {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    next_id: PrimaryKey,
    sessions: Vec<SessionData>,
    rooms: Vec<RoomData>,
    vibes: Vec<Vibe>,
    /// When set, every write fails with an internal error
    fail_writes: bool,
    /// How long room deletions take
    delete_delay: std::time::Duration,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        let vibes = ["Chill", "Focus", "Party"]
            .into_iter()
            .map(|name| Vibe {
                name: name.to_string(),
                kind: VibeKind::Preset,
            })
            .collect();

        Self {
            state: Mutex::new(MemoryState {
                next_id: 1,
                vibes,
                ..Default::default()
            }),
        }
    }

    /// Registers a session that stays valid for a day.
    pub fn insert_session(&self, token: &str, user: UserData) {
        self.state.lock().sessions.push(SessionData {
            token: token.to_string(),
            expires_at: Utc::now() + Duration::days(1),
            user,
        });
    }

    /// Inserts a room as if it was created earlier, returning its id.
    pub fn insert_room(&self, slug: &str, name: &str, host_id: Option<PrimaryKey>) -> PrimaryKey {
        let mut state = self.state.lock();
        let id = state.next_id();

        state.rooms.push(RoomData {
            id,
            slug: slug.to_string(),
            name: name.to_string(),
            vibe: Vibe {
                name: "Chill".to_string(),
                kind: VibeKind::Preset,
            },
            host_id,
        });

        id
    }

    /// Returns the persisted room with the given id, if any.
    pub fn room_by_id(&self, room_id: PrimaryKey) -> Option<RoomData> {
        self.state
            .lock()
            .rooms
            .iter()
            .find(|r| r.id == room_id)
            .cloned()
    }

    /// Makes every following write fail, to simulate an unreachable database.
    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    /// Makes room deletions wait before they apply.
    pub fn delay_deletes(&self, delay: std::time::Duration) {
        self.state.lock().delete_delay = delay;
    }
}

impl MemoryState {
    fn next_id(&mut self) -> PrimaryKey {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes {
            return Err(DatabaseError::Internal("Database is not writable".into()));
        }

        Ok(())
    }
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        self.state
            .lock()
            .sessions
            .iter()
            .find(|s| s.token == token)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "session",
                identifier: "token",
            })
    }

    async fn room_by_slug(&self, slug: &str) -> Result<RoomData> {
        self.state
            .lock()
            .rooms
            .iter()
            .find(|r| r.slug == slug)
            .cloned()
            .ok_or(DatabaseError::NotFound {
                resource: "room",
                identifier: "slug",
            })
    }

    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData> {
        let mut state = self.state.lock();
        state.check_writable()?;

        if state.rooms.iter().any(|r| r.slug == new_room.slug) {
            return Err(DatabaseError::Conflict {
                resource: "room",
                field: "slug",
                value: new_room.slug,
            });
        }

        let room = RoomData {
            id: state.next_id(),
            slug: new_room.slug,
            name: new_room.name,
            vibe: new_room.vibe,
            host_id: Some(new_room.host_id),
        };

        state.rooms.push(room.clone());
        Ok(room)
    }

    async fn update_room_host(&self, room_id: PrimaryKey, user_id: PrimaryKey) -> Result<()> {
        let mut state = self.state.lock();
        state.check_writable()?;

        let room = state
            .rooms
            .iter_mut()
            .find(|r| r.id == room_id)
            .ok_or(DatabaseError::NotFound {
                resource: "room",
                identifier: "id",
            })?;

        room.host_id = Some(user_id);
        Ok(())
    }

    async fn delete_room(&self, room_id: PrimaryKey) -> Result<()> {
        let delay = self.state.lock().delete_delay;

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock();
        state.check_writable()?;

        state.rooms.retain(|r| r.id != room_id);
        Ok(())
    }

    async fn list_vibes(&self) -> Result<Vec<Vibe>> {
        Ok(self.state.lock().vibes.clone())
    }
}
