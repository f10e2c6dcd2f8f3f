use chrono::{DateTime, Utc};

/// The type used for primary keys in the database.
pub type PrimaryKey = i32;

/// A user profile as provided by the auth collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserData {
    pub id: PrimaryKey,
    pub display_name: String,
    pub avatar: Option<String>,
}

/// Login session data for authentication
#[derive(Debug, Clone)]
pub struct SessionData {
    /// The session token, or key if you will
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// The user that is logged in
    pub user: UserData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VibeKind {
    /// Offered to everyone in the lobby
    Preset,
    /// Made up by a room creator
    Custom,
}

/// The category tag of a room
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Vibe {
    pub name: String,
    pub kind: VibeKind,
}

/// A persisted room
#[derive(Debug, Clone)]
pub struct RoomData {
    pub id: PrimaryKey,
    /// A slug used to join the room, never changes
    pub slug: String,
    pub name: String,
    pub vibe: Vibe,
    /// The last known host of the room
    pub host_id: Option<PrimaryKey>,
}

impl VibeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VibeKind::Preset => "preset",
            VibeKind::Custom => "custom",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "preset" => Some(VibeKind::Preset),
            "custom" => Some(VibeKind::Custom),
            _ => None,
        }
    }
}
