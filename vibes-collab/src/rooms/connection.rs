use vibes_core::Id;

use crate::UserData;

use super::RoomId;

pub type ConnectionId = Id<Connection>;

/// An open client connection, authenticated as a user
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    pub user: UserData,
    /// The room this connection joined, if any
    pub room_id: Option<RoomId>,
}

impl Connection {
    pub fn new(user: UserData) -> Self {
        Self {
            id: ConnectionId::new(),
            user,
            room_id: None,
        }
    }
}
