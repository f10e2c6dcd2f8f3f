use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, query, query_as, Error as SqlxError, FromRow, PgPool};

use crate::{
    Database, DatabaseError, DatabaseResult, IntoDatabaseError, NewRoom, PrimaryKey, Result,
    RoomData, SessionData, UserData, Vibe, VibeKind,
};

/// A postgres database implementation
pub struct PgDatabase {
    pool: PgPool,
}

#[derive(FromRow)]
struct RoomRow {
    id: PrimaryKey,
    slug: String,
    name: String,
    vibe_name: String,
    vibe_kind: String,
    host_id: Option<PrimaryKey>,
}

#[derive(FromRow)]
struct SessionRow {
    token: String,
    expires_at: DateTime<Utc>,
    user_id: PrimaryKey,
    display_name: String,
    avatar: Option<String>,
}

#[derive(FromRow)]
struct VibeRow {
    name: String,
    kind: String,
}

impl PgDatabase {
    /// Connects to the database and applies pending migrations.
    pub async fn new(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| e.any())?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(|e| DatabaseError::Internal(Box::new(e)))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl Database for PgDatabase {
    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        let row: SessionRow = query_as(
            "SELECT
                sessions.token,
                sessions.expires_at,
                sessions.user_id,
                users.display_name,
                users.avatar
            FROM sessions
                INNER JOIN users ON sessions.user_id = users.id
            WHERE token = $1",
        )
        .bind(token)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("session", "token"))?;

        Ok(SessionData {
            token: row.token,
            expires_at: row.expires_at,
            user: UserData {
                id: row.user_id,
                display_name: row.display_name,
                avatar: row.avatar,
            },
        })
    }

    async fn room_by_slug(&self, slug: &str) -> Result<RoomData> {
        let row: RoomRow = query_as("SELECT * FROM rooms WHERE slug = $1")
            .bind(slug)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("room", "slug"))?;

        row.try_into()
    }

    async fn create_room(&self, new_room: NewRoom) -> Result<RoomData> {
        self.room_by_slug(&new_room.slug)
            .await
            .conflict_or_ok("room", "slug", &new_room.slug)?;

        let row: RoomRow = query_as(
            "INSERT INTO rooms (slug, name, vibe_name, vibe_kind, host_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *",
        )
        .bind(&new_room.slug)
        .bind(&new_room.name)
        .bind(&new_room.vibe.name)
        .bind(new_room.vibe.kind.as_str())
        .bind(new_room.host_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?;

        row.try_into()
    }

    async fn update_room_host(&self, room_id: PrimaryKey, user_id: PrimaryKey) -> Result<()> {
        let result = query("UPDATE rooms SET host_id = $1 WHERE id = $2")
            .bind(user_id)
            .bind(room_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "room",
                identifier: "id",
            });
        }

        Ok(())
    }

    async fn delete_room(&self, room_id: PrimaryKey) -> Result<()> {
        query("DELETE FROM rooms WHERE id = $1")
            .bind(room_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn list_vibes(&self) -> Result<Vec<Vibe>> {
        let rows: Vec<VibeRow> = query_as("SELECT name, kind FROM vibes ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())?;

        Ok(rows
            .into_iter()
            .filter_map(|r| {
                VibeKind::parse(&r.kind).map(|kind| Vibe { name: r.name, kind })
            })
            .collect())
    }
}

impl TryFrom<RoomRow> for RoomData {
    type Error = DatabaseError;

    fn try_from(row: RoomRow) -> Result<Self> {
        let kind = VibeKind::parse(&row.vibe_kind).ok_or_else(|| {
            DatabaseError::Internal(format!("Unknown vibe kind {}", row.vibe_kind).into())
        })?;

        Ok(RoomData {
            id: row.id,
            slug: row.slug,
            name: row.name,
            vibe: Vibe {
                name: row.vibe_name,
                kind,
            },
            host_id: row.host_id,
        })
    }
}

impl IntoDatabaseError for SqlxError {
    fn any(self) -> DatabaseError {
        DatabaseError::Internal(Box::new(self))
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError {
        match self {
            SqlxError::RowNotFound => DatabaseError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }
}
