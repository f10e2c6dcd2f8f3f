use axum::{
    extract::{Path, State},
    routing::get,
    Json,
};

use crate::{
    auth::Session,
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::{SearchSchema, ValidatedQuery},
    serialized::{Room, RoomSummary, ToSerialized, Track, Vibe},
    Router,
};

/// Lists the rooms that are currently active
async fn list_rooms(State(context): State<ServerContext>) -> Json<Vec<RoomSummary>> {
    let rooms: Vec<_> = context
        .collab
        .rooms
        .list_all()
        .into_iter()
        .map(|r| r.summary().to_serialized())
        .collect();

    Json(rooms)
}

async fn room(
    _session: Session,
    State(context): State<ServerContext>,
    Path(slug): Path<String>,
) -> ServerResult<Json<Room>> {
    // Only active rooms, loading one here would keep it around without listeners
    let room = context
        .collab
        .rooms
        .room_by_slug(&slug)
        .filter(|room| !room.is_closed())
        .ok_or(ServerError::NotFound {
            resource: "room",
            identifier: "slug",
        })?;

    Ok(Json(room.snapshot().to_serialized()))
}

async fn vibes(State(context): State<ServerContext>) -> ServerResult<Json<Vec<Vibe>>> {
    let vibes = context.collab.database.list_vibes().await?;

    Ok(Json(vibes.to_serialized()))
}

async fn search(
    _session: Session,
    State(context): State<ServerContext>,
    ValidatedQuery(body): ValidatedQuery<SearchSchema>,
) -> ServerResult<Json<Vec<Track>>> {
    let tracks = context.collab.rooms.find_tracks(&body.query).await?;

    Ok(Json(tracks.to_serialized()))
}

pub fn router() -> Router {
    Router::new()
        .route("/rooms", get(list_rooms))
        .route("/rooms/:slug", get(room))
        .route("/vibes", get(vibes))
        .route("/search", get(search))
}
