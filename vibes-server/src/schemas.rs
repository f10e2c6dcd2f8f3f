use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::{request::Parts, StatusCode},
};
use serde::{de::DeserializeOwned, Deserialize};
use validator::{Validate, ValidationError, ValidationErrors};
use vibes_collab::{RoomId, Vibe, VibeKind};

/// Events sent by clients over the gateway
#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    JoinRoom(JoinRoomSchema),
    CreateRoom(NewRoomSchema),
    LeaveRoom(RoomSchema),
    SendMessage(MessageSchema),
    HostPlaybackChange(PlaybackChangeSchema),
    SkipTrack(RoomSchema),
    PlayPrevTrack(RoomSchema),
    PlayTrackAtIndex(IndexSchema),
    AddTrack(AddTrackSchema),
    DeleteTrack(IndexSchema),
    ApproveSuggestion(SuggestionSchema),
    RejectSuggestion(SuggestionSchema),
    Search(SearchSchema),
}

#[derive(Debug, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct JoinRoomSchema {
    #[validate(length(min = 1, max = 128))]
    pub slug: String,
}

#[derive(Debug, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewRoomSchema {
    #[validate(length(max = 64), custom(function = "not_blank"))]
    pub name: String,
    #[validate(nested)]
    pub vibe: VibeSchema,
}

#[derive(Debug, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct VibeSchema {
    #[validate(length(max = 32), custom(function = "not_blank"))]
    pub name: String,
    pub kind: VibeKindSchema,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VibeKindSchema {
    Preset,
    Custom,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RoomSchema {
    pub room_id: RoomId,
}

#[derive(Debug, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MessageSchema {
    pub room_id: RoomId,
    #[validate(length(max = 4096))]
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PlaybackChangeSchema {
    pub room_id: RoomId,
    /// Milliseconds into the track
    pub position: Option<u64>,
    pub is_playing: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct IndexSchema {
    pub room_id: RoomId,
    /// Negative means "nothing"
    pub index: i64,
}

#[derive(Debug, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AddTrackSchema {
    pub room_id: RoomId,
    /// A URL or a search query
    #[serde(alias = "url")]
    #[validate(length(max = 2048), custom(function = "not_blank"))]
    pub query: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SuggestionSchema {
    pub room_id: RoomId,
    pub suggestion_id: u64,
}

#[derive(Debug, Validate, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SearchSchema {
    #[validate(length(max = 256), custom(function = "not_blank"))]
    pub query: String,
}

impl ClientEvent {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        match self {
            ClientEvent::JoinRoom(body) => body.validate(),
            ClientEvent::CreateRoom(body) => body.validate(),
            ClientEvent::SendMessage(body) => body.validate(),
            ClientEvent::AddTrack(body) => body.validate(),
            ClientEvent::Search(body) => body.validate(),
            _ => Ok(()),
        }
    }
}

impl From<VibeSchema> for Vibe {
    fn from(value: VibeSchema) -> Self {
        let kind = match value.kind {
            VibeKindSchema::Preset => VibeKind::Preset,
            VibeKindSchema::Custom => VibeKind::Custom,
        };

        Vibe {
            name: value.name.trim().to_string(),
            kind,
        }
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }

    Ok(())
}

/// Like [Query], but rejects values that don't pass validation
pub struct ValidatedQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ValidatedQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(extracted) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|_| (StatusCode::BAD_REQUEST, "Query parse failed"))?;

        extracted
            .validate()
            .map_err(|_| (StatusCode::BAD_REQUEST, "Query is invalid"))?;

        Ok(Self(extracted))
    }
}
