use axum::{
    async_trait, debug_handler,
    extract::{FromRef, FromRequestParts, Query},
    http::{header, request::Parts, StatusCode},
    routing::get,
    Json,
};
use serde::Deserialize;
use vibes_collab::{SessionData, UserData};

use crate::{
    serialized::{ToSerialized, User},
    Router, ServerContext,
};

/// Wraps [SessionData] so [FromRequestParts] can be implemented for it
pub struct Session(SessionData);

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

impl Session {
    /// Returns the user of the session
    pub fn user(&self) -> UserData {
        self.0.user.clone()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
    ServerContext: FromRef<S>,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let context = ServerContext::from_ref(state);
        let token = token(parts)?;

        let session = context
            .collab
            .auth
            .session(&token)
            .await
            .map_err(|_| (StatusCode::UNAUTHORIZED, "Session does not exist"))?;

        Ok(Self(session))
    }
}

/// Browsers can't set headers on websockets, so the token may also come as `?token=`
fn token(parts: &Parts) -> Result<String, (StatusCode, &'static str)> {
    if let Some(value) = parts.headers.get(header::AUTHORIZATION) {
        let value = value
            .to_str()
            .map_err(|_| (StatusCode::BAD_REQUEST, "Authorization is malformed"))?;

        let parts: Vec<_> = value.split_ascii_whitespace().collect();

        return match parts.as_slice() {
            ["Bearer", token] => Ok(token.to_string()),
            _ => Err((StatusCode::BAD_REQUEST, "Authorization must be Bearer")),
        };
    }

    Query::<TokenQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(query)| query.token)
        .ok_or((StatusCode::UNAUTHORIZED, "Missing authorization"))
}

#[debug_handler(state = ServerContext)]
async fn user(session: Session) -> Json<User> {
    Json(session.user().to_serialized())
}

pub fn router() -> Router {
    Router::new().route("/user", get(user))
}
