use async_trait::async_trait;
use thiserror::Error;
use url::Url;
use vibes_core::Track;

mod spotify;
mod youtube;

pub use spotify::*;
pub use youtube::*;

use crate::util::URL_SCHEME_REGEX;

#[derive(Debug, Error)]
pub enum InputError {
    #[error("Input did not match any supported source")]
    NoMatch,

    #[error("Input is invalid: {0}")]
    Invalid(String),

    #[error("Input type is supported but resource was not found")]
    NotFound,

    #[error("Resource was found but is unavailable")]
    Unavailable,

    #[error("Unsupported input type")]
    UnsupportedType,

    #[error("Failed to fetch resource: {0}")]
    FetchError(String),

    #[error("Failed to parse resource: {0}")]
    ParseError(String),

    #[error("Looking up the track took too long")]
    Timeout,

    #[error("{0}")]
    Other(String),
}

/// Turns user input into tracks. The room engine only talks to this trait.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolves a URL or a free-text query into one or more tracks.
    /// Playlist URLs resolve to all of their playable entries.
    async fn resolve(&self, query: &str) -> Result<Vec<Track>, InputError>;

    /// Searches for tracks matching a free-text query.
    async fn search(&self, query: &str) -> Result<Vec<Track>, InputError>;
}

/// Represents a source that tracks can be resolved from
#[async_trait]
pub trait Inputable {
    /// Returns true if the given query matches the pattern of this inputable
    fn test(&self, query: &str) -> bool;

    /// Attempts to fetch the resource from the given query.
    /// This can return multiple results if the query is a playlist.
    async fn fetch(&self, query: &str) -> Result<Vec<Track>, InputError>;
}

/// The default resolver, trying each supported source in turn.
/// Free-text queries are searched on YouTube and resolve to the first hit.
pub struct Input {
    youtube: YouTubeInput,
    spotify: Option<SpotifyInput>,
}

impl Input {
    /// The amount of results returned by [Resolver::search]
    pub const SEARCH_LIMIT: usize = 10;

    pub fn new(spotify: Option<SpotifyCredentials>) -> Self {
        Self {
            youtube: YouTubeInput,
            spotify: spotify.map(SpotifyInput::new),
        }
    }
}

#[async_trait]
impl Resolver for Input {
    async fn resolve(&self, query: &str) -> Result<Vec<Track>, InputError> {
        let query = query.trim();

        if query.is_empty() {
            return Err(InputError::Invalid("Query is empty".to_string()));
        }

        if self.youtube.test(query) {
            return self.youtube.fetch(query).await;
        }

        if SpotifyInput::matches(query) {
            return match &self.spotify {
                Some(spotify) => spotify.fetch(query).await,
                None => Err(InputError::UnsupportedType),
            };
        }

        if looks_like_url(query) {
            return Err(InputError::NoMatch);
        }

        let first = self
            .youtube
            .search(query, 1)
            .await?
            .into_iter()
            .next()
            .ok_or(InputError::NotFound)?;

        Ok(vec![first])
    }

    async fn search(&self, query: &str) -> Result<Vec<Track>, InputError> {
        let query = query.trim();

        if query.is_empty() {
            return Ok(vec![]);
        }

        self.youtube.search(query, Self::SEARCH_LIMIT).await
    }
}

/// Returns true for input that is meant as a link rather than a search.
fn looks_like_url(query: &str) -> bool {
    if query.contains(char::is_whitespace) || !query.contains('.') {
        return false;
    }

    let query = URL_SCHEME_REGEX.replace(query, "https://");

    Url::parse(&query)
        .map(|url| url.host_str().is_some())
        .unwrap_or(false)
}
