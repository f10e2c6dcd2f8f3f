use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize};
use std::time::{Duration, Instant};
use url::Url;
use vibes_core::{Track, TrackSource};

use crate::util::URL_SCHEME_REGEX;

use super::{InputError, Inputable};

const API_BASE: &str = "https://api.spotify.com/v1";
const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Client credentials of a Spotify app
#[derive(Debug, Clone)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Resolves Spotify tracks, albums and playlists with the Web API.
/// The playable locator of a resolved track is its `spotify:` URI.
pub struct SpotifyInput {
    client: Client,
    credentials: SpotifyCredentials,
    token: Mutex<Option<AccessToken>>,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, PartialEq, Eq)]
enum UrlExtraction {
    Track(String),
    Album(String),
    Playlist(String),
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct SpotifyTrack {
    id: Option<String>,
    name: String,
    uri: String,
    duration_ms: u64,
    artists: Vec<Artist>,
    album: Option<Album>,
}

#[derive(Debug, Clone, Deserialize)]
struct Artist {
    name: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Album {
    #[serde(default)]
    images: Vec<Image>,
}

#[derive(Debug, Clone, Deserialize)]
struct Image {
    url: String,
    width: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct FullAlbum {
    #[serde(default)]
    images: Vec<Image>,
    tracks: Page<SpotifyTrack>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    track: Option<SpotifyTrack>,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    items: Vec<T>,
}

impl SpotifyInput {
    /// Only the first page of albums and playlists is resolved
    const PAGE_LIMIT: usize = 100;

    pub fn new(credentials: SpotifyCredentials) -> Self {
        Self {
            client: Client::new(),
            credentials,
            token: Mutex::new(None),
        }
    }

    /// Returns true if the query is a Spotify link or URI, regardless of whether credentials exist.
    pub fn matches(query: &str) -> bool {
        UrlExtraction::parse(query).is_some()
    }

    async fn access_token(&self) -> Result<String, InputError> {
        if let Some(token) = self
            .token
            .lock()
            .as_ref()
            .filter(|t| t.expires_at > Instant::now())
        {
            return Ok(token.value.clone());
        }

        let response = self
            .client
            .post(TOKEN_URL)
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| InputError::FetchError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(InputError::FetchError(format!(
                "Spotify token request failed with {}",
                response.status()
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| InputError::ParseError(e.to_string()))?;

        // Refresh a little early so a token never expires mid-request
        let lifetime = Duration::from_secs(token.expires_in.saturating_sub(30));

        *self.token.lock() = Some(AccessToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });

        Ok(token.access_token)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, InputError> {
        let token = self.access_token().await?;

        let response = self
            .client
            .get(format!("{}{}", API_BASE, path))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| InputError::FetchError(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST => Err(InputError::NotFound),
            StatusCode::FORBIDDEN => Err(InputError::Unavailable),
            status if !status.is_success() => Err(InputError::FetchError(format!(
                "Spotify responded with {}",
                status
            ))),
            _ => response
                .json()
                .await
                .map_err(|e| InputError::ParseError(e.to_string())),
        }
    }
}

#[async_trait]
impl Inputable for SpotifyInput {
    fn test(&self, query: &str) -> bool {
        Self::matches(query)
    }

    async fn fetch(&self, query: &str) -> Result<Vec<Track>, InputError> {
        let extraction = UrlExtraction::parse(query).ok_or(InputError::NoMatch)?;

        let tracks = match extraction {
            UrlExtraction::Track(id) => {
                let track: SpotifyTrack = self.get(&format!("/tracks/{}", id)).await?;
                track.into_track(None).into_iter().collect()
            }
            UrlExtraction::Album(id) => {
                let album: FullAlbum = self
                    .get(&format!("/albums/{}?limit={}", id, Self::PAGE_LIMIT))
                    .await?;
                let artwork = largest_image(&album.images);

                album
                    .tracks
                    .items
                    .into_iter()
                    .filter_map(|t| t.into_track(artwork.clone()))
                    .collect()
            }
            UrlExtraction::Playlist(id) => {
                let page: Page<PlaylistItem> = self
                    .get(&format!("/playlists/{}/tracks?limit={}", id, Self::PAGE_LIMIT))
                    .await?;

                page.items
                    .into_iter()
                    .filter_map(|i| i.track)
                    .filter_map(|t| t.into_track(None))
                    .collect::<Vec<_>>()
            }
        };

        if tracks.is_empty() {
            return Err(InputError::Unavailable);
        }

        Ok(tracks)
    }
}

impl UrlExtraction {
    fn parse(query: &str) -> Option<Self> {
        let query = query.trim();

        if let Some(rest) = query.strip_prefix("spotify:") {
            let mut parts = rest.split(':');
            return Self::from_parts(parts.next()?, parts.next()?);
        }

        let query = URL_SCHEME_REGEX.replace(query, "https://");
        let url = Url::parse(&query).ok()?;

        if url.host_str() != Some("open.spotify.com") {
            return None;
        }

        // Localized links look like /intl-de/track/{id}
        let segments: Vec<_> = url
            .path_segments()?
            .filter(|s| !s.is_empty() && !s.starts_with("intl-"))
            .collect();

        match segments.as_slice() {
            [kind, id] => Self::from_parts(kind, id),
            _ => None,
        }
    }

    fn from_parts(kind: &str, id: &str) -> Option<Self> {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return None;
        }

        let id = id.to_string();

        match kind {
            "track" => Some(Self::Track(id)),
            "album" => Some(Self::Album(id)),
            "playlist" => Some(Self::Playlist(id)),
            _ => None,
        }
    }
}

impl SpotifyTrack {
    /// Local files have no id and cannot be played by clients
    fn into_track(self, artwork: Option<String>) -> Option<Track> {
        let id = self.id?;

        Some(Track {
            artwork: artwork.or_else(|| self.album.and_then(|a| largest_image(&a.images))),
            artist: self
                .artists
                .iter()
                .map(|a| a.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            duration: Duration::from_millis(self.duration_ms),
            locator: self.uri,
            source: TrackSource::Spotify,
            title: self.name,
            id,
        })
    }
}

fn largest_image(images: &[Image]) -> Option<String> {
    images
        .iter()
        .max_by_key(|i| i.width.unwrap_or_default())
        .map(|i| i.url.clone())
}
