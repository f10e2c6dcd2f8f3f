use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::process::Command;
use url::Url;
use vibes_core::{Track, TrackSource};

use crate::util::URL_SCHEME_REGEX;

use super::{InputError, Inputable};

const YT_UNAVAILABLE: &str = "Video unavailable. This video is not available";
const YT_PRIVATE: &str = "Private video";
const YT_NOT_FOUND: &str = "Video unavailable";
const YT_ID_ERROR: &str = "Incomplete YouTube ID";

/// Resolves YouTube videos, playlists and searches using yt-dlp.
#[derive(Debug, Clone, Copy)]
pub struct YouTubeInput;

#[derive(Debug, Deserialize)]
struct FlatYouTubeVideo {
    id: String,
    title: Option<String>,
    channel: Option<String>,
    uploader: Option<String>,
    #[serde(default)]
    thumbnails: Vec<Thumbnail>,
    /// Missing for live streams and deleted playlist entries
    duration: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
    width: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct YouTubePlaylist {
    entries: Vec<FlatYouTubeVideo>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum YouTubeResource {
    Playlist(YouTubePlaylist),
    Video(FlatYouTubeVideo),
}

#[async_trait]
impl Inputable for YouTubeInput {
    fn test(&self, query: &str) -> bool {
        let query = URL_SCHEME_REGEX.replace(query, "https://");
        let url = Url::parse(&query);

        match url {
            Ok(url) => {
                // Test youtube.com
                if url
                    .host_str()
                    .filter(|s| s.ends_with("youtube.com"))
                    .is_some()
                {
                    // Test /watch?v=...
                    if url.path().starts_with("/watch")
                        && url.query_pairs().any(|(k, v)| k == "v" && !v.is_empty())
                    {
                        return true;
                    }

                    // Test /v/... and /shorts/...
                    if url.path().starts_with("/v/") || url.path().starts_with("/shorts/") {
                        return true;
                    }

                    // Test playlists
                    if url.path() == "/playlist"
                        && url
                            .query_pairs()
                            .any(|(k, v)| k == "list" && !v.is_empty())
                    {
                        return true;
                    }
                }

                // Test youtu.be/...
                if url.host_str() == Some("youtu.be") && url.path().len() > 1 {
                    return true;
                }

                false
            }
            Err(_) => false,
        }
    }

    async fn fetch(&self, query: &str) -> Result<Vec<Track>, InputError> {
        let url = URL_SCHEME_REGEX.replace(query, "https://");
        let resource = YouTubeResource::fetch(&url).await?;

        let tracks = resource.into_tracks();

        if tracks.is_empty() {
            return Err(InputError::Unavailable);
        }

        Ok(tracks)
    }
}

impl YouTubeInput {
    /// Searches YouTube, returning at most `limit` playable results.
    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<Track>, InputError> {
        let search = format!("ytsearch{}:{}", limit, query);
        let resource = YouTubeResource::fetch(&search).await?;

        Ok(resource.into_tracks())
    }
}

impl YouTubeResource {
    /// Attempts to fetch a video or several videos from the given URL using yt-dlp.
    async fn fetch(url: &str) -> Result<Self, InputError> {
        let output = Command::new("yt-dlp")
            // Don't try to get a stream url for playlists.
            .arg("--flat-playlist")
            // Or videos.
            .arg("--skip-download")
            // Get a JSON output, in a single line.
            .arg("-J")
            .args(["--", url])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| InputError::Other(e.to_string()))?;

        if !output.status.success() {
            let error_output = String::from_utf8_lossy(&output.stderr);
            return Err(classify_error(&error_output));
        }

        serde_json::from_slice(&output.stdout).map_err(|e| InputError::ParseError(e.to_string()))
    }

    fn into_tracks(self) -> Vec<Track> {
        let videos = match self {
            YouTubeResource::Video(video) => vec![video],
            YouTubeResource::Playlist(playlist) => playlist.entries,
        };

        videos.into_iter().filter_map(FlatYouTubeVideo::into_track).collect()
    }
}

impl FlatYouTubeVideo {
    fn into_track(self) -> Option<Track> {
        let duration = self.duration.filter(|d| *d > 0.)?;
        let title = self.title?;

        Some(Track {
            locator: format!("https://www.youtube.com/watch?v={}", self.id),
            artwork: determine_thumbnail(self.thumbnails),
            artist: self.channel.or(self.uploader).unwrap_or_default(),
            duration: Duration::from_secs_f32(duration),
            source: TrackSource::YouTube,
            id: self.id,
            title,
        })
    }
}

fn classify_error(error_output: &str) -> InputError {
    if error_output.contains(YT_UNAVAILABLE) || error_output.contains(YT_PRIVATE) {
        return InputError::Unavailable;
    }

    if error_output.contains(YT_NOT_FOUND) {
        return InputError::NotFound;
    }

    if error_output.contains(YT_ID_ERROR) {
        return InputError::Invalid("Invalid Video ID".to_string());
    }

    InputError::FetchError(error_output.trim().to_string())
}

fn determine_thumbnail(mut thumbnails: Vec<Thumbnail>) -> Option<String> {
    // Sort to get the largest at end
    thumbnails.sort_by(|a, b| a.width.cmp(&b.width));

    thumbnails
        .pop()
        .map(|t| t.url.replace("hqdefault", "maxresdefault"))
}
