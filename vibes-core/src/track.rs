use std::{fmt::Display, time::Duration};

/// Where a track was resolved from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackSource {
    YouTube,
    Spotify,
}

/// Normalized metadata of a playable track.
///
/// Tracks are never mutated after resolution, the playlist and suggestions hold clones.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// The identifier of the track at its source, e.g. a YouTube video id
    pub id: String,
    pub title: String,
    pub artist: String,
    pub artwork: Option<String>,
    pub duration: Duration,
    /// A URL or URI the client hands to its player
    pub locator: String,
    pub source: TrackSource,
}

impl TrackSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackSource::YouTube => "youtube",
            TrackSource::Spotify => "spotify",
        }
    }
}

impl Display for TrackSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Display for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} - {} ({})", self.artist, self.title, self.source)
    }
}
