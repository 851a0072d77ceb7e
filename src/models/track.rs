//! Normalized track and album records built by the enrichment pipeline.

use serde::{Deserialize, Serialize};

/// A user's top track.
///
/// Stored in `top_tracks` with document ID `{user_id}_{spotify_id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopTrack {
    /// Owning user (Spotify user ID)
    pub user_id: String,
    /// Spotify track ID
    pub spotify_id: String,
    pub name: String,
    /// Primary artist name
    pub artist: String,
    /// Spotify ID of the primary artist
    pub artist_spotify_id: String,
    pub album: String,
    /// Genres inherited from the primary artist
    #[serde(default)]
    pub genres: Vec<String>,
    /// Duration in seconds, rounded to two decimals
    pub duration_secs: f64,
    /// Release date padded to a full `YYYY-MM-DD`
    pub release_date: String,
    pub popularity: u32,
    /// Full lyric text when Genius had it
    pub lyrics: Option<String>,
    pub track_uri: String,
    /// When this record was last refreshed (ISO 8601)
    pub updated_at: String,
}

impl TopTrack {
    /// True if the track carries usable lyric text.
    pub fn has_lyrics(&self) -> bool {
        matches!(&self.lyrics, Some(text)
            if !text.trim().is_empty() && text != crate::services::lyrics::NO_LYRICS)
    }
}

/// An album owning at least one of the user's top tracks.
///
/// Stored in `top_albums` with document ID `{user_id}_{spotify_id}`,
/// deduplicated by Spotify album ID within one enrichment run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopAlbum {
    pub user_id: String,
    /// Spotify album ID
    pub spotify_id: String,
    pub name: String,
    pub artist: String,
    /// Release date padded to a full `YYYY-MM-DD`
    pub release_date: String,
    pub total_tracks: u32,
    pub image_url: Option<String>,
    pub updated_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(lyrics: Option<&str>) -> TopTrack {
        TopTrack {
            user_id: "user1".to_string(),
            spotify_id: "track1".to_string(),
            name: "Song".to_string(),
            artist: "Artist".to_string(),
            artist_spotify_id: "artist1".to_string(),
            album: "Album".to_string(),
            genres: vec![],
            duration_secs: 200.5,
            release_date: "2001-01-01".to_string(),
            popularity: 50,
            lyrics: lyrics.map(String::from),
            track_uri: "spotify:track:track1".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_has_lyrics() {
        assert!(track(Some("Some real lyric text")).has_lyrics());
        assert!(!track(None).has_lyrics());
        assert!(!track(Some("")).has_lyrics());
        assert!(!track(Some("No lyrics available")).has_lyrics());
    }
}
