//! Normalized artist records built by the enrichment pipeline.

use serde::{Deserialize, Serialize};

/// The artist's most-streamed track, as reported by Spotify.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PopularSong {
    pub name: String,
    pub spotify_id: String,
    pub uri: String,
}

/// A user's top artist, enriched from multiple metadata sources.
///
/// Stored in `top_artists` with document ID `{user_id}_{spotify_id}`.
/// Every enrichment field is optional: a metadata source being down
/// degrades the record rather than blocking the sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopArtist {
    /// Owning user (Spotify user ID)
    pub user_id: String,
    /// Spotify artist ID
    pub spotify_id: String,
    pub name: String,
    /// Genres from the Spotify catalog
    #[serde(default)]
    pub genres: Vec<String>,
    /// Spotify popularity score, 0-100
    pub popularity: u32,
    pub followers: Option<u64>,
    /// Year of first release (Discogs)
    pub debut_year: Option<i32>,
    /// Birth year for persons, formation year for groups (MusicBrainz)
    pub birth_year: Option<i32>,
    /// Number of members for groups, 1 for persons (Discogs)
    pub members: Option<u32>,
    /// Country of origin (MusicBrainz)
    pub country: Option<String>,
    /// "male" / "female" for persons, None for groups (MusicBrainz)
    pub gender: Option<String>,
    pub most_popular_song: Option<PopularSong>,
    /// Album count from the Spotify catalog
    pub num_albums: Option<u32>,
    /// Assembled Wikipedia biography, or the "No biography available"
    /// sentinel
    pub biography: Option<String>,
    pub image_url: Option<String>,
    /// When this record was last refreshed (ISO 8601)
    pub updated_at: String,
}

impl TopArtist {
    /// True if the biography holds real prose rather than the sentinel.
    pub fn has_biography(&self) -> bool {
        matches!(&self.biography, Some(bio)
            if !bio.is_empty() && bio != crate::services::wiki::NO_BIOGRAPHY)
    }
}
