// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Library enrichment pipeline.
//!
//! Handles the core sync workflow:
//! 1. Fetch the user's top artists and tracks from Spotify
//! 2. Per artist, scatter-gather the metadata sources (MusicBrainz,
//!    Discogs, Spotify catalog) plus a best-effort Wikipedia biography
//! 3. Per track, inherit artist genres and fetch lyrics from Genius
//! 4. Deduplicate albums within the run
//! 5. Persist everything keyed `{user_id}_{spotify_id}`
//!
//! A single source being down degrades the affected fields to `None`;
//! an artist is skipped only when every source fails.

use std::collections::{HashMap, HashSet};

use crate::db::FirestoreDb;
use crate::error::{AppError, Result};
use crate::models::{PopularSong, TopAlbum, TopArtist, TopTrack};
use crate::services::discogs::DiscogsArtist;
use crate::services::musicbrainz::MusicBrainzArtist;
use crate::services::retry::{with_retry, FetchError, RetryPolicy};
use crate::services::spotify::{SpotifyArtist, SpotifyTrack};
use crate::services::{
    DiscogsClient, LyricsClient, MusicBrainzClient, SpotifyService, WikipediaClient,
};
use serde::Serialize;

/// How many top artists/tracks one sync pulls.
const SYNC_LIMIT: u32 = 50;

/// Outcome of one library sync.
#[derive(Debug, Default, Serialize)]
pub struct EnrichmentReport {
    pub artists_synced: u32,
    pub tracks_synced: u32,
    pub albums_synced: u32,
    pub artists_failed: u32,
    pub tracks_failed: u32,
}

/// Orchestrates the multi-source enrichment pipeline.
pub struct EnrichmentService {
    spotify: SpotifyService,
    musicbrainz: MusicBrainzClient,
    discogs: DiscogsClient,
    lyrics: LyricsClient,
    wiki: WikipediaClient,
    db: FirestoreDb,
}

impl EnrichmentService {
    pub fn new(
        spotify: SpotifyService,
        musicbrainz: MusicBrainzClient,
        discogs: DiscogsClient,
        lyrics: LyricsClient,
        wiki: WikipediaClient,
        db: FirestoreDb,
    ) -> Self {
        Self {
            spotify,
            musicbrainz,
            discogs,
            lyrics,
            wiki,
            db,
        }
    }

    /// Sync and enrich a user's library.
    ///
    /// Spotify being unreachable fails the sync; every other source only
    /// degrades it.
    pub async fn enrich_user_library(&self, user_id: &str) -> Result<EnrichmentReport> {
        tracing::info!(user_id, "Starting library sync");

        let (artists, tracks) = tokio::join!(
            self.spotify.get_top_artists(user_id, SYNC_LIMIT),
            self.spotify.get_top_tracks(user_id, SYNC_LIMIT),
        );
        let artists = artists?;
        let tracks = tracks?;

        let mut report = EnrichmentReport::default();
        let now = chrono::Utc::now().to_rfc3339();

        // Artist name -> genres, for track genre inheritance
        let genre_map: HashMap<String, Vec<String>> = artists
            .iter()
            .map(|a| (a.name.clone(), a.genres.clone()))
            .collect();

        for artist in &artists {
            match self.enrich_artist(user_id, artist, &now).await {
                Some(record) => {
                    self.db.upsert_top_artist(&record).await?;
                    report.artists_synced += 1;
                }
                None => {
                    tracing::error!(
                        user_id,
                        artist = %artist.name,
                        "All metadata sources failed, skipping artist"
                    );
                    report.artists_failed += 1;
                }
            }
        }

        for track in &tracks {
            match self.enrich_track(user_id, track, &genre_map, &now).await {
                Some(record) => {
                    self.db.upsert_top_track(&record).await?;
                    report.tracks_synced += 1;
                }
                None => report.tracks_failed += 1,
            }
        }

        let albums = dedup_albums(&tracks, user_id, &now);
        report.albums_synced = albums.len() as u32;
        self.db.batch_set_top_albums(&albums).await?;

        if let Some(mut user) = self.db.get_user(user_id).await? {
            user.last_synced_at = Some(now.clone());
            self.db.upsert_user(&user).await?;
        }

        tracing::info!(
            user_id,
            artists_synced = report.artists_synced,
            tracks_synced = report.tracks_synced,
            albums_synced = report.albums_synced,
            artists_failed = report.artists_failed,
            tracks_failed = report.tracks_failed,
            "Library sync complete"
        );

        Ok(report)
    }

    /// Enrich one artist from all sources concurrently.
    ///
    /// Returns `None` only when every source arm failed.
    async fn enrich_artist(
        &self,
        user_id: &str,
        artist: &SpotifyArtist,
        now: &str,
    ) -> Option<TopArtist> {
        let policy = RetryPolicy::default();

        let (mb, dg, top_track, album_count) = tokio::join!(
            with_retry(&policy, "musicbrainz", || self
                .musicbrainz
                .lookup_artist(&artist.name)),
            with_retry(&policy, "discogs", || self.discogs.lookup_artist(&artist.name)),
            with_retry(&policy, "spotify top track", || self
                .catalog_top_track(user_id, &artist.id)),
            with_retry(&policy, "spotify album count", || self
                .catalog_album_count(user_id, &artist.id)),
        );

        let all_failed =
            mb.is_err() && dg.is_err() && top_track.is_err() && album_count.is_err();
        if all_failed {
            return None;
        }

        let mb = mb
            .map_err(|e| tracing::warn!(artist = %artist.name, error = %e, "MusicBrainz lookup failed"))
            .ok()
            .flatten()
            .unwrap_or_default();
        let dg = dg
            .map_err(|e| tracing::warn!(artist = %artist.name, error = %e, "Discogs lookup failed"))
            .ok()
            .flatten()
            .unwrap_or_default();
        let top_track = top_track
            .map_err(|e| tracing::warn!(artist = %artist.name, error = %e, "Top track lookup failed"))
            .ok()
            .flatten();
        let album_count = album_count
            .map_err(|e| tracing::warn!(artist = %artist.name, error = %e, "Album count lookup failed"))
            .ok();

        // Best-effort biography after the metadata join
        let biography = match with_retry(&RetryPolicy::extended(), "wikipedia", || {
            self.wiki.fetch_biography(&artist.name)
        })
        .await
        {
            Ok(bio) => bio,
            Err(e) => {
                tracing::warn!(artist = %artist.name, error = %e, "Biography fetch failed");
                None
            }
        };

        Some(assemble_artist(
            user_id,
            artist,
            mb,
            dg,
            top_track,
            album_count,
            biography,
            now,
        ))
    }

    /// Spotify catalog arm of the scatter-gather, classified for the
    /// retry loop.
    async fn catalog_top_track(
        &self,
        user_id: &str,
        artist_id: &str,
    ) -> std::result::Result<Option<SpotifyTrack>, FetchError> {
        self.spotify
            .get_artist_top_track(user_id, artist_id)
            .await
            .map_err(classify_catalog_error)
    }

    async fn catalog_album_count(
        &self,
        user_id: &str,
        artist_id: &str,
    ) -> std::result::Result<u32, FetchError> {
        self.spotify
            .get_artist_album_count(user_id, artist_id)
            .await
            .map_err(classify_catalog_error)
    }

    /// Normalize one track; lyric failures leave `lyrics` unset.
    async fn enrich_track(
        &self,
        user_id: &str,
        track: &SpotifyTrack,
        genre_map: &HashMap<String, Vec<String>>,
        now: &str,
    ) -> Option<TopTrack> {
        let primary = track.artists.first()?;

        let lyrics = match with_retry(&RetryPolicy::extended(), "genius", || {
            self.lyrics.fetch_lyrics(&track.name, Some(&primary.name))
        })
        .await
        {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(track = %track.name, error = %e, "Lyric fetch failed");
                None
            }
        };

        Some(TopTrack {
            user_id: user_id.to_string(),
            spotify_id: track.id.clone(),
            name: track.name.clone(),
            artist: primary.name.clone(),
            artist_spotify_id: primary.id.clone(),
            album: track.album.name.clone(),
            genres: genre_map.get(&primary.name).cloned().unwrap_or_default(),
            duration_secs: crate::time_utils::duration_ms_to_secs(track.duration_ms),
            release_date: crate::time_utils::pad_release_date(&track.album.release_date),
            popularity: track.popularity,
            lyrics,
            track_uri: track.uri.clone(),
            updated_at: now.to_string(),
        })
    }
}

/// Classify a Spotify catalog error for the retry loop: credential
/// problems are permanent, everything else (rate limit, outage,
/// transport) is worth another try.
fn classify_catalog_error(e: AppError) -> FetchError {
    match &e {
        AppError::SpotifyApi(msg) if msg == AppError::SPOTIFY_TOKEN_ERROR => {
            FetchError::Permanent(format!("spotify: {msg}"))
        }
        AppError::InvalidToken | AppError::NotFound(_) => {
            FetchError::Permanent(format!("spotify: {e}"))
        }
        _ => FetchError::Transient(format!("spotify: {e}")),
    }
}

/// Merge the per-source results into one library record. A source that
/// failed arrives as its default and its fields stay `None`.
#[allow(clippy::too_many_arguments)]
fn assemble_artist(
    user_id: &str,
    artist: &SpotifyArtist,
    mb: MusicBrainzArtist,
    dg: DiscogsArtist,
    top_track: Option<SpotifyTrack>,
    album_count: Option<u32>,
    biography: Option<String>,
    now: &str,
) -> TopArtist {
    // Gender only makes sense for persons
    let is_person = mb.artist_type.as_deref() == Some("Person");

    TopArtist {
        user_id: user_id.to_string(),
        spotify_id: artist.id.clone(),
        name: artist.name.clone(),
        genres: artist.genres.clone(),
        popularity: artist.popularity,
        followers: artist.followers.as_ref().map(|f| f.total),
        debut_year: dg.debut_year,
        birth_year: mb.begin_year,
        members: dg.members,
        country: mb.country,
        gender: if is_person { mb.gender } else { None },
        most_popular_song: top_track.map(|t| PopularSong {
            name: t.name,
            spotify_id: t.id,
            uri: t.uri,
        }),
        num_albums: album_count,
        biography,
        image_url: artist.images.first().map(|i| i.url.clone()),
        updated_at: now.to_string(),
    }
}

/// Collapse the albums behind a track list, one record per Spotify album ID.
fn dedup_albums(tracks: &[SpotifyTrack], user_id: &str, now: &str) -> Vec<TopAlbum> {
    let mut seen = HashSet::new();
    let mut albums = Vec::new();

    for track in tracks {
        if !seen.insert(track.album.id.clone()) {
            continue;
        }
        albums.push(TopAlbum {
            user_id: user_id.to_string(),
            spotify_id: track.album.id.clone(),
            name: track.album.name.clone(),
            artist: track
                .album
                .artists
                .first()
                .map(|a| a.name.clone())
                .unwrap_or_default(),
            release_date: crate::time_utils::pad_release_date(&track.album.release_date),
            total_tracks: track.album.total_tracks,
            image_url: track.album.images.first().map(|i| i.url.clone()),
            updated_at: now.to_string(),
        });
    }

    albums
}
