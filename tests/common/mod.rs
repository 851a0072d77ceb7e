// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use std::sync::Arc;
use tuneguess::config::Config;
use tuneguess::db::FirestoreDb;
use tuneguess::games::{GameContext, GameEngine};
use tuneguess::routes::create_router;
use tuneguess::services::{
    ContentClient, DiscogsClient, EnrichmentService, LyricsClient, MusicBrainzClient,
    SpotifyService, StatsService, TtlCache, WikipediaClient,
};
use tuneguess::AppState;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a mock database connection (offline).
#[allow(dead_code)]
pub fn test_db_offline() -> FirestoreDb {
    FirestoreDb::new_mock()
}

/// Build a game engine over the given database with the generative
/// content client disabled, so game modes use local generation.
#[allow(dead_code)]
pub fn test_engine(db: FirestoreDb) -> GameEngine {
    GameEngine::new(GameContext {
        db: db.clone(),
        cache: TtlCache::default(),
        content: ContentClient::new(String::new()).expect("content client"),
        stats: StatsService::new(db),
    })
}

/// Create a test app with offline mock dependencies.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    let config = Config::default();
    let db = test_db_offline();

    let token_cache = Arc::new(dashmap::DashMap::new());
    let refresh_locks = Arc::new(dashmap::DashMap::new());

    let spotify_service = SpotifyService::new(
        config.spotify_client_id.clone(),
        config.spotify_client_secret.clone(),
        db.clone(),
        token_cache,
        refresh_locks,
    )
    .expect("spotify service");

    let enrichment_service = EnrichmentService::new(
        spotify_service.clone(),
        MusicBrainzClient::new().expect("musicbrainz client"),
        DiscogsClient::new(config.discogs_api_token.clone()).expect("discogs client"),
        LyricsClient::new(config.genius_api_token.clone()).expect("lyrics client"),
        WikipediaClient::new().expect("wikipedia client"),
        db.clone(),
    );

    let stats_service = StatsService::new(db.clone());
    let engine = test_engine(db.clone());

    let state = Arc::new(AppState {
        config,
        db,
        spotify_service,
        enrichment_service,
        stats_service,
        engine,
    });

    (create_router(state.clone()), state)
}
