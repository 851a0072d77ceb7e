// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! TuneGuess API Server
//!
//! Music trivia games built on the user's own Spotify listening history:
//! lyric challenges, artist guessing, crosswords and trivia, backed by a
//! multi-source enrichment pipeline.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tuneguess::{
    config::Config,
    db::FirestoreDb,
    games::{GameContext, GameEngine},
    services::{
        ContentClient, DiscogsClient, EnrichmentService, LyricsClient, MusicBrainzClient,
        SpotifyService, StatsService, TtlCache, WikipediaClient,
    },
    AppState,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting TuneGuess API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .expect("Failed to connect to Firestore");

    // Initialize shared token cache and refresh locks
    // These are shared across all SpotifyService instances within this instance
    let token_cache = Arc::new(dashmap::DashMap::new());
    let refresh_locks = Arc::new(dashmap::DashMap::new());
    tracing::info!("Token cache initialized");

    // Initialize Spotify service
    let spotify_service = SpotifyService::new(
        config.spotify_client_id.clone(),
        config.spotify_client_secret.clone(),
        db.clone(),
        token_cache,
        refresh_locks,
    )
    .expect("Failed to build Spotify client");

    // Metadata source clients for the enrichment pipeline
    let musicbrainz = MusicBrainzClient::new().expect("Failed to build MusicBrainz client");
    let discogs =
        DiscogsClient::new(config.discogs_api_token.clone()).expect("Failed to build Discogs client");
    let lyrics =
        LyricsClient::new(config.genius_api_token.clone()).expect("Failed to build lyrics client");
    let wiki = WikipediaClient::new().expect("Failed to build Wikipedia client");

    let enrichment_service = EnrichmentService::new(
        spotify_service.clone(),
        musicbrainz,
        discogs,
        lyrics,
        wiki,
        db.clone(),
    );

    // Generative content client; an empty key disables it and the game
    // modes fall back to local generation
    let content =
        ContentClient::new(config.content_api_key.clone()).expect("Failed to build content client");
    if !content.is_enabled() {
        tracing::warn!("CONTENT_API_KEY not set, using local game content generation");
    }

    let stats_service = StatsService::new(db.clone());

    let engine = GameEngine::new(GameContext {
        db: db.clone(),
        cache: TtlCache::default(),
        content,
        stats: stats_service.clone(),
    });

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        spotify_service,
        enrichment_service,
        stats_service,
        engine,
    });

    // Build router
    let app = tuneguess::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("tuneguess=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
