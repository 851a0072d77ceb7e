// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated users.

use crate::error::{AppError, Result};
use crate::games::{Answer, SessionView, TurnResult};
use crate::middleware::auth::AuthUser;
use crate::models::{GameStatistics, GameType, LeaderboardEntry};
use crate::services::enrichment::EnrichmentReport;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/sync", post(sync_library))
        .route("/api/games", post(create_game))
        .route("/api/games/{id}", get(get_game))
        .route("/api/games/{id}/answer", post(submit_answer))
        .route("/api/games/{id}/guess", post(submit_guess))
        .route("/api/games/{id}/restart", post(restart_game))
        .route("/api/games/{id}/artists", get(search_artists))
        .route("/api/leaderboard/{game_type}", get(get_leaderboard))
        .route("/api/statistics", get(get_statistics))
}

// ─── User Profile ────────────────────────────────────────────

/// Current user response.
#[derive(Serialize)]
pub struct UserResponse {
    pub user_id: String,
    pub display_name: String,
    pub country: Option<String>,
    pub profile_picture: Option<String>,
    pub last_synced_at: Option<String>,
}

/// Get current user profile.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserResponse>> {
    let profile = state
        .db
        .get_user(&user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", user.user_id)))?;

    Ok(Json(UserResponse {
        user_id: profile.spotify_user_id,
        display_name: profile.display_name,
        country: profile.country,
        profile_picture: profile.profile_picture,
        last_synced_at: profile.last_synced_at,
    }))
}

// ─── Library Sync ────────────────────────────────────────────

/// Sync and enrich the user's Spotify library.
///
/// Runs inline; the multi-source enrichment degrades per source, so a
/// sync never fails because one metadata provider is down.
async fn sync_library(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<EnrichmentReport>> {
    let report = state
        .enrichment_service
        .enrich_user_library(&user.user_id)
        .await?;
    Ok(Json(report))
}

// ─── Games ───────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CreateGameRequest {
    pub game_type: String,
}

/// Start a new game session.
async fn create_game(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateGameRequest>,
) -> Result<(StatusCode, Json<SessionView>)> {
    let game_type = GameType::parse(&body.game_type)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown game type: {}", body.game_type)))?;

    let view = state.engine.start_game(&user.user_id, game_type).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// Get the current state of a game session.
async fn get_game(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>> {
    let view = state.engine.get_state(&id, &user.user_id).await?;
    Ok(Json(view))
}

/// One answer submission: text for lyrics and trivia, a full grid for
/// crosswords.
#[derive(Deserialize)]
pub struct AnswerRequest {
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub grid: Option<Vec<Vec<String>>>,
}

/// Submit an answer for the current challenge.
async fn submit_answer(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<AnswerRequest>,
) -> Result<Json<TurnResult>> {
    let answer = match (body.answer, body.grid) {
        (_, Some(grid)) => Answer::Grid(grid),
        (Some(text), None) => Answer::Text(text),
        (None, None) => {
            return Err(AppError::BadRequest(
                "request needs an answer or a grid".to_string(),
            ))
        }
    };

    let result = state.engine.submit_answer(&id, &user.user_id, answer).await?;
    Ok(Json(result))
}

#[derive(Deserialize)]
pub struct GuessRequest {
    pub artist_name: String,
}

/// Submit an artist guess (guess-artist mode only).
async fn submit_guess(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<GuessRequest>,
) -> Result<Json<TurnResult>> {
    if body.artist_name.trim().is_empty() {
        return Err(AppError::BadRequest("artist_name is required".to_string()));
    }

    let result = state
        .engine
        .submit_guess(&id, &user.user_id, &body.artist_name)
        .await?;
    Ok(Json(result))
}

/// Restart a game session with fresh content.
async fn restart_game(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>> {
    let view = state.engine.restart_game(&id, &user.user_id).await?;
    Ok(Json(view))
}

#[derive(Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub artists: Vec<String>,
}

/// Autocomplete artist names from the user's library.
async fn search_artists(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(_id): Path<String>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>> {
    let artists = state.engine.search_artists(&user.user_id, &params.q).await?;
    Ok(Json(SearchResponse { artists }))
}

// ─── Leaderboard / Statistics ────────────────────────────────

/// Get the leaderboard for a game type (top 100 by score).
async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    Path(game_type): Path<String>,
) -> Result<Json<Vec<LeaderboardEntry>>> {
    let game_type = GameType::parse(&game_type)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown game type: {}", game_type)))?;

    let entries = state.stats_service.get_leaderboard(game_type).await?;
    Ok(Json(entries))
}

/// Get the authenticated user's per-mode statistics.
async fn get_statistics(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<GameStatistics>>> {
    let stats = state.stats_service.get_statistics(&user.user_id).await?;
    Ok(Json(stats))
}
