// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Spotify Web API client.
//!
//! Handles:
//! - User profile and top tracks/artists fetching
//! - Artist catalog lookups (top track, album count)
//! - Token exchange and refresh
//! - Rate limit handling via Retry-After

use crate::error::AppError;
use base64::Engine;
use serde::Deserialize;
use std::time::{Duration as StdDuration, Instant};

/// Default wait when a 429 response carries no Retry-After header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;
/// Total wall-clock budget for waiting out rate limits on one request.
const RATE_LIMIT_BUDGET_SECS: u64 = 60;

/// Spotify Web API client.
#[derive(Clone)]
pub struct SpotifyClient {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
}

impl SpotifyClient {
    /// Create a new Spotify client with OAuth credentials.
    pub fn new(client_id: String, client_secret: String) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .connect_timeout(StdDuration::from_secs(10))
            .timeout(StdDuration::from_secs(30))
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
        Ok(Self {
            http,
            base_url: "https://api.spotify.com/v1".to_string(),
            client_id,
            client_secret,
        })
    }

    /// Get the authenticated user's profile.
    pub async fn get_current_user(&self, access_token: &str) -> Result<SpotifyUser, AppError> {
        let url = format!("{}/me", self.base_url);
        self.get_json(&url, access_token, &[]).await
    }

    /// Get the user's top tracks (medium term).
    pub async fn get_top_tracks(
        &self,
        access_token: &str,
        limit: u32,
    ) -> Result<Vec<SpotifyTrack>, AppError> {
        let url = format!("{}/me/top/tracks", self.base_url);
        let paging: Paging<SpotifyTrack> = self
            .get_json(
                &url,
                access_token,
                &[
                    ("limit", limit.to_string()),
                    ("time_range", "medium_term".to_string()),
                ],
            )
            .await?;
        Ok(paging.items)
    }

    /// Get the user's top artists (medium term).
    pub async fn get_top_artists(
        &self,
        access_token: &str,
        limit: u32,
    ) -> Result<Vec<SpotifyArtist>, AppError> {
        let url = format!("{}/me/top/artists", self.base_url);
        let paging: Paging<SpotifyArtist> = self
            .get_json(
                &url,
                access_token,
                &[
                    ("limit", limit.to_string()),
                    ("time_range", "medium_term".to_string()),
                ],
            )
            .await?;
        Ok(paging.items)
    }

    /// Get an artist's most popular track, if any.
    pub async fn get_artist_top_track(
        &self,
        access_token: &str,
        artist_id: &str,
    ) -> Result<Option<SpotifyTrack>, AppError> {
        let url = format!("{}/artists/{}/top-tracks", self.base_url, artist_id);
        let response: ArtistTopTracks = self
            .get_json(&url, access_token, &[("market", "US".to_string())])
            .await?;
        Ok(response.tracks.into_iter().next())
    }

    /// Get the number of albums an artist has in the catalog.
    pub async fn get_artist_album_count(
        &self,
        access_token: &str,
        artist_id: &str,
    ) -> Result<u32, AppError> {
        let url = format!("{}/artists/{}/albums", self.base_url, artist_id);
        let paging: Paging<serde_json::Value> = self
            .get_json(
                &url,
                access_token,
                &[
                    ("include_groups", "album".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;
        Ok(paging.total)
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, AppError> {
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", redirect_uri),
        ])
        .await
    }

    /// Refresh an expired access token.
    pub async fn refresh_token(&self, refresh_token: &str) -> Result<TokenResponse, AppError> {
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }

    /// POST to the accounts token endpoint with Basic client credentials.
    async fn token_request(&self, form: &[(&str, &str)]) -> Result<TokenResponse, AppError> {
        let credentials = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:{}", self.client_id, self.client_secret));

        let response = self
            .http
            .post("https://accounts.spotify.com/api/token")
            .header("Authorization", format!("Basic {}", credentials))
            .form(form)
            .send()
            .await
            .map_err(|e| AppError::SpotifyApi(format!("Token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Spotify token request failed");
            // Surface invalid_grant so callers can detect refresh races
            if body.contains("invalid_grant") {
                return Err(AppError::SpotifyApi("invalid_grant".to_string()));
            }
            return Err(AppError::SpotifyApi(format!(
                "Token request failed with status {}",
                status
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::SpotifyApi(format!("Failed to parse token response: {}", e)))
    }

    /// Generic GET with JSON response and rate-limit handling.
    ///
    /// On a 429 the call sleeps for the Retry-After value (default 5 s)
    /// and retries, repeating until the wait budget is spent. A 429 that
    /// outlives the budget surfaces as `SPOTIFY_RATE_LIMIT`.
    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        access_token: &str,
        query: &[(&str, String)],
    ) -> Result<T, AppError> {
        let deadline = Instant::now() + StdDuration::from_secs(RATE_LIMIT_BUDGET_SECS);

        loop {
            let response = self
                .http
                .get(url)
                .bearer_auth(access_token)
                .query(query)
                .send()
                .await
                .map_err(|e| AppError::SpotifyApi(e.to_string()))?;

            if response.status().as_u16() == 429 {
                let wait_secs = response
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                let wait = StdDuration::from_secs(wait_secs);

                if Instant::now() + wait <= deadline {
                    tracing::warn!(url, wait_secs, "Spotify rate limit hit (429), waiting");
                    tokio::time::sleep(wait).await;
                    continue;
                }
                tracing::warn!(url, "Rate limit wait budget spent, giving up");
            }

            return self.check_response_json(response).await;
        }
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();

            if status.as_u16() == 429 {
                return Err(AppError::SpotifyApi(
                    AppError::SPOTIFY_RATE_LIMIT.to_string(),
                ));
            }

            if status.as_u16() == 401 {
                return Err(AppError::SpotifyApi(
                    AppError::SPOTIFY_TOKEN_ERROR.to_string(),
                ));
            }

            return Err(AppError::SpotifyApi(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::SpotifyApi(format!("JSON parse error: {}", e)))
    }
}

/// Token endpoint response from Spotify.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Omitted on refresh responses; keep the previous one then
    pub refresh_token: Option<String>,
    pub expires_in: i64,
    #[serde(default)]
    pub scope: String,
}

/// Generic Spotify paging envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct Paging<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub total: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyImage {
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyUser {
    pub id: String,
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub country: Option<String>,
    #[serde(default)]
    pub images: Vec<SpotifyImage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyFollowers {
    pub total: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyArtist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub popularity: u32,
    pub followers: Option<SpotifyFollowers>,
    #[serde(default)]
    pub images: Vec<SpotifyImage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyArtistRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyAlbum {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub release_date: String,
    #[serde(default)]
    pub total_tracks: u32,
    #[serde(default)]
    pub images: Vec<SpotifyImage>,
    #[serde(default)]
    pub artists: Vec<SpotifyArtistRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyTrack {
    pub id: String,
    pub name: String,
    pub duration_ms: u64,
    #[serde(default)]
    pub popularity: u32,
    pub uri: String,
    pub album: SpotifyAlbum,
    #[serde(default)]
    pub artists: Vec<SpotifyArtistRef>,
}

#[derive(Debug, Clone, Deserialize)]
struct ArtistTopTracks {
    tracks: Vec<SpotifyTrack>,
}

// ─────────────────────────────────────────────────────────────────────────────
// SpotifyService - High-level service with token management
// ─────────────────────────────────────────────────────────────────────────────

use crate::db::FirestoreDb;
use crate::models::{User, UserTokens};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Margin before token expiration when we proactively refresh (5 minutes).
const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Cached access token with expiry information.
#[derive(Clone)]
pub struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// Shared token cache type for use in AppState.
pub type TokenCache = Arc<DashMap<String, CachedToken>>;

/// Shared refresh locks type for use in AppState.
pub type RefreshLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// High-level Spotify service that manages token lifecycle and API calls.
///
/// This service encapsulates:
/// - Token retrieval from Firestore
/// - Automatic token refresh when expiring (with 5-minute margin)
/// - Storage of refreshed tokens
/// - In-memory token caching to reduce Firestore reads
/// - Per-user locking to prevent duplicate refresh calls
/// - All Spotify API calls
#[derive(Clone)]
pub struct SpotifyService {
    client: SpotifyClient,
    db: FirestoreDb,
    /// In-memory cache of access tokens (shared across requests).
    token_cache: TokenCache,
    /// Per-user mutex to serialize token refresh operations.
    refresh_locks: RefreshLocks,
}

impl SpotifyService {
    /// Create a new Spotify service with shared token cache.
    ///
    /// The `token_cache` and `refresh_locks` should be shared across all
    /// `SpotifyService` instances to enable caching within a server instance.
    pub fn new(
        client_id: String,
        client_secret: String,
        db: FirestoreDb,
        token_cache: TokenCache,
        refresh_locks: RefreshLocks,
    ) -> Result<Self, AppError> {
        Ok(Self {
            client: SpotifyClient::new(client_id, client_secret)?,
            db,
            token_cache,
            refresh_locks,
        })
    }

    // ─── Token Management ────────────────────────────────────────────────────

    /// Get a valid (non-expired) access token for the given user.
    ///
    /// 1. Check in-memory cache (fast path - no I/O)
    /// 2. Acquire per-user lock to prevent duplicate refresh calls
    /// 3. Re-check cache after lock (another task may have refreshed)
    /// 4. Fetch from Firestore
    /// 5. If token is valid, cache and return
    /// 6. If expired, refresh with Spotify
    /// 7. Handle cross-instance races via re-read on invalid_grant
    pub async fn get_valid_access_token(&self, user_id: &str) -> Result<String, AppError> {
        let now = Utc::now();
        let margin = Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);

        // STEP 1: Check cache (fast path - no I/O)
        if let Some(cached) = self.token_cache.get(user_id) {
            if now + margin < cached.expires_at {
                return Ok(cached.access_token.clone());
            }
            // Token expired or expiring soon - fall through to refresh
        }

        // STEP 2: Acquire per-user refresh lock.
        // Only one task per user performs the refresh; others wait here.
        let lock = self
            .refresh_locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let _guard = lock.lock().await;

        // STEP 3: Re-check cache after acquiring lock (double-check).
        // Another task may have refreshed while we were waiting.
        if let Some(cached) = self.token_cache.get(user_id) {
            if now + margin < cached.expires_at {
                return Ok(cached.access_token.clone());
            }
        }

        // STEP 4: Fetch from Firestore
        let tokens = self
            .db
            .get_tokens(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tokens for user {}", user_id)))?;

        // STEP 5: Check if refresh is needed
        if !tokens.is_expired(TOKEN_REFRESH_MARGIN_SECS) {
            let expires_at = DateTime::parse_from_rfc3339(&tokens.expires_at)
                .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to parse expiry: {}", e)))?
                .with_timezone(&Utc);
            self.token_cache.insert(
                user_id.to_string(),
                CachedToken {
                    access_token: tokens.access_token.clone(),
                    expires_at,
                },
            );
            return Ok(tokens.access_token);
        }

        // STEP 6: Token expired - refresh with cross-instance race handling
        tracing::info!(user_id, "Access token expired, refreshing");

        let refresh_token = tokens.refresh_token.clone().ok_or_else(|| {
            AppError::InvalidToken
        })?;

        // If another instance already refreshed, Spotify rejects our old
        // refresh token; fetch the winner's tokens from Firestore.
        let refreshed = match self.client.refresh_token(&refresh_token).await {
            Ok(t) => t,
            Err(AppError::SpotifyApi(ref msg)) if msg.contains("invalid_grant") => {
                tracing::info!(
                    user_id,
                    "Refresh token race detected - another instance won, fetching their tokens"
                );
                return self.fetch_and_cache_from_db(user_id).await;
            }
            Err(e) => return Err(e),
        };

        // STEP 7: Store new tokens
        let new_expires_at = Utc::now() + Duration::seconds(refreshed.expires_in);

        let updated_tokens = UserTokens {
            access_token: refreshed.access_token.clone(),
            // Spotify may omit the refresh token on refresh; keep the old one
            refresh_token: refreshed.refresh_token.clone().or(Some(refresh_token)),
            expires_at: new_expires_at.to_rfc3339(),
            scopes: tokens.scopes.clone(),
        };

        self.db.set_tokens(user_id, &updated_tokens).await?;

        // STEP 8: Update cache with new token
        self.token_cache.insert(
            user_id.to_string(),
            CachedToken {
                access_token: refreshed.access_token.clone(),
                expires_at: new_expires_at,
            },
        );

        tracing::info!(user_id, "Token refreshed and cached");
        Ok(refreshed.access_token)
    }

    /// Fetch fresh tokens from Firestore (after cross-instance race) and cache.
    async fn fetch_and_cache_from_db(&self, user_id: &str) -> Result<String, AppError> {
        let tokens = self
            .db
            .get_tokens(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tokens for user {}", user_id)))?;

        let expires_at = DateTime::parse_from_rfc3339(&tokens.expires_at)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to parse expiry: {}", e)))?
            .with_timezone(&Utc);

        self.token_cache.insert(
            user_id.to_string(),
            CachedToken {
                access_token: tokens.access_token.clone(),
                expires_at,
            },
        );

        Ok(tokens.access_token)
    }

    /// Drop a user's cached token (logout).
    pub fn invalidate_cached_token(&self, user_id: &str) {
        self.token_cache.remove(user_id);
    }

    // ─── OAuth Callback Handling ─────────────────────────────────────────────

    /// Handle OAuth callback: exchange code for tokens, store user and tokens.
    pub async fn handle_oauth_callback(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<OAuthResult, AppError> {
        let token_response = self.client.exchange_code(code, redirect_uri).await?;

        // The token response has no profile; fetch it with the fresh token
        let profile = self
            .client
            .get_current_user(&token_response.access_token)
            .await?;

        let user_id = profile.id.clone();
        let display_name = profile
            .display_name
            .clone()
            .unwrap_or_else(|| user_id.clone());
        let now = chrono::Utc::now().to_rfc3339();

        let user = User {
            spotify_user_id: user_id.clone(),
            display_name: display_name.clone(),
            email: profile.email.clone(),
            country: profile.country.clone(),
            profile_picture: profile.images.first().map(|i| i.url.clone()),
            created_at: now.clone(),
            last_synced_at: None,
        };

        if let Err(e) = self.db.upsert_user(&user).await {
            tracing::warn!(error = %e, "Failed to store user profile, continuing anyway");
        }

        let expires_at = Utc::now() + Duration::seconds(token_response.expires_in);

        let tokens = UserTokens {
            access_token: token_response.access_token.clone(),
            refresh_token: token_response.refresh_token.clone(),
            expires_at: expires_at.to_rfc3339(),
            scopes: token_response
                .scope
                .split_whitespace()
                .map(String::from)
                .collect(),
        };

        self.db.set_tokens(&user_id, &tokens).await?;

        self.token_cache.insert(
            user_id.clone(),
            CachedToken {
                access_token: token_response.access_token.clone(),
                expires_at,
            },
        );

        tracing::info!(
            user_id = %user_id,
            display_name = %display_name,
            "OAuth callback handled, user and tokens stored"
        );

        Ok(OAuthResult {
            user_id,
            display_name,
        })
    }

    // ─── API Wrappers ────────────────────────────────────────────────────────

    /// Get the user's top tracks (medium term).
    pub async fn get_top_tracks(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<SpotifyTrack>, AppError> {
        let access_token = self.get_valid_access_token(user_id).await?;
        self.client.get_top_tracks(&access_token, limit).await
    }

    /// Get the user's top artists (medium term).
    pub async fn get_top_artists(
        &self,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<SpotifyArtist>, AppError> {
        let access_token = self.get_valid_access_token(user_id).await?;
        self.client.get_top_artists(&access_token, limit).await
    }

    /// Get an artist's most popular track.
    pub async fn get_artist_top_track(
        &self,
        user_id: &str,
        artist_id: &str,
    ) -> Result<Option<SpotifyTrack>, AppError> {
        let access_token = self.get_valid_access_token(user_id).await?;
        self.client
            .get_artist_top_track(&access_token, artist_id)
            .await
    }

    /// Get the number of albums an artist has in the catalog.
    pub async fn get_artist_album_count(
        &self,
        user_id: &str,
        artist_id: &str,
    ) -> Result<u32, AppError> {
        let access_token = self.get_valid_access_token(user_id).await?;
        self.client
            .get_artist_album_count(&access_token, artist_id)
            .await
    }
}

/// Result of handling OAuth callback.
#[derive(Debug, Clone)]
pub struct OAuthResult {
    pub user_id: String,
    pub display_name: String,
}
