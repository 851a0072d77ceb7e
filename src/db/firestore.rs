// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Users (profile storage)
//! - Tokens (OAuth tokens)
//! - Top artists / tracks / albums (enriched library records)
//! - Game sessions, durable game state, statistics and leaderboard

use crate::db::collections;
use crate::error::AppError;
use crate::models::user::UserTokens;
use crate::models::{
    GameSession, GameStateRecord, GameStatistics, GameType, LeaderboardEntry, TopAlbum, TopArtist,
    TopTrack, User,
};
use futures_util::{stream, StreamExt};

const MAX_CONCURRENT_DB_OPS: usize = 50;
// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Maximum number of leaderboard entries kept per game type.
pub const LEADERBOARD_CAP: u32 = 100;

/// Document ID scheme shared by the per-user library collections.
fn library_doc_id(user_id: &str, spotify_id: &str) -> String {
    format!("{user_id}_{spotify_id}")
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        // Use ExternalJwtFunctionSource to provide a dummy token without needing async-trait
        // or a custom TokenSource implementation struct.
        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Get a user by their Spotify user ID.
    pub async fn get_user(&self, user_id: &str) -> Result<Option<User>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::USERS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a user.
    pub async fn upsert_user(&self, user: &User) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::USERS)
            .document_id(&user.spotify_user_id)
            .object(user)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Token Operations ────────────────────────────────────────

    /// Get OAuth tokens for a user.
    pub async fn get_tokens(&self, user_id: &str) -> Result<Option<UserTokens>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::TOKENS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store OAuth tokens for a user.
    pub async fn set_tokens(&self, user_id: &str, tokens: &UserTokens) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::TOKENS)
            .document_id(user_id)
            .object(tokens)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete tokens (for logout/deauthorization).
    pub async fn delete_tokens(&self, user_id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::TOKENS)
            .document_id(user_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Library Operations (top artists / tracks / albums) ──────

    /// Create or update a top-artist record, keyed `{user_id}_{spotify_id}`.
    pub async fn upsert_top_artist(&self, artist: &TopArtist) -> Result<(), AppError> {
        let doc_id = library_doc_id(&artist.user_id, &artist.spotify_id);
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::TOP_ARTISTS)
            .document_id(&doc_id)
            .object(artist)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Get all top artists for a user.
    pub async fn get_top_artists(&self, user_id: &str) -> Result<Vec<TopArtist>, AppError> {
        let user_id = user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::TOP_ARTISTS)
            .filter(move |q| q.field("user_id").eq(user_id.clone()))
            .order_by([(
                "popularity",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a top-track record, keyed `{user_id}_{spotify_id}`.
    pub async fn upsert_top_track(&self, track: &TopTrack) -> Result<(), AppError> {
        let doc_id = library_doc_id(&track.user_id, &track.spotify_id);
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::TOP_TRACKS)
            .document_id(&doc_id)
            .object(track)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Get all top tracks for a user.
    pub async fn get_top_tracks(&self, user_id: &str) -> Result<Vec<TopTrack>, AppError> {
        let user_id = user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::TOP_TRACKS)
            .filter(move |q| q.field("user_id").eq(user_id.clone()))
            .order_by([(
                "popularity",
                firestore::FirestoreQueryDirection::Descending,
            )])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store album records concurrently with a bounded in-flight limit.
    pub async fn batch_set_top_albums(&self, albums: &[TopAlbum]) -> Result<(), AppError> {
        let client = self.get_client()?;

        stream::iter(albums.to_vec())
            .map(|album| async move {
                let doc_id = library_doc_id(&album.user_id, &album.spotify_id);

                let _: () = client
                    .fluent()
                    .update()
                    .in_col(collections::TOP_ALBUMS)
                    .document_id(&doc_id)
                    .object(&album)
                    .execute()
                    .await
                    .map_err(|e| AppError::Database(e.to_string()))?;

                Ok::<_, AppError>(())
            })
            .buffer_unordered(MAX_CONCURRENT_DB_OPS)
            .collect::<Vec<Result<(), AppError>>>()
            .await
            .into_iter()
            .collect::<Result<Vec<()>, AppError>>()?;

        Ok(())
    }

    // ─── Game Session Operations ─────────────────────────────────

    pub async fn get_game_session(&self, id: &str) -> Result<Option<GameSession>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::GAME_SESSIONS)
            .obj()
            .one(id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn set_game_session(&self, session: &GameSession) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::GAME_SESSIONS)
            .document_id(&session.id)
            .object(session)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete a session row (rollback after failed initialization).
    pub async fn delete_game_session(&self, id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::GAME_SESSIONS)
            .document_id(id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Game State Operations ───────────────────────────────────

    pub async fn get_game_state(
        &self,
        session_id: &str,
    ) -> Result<Option<GameStateRecord>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::GAME_STATES)
            .obj()
            .one(session_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    pub async fn set_game_state(&self, record: &GameStateRecord) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::GAME_STATES)
            .document_id(&record.session_id)
            .object(record)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    pub async fn delete_game_state(&self, session_id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::GAME_STATES)
            .document_id(session_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Statistics / Leaderboard Operations ─────────────────────

    /// Get the statistics rollup for one user and game type.
    pub async fn get_game_stats(
        &self,
        user_id: &str,
        game_type: GameType,
    ) -> Result<Option<GameStatistics>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::GAME_STATS)
            .obj()
            .one(&GameStatistics::doc_id(user_id, game_type))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get all statistics rollups for a user.
    pub async fn get_all_game_stats(
        &self,
        user_id: &str,
    ) -> Result<Vec<GameStatistics>, AppError> {
        let user_id = user_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::GAME_STATS)
            .filter(move |q| q.field("user_id").eq(user_id.clone()))
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Atomically record a completed session: persist the session row,
    /// fold it into the statistics rollup and insert the leaderboard entry.
    ///
    /// Uses a Firestore transaction so a conflicting concurrent rollup is
    /// retried with fresh data instead of losing an update.
    ///
    /// Returns `true` if the session was newly recorded, `false` if it was
    /// already recorded (idempotent duplicate).
    pub async fn record_completion_atomic(
        &self,
        session: &GameSession,
    ) -> Result<bool, AppError> {
        let now = chrono::Utc::now().to_rfc3339();
        let stats_doc_id = GameStatistics::doc_id(&session.user_id, session.game_type);

        // Begin a transaction
        let mut transaction = self
            .get_client()?
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        // 1. Idempotency check: if the stored session row is already marked
        //    completed, this rollup has happened.
        let stored: Option<GameSession> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::GAME_SESSIONS)
            .obj()
            .one(&session.id)
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to read session in transaction: {}", e))
            })?;

        if stored.as_ref().is_some_and(|s| s.completed) {
            tracing::debug!(
                session_id = %session.id,
                "Session already recorded (idempotent skip)"
            );
            let _ = transaction.rollback().await;
            return Ok(false);
        }

        // 2. Read the current rollup within the transaction
        let current: Option<GameStatistics> = self
            .get_client()?
            .fluent()
            .select()
            .by_id_in(collections::GAME_STATS)
            .obj()
            .one(&stats_doc_id)
            .await
            .map_err(|e| {
                AppError::Database(format!("Failed to read stats in transaction: {}", e))
            })?;

        let mut stats = current
            .unwrap_or_else(|| GameStatistics::new(&session.user_id, session.game_type));
        stats.update_from_session(session, &now);

        // 3. Add session write to transaction
        self.get_client()?
            .fluent()
            .update()
            .in_col(collections::GAME_SESSIONS)
            .document_id(&session.id)
            .object(session)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add session to transaction: {}", e))
            })?;

        // 4. Add stats write to transaction
        self.get_client()?
            .fluent()
            .update()
            .in_col(collections::GAME_STATS)
            .document_id(&stats_doc_id)
            .object(&stats)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add stats to transaction: {}", e))
            })?;

        // 5. Add leaderboard entry to transaction (doc id = session id)
        let entry = LeaderboardEntry {
            session_id: session.id.clone(),
            user_id: session.user_id.clone(),
            game_type: session.game_type,
            score: session.score,
            achieved_at: now.clone(),
        };
        self.get_client()?
            .fluent()
            .update()
            .in_col(collections::LEADERBOARD)
            .document_id(&session.id)
            .object(&entry)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!(
                    "Failed to add leaderboard entry to transaction: {}",
                    e
                ))
            })?;

        // 6. Commit the transaction atomically
        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(
            session_id = %session.id,
            user_id = %session.user_id,
            game_type = %session.game_type,
            score = session.score,
            "Session completion recorded atomically"
        );

        Ok(true)
    }

    /// Read the leaderboard for a game type, best scores first.
    pub async fn get_leaderboard(
        &self,
        game_type: GameType,
        limit: u32,
    ) -> Result<Vec<LeaderboardEntry>, AppError> {
        let game_type_str = game_type.as_str().to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::LEADERBOARD)
            .filter(move |q| q.field("game_type").eq(game_type_str.clone()))
            .order_by([("score", firestore::FirestoreQueryDirection::Descending)])
            .limit(limit)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete every leaderboard entry beyond the top `LEADERBOARD_CAP`
    /// for a game type. Deletions run in transactions, so concurrent
    /// inserts settle at the cap rather than below it.
    pub async fn prune_leaderboard(&self, game_type: GameType) -> Result<usize, AppError> {
        let game_type_str = game_type.as_str().to_string();
        let overflow: Vec<LeaderboardEntry> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::LEADERBOARD)
            .filter(move |q| q.field("game_type").eq(game_type_str.clone()))
            .order_by([("score", firestore::FirestoreQueryDirection::Descending)])
            .offset(LEADERBOARD_CAP)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if overflow.is_empty() {
            return Ok(0);
        }

        let count = overflow.len();
        self.batch_delete(&overflow, collections::LEADERBOARD, |entry| {
            entry.session_id.clone()
        })
        .await?;

        tracing::debug!(game_type = %game_type, count, "Pruned leaderboard overflow");

        Ok(count)
    }

    // ─── Helper Methods ────────────────────────────────────────────

    /// Helper to batch delete documents using transactions.
    async fn batch_delete<T, F>(
        &self,
        items: &[T],
        collection: &str,
        id_extractor: F,
    ) -> Result<(), AppError>
    where
        F: Fn(&T) -> String,
    {
        let client = self.get_client()?;

        for chunk in items.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for item in chunk {
                let doc_id = id_extractor(item);
                client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(&doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit batch deletion: {}", e))
            })?;
        }

        Ok(())
    }
}
