// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Statistics and leaderboard service.

use crate::db::firestore::LEADERBOARD_CAP;
use crate::db::FirestoreDb;
use crate::error::Result;
use crate::models::{GameSession, GameStatistics, GameType, LeaderboardEntry};

/// Rolls completed sessions into per-user statistics and the leaderboard.
#[derive(Clone)]
pub struct StatsService {
    db: FirestoreDb,
}

impl StatsService {
    pub fn new(db: FirestoreDb) -> Self {
        Self { db }
    }

    /// Record a completed session: transactional stats rollup plus a
    /// leaderboard insert, then prune the leaderboard back to the cap.
    ///
    /// Returns `false` when the session had already been recorded.
    pub async fn record_completion(&self, session: &GameSession) -> Result<bool> {
        let recorded = self.db.record_completion_atomic(session).await?;

        if recorded {
            // Pruning failures must not fail the completion; the next
            // insert will prune again.
            if let Err(e) = self.db.prune_leaderboard(session.game_type).await {
                tracing::warn!(
                    game_type = %session.game_type,
                    error = %e,
                    "Leaderboard prune failed"
                );
            }
        }

        Ok(recorded)
    }

    /// All statistics rollups for a user.
    pub async fn get_statistics(&self, user_id: &str) -> Result<Vec<GameStatistics>> {
        self.db.get_all_game_stats(user_id).await
    }

    /// Top entries for a game type, best scores first.
    pub async fn get_leaderboard(&self, game_type: GameType) -> Result<Vec<LeaderboardEntry>> {
        self.db.get_leaderboard(game_type, LEADERBOARD_CAP).await
    }
}
