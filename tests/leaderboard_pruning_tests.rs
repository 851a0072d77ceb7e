// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Leaderboard capacity tests against the Firestore emulator.

use tuneguess::models::{GameSession, GameType};

mod common;
use common::test_db;

fn unique_user_id(n: usize) -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    format!(
        "lb_user_{}_{}",
        n,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    )
}

#[tokio::test]
async fn test_leaderboard_pruned_to_capacity() {
    require_emulator!();

    let db = test_db().await;
    let game_type = GameType::LyricsVoice;

    // Record more completions than the leaderboard keeps
    for n in 0..105 {
        let user_id = unique_user_id(n);
        let mut session = GameSession::new(&user_id, game_type, "2026-01-15T10:00:00Z");
        session.score = n as i64;
        session.completed = true;
        session.ended_at = Some("2026-01-15T10:03:00Z".to_string());
        assert!(db.record_completion_atomic(&session).await.unwrap());
    }

    let pruned = db.prune_leaderboard(game_type).await.unwrap();
    assert!(pruned >= 5, "expected at least 5 entries pruned, got {pruned}");

    let entries = db.get_leaderboard(game_type, 150).await.unwrap();
    assert!(entries.len() <= 100, "leaderboard holds {} entries", entries.len());

    // Survivors are the best scores, in descending order
    for pair in entries.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    assert!(entries.iter().any(|e| e.score == 104));
    assert!(!entries.iter().any(|e| e.score == 0));
}

#[tokio::test]
async fn test_prune_is_noop_under_capacity() {
    require_emulator!();

    let db = test_db().await;
    // Crossword entries come only from the handful of tests in this run
    let before = db.get_leaderboard(GameType::Crossword, 150).await.unwrap();
    if before.len() >= 100 {
        eprintln!("⚠️  Skipping: crossword leaderboard already at capacity");
        return;
    }

    let pruned = db.prune_leaderboard(GameType::Crossword).await.unwrap();
    assert_eq!(pruned, 0);
}
