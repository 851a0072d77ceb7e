// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore integration tests.
//!
//! These tests require the Firestore emulator to be running.
//! The emulator provides a clean state for each test run.

use tuneguess::models::{
    GameSession, GameStateDoc, GameStateRecord, GameType, LyricChallenge, ModeState, TopArtist,
    TopTrack, User, UserTokens,
};

mod common;
use common::test_db;

/// Generate a unique user ID for test isolation.
fn unique_user_id() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    format!(
        "user_{}",
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    )
}

fn test_user(user_id: &str) -> User {
    User {
        spotify_user_id: user_id.to_string(),
        display_name: "Test User".to_string(),
        email: Some("test@example.com".to_string()),
        country: Some("SE".to_string()),
        profile_picture: None,
        created_at: "2026-01-15T10:00:00Z".to_string(),
        last_synced_at: None,
    }
}

fn test_artist(user_id: &str, spotify_id: &str, name: &str, popularity: u32) -> TopArtist {
    TopArtist {
        user_id: user_id.to_string(),
        spotify_id: spotify_id.to_string(),
        name: name.to_string(),
        genres: vec!["indie pop".to_string()],
        popularity,
        followers: Some(100_000),
        debut_year: Some(2005),
        birth_year: None,
        members: Some(4),
        country: Some("Sweden".to_string()),
        gender: None,
        most_popular_song: None,
        num_albums: Some(5),
        biography: Some(format!("ARTIST BIOGRAPHY\n{name} formed in 2005.")),
        image_url: None,
        updated_at: "2026-01-15T10:00:00Z".to_string(),
    }
}

fn test_track(user_id: &str, spotify_id: &str, name: &str, popularity: u32) -> TopTrack {
    TopTrack {
        user_id: user_id.to_string(),
        spotify_id: spotify_id.to_string(),
        name: name.to_string(),
        artist: "Test Band".to_string(),
        artist_spotify_id: "artist1".to_string(),
        album: "Test Album".to_string(),
        genres: vec!["indie pop".to_string()],
        duration_secs: 215.32,
        release_date: "2019-06-01".to_string(),
        popularity,
        lyrics: Some("la la la these are the test lyrics for the song".to_string()),
        track_uri: format!("spotify:track:{spotify_id}"),
        updated_at: "2026-01-15T10:00:00Z".to_string(),
    }
}

// ─── Users and tokens ────────────────────────────────────────

#[tokio::test]
async fn test_user_creation_and_fetch() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id();

    let before = db.get_user(&user_id).await.unwrap();
    assert!(before.is_none(), "User should not exist before creation");

    db.upsert_user(&test_user(&user_id)).await.unwrap();

    let fetched = db.get_user(&user_id).await.unwrap().unwrap();
    assert_eq!(fetched.spotify_user_id, user_id);
    assert_eq!(fetched.display_name, "Test User");
    assert_eq!(fetched.country, Some("SE".to_string()));
}

#[tokio::test]
async fn test_token_round_trip_and_delete() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id();

    let tokens = UserTokens {
        access_token: "access_abc".to_string(),
        refresh_token: Some("refresh_xyz".to_string()),
        expires_at: "2026-06-01T00:00:00Z".to_string(),
        scopes: vec!["user-top-read".to_string()],
    };
    db.set_tokens(&user_id, &tokens).await.unwrap();

    let fetched = db.get_tokens(&user_id).await.unwrap().unwrap();
    assert_eq!(fetched.access_token, "access_abc");
    assert_eq!(fetched.refresh_token, Some("refresh_xyz".to_string()));

    db.delete_tokens(&user_id).await.unwrap();
    assert!(db.get_tokens(&user_id).await.unwrap().is_none());
}

// ─── Library collections ─────────────────────────────────────

#[tokio::test]
async fn test_top_artists_ordered_by_popularity() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id();

    db.upsert_top_artist(&test_artist(&user_id, "a1", "Low Artist", 40))
        .await
        .unwrap();
    db.upsert_top_artist(&test_artist(&user_id, "a2", "High Artist", 90))
        .await
        .unwrap();
    db.upsert_top_artist(&test_artist(&user_id, "a3", "Mid Artist", 65))
        .await
        .unwrap();

    let artists = db.get_top_artists(&user_id).await.unwrap();
    assert_eq!(artists.len(), 3);
    assert_eq!(artists[0].name, "High Artist");
    assert_eq!(artists[2].name, "Low Artist");

    // Upserting the same artist overwrites rather than duplicates
    db.upsert_top_artist(&test_artist(&user_id, "a2", "High Artist", 95))
        .await
        .unwrap();
    let artists = db.get_top_artists(&user_id).await.unwrap();
    assert_eq!(artists.len(), 3);
    assert_eq!(artists[0].popularity, 95);
}

#[tokio::test]
async fn test_top_tracks_scoped_to_user() {
    require_emulator!();

    let db = test_db().await;
    let user_a = unique_user_id();
    let user_b = unique_user_id();

    db.upsert_top_track(&test_track(&user_a, "t1", "Song A", 80))
        .await
        .unwrap();
    db.upsert_top_track(&test_track(&user_b, "t1", "Song B", 70))
        .await
        .unwrap();

    let tracks_a = db.get_top_tracks(&user_a).await.unwrap();
    assert_eq!(tracks_a.len(), 1);
    assert_eq!(tracks_a[0].name, "Song A");

    let tracks_b = db.get_top_tracks(&user_b).await.unwrap();
    assert_eq!(tracks_b.len(), 1);
    assert_eq!(tracks_b[0].name, "Song B");
}

// ─── Game sessions and state ─────────────────────────────────

#[tokio::test]
async fn test_game_session_lifecycle() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id();

    let session = GameSession::new(&user_id, GameType::Trivia, "2026-01-15T10:00:00Z");
    db.set_game_session(&session).await.unwrap();

    let fetched = db.get_game_session(&session.id).await.unwrap().unwrap();
    assert_eq!(fetched.user_id, user_id);
    assert_eq!(fetched.game_type, GameType::Trivia);
    assert!(!fetched.completed);

    db.delete_game_session(&session.id).await.unwrap();
    assert!(db.get_game_session(&session.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_game_state_round_trip_preserves_mode() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id();
    let session = GameSession::new(&user_id, GameType::LyricsText, "2026-01-15T10:00:00Z");

    let record = GameStateRecord {
        session_id: session.id.clone(),
        user_id: user_id.clone(),
        game_type: GameType::LyricsText,
        state: GameStateDoc {
            tries_used: 2,
            score: 10,
            completed: false,
            payload: ModeState::Lyrics {
                challenges: vec![LyricChallenge {
                    track_spotify_id: "t1".to_string(),
                    track_name: "Song".to_string(),
                    artist: "Artist".to_string(),
                    masked_text: "la ____ la".to_string(),
                    answer: "di".to_string(),
                }],
                current_index: 1,
            },
        },
        metadata: serde_json::Value::Null,
        last_action: "answer".to_string(),
        last_updated: "2026-01-15T10:05:00Z".to_string(),
    };
    db.set_game_state(&record).await.unwrap();

    let fetched = db.get_game_state(&session.id).await.unwrap().unwrap();
    assert_eq!(fetched.state.tries_used, 2);
    assert_eq!(fetched.state.score, 10);
    match fetched.state.payload {
        ModeState::Lyrics { current_index, .. } => assert_eq!(current_index, 1),
        other => panic!("wrong mode payload: {other:?}"),
    }

    db.delete_game_state(&session.id).await.unwrap();
    assert!(db.get_game_state(&session.id).await.unwrap().is_none());
}

// ─── Completion rollup ───────────────────────────────────────

#[tokio::test]
async fn test_record_completion_updates_stats_and_leaderboard() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id();

    let mut session = GameSession::new(&user_id, GameType::Crossword, "2026-01-15T10:00:00Z");
    session.score = 80;
    session.completed = true;
    session.ended_at = Some("2026-01-15T10:04:00Z".to_string());

    let recorded = db.record_completion_atomic(&session).await.unwrap();
    assert!(recorded);

    let stats = db
        .get_game_stats(&user_id, GameType::Crossword)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stats.total_games, 1);
    assert_eq!(stats.total_score, 80);
    assert_eq!(stats.highest_score, 80);
    assert_eq!(stats.total_time_played_secs, 240);

    let leaderboard = db.get_leaderboard(GameType::Crossword, 100).await.unwrap();
    assert!(leaderboard
        .iter()
        .any(|e| e.session_id == session.id && e.score == 80));
}

#[tokio::test]
async fn test_record_completion_is_idempotent() {
    require_emulator!();

    let db = test_db().await;
    let user_id = unique_user_id();

    let mut session = GameSession::new(&user_id, GameType::Trivia, "2026-01-15T10:00:00Z");
    session.score = 7;
    session.completed = true;
    session.ended_at = Some("2026-01-15T10:02:00Z".to_string());

    assert!(db.record_completion_atomic(&session).await.unwrap());
    // Second rollup of the same session is skipped inside the transaction
    assert!(!db.record_completion_atomic(&session).await.unwrap());

    let stats = db
        .get_game_stats(&user_id, GameType::Trivia)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stats.total_games, 1);
    assert_eq!(stats.total_score, 7);
}
