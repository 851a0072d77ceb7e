// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Game session lifecycle.
//!
//! The engine owns the session state machine: start (create session row,
//! generate mode state, roll back the row if generation fails), resume
//! (cache first, durable row second, regenerate last), answer submission
//! (serialized per session, rejected once completed) and restart. Mode
//! behavior lives behind the [`GameMode`] trait; the engine composes it
//! with persistence, caching and the stats rollup.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::db::FirestoreDb;
use crate::error::{AppError, Result};
use crate::models::{
    ArtistFacts, GameSession, GameStateDoc, GameStateRecord, GameType, ModeState, TopArtist,
};
use crate::services::{ContentClient, StatsService, TtlCache};

use crate::games::artist_guess::ArtistGuessGame;
use crate::games::crossword::CrosswordGame;
use crate::games::lyrics::LyricsGame;
use crate::games::trivia::TriviaGame;

/// Maximum autocomplete results.
const SEARCH_LIMIT: usize = 10;

/// Shared dependencies handed to game modes.
#[derive(Clone)]
pub struct GameContext {
    pub db: FirestoreDb,
    pub cache: TtlCache,
    pub content: ContentClient,
    pub stats: StatsService,
}

/// One player submission.
#[derive(Debug, Clone)]
pub enum Answer {
    /// Typed or transcribed text (lyrics, trivia)
    Text(String),
    /// An artist-name guess with the guessed artist's library facts, when
    /// the name resolved to one
    ArtistGuess {
        name: String,
        facts: Option<ArtistFacts>,
    },
    /// A full crossword grid
    Grid(Vec<Vec<String>>),
}

/// What a mode reports back for one submission.
#[derive(Debug)]
pub struct TurnFeedback {
    pub correct: bool,
    /// Mode-specific detail (attribute comparisons, matched word count)
    pub detail: Value,
}

/// A game mode: content generation at start, pure scoring per turn.
pub trait GameMode {
    /// Build fresh mode state for a new session.
    async fn initialize(&self, ctx: &GameContext, session: &GameSession) -> Result<ModeState>;

    /// Score one submission, updating tries/score/completion on the
    /// envelope.
    fn apply_answer(
        &self,
        state: &mut GameStateDoc,
        answer: &Answer,
        max_tries: u32,
    ) -> Result<TurnFeedback>;

    /// Player-facing view of the state. Never includes answers.
    fn client_view(&self, state: &GameStateDoc) -> Value;
}

/// Session state returned to the client.
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub game_type: GameType,
    pub score: i64,
    pub tries_used: u32,
    pub max_tries: u32,
    pub completed: bool,
    pub state: Value,
}

/// Outcome of one submission.
#[derive(Debug, Serialize)]
pub struct TurnResult {
    pub correct: bool,
    pub completed: bool,
    pub score: i64,
    pub tries_used: u32,
    pub tries_remaining: u32,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub feedback: Value,
    pub state: Value,
}

/// Drives all four game modes over shared persistence.
#[derive(Clone)]
pub struct GameEngine {
    ctx: GameContext,
    /// Per-session mutex serializing state mutation.
    session_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl GameEngine {
    pub fn new(ctx: GameContext) -> Self {
        Self {
            ctx,
            session_locks: Arc::new(DashMap::new()),
        }
    }

    /// Start a new game: create the session row, then generate content.
    /// The row is rolled back if generation fails, so a failed start
    /// leaves nothing behind.
    pub async fn start_game(&self, user_id: &str, game_type: GameType) -> Result<SessionView> {
        let now = chrono::Utc::now().to_rfc3339();
        let session = GameSession::new(user_id, game_type, &now);
        self.ctx.db.set_game_session(&session).await?;

        let record = match self.build_fresh_state(&session).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(
                    session_id = %session.id,
                    game_type = %game_type,
                    error = %e,
                    "Game initialization failed, rolling back session"
                );
                // No dangling session rows on init failure
                if let Err(del) = self.ctx.db.delete_game_session(&session.id).await {
                    tracing::error!(session_id = %session.id, error = %del, "Session rollback failed");
                }
                return Err(e);
            }
        };

        tracing::info!(
            session_id = %session.id,
            user_id,
            game_type = %game_type,
            "Game started"
        );

        Ok(self.session_view(&session, &record.state))
    }

    /// Current state of a session, resuming from cache or the durable row.
    pub async fn get_state(&self, session_id: &str, user_id: &str) -> Result<SessionView> {
        let session = self.load_owned_session(session_id, user_id).await?;
        let record = self.load_or_regenerate_state(&session).await?;
        Ok(self.session_view(&session, &record.state))
    }

    /// Submit a text answer (lyrics and trivia modes).
    pub async fn submit_answer(
        &self,
        session_id: &str,
        user_id: &str,
        answer: Answer,
    ) -> Result<TurnResult> {
        self.submit(session_id, user_id, answer, "answer").await
    }

    /// Submit an artist-name guess (guess-artist mode). The guessed name
    /// is resolved against the user's library before scoring so attribute
    /// feedback can compare real records.
    pub async fn submit_guess(
        &self,
        session_id: &str,
        user_id: &str,
        artist_name: &str,
    ) -> Result<TurnResult> {
        let session = self.load_owned_session(session_id, user_id).await?;
        if session.game_type != GameType::GuessArtist {
            return Err(AppError::BadRequest(format!(
                "guess submissions are not valid for {}",
                session.game_type
            )));
        }

        let facts = self.resolve_artist_facts(user_id, artist_name).await?;
        let answer = Answer::ArtistGuess {
            name: artist_name.to_string(),
            facts,
        };
        self.submit(session_id, user_id, answer, "guess").await
    }

    /// Reset a session for a fresh play-through: cleared state, fresh
    /// content, zeroed envelope.
    pub async fn restart_game(&self, session_id: &str, user_id: &str) -> Result<SessionView> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        let mut session = self.load_owned_session(session_id, user_id).await?;

        self.ctx
            .cache
            .remove(&TtlCache::session_key(&session.id, session.game_type));
        self.ctx.db.delete_game_state(&session.id).await?;

        session.score = 0;
        session.current_tries = 0;
        session.completed = false;
        session.ended_at = None;
        session.started_at = chrono::Utc::now().to_rfc3339();
        self.ctx.db.set_game_session(&session).await?;

        let record = self.build_fresh_state(&session).await?;

        tracing::info!(session_id = %session.id, "Game restarted");

        Ok(self.session_view(&session, &record.state))
    }

    /// Autocomplete artist names from the user's library (guess mode).
    pub async fn search_artists(&self, user_id: &str, query: &str) -> Result<Vec<String>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let artists = self.ctx.db.get_top_artists(user_id).await?;
        Ok(artists
            .iter()
            .filter(|a| a.name.to_lowercase().contains(&needle))
            .take(SEARCH_LIMIT)
            .map(|a| a.name.clone())
            .collect())
    }

    // ─── Internals ───────────────────────────────────────────────

    async fn submit(
        &self,
        session_id: &str,
        user_id: &str,
        answer: Answer,
        action: &str,
    ) -> Result<TurnResult> {
        let lock = self.session_lock(session_id);
        let _guard = lock.lock().await;

        let mut session = self.load_owned_session(session_id, user_id).await?;
        if session.completed {
            return Err(AppError::GameState(
                "session is already completed".to_string(),
            ));
        }

        let mut record = self.load_or_regenerate_state(&session).await?;

        let feedback = self.apply(&session, &mut record.state, &answer)?;

        session.current_tries = record.state.tries_used;
        session.score = record.state.score;

        let completed = record.state.completed;
        if completed {
            session.completed = true;
            session.ended_at = Some(chrono::Utc::now().to_rfc3339());
            // Writes the session row, the stats rollup and the
            // leaderboard entry in one transaction.
            self.ctx.stats.record_completion(&session).await?;
        } else {
            self.ctx.db.set_game_session(&session).await?;
        }

        record.last_action = action.to_string();
        record.last_updated = chrono::Utc::now().to_rfc3339();
        self.persist_state(&record).await?;

        Ok(TurnResult {
            correct: feedback.correct,
            completed,
            score: record.state.score,
            tries_used: record.state.tries_used,
            tries_remaining: session.max_tries.saturating_sub(record.state.tries_used),
            feedback: feedback.detail,
            state: self.view(session.game_type, &record.state),
        })
    }

    /// Load state: cache hit wins, the durable row is the fallback, and a
    /// lost row regenerates from scratch. Corrupt cache entries are
    /// discarded by the cache itself, which lands us on the durable copy.
    async fn load_or_regenerate_state(&self, session: &GameSession) -> Result<GameStateRecord> {
        let key = TtlCache::session_key(&session.id, session.game_type);

        if let Some(record) = self.ctx.cache.get::<GameStateRecord>(&key) {
            return Ok(record);
        }

        if let Some(record) = self.ctx.db.get_game_state(&session.id).await? {
            self.ctx.cache.set(&key, &record);
            return Ok(record);
        }

        tracing::warn!(session_id = %session.id, "Game state missing, regenerating");
        self.build_fresh_state(session).await
    }

    /// Generate fresh mode state and persist both copies.
    async fn build_fresh_state(&self, session: &GameSession) -> Result<GameStateRecord> {
        let payload = self.initialize_mode(session).await?;

        let record = GameStateRecord {
            session_id: session.id.clone(),
            user_id: session.user_id.clone(),
            game_type: session.game_type,
            state: GameStateDoc {
                tries_used: session.current_tries,
                score: session.score,
                completed: session.completed,
                payload,
            },
            metadata: Value::Null,
            last_action: "initialize".to_string(),
            last_updated: chrono::Utc::now().to_rfc3339(),
        };

        self.persist_state(&record).await?;
        Ok(record)
    }

    async fn persist_state(&self, record: &GameStateRecord) -> Result<()> {
        self.ctx.db.set_game_state(record).await?;
        let key = TtlCache::session_key(&record.session_id, record.game_type);
        self.ctx.cache.set(&key, record);
        Ok(())
    }

    async fn initialize_mode(&self, session: &GameSession) -> Result<ModeState> {
        match session.game_type {
            GameType::LyricsText => LyricsGame::text().initialize(&self.ctx, session).await,
            GameType::LyricsVoice => LyricsGame::voice().initialize(&self.ctx, session).await,
            GameType::GuessArtist => ArtistGuessGame.initialize(&self.ctx, session).await,
            GameType::Crossword => CrosswordGame.initialize(&self.ctx, session).await,
            GameType::Trivia => TriviaGame.initialize(&self.ctx, session).await,
        }
    }

    fn apply(
        &self,
        session: &GameSession,
        state: &mut GameStateDoc,
        answer: &Answer,
    ) -> Result<TurnFeedback> {
        let max_tries = session.max_tries;
        match session.game_type {
            GameType::LyricsText => LyricsGame::text().apply_answer(state, answer, max_tries),
            GameType::LyricsVoice => LyricsGame::voice().apply_answer(state, answer, max_tries),
            GameType::GuessArtist => ArtistGuessGame.apply_answer(state, answer, max_tries),
            GameType::Crossword => CrosswordGame.apply_answer(state, answer, max_tries),
            GameType::Trivia => TriviaGame.apply_answer(state, answer, max_tries),
        }
    }

    fn view(&self, game_type: GameType, state: &GameStateDoc) -> Value {
        match game_type {
            GameType::LyricsText => LyricsGame::text().client_view(state),
            GameType::LyricsVoice => LyricsGame::voice().client_view(state),
            GameType::GuessArtist => ArtistGuessGame.client_view(state),
            GameType::Crossword => CrosswordGame.client_view(state),
            GameType::Trivia => TriviaGame.client_view(state),
        }
    }

    fn session_view(&self, session: &GameSession, state: &GameStateDoc) -> SessionView {
        SessionView {
            session_id: session.id.clone(),
            game_type: session.game_type,
            score: state.score,
            tries_used: state.tries_used,
            max_tries: session.max_tries,
            completed: state.completed,
            state: self.view(session.game_type, state),
        }
    }

    async fn load_owned_session(&self, session_id: &str, user_id: &str) -> Result<GameSession> {
        let session = self
            .ctx
            .db
            .get_game_session(session_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Game session {}", session_id)))?;

        // Sessions are private; a wrong owner looks like a missing session
        if session.user_id != user_id {
            return Err(AppError::NotFound(format!("Game session {}", session_id)));
        }

        Ok(session)
    }

    fn session_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.session_locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Resolve a guessed name to library facts when the user has that
    /// artist in their top list.
    async fn resolve_artist_facts(
        &self,
        user_id: &str,
        name: &str,
    ) -> Result<Option<ArtistFacts>> {
        let artists = self.ctx.db.get_top_artists(user_id).await?;
        Ok(artists
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
            .map(artist_facts))
    }
}

/// Snapshot the comparable attributes of a library artist.
pub fn artist_facts(artist: &TopArtist) -> ArtistFacts {
    ArtistFacts {
        debut_year: artist.debut_year,
        birth_year: artist.birth_year,
        members: artist.members,
        followers: artist.followers,
        num_albums: artist.num_albums,
        country: artist.country.clone(),
        gender: artist.gender.clone(),
        genres: artist.genres.clone(),
    }
}
