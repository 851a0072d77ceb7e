//! Game session, state, statistics and leaderboard models.
//!
//! Game state is persisted as a tagged union: a common envelope
//! (tries, score, completion) plus a per-mode payload discriminated by a
//! `mode` field, so a state written by one game mode can never be
//! deserialized as another.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The supported game modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameType {
    LyricsText,
    LyricsVoice,
    GuessArtist,
    Crossword,
    Trivia,
}

impl GameType {
    pub const ALL: [GameType; 5] = [
        GameType::LyricsText,
        GameType::LyricsVoice,
        GameType::GuessArtist,
        GameType::Crossword,
        GameType::Trivia,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            GameType::LyricsText => "lyrics_text",
            GameType::LyricsVoice => "lyrics_voice",
            GameType::GuessArtist => "guess_artist",
            GameType::Crossword => "crossword",
            GameType::Trivia => "trivia",
        }
    }

    pub fn parse(s: &str) -> Option<GameType> {
        match s {
            "lyrics_text" => Some(GameType::LyricsText),
            "lyrics_voice" => Some(GameType::LyricsVoice),
            "guess_artist" => Some(GameType::GuessArtist),
            "crossword" => Some(GameType::Crossword),
            "trivia" => Some(GameType::Trivia),
            _ => None,
        }
    }
}

impl std::fmt::Display for GameType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One play-through of a game mode.
///
/// Stored in `game_sessions` with a UUID document ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSession {
    /// Session UUID (also the document ID)
    pub id: String,
    pub user_id: String,
    pub game_type: GameType,
    /// When the session started (ISO 8601)
    pub started_at: String,
    /// Set when the session completes
    pub ended_at: Option<String>,
    pub score: i64,
    pub max_tries: u32,
    pub current_tries: u32,
    pub completed: bool,
}

impl GameSession {
    pub const DEFAULT_MAX_TRIES: u32 = 10;

    pub fn new(user_id: &str, game_type: GameType, now: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            game_type,
            started_at: now.to_string(),
            ended_at: None,
            score: 0,
            max_tries: Self::DEFAULT_MAX_TRIES,
            current_tries: 0,
            completed: false,
        }
    }

    /// Elapsed play time in whole seconds, zero until the session ends.
    pub fn elapsed_secs(&self) -> i64 {
        let (Some(end), Ok(start)) = (
            self.ended_at
                .as_deref()
                .and_then(|e| DateTime::parse_from_rfc3339(e).ok()),
            DateTime::parse_from_rfc3339(&self.started_at),
        ) else {
            return 0;
        };
        (end - start).num_seconds().max(0)
    }
}

// ─── Game state (tagged union) ───────────────────────────────────

/// Direction of a crossword placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Across,
    Down,
}

/// A word placed on the crossword grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacedWord {
    pub word: String,
    pub clue: String,
    /// Column of the first letter
    pub x: usize,
    /// Row of the first letter
    pub y: usize,
    pub direction: Direction,
}

/// One masked-lyric challenge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LyricChallenge {
    pub track_spotify_id: String,
    pub track_name: String,
    pub artist: String,
    /// Lyric excerpt with the answer span replaced by placeholders
    pub masked_text: String,
    /// The hidden span the player must supply
    pub answer: String,
}

/// One multiple-choice trivia question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriviaQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub answer: String,
    pub difficulty: String,
}

/// Attributes revealed to the player at the start of a guess-artist game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevealedHints {
    pub genres: Vec<String>,
    pub country: Option<String>,
}

/// The comparable attributes of an artist, snapshotted into game state so
/// guesses can be scored without re-reading the library.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtistFacts {
    pub debut_year: Option<i32>,
    pub birth_year: Option<i32>,
    pub members: Option<u32>,
    pub followers: Option<u64>,
    pub num_albums: Option<u32>,
    pub country: Option<String>,
    pub gender: Option<String>,
    #[serde(default)]
    pub genres: Vec<String>,
}

/// Per-mode game state payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ModeState {
    Lyrics {
        challenges: Vec<LyricChallenge>,
        current_index: usize,
    },
    GuessArtist {
        target_spotify_id: String,
        target_name: String,
        facts: ArtistFacts,
        hints: RevealedHints,
    },
    Crossword {
        track_spotify_id: String,
        track_name: String,
        grid_size: usize,
        placements: Vec<PlacedWord>,
    },
    Trivia {
        questions: Vec<TriviaQuestion>,
        current_index: usize,
    },
}

/// The persisted game state: common envelope plus mode payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStateDoc {
    pub tries_used: u32,
    pub score: i64,
    pub completed: bool,
    #[serde(flatten)]
    pub payload: ModeState,
}

/// Durable game-state row, mirrored by the in-process cache.
///
/// Stored in `game_states` with the session ID as document ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStateRecord {
    pub session_id: String,
    pub user_id: String,
    pub game_type: GameType,
    pub state: GameStateDoc,
    /// Free-form mode metadata (not interpreted by the engine)
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Last lifecycle action applied ("initialize", "answer", "restart", ...)
    pub last_action: String,
    pub last_updated: String,
}

// ─── Statistics / leaderboard ────────────────────────────────────

/// Per-user, per-mode statistics rollup.
///
/// Stored in `game_stats` with document ID `{user_id}_{game_type}`,
/// updated inside a Firestore transaction when a session completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameStatistics {
    pub user_id: String,
    pub game_type: GameType,
    #[serde(default)]
    pub total_games: u32,
    #[serde(default)]
    pub total_score: i64,
    #[serde(default)]
    pub highest_score: i64,
    #[serde(default)]
    pub average_score: f64,
    #[serde(default)]
    pub total_time_played_secs: i64,
    #[serde(default)]
    pub updated_at: String,
}

impl GameStatistics {
    pub fn new(user_id: &str, game_type: GameType) -> Self {
        Self {
            user_id: user_id.to_string(),
            game_type,
            total_games: 0,
            total_score: 0,
            highest_score: 0,
            average_score: 0.0,
            total_time_played_secs: 0,
            updated_at: String::new(),
        }
    }

    pub fn doc_id(user_id: &str, game_type: GameType) -> String {
        format!("{user_id}_{game_type}")
    }

    /// Fold a completed session into the rollup.
    pub fn update_from_session(&mut self, session: &GameSession, now: &str) {
        self.total_games += 1;
        self.total_score += session.score;
        self.highest_score = self.highest_score.max(session.score);
        self.average_score = self.total_score as f64 / self.total_games as f64;
        self.total_time_played_secs += session.elapsed_secs();
        self.updated_at = now.to_string();
    }
}

/// One leaderboard row; the top 100 per game type are kept.
///
/// The originating session ID doubles as the document ID, so repeated
/// rollups of the same session overwrite rather than duplicate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub session_id: String,
    pub user_id: String,
    pub game_type: GameType,
    pub score: i64,
    pub achieved_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finished_session(score: i64) -> GameSession {
        GameSession {
            id: "s1".to_string(),
            user_id: "user1".to_string(),
            game_type: GameType::Trivia,
            started_at: "2026-01-01T10:00:00Z".to_string(),
            ended_at: Some("2026-01-01T10:05:00Z".to_string()),
            score,
            max_tries: 10,
            current_tries: 10,
            completed: true,
        }
    }

    #[test]
    fn test_game_type_round_trip() {
        for gt in GameType::ALL {
            assert_eq!(GameType::parse(gt.as_str()), Some(gt));
        }
        assert_eq!(GameType::parse("checkers"), None);
    }

    #[test]
    fn test_stats_rollup_math() {
        let mut stats = GameStatistics::new("user1", GameType::Trivia);
        stats.update_from_session(&finished_session(8), "now");
        stats.update_from_session(&finished_session(5), "now");

        assert_eq!(stats.total_games, 2);
        assert_eq!(stats.total_score, 13);
        assert_eq!(stats.highest_score, 8);
        assert_eq!(stats.average_score, 6.5);
        assert_eq!(stats.total_time_played_secs, 600);
    }

    #[test]
    fn test_elapsed_secs_zero_until_ended() {
        let mut session = finished_session(0);
        session.ended_at = None;
        assert_eq!(session.elapsed_secs(), 0);
    }

    #[test]
    fn test_state_doc_tagged_union_round_trip() {
        let doc = GameStateDoc {
            tries_used: 3,
            score: 20,
            completed: false,
            payload: ModeState::Lyrics {
                challenges: vec![LyricChallenge {
                    track_spotify_id: "t1".to_string(),
                    track_name: "Song".to_string(),
                    artist: "Artist".to_string(),
                    masked_text: "la la ____ ____".to_string(),
                    answer: "di da".to_string(),
                }],
                current_index: 0,
            },
        };

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["mode"], "lyrics");
        assert_eq!(json["tries_used"], 3);

        let back: GameStateDoc = serde_json::from_value(json).unwrap();
        assert!(matches!(back.payload, ModeState::Lyrics { .. }));
    }

    #[test]
    fn test_state_doc_rejects_unknown_mode() {
        let json = serde_json::json!({
            "tries_used": 0,
            "score": 0,
            "completed": false,
            "mode": "checkers"
        });
        assert!(serde_json::from_value::<GameStateDoc>(json).is_err());
    }
}
