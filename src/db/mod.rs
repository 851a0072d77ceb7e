//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    pub const USERS: &str = "users";
    pub const TOKENS: &str = "tokens";
    pub const TOP_ARTISTS: &str = "top_artists";
    pub const TOP_TRACKS: &str = "top_tracks";
    pub const TOP_ALBUMS: &str = "top_albums";
    pub const GAME_SESSIONS: &str = "game_sessions";
    pub const GAME_STATES: &str = "game_states";
    /// Per-user, per-mode statistics rollups (keyed `{user_id}_{game_type}`)
    pub const GAME_STATS: &str = "game_stats";
    pub const LEADERBOARD: &str = "leaderboard";
}
