// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod artist;
pub mod game;
pub mod track;
pub mod user;

pub use artist::{PopularSong, TopArtist};
pub use game::{
    ArtistFacts, Direction, GameSession, GameStateDoc, GameStateRecord, GameStatistics, GameType,
    LeaderboardEntry, LyricChallenge, ModeState, PlacedWord, RevealedHints, TriviaQuestion,
};
pub use track::{TopAlbum, TopTrack};
pub use user::{User, UserTokens};
