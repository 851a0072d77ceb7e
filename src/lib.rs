// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! TuneGuess: music trivia games built on a user's own Spotify library.
//!
//! This crate provides the backend API: Spotify OAuth, a multi-source
//! library enrichment pipeline, and a game engine driving the lyric,
//! artist-guessing, crossword and trivia modes.

pub mod config;
pub mod db;
pub mod error;
pub mod games;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use games::GameEngine;
use services::{EnrichmentService, SpotifyService, StatsService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub spotify_service: SpotifyService,
    pub enrichment_service: EnrichmentService,
    pub stats_service: StatsService,
    pub engine: GameEngine,
}
