// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Game modes and the engine that drives them.

pub mod artist_guess;
pub mod crossword;
pub mod engine;
pub mod lyrics;
pub mod matching;
pub mod trivia;

pub use engine::{Answer, GameContext, GameEngine, SessionView, TurnResult};
