// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Guess-the-artist game.
//!
//! A random artist from the user's library is the hidden target. Each
//! guess is resolved to that artist's library record and compared
//! attribute by attribute, so the player converges on the answer through
//! higher/lower and match/mismatch feedback. Genres and country are
//! revealed up front.

use rand::seq::SliceRandom;
use serde_json::{json, Value};

use crate::error::{AppError, Result};
use crate::games::engine::{artist_facts, Answer, GameContext, GameMode, TurnFeedback};
use crate::games::matching::{
    answers_match, compare_exact, compare_genres, compare_numeric, compare_year, TEXT_THRESHOLD,
};
use crate::models::{ArtistFacts, GameSession, GameStateDoc, ModeState, RevealedHints};

/// Minimum library size to start a game.
const MIN_ARTISTS: usize = 5;
/// Starting score; each try spent costs one point.
const BASE_SCORE: i64 = 10;
/// Genres revealed as the opening hint.
const HINT_GENRES: usize = 3;

pub struct ArtistGuessGame;

impl GameMode for ArtistGuessGame {
    async fn initialize(&self, ctx: &GameContext, session: &GameSession) -> Result<ModeState> {
        let artists = ctx.db.get_top_artists(&session.user_id).await?;
        if artists.len() < MIN_ARTISTS {
            return Err(AppError::GameInit(format!(
                "not enough artists in library: {} (minimum {} required)",
                artists.len(),
                MIN_ARTISTS
            )));
        }

        let target = artists
            .choose(&mut rand::thread_rng())
            .ok_or_else(|| AppError::GameInit("artist selection failed".to_string()))?;

        Ok(ModeState::GuessArtist {
            target_spotify_id: target.spotify_id.clone(),
            target_name: target.name.clone(),
            facts: artist_facts(target),
            hints: RevealedHints {
                genres: target.genres.iter().take(HINT_GENRES).cloned().collect(),
                country: target.country.clone(),
            },
        })
    }

    fn apply_answer(
        &self,
        state: &mut GameStateDoc,
        answer: &Answer,
        max_tries: u32,
    ) -> Result<TurnFeedback> {
        let Answer::ArtistGuess { name, facts } = answer else {
            return Err(AppError::BadRequest(
                "guess-artist games take an artist name".to_string(),
            ));
        };

        let ModeState::GuessArtist {
            target_name,
            facts: target_facts,
            ..
        } = &state.payload
        else {
            return Err(AppError::GameState(
                "state is not a guess-artist game".to_string(),
            ));
        };

        state.tries_used += 1;

        let correct = answers_match(target_name, name, TEXT_THRESHOLD);
        let mut detail = match facts {
            Some(guessed) => compare_facts(target_facts, guessed),
            None => json!({ "unknown_artist": true }),
        };

        if correct {
            state.score = (BASE_SCORE - state.tries_used as i64).max(0);
            state.completed = true;
        } else if state.tries_used >= max_tries {
            state.completed = true;
            // Out of tries, so the target can be shown
            detail["target"] = json!(target_name);
        }

        Ok(TurnFeedback { correct, detail })
    }

    fn client_view(&self, state: &GameStateDoc) -> Value {
        let ModeState::GuessArtist {
            target_name,
            hints,
            ..
        } = &state.payload
        else {
            return Value::Null;
        };

        let mut view = json!({
            "hints": {
                "genres": hints.genres,
                "country": hints.country,
            },
        });
        if state.completed {
            view["target"] = json!(target_name);
        }
        view
    }
}

/// Compare every attribute of the guessed artist against the target's.
fn compare_facts(target: &ArtistFacts, guess: &ArtistFacts) -> Value {
    let numeric = |v: Option<u32>| v.map(f64::from);
    json!({
        "debut_year": compare_year(target.debut_year, guess.debut_year),
        "birth_year": compare_year(target.birth_year, guess.birth_year),
        "members": compare_numeric(numeric(target.members), numeric(guess.members)),
        "followers": compare_numeric(
            target.followers.map(|f| f as f64),
            guess.followers.map(|f| f as f64),
        ),
        "num_albums": compare_numeric(numeric(target.num_albums), numeric(guess.num_albums)),
        "country": compare_exact(target.country.as_deref(), guess.country.as_deref()),
        "gender": compare_exact(target.gender.as_deref(), guess.gender.as_deref()),
        "genres": compare_genres(&target.genres, &guess.genres),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target_facts() -> ArtistFacts {
        ArtistFacts {
            debut_year: Some(2005),
            birth_year: Some(1985),
            members: Some(4),
            followers: Some(1_000_000),
            num_albums: Some(6),
            country: Some("Sweden".to_string()),
            gender: None,
            genres: vec!["indie pop".to_string(), "synthpop".to_string()],
        }
    }

    fn fresh_state() -> GameStateDoc {
        GameStateDoc {
            tries_used: 0,
            score: 0,
            completed: false,
            payload: ModeState::GuessArtist {
                target_spotify_id: "artist1".to_string(),
                target_name: "The Targets".to_string(),
                facts: target_facts(),
                hints: RevealedHints {
                    genres: vec!["indie pop".to_string()],
                    country: Some("Sweden".to_string()),
                },
            },
        }
    }

    fn guess(name: &str, facts: Option<ArtistFacts>) -> Answer {
        Answer::ArtistGuess {
            name: name.to_string(),
            facts,
        }
    }

    #[test]
    fn test_correct_guess_completes_with_score() {
        let mut state = fresh_state();
        let feedback = ArtistGuessGame
            .apply_answer(&mut state, &guess("the targets", Some(target_facts())), 10)
            .unwrap();

        assert!(feedback.correct);
        assert!(state.completed);
        assert_eq!(state.score, BASE_SCORE - 1);
    }

    #[test]
    fn test_wrong_guess_gives_attribute_feedback() {
        let mut state = fresh_state();
        let guessed = ArtistFacts {
            debut_year: Some(1990),       // target 2005 -> higher
            birth_year: Some(1986),       // within 5 -> close
            members: Some(1),             // target 4 -> higher
            followers: Some(5_000_000),   // target 1M -> lower
            num_albums: None,             // -> invalid
            country: Some("Norway".to_string()),
            gender: None,                 // both missing -> invalid
            genres: vec!["synthpop".to_string()],
        };

        let feedback = ArtistGuessGame
            .apply_answer(&mut state, &guess("Someone Else", Some(guessed)), 10)
            .unwrap();

        assert!(!feedback.correct);
        assert!(!state.completed);
        assert_eq!(state.tries_used, 1);
        assert_eq!(feedback.detail["debut_year"], "higher");
        assert_eq!(feedback.detail["birth_year"], "close");
        assert_eq!(feedback.detail["members"], "higher");
        assert_eq!(feedback.detail["followers"], "lower");
        assert_eq!(feedback.detail["num_albums"], "invalid");
        assert_eq!(feedback.detail["country"], "mismatch");
        assert_eq!(feedback.detail["gender"], "invalid");
        assert_eq!(feedback.detail["genres"], "correct");
    }

    #[test]
    fn test_unknown_artist_guess_costs_a_try() {
        let mut state = fresh_state();
        let feedback = ArtistGuessGame
            .apply_answer(&mut state, &guess("Nobody I Know", None), 10)
            .unwrap();

        assert!(!feedback.correct);
        assert_eq!(feedback.detail["unknown_artist"], true);
        assert_eq!(state.tries_used, 1);
    }

    #[test]
    fn test_exhaustion_reveals_target() {
        let mut state = fresh_state();
        let feedback = ArtistGuessGame
            .apply_answer(&mut state, &guess("wrong", None), 1)
            .unwrap();

        assert!(state.completed);
        assert_eq!(state.score, 0);
        assert_eq!(feedback.detail["target"], "The Targets");
    }

    #[test]
    fn test_client_view_hides_target_until_done() {
        let mut state = fresh_state();
        let view = ArtistGuessGame.client_view(&state);
        assert_eq!(view["hints"]["country"], "Sweden");
        assert!(view.get("target").is_none());

        state.completed = true;
        let view = ArtistGuessGame.client_view(&state);
        assert_eq!(view["target"], "The Targets");
    }

    #[test]
    fn test_text_answer_rejected() {
        let mut state = fresh_state();
        let err = ArtistGuessGame
            .apply_answer(&mut state, &Answer::Text("abba".to_string()), 10)
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }
}
