// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Multiple-choice trivia about the user's top artists.
//!
//! Questions come from the generative client in one batched call over the
//! stored biographies; when it is disabled or fails, a local generator
//! builds questions from the artists' career facts instead.

use rand::seq::SliceRandom;
use serde_json::{json, Value};

use crate::error::{AppError, Result};
use crate::games::engine::{Answer, GameContext, GameMode, TurnFeedback};
use crate::models::{GameSession, GameStateDoc, ModeState, TopArtist, TriviaQuestion};

/// Minimum biography-bearing artists to start a game.
const MIN_ARTISTS: usize = 4;
/// Questions per game.
const QUESTION_COUNT: usize = 10;
/// Points per correct answer.
const POINTS_PER_CORRECT: i64 = 1;

pub struct TriviaGame;

impl GameMode for TriviaGame {
    async fn initialize(&self, ctx: &GameContext, session: &GameSession) -> Result<ModeState> {
        let artists = ctx.db.get_top_artists(&session.user_id).await?;
        let with_bios: Vec<&TopArtist> = artists.iter().filter(|a| a.has_biography()).collect();

        if with_bios.len() < MIN_ARTISTS {
            return Err(AppError::GameInit(format!(
                "not enough artists with biographies: {} (minimum {} required)",
                with_bios.len(),
                MIN_ARTISTS
            )));
        }

        let mut questions = generate_questions(ctx, &with_bios).await;
        if questions.len() < MIN_ARTISTS {
            return Err(AppError::GameInit(format!(
                "could not build enough trivia questions: {}",
                questions.len()
            )));
        }

        questions.shuffle(&mut rand::thread_rng());
        questions.truncate(QUESTION_COUNT);

        Ok(ModeState::Trivia {
            questions,
            current_index: 0,
        })
    }

    fn apply_answer(
        &self,
        state: &mut GameStateDoc,
        answer: &Answer,
        max_tries: u32,
    ) -> Result<TurnFeedback> {
        let Answer::Text(given) = answer else {
            return Err(AppError::BadRequest(
                "trivia games take a text answer".to_string(),
            ));
        };

        let ModeState::Trivia {
            questions,
            current_index,
        } = &mut state.payload
        else {
            return Err(AppError::GameState("state is not a trivia game".to_string()));
        };

        let Some(question) = questions.get(*current_index) else {
            return Err(AppError::GameState("no question remaining".to_string()));
        };

        let correct = question.answer.trim().eq_ignore_ascii_case(given.trim());

        state.tries_used += 1;
        let mut detail = json!({ "difficulty": question.difficulty });
        if correct {
            state.score += POINTS_PER_CORRECT;
        } else {
            detail["expected"] = json!(question.answer);
        }

        *current_index += 1;
        if *current_index >= questions.len() || state.tries_used >= max_tries {
            state.completed = true;
        }

        Ok(TurnFeedback { correct, detail })
    }

    fn client_view(&self, state: &GameStateDoc) -> Value {
        let ModeState::Trivia {
            questions,
            current_index,
        } = &state.payload
        else {
            return Value::Null;
        };

        let current = questions.get(*current_index).map(|q| {
            json!({
                "question": q.question,
                "options": q.options,
                "difficulty": q.difficulty,
            })
        });

        json!({
            "question": current,
            "question_index": current_index,
            "total_questions": questions.len(),
        })
    }
}

/// Biography-driven questions when the generative client is available,
/// fact-driven local questions otherwise.
async fn generate_questions(ctx: &GameContext, artists: &[&TopArtist]) -> Vec<TriviaQuestion> {
    if ctx.content.is_enabled() {
        let bios: Vec<(String, String)> = artists
            .iter()
            .filter_map(|a| a.biography.clone().map(|b| (a.name.clone(), b)))
            .collect();
        match ctx
            .content
            .generate_trivia_questions(&bios, QUESTION_COUNT)
            .await
        {
            Ok(questions) => return questions,
            Err(e) => {
                tracing::warn!(error = %e, "Generative trivia failed, using local questions");
            }
        }
    }
    local_questions(artists)
}

/// Build questions from stored career facts. Distractors come from the
/// other artists' values for the same attribute, so every option is
/// plausible for the library in question.
fn local_questions(artists: &[&TopArtist]) -> Vec<TriviaQuestion> {
    let mut questions = Vec::new();
    let mut rng = rand::thread_rng();

    for artist in artists {
        if questions.len() >= QUESTION_COUNT {
            break;
        }

        if let Some(country) = artist.country.as_deref() {
            let distractors: Vec<String> = artists
                .iter()
                .filter_map(|a| a.country.clone())
                .filter(|c| !c.eq_ignore_ascii_case(country))
                .collect();
            if let Some(q) = multiple_choice(
                format!("Which country is {} from?", artist.name),
                country.to_string(),
                distractors,
                "easy",
                &mut rng,
            ) {
                questions.push(q);
            }
        }

        if questions.len() >= QUESTION_COUNT {
            break;
        }

        if let Some(year) = artist.debut_year {
            let distractors = vec![
                (year - 7).to_string(),
                (year + 6).to_string(),
                (year - 13).to_string(),
            ];
            if let Some(q) = multiple_choice(
                format!("In which year did {} first release music?", artist.name),
                year.to_string(),
                distractors,
                "medium",
                &mut rng,
            ) {
                questions.push(q);
            }
        }
    }

    questions
}

/// Assemble a four-option question; `None` when there are not enough
/// distinct distractors.
fn multiple_choice(
    question: String,
    answer: String,
    distractors: Vec<String>,
    difficulty: &str,
    rng: &mut impl rand::Rng,
) -> Option<TriviaQuestion> {
    let mut options = vec![answer.clone()];
    for d in distractors {
        if options.len() >= 4 {
            break;
        }
        if !options.iter().any(|o| o.eq_ignore_ascii_case(&d)) {
            options.push(d);
        }
    }
    if options.len() < 4 {
        return None;
    }
    options.shuffle(rng);

    Some(TriviaQuestion {
        question,
        options,
        answer,
        difficulty: difficulty.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(n: usize) -> TriviaQuestion {
        TriviaQuestion {
            question: format!("Question {n}?"),
            options: vec![
                "Option A".to_string(),
                "Option B".to_string(),
                "Option C".to_string(),
                "Option D".to_string(),
            ],
            answer: "Option B".to_string(),
            difficulty: "easy".to_string(),
        }
    }

    fn state_with_questions(n: usize) -> GameStateDoc {
        GameStateDoc {
            tries_used: 0,
            score: 0,
            completed: false,
            payload: ModeState::Trivia {
                questions: (0..n).map(question).collect(),
                current_index: 0,
            },
        }
    }

    #[test]
    fn test_correct_answer_scores_one() {
        let mut state = state_with_questions(3);
        let feedback = TriviaGame
            .apply_answer(&mut state, &Answer::Text("option b".to_string()), 10)
            .unwrap();

        assert!(feedback.correct);
        assert_eq!(state.score, 1);
        assert!(!state.completed);
    }

    #[test]
    fn test_wrong_answer_reveals_expected() {
        let mut state = state_with_questions(2);
        let feedback = TriviaGame
            .apply_answer(&mut state, &Answer::Text("Option A".to_string()), 10)
            .unwrap();

        assert!(!feedback.correct);
        assert_eq!(feedback.detail["expected"], "Option B");
        assert_eq!(state.score, 0);
    }

    #[test]
    fn test_completes_when_questions_exhausted() {
        let mut state = state_with_questions(2);
        for _ in 0..2 {
            TriviaGame
                .apply_answer(&mut state, &Answer::Text("Option B".to_string()), 10)
                .unwrap();
        }
        assert!(state.completed);
        assert_eq!(state.score, 2);
    }

    #[test]
    fn test_client_view_hides_answer() {
        let state = state_with_questions(2);
        let view = TriviaGame.client_view(&state);
        assert_eq!(view["question"]["question"], "Question 0?");
        assert_eq!(view["question"]["options"].as_array().unwrap().len(), 4);
        assert!(view["question"].get("answer").is_none());
    }

    fn artist(name: &str, country: Option<&str>, debut: Option<i32>) -> TopArtist {
        TopArtist {
            user_id: "user1".to_string(),
            spotify_id: name.to_lowercase(),
            name: name.to_string(),
            genres: vec![],
            popularity: 50,
            followers: None,
            debut_year: debut,
            birth_year: None,
            members: None,
            country: country.map(String::from),
            gender: None,
            most_popular_song: None,
            num_albums: None,
            biography: Some(format!("{name} is a musician.")),
            image_url: None,
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_local_questions_from_facts() {
        let artists = [
            artist("Alpha", Some("Sweden"), Some(2001)),
            artist("Beta", Some("Norway"), None),
            artist("Gamma", Some("Iceland"), None),
            artist("Delta", Some("Finland"), None),
        ];
        let refs: Vec<&TopArtist> = artists.iter().collect();
        let questions = local_questions(&refs);

        assert!(!questions.is_empty());
        for q in &questions {
            assert_eq!(q.options.len(), 4);
            assert!(q.options.contains(&q.answer));
        }
        // The debut question only exists for the artist with a year
        assert!(questions.iter().any(|q| q.question.contains("Alpha")));
    }

    #[test]
    fn test_multiple_choice_needs_enough_distractors() {
        let mut rng = rand::thread_rng();
        let q = multiple_choice(
            "Q?".to_string(),
            "right".to_string(),
            vec!["right".to_string(), "other".to_string()],
            "easy",
            &mut rng,
        );
        assert!(q.is_none());
    }
}
