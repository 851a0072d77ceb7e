// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fill-in-the-lyric game (typed and voice variants).
//!
//! Challenges are built from the user's lyric-bearing top tracks: a
//! contiguous span of each song is masked and the player supplies it.
//! The two variants share all logic except the match threshold, which is
//! more lenient for transcribed voice input.

use rand::seq::SliceRandom;
use serde_json::{json, Value};

use crate::error::{AppError, Result};
use crate::games::engine::{Answer, GameContext, GameMode, TurnFeedback};
use crate::games::matching::{answers_match, similarity, TEXT_THRESHOLD, VOICE_THRESHOLD};
use crate::models::{GameSession, GameStateDoc, LyricChallenge, ModeState, TopTrack};

/// A track needs this many lyric words to host a challenge.
const MIN_LYRIC_WORDS: usize = 20;
/// Minimum eligible tracks to start a game.
const MIN_ELIGIBLE_TRACKS: usize = 4;
/// Challenges generated per track.
const CHALLENGES_PER_TRACK: usize = 2;
/// Target challenge count per game.
const TARGET_CHALLENGES: usize = 10;
/// Points per correct answer.
const POINTS_PER_CORRECT: i64 = 10;
/// Masked span length in words.
const SPAN_WORDS: usize = 10;

pub struct LyricsGame {
    voice: bool,
}

impl LyricsGame {
    pub fn text() -> Self {
        Self { voice: false }
    }

    pub fn voice() -> Self {
        Self { voice: true }
    }

    fn threshold(&self) -> f64 {
        if self.voice {
            VOICE_THRESHOLD
        } else {
            TEXT_THRESHOLD
        }
    }
}

impl GameMode for LyricsGame {
    async fn initialize(&self, ctx: &GameContext, session: &GameSession) -> Result<ModeState> {
        let tracks = ctx.db.get_top_tracks(&session.user_id).await?;
        let mut eligible: Vec<&TopTrack> = tracks
            .iter()
            .filter(|t| {
                t.has_lyrics()
                    && t.lyrics
                        .as_deref()
                        .is_some_and(|l| l.split_whitespace().count() >= MIN_LYRIC_WORDS)
            })
            .collect();

        if eligible.len() < MIN_ELIGIBLE_TRACKS {
            return Err(AppError::GameInit(format!(
                "not enough tracks with lyrics: {} (minimum {} required)",
                eligible.len(),
                MIN_ELIGIBLE_TRACKS
            )));
        }

        eligible.shuffle(&mut rand::thread_rng());

        let mut challenges = Vec::new();
        for track in &eligible {
            if challenges.len() >= TARGET_CHALLENGES {
                break;
            }
            let Some(lyrics) = track.lyrics.as_deref() else {
                continue;
            };

            let spans = match pick_spans(ctx, lyrics).await {
                Ok(spans) => spans,
                Err(e) => {
                    tracing::warn!(track = %track.name, error = %e, "Span selection failed, skipping track");
                    continue;
                }
            };

            for span in spans.into_iter().take(CHALLENGES_PER_TRACK) {
                if challenges.len() >= TARGET_CHALLENGES {
                    break;
                }
                if let Some(masked) = mask_span(lyrics, &span) {
                    challenges.push(LyricChallenge {
                        track_spotify_id: track.spotify_id.clone(),
                        track_name: track.name.clone(),
                        artist: track.artist.clone(),
                        masked_text: masked,
                        answer: span,
                    });
                }
            }
        }

        if challenges.len() < MIN_ELIGIBLE_TRACKS {
            return Err(AppError::GameInit(format!(
                "could not build enough lyric challenges: {}",
                challenges.len()
            )));
        }

        Ok(ModeState::Lyrics {
            challenges,
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
                "lyrics games take a text answer".to_string(),
            ));
        };

        let ModeState::Lyrics {
            challenges,
            current_index,
        } = &mut state.payload
        else {
            return Err(AppError::GameState("state is not a lyrics game".to_string()));
        };

        let Some(challenge) = challenges.get(*current_index) else {
            return Err(AppError::GameState("no challenge remaining".to_string()));
        };

        let correct = answers_match(&challenge.answer, given, self.threshold());
        let closeness = similarity(&challenge.answer, given);

        state.tries_used += 1;
        let mut detail = json!({
            "similarity": closeness,
            "track_name": challenge.track_name,
        });
        if correct {
            state.score += POINTS_PER_CORRECT;
        } else {
            // The turn is spent, so the answer can be shown
            detail["expected"] = json!(challenge.answer);
        }

        *current_index += 1;
        if *current_index >= challenges.len() || state.tries_used >= max_tries {
            state.completed = true;
        }

        Ok(TurnFeedback { correct, detail })
    }

    fn client_view(&self, state: &GameStateDoc) -> Value {
        let ModeState::Lyrics {
            challenges,
            current_index,
        } = &state.payload
        else {
            return Value::Null;
        };

        let current = challenges.get(*current_index).map(|c| {
            json!({
                "track_name": c.track_name,
                "artist": c.artist,
                "masked_text": c.masked_text,
            })
        });

        json!({
            "challenge": current,
            "challenge_index": current_index,
            "total_challenges": challenges.len(),
            "voice": self.voice,
        })
    }
}

/// Choose challenge spans: the generative picker when enabled, the local
/// window splitter otherwise or on failure.
async fn pick_spans(ctx: &GameContext, lyrics: &str) -> Result<Vec<String>> {
    if ctx.content.is_enabled() {
        match ctx
            .content
            .select_lyric_spans(lyrics, CHALLENGES_PER_TRACK)
            .await
        {
            Ok(spans) => return Ok(spans),
            Err(e) => {
                tracing::warn!(error = %e, "Generative span selection failed, using local spans");
            }
        }
    }
    Ok(local_spans(lyrics, CHALLENGES_PER_TRACK))
}

/// Deterministic fallback: evenly spaced fixed-length windows over the
/// lyric words.
fn local_spans(lyrics: &str, count: usize) -> Vec<String> {
    let words: Vec<&str> = lyrics.split_whitespace().collect();
    if words.len() < SPAN_WORDS {
        return Vec::new();
    }

    let last_start = words.len() - SPAN_WORDS;
    let mut spans = Vec::new();
    for i in 0..count {
        let start = last_start * (i + 1) / (count + 1);
        let span = words[start..start + SPAN_WORDS].join(" ");
        if !spans.contains(&span) {
            spans.push(span);
        }
    }
    spans
}

/// Replace the span with one `____` per hidden word in the full lyric.
/// Matching is word-based, so line breaks in the lyrics never prevent a
/// span from being found, and substituting the answer back into the
/// masked text reconstructs the whitespace-normalized lyric.
fn mask_span(lyrics: &str, span: &str) -> Option<String> {
    let words: Vec<&str> = lyrics.split_whitespace().collect();
    let span_words: Vec<&str> = span.split_whitespace().collect();
    if span_words.is_empty() || words.len() < span_words.len() {
        return None;
    }

    let start = (0..=words.len() - span_words.len())
        .find(|&i| words[i..i + span_words.len()] == span_words[..])?;
    let end = start + span_words.len();

    let mut parts: Vec<&str> = Vec::with_capacity(words.len());
    parts.extend_from_slice(&words[..start]);
    parts.extend(std::iter::repeat("____").take(span_words.len()));
    parts.extend_from_slice(&words[end..]);
    Some(parts.join(" "))
}
