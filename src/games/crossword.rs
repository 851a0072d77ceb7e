// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Crossword grid builder and scoring.
//!
//! Placement is greedy backtracking: words are taken longest first, the
//! first word sits centered across, and candidate positions for later
//! words are anchored at matching letters already on the grid, ranked by
//! intersection count. The minimum-intersection requirement relaxes from
//! 2 to 1 to 0 before the attempt is abandoned, and words that fit
//! nowhere are skipped as long as enough words land on the grid. The
//! builder is deterministic for a fixed word order.

use rand::seq::SliceRandom;
use serde_json::{json, Value};

use crate::error::{AppError, Result};
use crate::games::engine::{Answer, GameContext, GameMode, TurnFeedback};
use crate::models::{Direction, GameSession, GameStateDoc, ModeState, PlacedWord};
use crate::services::content::WordClue;

/// Grid size for the first generation attempt.
pub const DEFAULT_GRID_SIZE: usize = 15;
/// Fallback grid size for the single retry.
pub const RETRY_GRID_SIZE: usize = 10;
/// A puzzle needs at least this many usable words.
pub const MIN_WORDS: usize = 10;

#[derive(Debug, Clone, Copy)]
struct Candidate {
    x: usize,
    y: usize,
    direction: Direction,
    intersections: usize,
}

/// Backtracking placement state for one attempt.
struct CrosswordBuilder {
    size: usize,
    grid: Vec<Vec<Option<char>>>,
    placements: Vec<PlacedWord>,
}

impl CrosswordBuilder {
    fn new(size: usize) -> Self {
        Self {
            size,
            grid: vec![vec![None; size]; size],
            placements: Vec::new(),
        }
    }

    /// Place at least [`MIN_WORDS`] of the given words, or `None` if no
    /// arrangement reaches that count. Words that fit nowhere are skipped.
    fn build(words: &[WordClue], size: usize) -> Option<Vec<PlacedWord>> {
        let mut builder = Self::new(size);
        for min_intersections in [2, 1, 0] {
            if builder.backtrack(words, 0, min_intersections) {
                return Some(builder.placements);
            }
            builder = Self::new(size);
        }
        None
    }

    fn backtrack(&mut self, words: &[WordClue], index: usize, min_intersections: usize) -> bool {
        if index >= words.len() {
            return self.placements.len() >= MIN_WORDS.min(words.len());
        }

        let entry = &words[index];
        let candidates = self.candidate_positions(&entry.word);

        for candidate in candidates {
            // The opening word has nothing to intersect with
            if !self.placements.is_empty() && candidate.intersections < min_intersections {
                continue;
            }

            let saved_grid = self.grid.clone();
            self.place(&entry.word, candidate);
            self.placements.push(PlacedWord {
                word: entry.word.clone(),
                clue: entry.clue.clone(),
                x: candidate.x,
                y: candidate.y,
                direction: candidate.direction,
            });

            if self.backtrack(words, index + 1, min_intersections) {
                return true;
            }

            self.grid = saved_grid;
            self.placements.pop();
        }

        // No viable position; drop this word and keep going
        self.backtrack(words, index + 1, min_intersections)
    }

    /// Candidate positions for a word, best-connected first.
    fn candidate_positions(&self, word: &str) -> Vec<Candidate> {
        let letters: Vec<char> = word.chars().collect();

        if self.placements.is_empty() {
            // Center the first word horizontally
            return vec![Candidate {
                x: (self.size - letters.len().min(self.size)) / 2,
                y: self.size / 2,
                direction: Direction::Across,
                intersections: 0,
            }];
        }

        let mut candidates = Vec::new();
        for gy in 0..self.size {
            for gx in 0..self.size {
                let Some(cell) = self.grid[gy][gx] else {
                    continue;
                };
                for (i, &letter) in letters.iter().enumerate() {
                    if letter != cell {
                        continue;
                    }
                    // Anchor this letter at (gx, gy), try both directions
                    if gx >= i {
                        let x = gx - i;
                        if self.fits(&letters, x, gy, Direction::Across) {
                            candidates.push(Candidate {
                                x,
                                y: gy,
                                direction: Direction::Across,
                                intersections: self.count_intersections(
                                    &letters,
                                    x,
                                    gy,
                                    Direction::Across,
                                ),
                            });
                        }
                    }
                    if gy >= i {
                        let y = gy - i;
                        if self.fits(&letters, gx, y, Direction::Down) {
                            candidates.push(Candidate {
                                x: gx,
                                y,
                                direction: Direction::Down,
                                intersections: self.count_intersections(
                                    &letters,
                                    gx,
                                    y,
                                    Direction::Down,
                                ),
                            });
                        }
                    }
                }
            }
        }

        candidates.sort_by(|a, b| b.intersections.cmp(&a.intersections));
        candidates
    }

    fn fits(&self, letters: &[char], x: usize, y: usize, direction: Direction) -> bool {
        let (dx, dy) = step(direction);
        let end_x = x + dx * (letters.len() - 1);
        let end_y = y + dy * (letters.len() - 1);
        if end_x >= self.size || end_y >= self.size {
            return false;
        }
        letters.iter().enumerate().all(|(i, &letter)| {
            match self.grid[y + dy * i][x + dx * i] {
                None => true,
                Some(cell) => cell == letter,
            }
        })
    }

    fn count_intersections(
        &self,
        letters: &[char],
        x: usize,
        y: usize,
        direction: Direction,
    ) -> usize {
        let (dx, dy) = step(direction);
        letters
            .iter()
            .enumerate()
            .filter(|&(i, &letter)| self.grid[y + dy * i][x + dx * i] == Some(letter))
            .count()
    }

    fn place(&mut self, word: &str, candidate: Candidate) {
        let (dx, dy) = step(candidate.direction);
        for (i, letter) in word.chars().enumerate() {
            self.grid[candidate.y + dy * i][candidate.x + dx * i] = Some(letter);
        }
    }
}

fn step(direction: Direction) -> (usize, usize) {
    match direction {
        Direction::Across => (1, 0),
        Direction::Down => (0, 1),
    }
}

/// Build a puzzle layout from a word list.
///
/// Words are uppercased, deduplicated and sorted longest first. The first
/// attempt runs on the default grid; one retry runs on the smaller grid.
pub fn generate_layout(words: &[WordClue]) -> std::result::Result<(Vec<PlacedWord>, usize), String> {
    let mut seen = std::collections::HashSet::new();
    let mut usable: Vec<WordClue> = words
        .iter()
        .filter_map(|wc| {
            let word = wc.word.trim().to_uppercase();
            if word.len() < 3 || !word.chars().all(|c| c.is_ascii_alphabetic()) {
                return None;
            }
            seen.insert(word.clone()).then(|| WordClue {
                word,
                clue: wc.clue.clone(),
            })
        })
        .collect();

    if usable.len() < MIN_WORDS {
        return Err(format!(
            "insufficient valid words: {} (minimum {} required)",
            usable.len(),
            MIN_WORDS
        ));
    }

    usable.sort_by(|a, b| b.word.len().cmp(&a.word.len()));

    for size in [DEFAULT_GRID_SIZE, RETRY_GRID_SIZE] {
        if let Some(placements) = CrosswordBuilder::build(&usable, size) {
            return Ok((placements, size));
        }
        tracing::debug!(size, "Crossword attempt failed, retrying");
    }

    Err("could not arrange words into a grid".to_string())
}

/// Score a submitted grid against the solution placements.
///
/// Each placement is sliced out of the submission and compared
/// case-insensitively; the score is the matched fraction scaled to 100.
pub fn score_grid(submission: &[Vec<String>], placements: &[PlacedWord]) -> (usize, i64) {
    if placements.is_empty() {
        return (0, 0);
    }

    let matched = placements
        .iter()
        .filter(|p| {
            extract_word(submission, p)
                .is_some_and(|entered| entered.eq_ignore_ascii_case(&p.word))
        })
        .count();

    let score = (matched as f64 / placements.len() as f64 * 100.0).round() as i64;
    (matched, score)
}

/// Read the letters along a placement out of the submitted grid.
fn extract_word(submission: &[Vec<String>], placement: &PlacedWord) -> Option<String> {
    let (dx, dy) = step(placement.direction);
    let mut out = String::new();
    for i in 0..placement.word.chars().count() {
        let cell = submission
            .get(placement.y + dy * i)?
            .get(placement.x + dx * i)?;
        // Cells hold single letters; anything longer is malformed input
        let mut chars = cell.chars();
        let letter = chars.next()?;
        if chars.next().is_some() {
            return None;
        }
        out.push(letter);
    }
    Some(out)
}

// ─── Game mode ───────────────────────────────────────────────────

/// Words requested from the generative picker.
const REQUESTED_WORDS: usize = 15;
/// Word length bounds for the local picker.
const LOCAL_WORD_MIN: usize = 4;
const LOCAL_WORD_MAX: usize = 8;

/// One crossword built from a randomly chosen lyric-bearing track.
pub struct CrosswordGame;

impl GameMode for CrosswordGame {
    async fn initialize(&self, ctx: &GameContext, session: &GameSession) -> Result<ModeState> {
        let tracks = ctx.db.get_top_tracks(&session.user_id).await?;
        let mut candidates: Vec<_> = tracks.iter().filter(|t| t.has_lyrics()).collect();
        candidates.shuffle(&mut rand::thread_rng());

        // Tracks vary in vocabulary, so try a few before giving up
        for track in candidates.iter().take(3) {
            let Some(lyrics) = track.lyrics.as_deref() else {
                continue;
            };

            let words = pick_words(ctx, &track.name, lyrics).await;
            match generate_layout(&words) {
                Ok((placements, grid_size)) => {
                    return Ok(ModeState::Crossword {
                        track_spotify_id: track.spotify_id.clone(),
                        track_name: track.name.clone(),
                        grid_size,
                        placements,
                    });
                }
                Err(e) => {
                    tracing::debug!(track = %track.name, error = %e, "Crossword layout failed");
                }
            }
        }

        Err(AppError::GameInit(
            "no track yielded a viable crossword".to_string(),
        ))
    }

    fn apply_answer(
        &self,
        state: &mut GameStateDoc,
        answer: &Answer,
        max_tries: u32,
    ) -> Result<TurnFeedback> {
        let Answer::Grid(submission) = answer else {
            return Err(AppError::BadRequest(
                "crossword games take a grid submission".to_string(),
            ));
        };

        let ModeState::Crossword { placements, .. } = &state.payload else {
            return Err(AppError::GameState(
                "state is not a crossword game".to_string(),
            ));
        };

        let (matched, score) = score_grid(submission, placements);

        state.tries_used += 1;
        state.score = score;
        let correct = score == 100;
        if correct || state.tries_used >= max_tries {
            state.completed = true;
        }

        Ok(TurnFeedback {
            correct,
            detail: json!({
                "matched": matched,
                "total": placements.len(),
            }),
        })
    }

    fn client_view(&self, state: &GameStateDoc) -> Value {
        let ModeState::Crossword {
            track_name,
            grid_size,
            placements,
            ..
        } = &state.payload
        else {
            return Value::Null;
        };

        let clues: Vec<Value> = placements
            .iter()
            .map(|p| {
                let mut clue = json!({
                    "clue": p.clue,
                    "x": p.x,
                    "y": p.y,
                    "direction": p.direction,
                    "length": p.word.chars().count(),
                });
                if state.completed {
                    clue["word"] = json!(p.word);
                }
                clue
            })
            .collect();

        json!({
            "track_name": track_name,
            "grid_size": grid_size,
            "clues": clues,
        })
    }
}

/// Choose puzzle words: the generative picker when enabled, lyric-derived
/// words otherwise or on failure.
async fn pick_words(ctx: &GameContext, song: &str, lyrics: &str) -> Vec<WordClue> {
    if ctx.content.is_enabled() {
        match ctx
            .content
            .generate_crossword_words(song, lyrics, REQUESTED_WORDS)
            .await
        {
            Ok(words) => return words,
            Err(e) => {
                tracing::warn!(error = %e, "Generative word selection failed, using lyric words");
            }
        }
    }
    local_word_clues(lyrics)
}

/// Deterministic fallback: distinct alphabetic lyric words, each clued by
/// its own line with the word blanked out.
fn local_word_clues(lyrics: &str) -> Vec<WordClue> {
    let mut seen = std::collections::HashSet::new();
    let mut clues = Vec::new();

    for line in lyrics.lines() {
        for raw in line.split_whitespace() {
            let word: String = raw
                .chars()
                .filter(|c| c.is_ascii_alphabetic())
                .collect::<String>()
                .to_uppercase();
            if word.len() < LOCAL_WORD_MIN || word.len() > LOCAL_WORD_MAX {
                continue;
            }
            if !seen.insert(word.clone()) {
                continue;
            }
            let blanked = line.replace(raw, "_____");
            clues.push(WordClue {
                word,
                clue: format!("Fill the blank: {}", blanked.trim()),
            });
            if clues.len() >= REQUESTED_WORDS {
                return clues;
            }
        }
    }
    clues
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wc(word: &str) -> WordClue {
        WordClue {
            word: word.to_string(),
            clue: format!("clue for {word}"),
        }
    }

    /// Rebuild a grid from placements; panics on cell conflicts.
    fn grid_from_placements(placements: &[PlacedWord], size: usize) -> Vec<Vec<Option<char>>> {
        let mut grid = vec![vec![None; size]; size];
        for p in placements {
            let (dx, dy) = match p.direction {
                Direction::Across => (1, 0),
                Direction::Down => (0, 1),
            };
            for (i, letter) in p.word.chars().enumerate() {
                let cell = &mut grid[p.y + dy * i][p.x + dx * i];
                match cell {
                    None => *cell = Some(letter),
                    Some(existing) => assert_eq!(
                        *existing, letter,
                        "conflicting letters at ({}, {})",
                        p.x + dx * i,
                        p.y + dy * i
                    ),
                }
            }
        }
        grid
    }

    fn solution_grid(placements: &[PlacedWord], size: usize) -> Vec<Vec<String>> {
        grid_from_placements(placements, size)
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|cell| cell.map(String::from).unwrap_or_default())
                    .collect()
            })
            .collect()
    }

    fn sample_words() -> Vec<WordClue> {
        [
            "stream", "melody", "rhythm", "chorus", "verse", "tempo", "sound", "music",
            "notes", "dance",
        ]
        .iter()
        .map(|w| wc(w))
        .collect()
    }

    #[test]
    fn test_layout_places_all_words_consistently() {
        let (placements, size) = generate_layout(&sample_words()).unwrap();

        assert_eq!(placements.len(), 10);
        // First word is the longest, centered across
        assert_eq!(placements[0].direction, Direction::Across);
        assert_eq!(placements[0].y, size / 2);

        // Every intersection agrees on its letter and stays in bounds
        grid_from_placements(&placements, size);

        // A connected grid needs both directions
        assert!(placements.iter().any(|p| p.direction == Direction::Down));
    }

    #[test]
    fn test_layout_is_deterministic() {
        let first = generate_layout(&sample_words()).unwrap();
        let second = generate_layout(&sample_words()).unwrap();
        assert_eq!(first.1, second.1);
        assert_eq!(first.0.len(), second.0.len());
        for (a, b) in first.0.iter().zip(second.0.iter()) {
            assert_eq!(a.word, b.word);
            assert_eq!((a.x, a.y), (b.x, b.y));
            assert_eq!(a.direction, b.direction);
        }
    }

    #[test]
    fn test_too_few_words_is_rejected() {
        let words: Vec<WordClue> = ["alpha", "beta", "gamma"].iter().map(|w| wc(w)).collect();
        assert!(generate_layout(&words).is_err());
    }

    #[test]
    fn test_duplicate_and_invalid_words_are_dropped() {
        let mut words = sample_words();
        words.push(wc("stream")); // duplicate
        words.push(wc("a")); // too short
        words.push(wc("rock n roll")); // spaces
        let (placements, _) = generate_layout(&words).unwrap();
        assert_eq!(placements.len(), 10);
    }

    #[test]
    fn test_full_solution_scores_100() {
        let (placements, size) = generate_layout(&sample_words()).unwrap();
        let solution = solution_grid(&placements, size);

        let (matched, score) = score_grid(&solution, &placements);
        assert_eq!(matched, placements.len());
        assert_eq!(score, 100);
    }

    #[test]
    fn test_empty_grid_scores_0() {
        let (placements, size) = generate_layout(&sample_words()).unwrap();
        let empty = vec![vec![String::new(); size]; size];

        let (matched, score) = score_grid(&empty, &placements);
        assert_eq!(matched, 0);
        assert_eq!(score, 0);
    }

    #[test]
    fn test_scoring_is_case_insensitive() {
        let (placements, size) = generate_layout(&sample_words()).unwrap();
        let lowered: Vec<Vec<String>> = solution_grid(&placements, size)
            .into_iter()
            .map(|row| row.into_iter().map(|c| c.to_lowercase()).collect())
            .collect();

        let (_, score) = score_grid(&lowered, &placements);
        assert_eq!(score, 100);
    }

    #[test]
    fn test_local_word_clues_blank_the_word() {
        let lyrics = "dancing under neon lights tonight\nsinging every chorus twice\n\
                      holding onto summer nights forever\nmusic keeps the feeling alive";
        let clues = local_word_clues(lyrics);

        assert!(!clues.is_empty());
        for wc in &clues {
            assert!(wc.word.len() >= LOCAL_WORD_MIN && wc.word.len() <= LOCAL_WORD_MAX);
            assert!(wc.word.chars().all(|c| c.is_ascii_uppercase()));
            assert!(wc.clue.contains("_____"));
            assert!(!wc.clue.to_uppercase().contains(&wc.word));
        }
        // No duplicates
        let mut words: Vec<_> = clues.iter().map(|wc| wc.word.clone()).collect();
        words.sort();
        words.dedup();
        assert_eq!(words.len(), clues.len());
    }

    fn crossword_state() -> GameStateDoc {
        let (placements, size) = generate_layout(&sample_words()).unwrap();
        GameStateDoc {
            tries_used: 0,
            score: 0,
            completed: false,
            payload: ModeState::Crossword {
                track_spotify_id: "t1".to_string(),
                track_name: "Song".to_string(),
                grid_size: size,
                placements,
            },
        }
    }

    #[test]
    fn test_full_grid_submission_completes() {
        let mut state = crossword_state();
        let ModeState::Crossword {
            placements,
            grid_size,
            ..
        } = &state.payload
        else {
            unreachable!();
        };
        let solution = solution_grid(placements, *grid_size);

        let feedback = CrosswordGame
            .apply_answer(&mut state, &Answer::Grid(solution), 10)
            .unwrap();
        assert!(feedback.correct);
        assert!(state.completed);
        assert_eq!(state.score, 100);
        assert_eq!(feedback.detail["matched"], 10);
    }

    #[test]
    fn test_partial_submission_keeps_playing() {
        let mut state = crossword_state();
        let ModeState::Crossword { grid_size, .. } = &state.payload else {
            unreachable!();
        };
        let empty = vec![vec![String::new(); *grid_size]; *grid_size];

        let feedback = CrosswordGame
            .apply_answer(&mut state, &Answer::Grid(empty), 10)
            .unwrap();
        assert!(!feedback.correct);
        assert!(!state.completed);
        assert_eq!(state.score, 0);
        assert_eq!(state.tries_used, 1);
    }

    #[test]
    fn test_client_view_hides_words_until_done() {
        let mut state = crossword_state();
        let view = CrosswordGame.client_view(&state);
        assert_eq!(view["clues"].as_array().unwrap().len(), 10);
        assert!(view["clues"][0].get("word").is_none());
        assert!(view["clues"][0]["length"].as_u64().unwrap() >= 3);

        state.completed = true;
        let view = CrosswordGame.client_view(&state);
        assert!(view["clues"][0].get("word").is_some());
    }

    #[test]
    fn test_text_answer_rejected() {
        let mut state = crossword_state();
        let err = CrosswordGame
            .apply_answer(&mut state, &Answer::Text("stream".to_string()), 10)
            .unwrap_err();
        assert!(matches!(err, crate::error::AppError::BadRequest(_)));
    }
}
