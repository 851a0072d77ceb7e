// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Generative content client for game material.
//!
//! One REST endpoint produces trivia questions, crossword word lists and
//! lyric challenge spans from prompts. Model output is free text, so every
//! response goes through JSON-array extraction and per-item validation;
//! callers fall back to deterministic local generation when the client is
//! disabled or a call fails.

use crate::models::TriviaQuestion;
use crate::services::retry::FetchError;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

const ALLOWED_DIFFICULTIES: [&str; 3] = ["easy", "medium", "hard"];

/// A generated crossword entry.
#[derive(Debug, Clone)]
pub struct WordClue {
    pub word: String,
    pub clue: String,
}

#[derive(Clone)]
pub struct ContentClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ContentClient {
    pub fn new(api_key: String) -> Result<Self, crate::error::AppError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| crate::error::AppError::Internal(anyhow::anyhow!(e)))?;
        Ok(Self {
            http,
            base_url: "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent".to_string(),
            api_key,
        })
    }

    /// False when no API key is configured; callers then use their local
    /// generators directly.
    pub fn is_enabled(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Generate up to `count` trivia questions from artist biographies in
    /// one batched call. Invalid items are dropped, not repaired.
    pub async fn generate_trivia_questions(
        &self,
        biographies: &[(String, String)],
        count: usize,
    ) -> Result<Vec<TriviaQuestion>, FetchError> {
        let mut prompt = format!(
            "Generate {count} multiple-choice music trivia questions from the artist \
             biographies below. Respond with only a JSON array; each element must have \
             \"question\", \"options\" (exactly 4 strings), \"answer\" (one of the options) \
             and \"difficulty\" (easy, medium or hard).\n"
        );
        for (name, bio) in biographies {
            prompt.push_str("\n--- ");
            prompt.push_str(name);
            prompt.push_str(" ---\n");
            prompt.push_str(bio);
            prompt.push('\n');
        }

        let text = self.generate_text(&prompt).await?;
        let items = extract_json_array(&text)
            .ok_or_else(|| FetchError::Permanent("no JSON array in response".to_string()))?;

        let questions: Vec<TriviaQuestion> = items
            .iter()
            .filter_map(validate_trivia_question)
            .take(count)
            .collect();

        if questions.is_empty() {
            return Err(FetchError::Permanent(
                "no valid trivia questions in response".to_string(),
            ));
        }
        Ok(questions)
    }

    /// Generate crossword words and clues from a song's lyrics.
    pub async fn generate_crossword_words(
        &self,
        song: &str,
        lyrics: &str,
        count: usize,
    ) -> Result<Vec<WordClue>, FetchError> {
        let prompt = format!(
            "From the lyrics of \"{song}\" below, pick {count} distinctive single words \
             (3-10 letters, no proper nouns) and write a short clue for each. Respond with \
             only a JSON array of objects with \"word\" and \"clue\".\n\n{lyrics}"
        );

        let text = self.generate_text(&prompt).await?;
        let items = extract_json_array(&text)
            .ok_or_else(|| FetchError::Permanent("no JSON array in response".to_string()))?;

        let words: Vec<WordClue> = items.iter().filter_map(validate_word_clue).collect();

        if words.is_empty() {
            return Err(FetchError::Permanent(
                "no valid crossword words in response".to_string(),
            ));
        }
        Ok(words)
    }

    /// Pick lyric spans suitable for fill-in-the-blank challenges.
    pub async fn select_lyric_spans(
        &self,
        lyrics: &str,
        count: usize,
    ) -> Result<Vec<String>, FetchError> {
        let prompt = format!(
            "From the lyrics below, choose {count} memorable contiguous passages of 8 to 20 \
             words each, quoted exactly as they appear. Respond with only a JSON array of \
             strings.\n\n{lyrics}"
        );

        let text = self.generate_text(&prompt).await?;
        let items = extract_json_array(&text)
            .ok_or_else(|| FetchError::Permanent("no JSON array in response".to_string()))?;

        // Only keep spans that really occur in the lyrics
        let spans: Vec<String> = items
            .iter()
            .filter_map(Value::as_str)
            .filter(|span| {
                let words = span.split_whitespace().count();
                (8..=20).contains(&words) && lyrics.contains(span)
            })
            .map(String::from)
            .collect();

        if spans.is_empty() {
            return Err(FetchError::Permanent(
                "no usable lyric spans in response".to_string(),
            ));
        }
        Ok(spans)
    }

    /// POST a prompt and return the first candidate's text.
    async fn generate_text(&self, prompt: &str) -> Result<String, FetchError> {
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .http
            .post(&self.base_url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, "content generate"))?;

        if !response.status().is_success() {
            return Err(FetchError::from_status(
                response.status().as_u16(),
                "content generate",
            ));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| FetchError::from_reqwest(e, "content parse"))?;

        body.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| FetchError::Permanent("empty generation response".to_string()))
    }
}

/// Extract the first top-level JSON array from free text (models often
/// wrap JSON in prose or markdown fences).
pub fn extract_json_array(text: &str) -> Option<Vec<Value>> {
    let start = text.find('[')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    let candidate = &text[start..start + offset + ch.len_utf8()];
                    return serde_json::from_str::<Vec<Value>>(candidate).ok();
                }
            }
            _ => {}
        }
    }
    None
}

/// Validate one generated trivia item; `None` drops it.
fn validate_trivia_question(value: &Value) -> Option<TriviaQuestion> {
    let question = value.get("question")?.as_str()?.trim().to_string();
    if question.is_empty() {
        return None;
    }

    let options: Vec<String> = value
        .get("options")?
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .map(|s| s.trim().to_string())
        .collect();
    if options.len() != 4 {
        return None;
    }

    let answer = value.get("answer")?.as_str()?.trim().to_string();
    if !options.contains(&answer) {
        return None;
    }

    let difficulty = value.get("difficulty")?.as_str()?.trim().to_lowercase();
    if !ALLOWED_DIFFICULTIES.contains(&difficulty.as_str()) {
        return None;
    }

    Some(TriviaQuestion {
        question,
        options,
        answer,
        difficulty,
    })
}

fn validate_word_clue(value: &Value) -> Option<WordClue> {
    let word = value.get("word")?.as_str()?.trim().to_uppercase();
    if word.len() < 3 || word.len() > 10 || !word.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let clue = value.get("clue")?.as_str()?.trim().to_string();
    if clue.is_empty() {
        return None;
    }
    Some(WordClue { word, clue })
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_array_from_markdown_fence() {
        let text = "Here you go:\n```json\n[{\"word\": \"echo\", \"clue\": \"a repeat\"}]\n```";
        let items = extract_json_array(text).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["word"], "echo");
    }

    #[test]
    fn test_extract_array_handles_brackets_in_strings() {
        let text = r#"[{"question": "What is [x]?", "a": 1}]"#;
        let items = extract_json_array(text).unwrap();
        assert_eq!(items[0]["question"], "What is [x]?");
    }

    #[test]
    fn test_extract_array_none_without_json() {
        assert!(extract_json_array("sorry, I can't do that").is_none());
    }

    #[test]
    fn test_validate_trivia_question() {
        let good = serde_json::json!({
            "question": "Who wrote it?",
            "options": ["A", "B", "C", "D"],
            "answer": "B",
            "difficulty": "Easy"
        });
        let q = validate_trivia_question(&good).unwrap();
        assert_eq!(q.answer, "B");
        assert_eq!(q.difficulty, "easy");

        // Answer not among the options
        let bad = serde_json::json!({
            "question": "Who wrote it?",
            "options": ["A", "B", "C", "D"],
            "answer": "E",
            "difficulty": "easy"
        });
        assert!(validate_trivia_question(&bad).is_none());

        // Wrong option count
        let bad = serde_json::json!({
            "question": "Who wrote it?",
            "options": ["A", "B"],
            "answer": "A",
            "difficulty": "easy"
        });
        assert!(validate_trivia_question(&bad).is_none());

        // Made-up difficulty
        let bad = serde_json::json!({
            "question": "Who wrote it?",
            "options": ["A", "B", "C", "D"],
            "answer": "A",
            "difficulty": "impossible"
        });
        assert!(validate_trivia_question(&bad).is_none());
    }

    #[test]
    fn test_validate_word_clue() {
        let good = serde_json::json!({"word": "melody", "clue": "a tune"});
        let wc = validate_word_clue(&good).unwrap();
        assert_eq!(wc.word, "MELODY");

        let bad = serde_json::json!({"word": "a", "clue": "too short"});
        assert!(validate_word_clue(&bad).is_none());

        let bad = serde_json::json!({"word": "rock n roll", "clue": "spaces"});
        assert!(validate_word_clue(&bad).is_none());
    }
}
