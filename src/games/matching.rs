// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Answer matching: text normalization, fuzzy comparison with a semantic
//! fallback, and the attribute comparators used by the guess-artist game.

use serde::Serialize;
use std::collections::HashMap;

/// Fuzzy threshold for typed answers.
pub const TEXT_THRESHOLD: f64 = 0.9;
/// Lenient threshold for transcribed voice answers.
pub const VOICE_THRESHOLD: f64 = 0.75;
/// Token-cosine threshold for the semantic fallback.
const SEMANTIC_THRESHOLD: f64 = 0.85;

/// Lowercase, strip punctuation, collapse whitespace.
pub fn normalize_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    let cleaned: String = lowered
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalized Damerau-Levenshtein similarity over normalized strings, in
/// [0, 1]. Transpositions count as one edit, so a swapped-letter typo in a
/// short answer still clears the text threshold.
pub fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_damerau_levenshtein(&normalize_text(a), &normalize_text(b))
}

/// Cosine similarity over token count vectors. Order-insensitive, so it
/// catches rephrasings that edit distance penalizes.
pub fn token_cosine_similarity(a: &str, b: &str) -> f64 {
    let a = normalize_text(a);
    let b = normalize_text(b);
    let counts_a = token_counts(&a);
    let counts_b = token_counts(&b);

    if counts_a.is_empty() || counts_b.is_empty() {
        return 0.0;
    }

    let dot: f64 = counts_a
        .iter()
        .filter_map(|(token, &n)| counts_b.get(token).map(|&m| (n * m) as f64))
        .sum();
    let norm_a: f64 = counts_a.values().map(|&n| (n * n) as f64).sum::<f64>().sqrt();
    let norm_b: f64 = counts_b.values().map(|&n| (n * n) as f64).sum::<f64>().sqrt();

    dot / (norm_a * norm_b)
}

fn token_counts(text: &str) -> HashMap<&str, u32> {
    let mut counts = HashMap::new();
    for token in text.split_whitespace() {
        *counts.entry(token).or_insert(0) += 1;
    }
    counts
}

/// True when `given` matches `expected`: exact after normalization, fuzzy
/// above `threshold`, or semantically close as a fallback.
pub fn answers_match(expected: &str, given: &str, threshold: f64) -> bool {
    let expected_norm = normalize_text(expected);
    let given_norm = normalize_text(given);

    if expected_norm.is_empty() || given_norm.is_empty() {
        return false;
    }
    if expected_norm == given_norm {
        return true;
    }
    if strsim::normalized_damerau_levenshtein(&expected_norm, &given_norm) >= threshold {
        return true;
    }
    token_cosine_similarity(expected, given) >= SEMANTIC_THRESHOLD
}

// ─── Attribute comparators ───────────────────────────────────────

/// Outcome of comparing one guessed attribute against the target's.
///
/// `Higher`/`Lower` describe the target relative to the guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// Exact match
    Correct,
    /// Within tolerance: years +/- 5, numbers 20%, related genre
    Close,
    Higher,
    Lower,
    Mismatch,
    /// Either side is missing the attribute
    Invalid,
}

/// Equal years match, within +/- 5 is close; otherwise hint at the
/// direction.
pub fn compare_year(target: Option<i32>, guess: Option<i32>) -> Comparison {
    let (Some(target), Some(guess)) = (target, guess) else {
        return Comparison::Invalid;
    };
    let diff = (target - guess).abs();
    if diff == 0 {
        Comparison::Correct
    } else if diff <= 5 {
        Comparison::Close
    } else if target > guess {
        Comparison::Higher
    } else {
        Comparison::Lower
    }
}

/// Equal numbers match, within 20% of the target is close; otherwise hint
/// at the direction.
pub fn compare_numeric(target: Option<f64>, guess: Option<f64>) -> Comparison {
    let (Some(target), Some(guess)) = (target, guess) else {
        return Comparison::Invalid;
    };
    let diff = (target - guess).abs();
    if diff == 0.0 {
        Comparison::Correct
    } else if diff <= 0.2 * target.abs().max(1.0) {
        Comparison::Close
    } else if target > guess {
        Comparison::Higher
    } else {
        Comparison::Lower
    }
}

/// Case-insensitive equality.
pub fn compare_exact(target: Option<&str>, guess: Option<&str>) -> Comparison {
    let (Some(target), Some(guess)) = (target, guess) else {
        return Comparison::Invalid;
    };
    if target.eq_ignore_ascii_case(guess) {
        Comparison::Correct
    } else {
        Comparison::Mismatch
    }
}

/// Genres match when the lists share an entry; a subgenre relation (one
/// entry containing the other, as in "pop" and "indie pop") is close.
pub fn compare_genres(target: &[String], guess: &[String]) -> Comparison {
    if target.is_empty() || guess.is_empty() {
        return Comparison::Invalid;
    }
    let target: Vec<String> = target.iter().map(|t| t.to_lowercase()).collect();
    let guess: Vec<String> = guess.iter().map(|g| g.to_lowercase()).collect();

    if guess.iter().any(|g| target.contains(g)) {
        return Comparison::Correct;
    }
    let related = guess.iter().any(|g| {
        target
            .iter()
            .any(|t| t.contains(g.as_str()) || g.contains(t.as_str()))
    });
    if related {
        Comparison::Close
    } else {
        Comparison::Mismatch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Hello,   WORLD!! "), "hello world");
        assert_eq!(normalize_text("don't stop"), "don t stop");
    }

    #[test]
    fn test_exact_match_ignores_punctuation() {
        assert!(answers_match("Hey Jude!", "hey jude", TEXT_THRESHOLD));
    }

    #[test]
    fn test_text_threshold_allows_small_typo() {
        // A transposed-letter typo clears 0.9 even in a short answer
        assert!(similarity("hello wrold", "hello world") >= TEXT_THRESHOLD);
        assert!(answers_match(
            "here comes the sun little darling",
            "here comes the sun littel darling",
            TEXT_THRESHOLD
        ));
        // A different phrase does not
        assert!(!answers_match(
            "here comes the sun",
            "there goes the moon",
            TEXT_THRESHOLD
        ));
    }

    #[test]
    fn test_voice_threshold_is_more_lenient() {
        let expected = "dancing in the moonlight";
        let garbled = "dancin in the moon light";
        assert!(answers_match(expected, garbled, VOICE_THRESHOLD));
    }

    #[test]
    fn test_semantic_fallback_catches_reordering() {
        let expected = "baby i love you so much";
        let reordered = "i love you so much baby";
        // Edit distance alone misses this at 0.9
        assert!(similarity(expected, reordered) < TEXT_THRESHOLD);
        assert!(answers_match(expected, reordered, TEXT_THRESHOLD));
    }

    #[test]
    fn test_empty_answers_never_match() {
        assert!(!answers_match("something", "", TEXT_THRESHOLD));
        assert!(!answers_match("", "", TEXT_THRESHOLD));
        assert!(!answers_match("something", "!!!", TEXT_THRESHOLD));
    }

    #[test]
    fn test_compare_year() {
        // Exact and close are distinct tiers
        assert_eq!(compare_year(Some(2000), Some(2000)), Comparison::Correct);
        assert_eq!(compare_year(Some(2000), Some(1998)), Comparison::Close);
        assert_eq!(compare_year(Some(1990), Some(1980)), Comparison::Higher);
        assert_eq!(compare_year(Some(1990), Some(2005)), Comparison::Lower);
        assert_eq!(compare_year(None, Some(1990)), Comparison::Invalid);
        assert_eq!(compare_year(Some(1990), None), Comparison::Invalid);
    }

    #[test]
    fn test_compare_numeric_20_percent() {
        assert_eq!(
            compare_numeric(Some(100.0), Some(100.0)),
            Comparison::Correct
        );
        assert_eq!(
            compare_numeric(Some(100.0), Some(119.0)),
            Comparison::Close
        );
        assert_eq!(
            compare_numeric(Some(100.0), Some(121.0)),
            Comparison::Lower
        );
        assert_eq!(
            compare_numeric(Some(100.0), Some(50.0)),
            Comparison::Higher
        );
        assert_eq!(compare_numeric(None, None), Comparison::Invalid);
    }

    #[test]
    fn test_compare_exact_and_genres() {
        assert_eq!(
            compare_exact(Some("Sweden"), Some("sweden")),
            Comparison::Correct
        );
        assert_eq!(
            compare_exact(Some("Sweden"), Some("Norway")),
            Comparison::Mismatch
        );

        let target = vec!["indie pop".to_string(), "synthpop".to_string()];
        let hit = vec!["Synthpop".to_string()];
        let miss = vec!["death metal".to_string()];
        assert_eq!(compare_genres(&target, &hit), Comparison::Correct);
        assert_eq!(compare_genres(&target, &miss), Comparison::Mismatch);
        assert_eq!(compare_genres(&target, &[]), Comparison::Invalid);
    }

    #[test]
    fn test_subgenre_is_close_not_wrong() {
        let target = vec!["pop".to_string()];
        let subgenre = vec!["indie pop".to_string()];
        assert_eq!(compare_genres(&target, &subgenre), Comparison::Close);
        // Containment works in both directions
        assert_eq!(compare_genres(&subgenre, &target), Comparison::Close);
    }

    #[test]
    fn test_token_cosine_identical_bags() {
        assert!((token_cosine_similarity("a b c", "c b a") - 1.0).abs() < 1e-9);
        assert_eq!(token_cosine_similarity("a b c", ""), 0.0);
    }
}
