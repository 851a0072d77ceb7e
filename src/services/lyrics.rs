// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Genius lyrics client.
//!
//! Searches the Genius API by track title, filters hits by primary artist,
//! then scrapes the lyric page. Extraction keeps the text of every
//! `data-lyrics-container` div, drops embedded scripts and buttons, strips
//! `[...]` section annotations and collapses runs of blank lines.

use crate::services::retry::FetchError;
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;

/// Sentinel stored when no lyrics could be found.
pub const NO_LYRICS: &str = "No lyrics available";

fn container_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)<div[^>]*data-lyrics-container="true"[^>]*>(.*?)</div>"#)
            .unwrap_or_else(|e| panic!("invalid lyrics container regex: {e}"))
    })
}

fn noise_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<script.*?</script>|<button.*?</button>")
            .unwrap_or_else(|e| panic!("invalid noise regex: {e}"))
    })
}

fn br_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<br\s*/?>").unwrap_or_else(|e| panic!("invalid br regex: {e}")))
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").unwrap_or_else(|e| panic!("invalid tag regex: {e}")))
}

fn annotation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[[^\]]*\]").unwrap_or_else(|e| panic!("invalid annotation regex: {e}"))
    })
}

fn blank_lines_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n{3,}").unwrap_or_else(|e| panic!("invalid blank regex: {e}")))
}

/// Extract lyric text from a Genius lyric page.
///
/// Returns `None` when no lyric containers are present or the extracted
/// text is empty.
pub fn extract_lyrics_from_html(html: &str) -> Option<String> {
    let mut parts = Vec::new();

    for cap in container_re().captures_iter(html) {
        let fragment = &cap[1];
        let fragment = noise_re().replace_all(fragment, "");
        let fragment = br_re().replace_all(&fragment, "\n");
        let fragment = tag_re().replace_all(&fragment, "");
        parts.push(decode_entities(&fragment));
    }

    if parts.is_empty() {
        return None;
    }

    let text = parts.join("\n");
    let text = annotation_re().replace_all(&text, "");
    let text = blank_lines_re().replace_all(&text, "\n\n");
    let text = text.trim().to_string();

    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}

#[derive(Clone)]
pub struct LyricsClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl LyricsClient {
    pub fn new(token: String) -> Result<Self, crate::error::AppError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| crate::error::AppError::Internal(anyhow::anyhow!(e)))?;
        Ok(Self {
            http,
            base_url: "https://api.genius.com".to_string(),
            token,
        })
    }

    /// Fetch lyrics for a track. `None` when there is no plausible hit or
    /// the page yields no text.
    pub async fn fetch_lyrics(
        &self,
        title: &str,
        artist: Option<&str>,
    ) -> Result<Option<String>, FetchError> {
        let Some(page_url) = self.search_lyric_page(title, artist).await? else {
            return Ok(None);
        };

        let response = self
            .http
            .get(&page_url)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, "genius page"))?;

        if !response.status().is_success() {
            return Err(FetchError::from_status(
                response.status().as_u16(),
                "genius page",
            ));
        }

        let html = response
            .text()
            .await
            .map_err(|e| FetchError::from_reqwest(e, "genius page body"))?;

        Ok(extract_lyrics_from_html(&html))
    }

    /// Search Genius and pick the first hit matching the primary artist.
    async fn search_lyric_page(
        &self,
        title: &str,
        artist: Option<&str>,
    ) -> Result<Option<String>, FetchError> {
        let url = format!("{}/search", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(&[("q", title)])
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, "genius search"))?;

        if !response.status().is_success() {
            return Err(FetchError::from_status(
                response.status().as_u16(),
                "genius search",
            ));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| FetchError::from_reqwest(e, "genius search parse"))?;

        let hit = body.response.hits.into_iter().find(|hit| {
            let Some(wanted) = artist else {
                return true;
            };
            let found = hit.result.primary_artist.name.to_lowercase();
            let wanted = wanted.to_lowercase();
            found.contains(&wanted) || wanted.contains(&found)
        });

        Ok(hit.map(|h| h.result.url))
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    response: SearchHits,
}

#[derive(Debug, Deserialize)]
struct SearchHits {
    #[serde(default)]
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    result: HitResult,
}

#[derive(Debug, Deserialize)]
struct HitResult {
    url: String,
    primary_artist: PrimaryArtist,
}

#[derive(Debug, Deserialize)]
struct PrimaryArtist {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_container_text() {
        let html = r#"
            <html><body>
            <div data-lyrics-container="true" class="x">
                [Verse 1]<br>Hello darkness my old friend<br/>
                I&#x27;ve come to talk with you again
            </div>
            <div class="ads">buy stuff</div>
            </body></html>
        "#;

        let lyrics = extract_lyrics_from_html(html).unwrap();
        assert!(lyrics.contains("Hello darkness my old friend"));
        assert!(lyrics.contains("I've come to talk with you again"));
        // Section annotations are stripped
        assert!(!lyrics.contains("[Verse 1]"));
        assert!(!lyrics.contains("buy stuff"));
    }

    #[test]
    fn test_drops_scripts_and_buttons() {
        let html = r#"
            <div data-lyrics-container="true">
                line one<br><script>window.x = 1;</script>
                <button>Embed</button>line two
            </div>
        "#;

        let lyrics = extract_lyrics_from_html(html).unwrap();
        assert!(lyrics.contains("line one"));
        assert!(lyrics.contains("line two"));
        assert!(!lyrics.contains("window.x"));
        assert!(!lyrics.contains("Embed"));
    }

    #[test]
    fn test_collapses_blank_lines() {
        let html = "<div data-lyrics-container=\"true\">a<br><br><br><br>b</div>";
        let lyrics = extract_lyrics_from_html(html).unwrap();
        assert_eq!(lyrics, "a\n\nb");
    }

    #[test]
    fn test_no_container_is_none() {
        assert_eq!(extract_lyrics_from_html("<div>nothing here</div>"), None);
    }

    #[test]
    fn test_annotation_only_page_is_none() {
        let html = "<div data-lyrics-container=\"true\">[Instrumental]</div>";
        assert_eq!(extract_lyrics_from_html(html), None);
    }
}
