// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Wikipedia biography client.
//!
//! Fetches the section list for an artist's page, keeps a fixed set of
//! biography-relevant sections, fetches each section's wikitext, strips
//! the markup and reflows the text per section kind (tables for awards
//! and filmography, bullets for discography, paragraphs otherwise).

use crate::services::retry::FetchError;
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::Duration;

/// Sentinel stored when no biography could be assembled.
pub const NO_BIOGRAPHY: &str = "No biography available";

/// Sections worth keeping, in presentation order.
const DESIRED_SECTIONS: [&str; 6] = [
    "Early life",
    "Personal life",
    "Artistry",
    "Filmography",
    "Discography",
    "Awards and nominations",
];

fn template_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Innermost templates only; applied repeatedly to unwind nesting
    RE.get_or_init(|| {
        Regex::new(r"\{\{[^{}]*\}\}").unwrap_or_else(|e| panic!("invalid template regex: {e}"))
    })
}

fn ref_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<ref[^>]*/>|<ref[^>]*>.*?</ref>|<!--.*?-->")
            .unwrap_or_else(|e| panic!("invalid ref regex: {e}"))
    })
}

fn file_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[\[(?:File|Image):[^\]]*\]\]")
            .unwrap_or_else(|e| panic!("invalid file regex: {e}"))
    })
}

fn link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[\[(?:[^|\]]*\|)?([^\]]*)\]\]")
            .unwrap_or_else(|e| panic!("invalid link regex: {e}"))
    })
}

fn external_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[https?://\S*\s*([^\]]*)\]")
            .unwrap_or_else(|e| panic!("invalid external link regex: {e}"))
    })
}

fn html_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").unwrap_or_else(|e| panic!("invalid tag regex: {e}")))
}

/// Strip wikitext markup, leaving plain text with the original line
/// structure intact.
pub fn strip_wikitext(text: &str) -> String {
    let mut text = ref_re().replace_all(text, "").into_owned();

    // Templates nest; peel one layer per pass
    loop {
        let stripped = template_re().replace_all(&text, "").into_owned();
        if stripped == text {
            break;
        }
        text = stripped;
    }

    let text = file_link_re().replace_all(&text, "");
    let text = link_re().replace_all(&text, "$1");
    let text = external_link_re().replace_all(&text, "$1");
    let text = html_tag_re().replace_all(&text, "");
    let text = text.replace("'''", "").replace("''", "");

    text.lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Reflow a stripped section according to its kind.
pub fn reflow_section(title: &str, text: &str) -> String {
    match title {
        "Awards and nominations" | "Filmography" => reflow_table(text),
        "Discography" => reflow_bullets(text),
        _ => reflow_paragraphs(text),
    }
}

/// Turn wikitable rows into one comma-joined line per row.
fn reflow_table(text: &str) -> String {
    let mut rows: Vec<String> = Vec::new();
    let mut current: Vec<String> = Vec::new();

    for line in text.lines() {
        let line = line.trim();
        if line.starts_with("{|") || line.starts_with("|}") {
            continue;
        }
        if line.starts_with("|-") {
            if !current.is_empty() {
                rows.push(current.join(", "));
                current.clear();
            }
            continue;
        }
        // Header rows separate cells with `!!`, data rows with `||`
        let cells = match (line.strip_prefix('!'), line.strip_prefix('|')) {
            (Some(rest), _) => rest.split("!!"),
            (None, Some(rest)) => rest.split("||"),
            (None, None) => {
                if !line.is_empty() {
                    rows.push(line.to_string());
                }
                continue;
            }
        };
        for cell in cells {
            let cell = cell.trim();
            if !cell.is_empty() {
                current.push(cell.to_string());
            }
        }
    }
    if !current.is_empty() {
        rows.push(current.join(", "));
    }

    rows.join("\n")
}

/// Normalize wikitext bullets to plain `- ` items.
fn reflow_bullets(text: &str) -> String {
    text.lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            Some(match line.strip_prefix('*') {
                Some(item) => format!("- {}", item.trim_start_matches('*').trim()),
                None => line.to_string(),
            })
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Collapse intra-paragraph line breaks, keep blank-line separators.
fn reflow_paragraphs(text: &str) -> String {
    text.split("\n\n")
        .map(|para| {
            para.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|para| !para.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Join reflowed sections under a shared header.
pub fn assemble_biography(sections: &[(String, String)]) -> String {
    let non_empty: Vec<&(String, String)> =
        sections.iter().filter(|(_, text)| !text.is_empty()).collect();

    if non_empty.is_empty() {
        return NO_BIOGRAPHY.to_string();
    }

    let mut out = String::from("ARTIST BIOGRAPHY");
    for (title, text) in non_empty {
        out.push_str("\n\n== ");
        out.push_str(title);
        out.push_str(" ==\n");
        out.push_str(text);
    }
    out
}

#[derive(Clone)]
pub struct WikipediaClient {
    http: reqwest::Client,
    base_url: String,
}

impl WikipediaClient {
    pub fn new() -> Result<Self, crate::error::AppError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| crate::error::AppError::Internal(anyhow::anyhow!(e)))?;
        Ok(Self {
            http,
            base_url: "https://en.wikipedia.org/w/api.php".to_string(),
        })
    }

    /// Fetch and assemble an artist biography. `None` when the page does
    /// not exist; the `NO_BIOGRAPHY` sentinel when it exists but has none
    /// of the desired sections.
    pub async fn fetch_biography(&self, artist: &str) -> Result<Option<String>, FetchError> {
        let Some(section_list) = self.fetch_sections(artist).await? else {
            return Ok(None);
        };

        let mut sections: Vec<(String, String)> = Vec::new();
        for wanted in DESIRED_SECTIONS {
            let Some(section) = section_list.iter().find(|s| s.line == wanted) else {
                continue;
            };
            match self.fetch_section_wikitext(artist, &section.index).await {
                Ok(Some(wikitext)) => {
                    let stripped = strip_wikitext(&wikitext);
                    sections.push((wanted.to_string(), reflow_section(wanted, &stripped)));
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(artist, section = wanted, error = %e, "Section fetch failed");
                }
            }
        }

        Ok(Some(assemble_biography(&sections)))
    }

    async fn fetch_sections(&self, page: &str) -> Result<Option<Vec<Section>>, FetchError> {
        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("action", "parse"),
                ("page", page),
                ("prop", "sections"),
                ("format", "json"),
                ("redirects", "1"),
            ])
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, "wikipedia sections"))?;

        if !response.status().is_success() {
            return Err(FetchError::from_status(
                response.status().as_u16(),
                "wikipedia sections",
            ));
        }

        let body: ParseResponse<SectionsResult> = response
            .json()
            .await
            .map_err(|e| FetchError::from_reqwest(e, "wikipedia sections parse"))?;

        // A missing page comes back as an error object with HTTP 200
        Ok(body.parse.map(|p| p.sections))
    }

    async fn fetch_section_wikitext(
        &self,
        page: &str,
        index: &str,
    ) -> Result<Option<String>, FetchError> {
        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("action", "parse"),
                ("page", page),
                ("section", index),
                ("prop", "wikitext"),
                ("format", "json"),
                ("redirects", "1"),
            ])
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, "wikipedia wikitext"))?;

        if !response.status().is_success() {
            return Err(FetchError::from_status(
                response.status().as_u16(),
                "wikipedia wikitext",
            ));
        }

        let body: ParseResponse<WikitextResult> = response
            .json()
            .await
            .map_err(|e| FetchError::from_reqwest(e, "wikipedia wikitext parse"))?;

        Ok(body.parse.map(|p| p.wikitext.value))
    }
}

#[derive(Debug, Deserialize)]
struct ParseResponse<T> {
    parse: Option<T>,
}

#[derive(Debug, Deserialize)]
struct SectionsResult {
    #[serde(default)]
    sections: Vec<Section>,
}

#[derive(Debug, Deserialize)]
struct Section {
    line: String,
    index: String,
}

#[derive(Debug, Deserialize)]
struct WikitextResult {
    #[serde(rename = "wikitext")]
    wikitext: WikitextValue,
}

#[derive(Debug, Deserialize)]
struct WikitextValue {
    #[serde(rename = "*")]
    value: String,
}
