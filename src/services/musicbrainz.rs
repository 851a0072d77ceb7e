// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! MusicBrainz client for artist origin metadata.
//!
//! One search request per artist (`fmt=json`, limit 1) yields the artist
//! type (person or group), country, gender and life-span begin year.

use crate::services::retry::FetchError;
use serde::Deserialize;
use std::time::Duration;

const USER_AGENT: &str = concat!("tuneguess/", env!("CARGO_PKG_VERSION"));

/// Artist metadata extracted from a MusicBrainz search hit.
#[derive(Debug, Clone, Default)]
pub struct MusicBrainzArtist {
    /// "Person" or "Group"
    pub artist_type: Option<String>,
    pub country: Option<String>,
    /// Only meaningful for persons
    pub gender: Option<String>,
    /// Birth year for persons, formation year for groups
    pub begin_year: Option<i32>,
}

#[derive(Clone)]
pub struct MusicBrainzClient {
    http: reqwest::Client,
    base_url: String,
}

impl MusicBrainzClient {
    pub fn new() -> Result<Self, crate::error::AppError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| crate::error::AppError::Internal(anyhow::anyhow!(e)))?;
        Ok(Self {
            http,
            base_url: "https://musicbrainz.org/ws/2".to_string(),
        })
    }

    /// Look up an artist by name. Returns `None` when there is no match.
    pub async fn lookup_artist(
        &self,
        name: &str,
    ) -> Result<Option<MusicBrainzArtist>, FetchError> {
        let url = format!("{}/artist", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("query", format!("artist:{}", name)),
                ("fmt", "json".to_string()),
                ("limit", "1".to_string()),
            ])
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, "musicbrainz search"))?;

        if !response.status().is_success() {
            return Err(FetchError::from_status(
                response.status().as_u16(),
                "musicbrainz search",
            ));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| FetchError::from_reqwest(e, "musicbrainz parse"))?;

        let Some(hit) = body.artists.into_iter().next() else {
            return Ok(None);
        };

        let begin_year = hit
            .life_span
            .and_then(|span| span.begin)
            .and_then(|begin| begin.get(..4).and_then(|y| y.parse().ok()));

        Ok(Some(MusicBrainzArtist {
            artist_type: hit.artist_type,
            country: hit.country,
            gender: hit.gender,
            begin_year,
        }))
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    artists: Vec<SearchArtist>,
}

#[derive(Debug, Deserialize)]
struct SearchArtist {
    #[serde(rename = "type")]
    artist_type: Option<String>,
    country: Option<String>,
    gender: Option<String>,
    #[serde(rename = "life-span")]
    life_span: Option<LifeSpan>,
}

#[derive(Debug, Deserialize)]
struct LifeSpan {
    begin: Option<String>,
}
