// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Discogs client for member counts and debut years.
//!
//! Flow per artist: search by name, keep the exact-title match, fetch the
//! artist resource for its member list, then list releases sorted by year
//! ascending and take the earliest as the debut.

use crate::services::retry::FetchError;
use serde::Deserialize;
use std::time::Duration;

const USER_AGENT: &str = concat!("tuneguess/", env!("CARGO_PKG_VERSION"));

/// Artist metadata extracted from Discogs.
#[derive(Debug, Clone, Default)]
pub struct DiscogsArtist {
    /// Number of listed members; 1 for solo artists with no member list
    pub members: Option<u32>,
    /// Year of the earliest release
    pub debut_year: Option<i32>,
}

#[derive(Clone)]
pub struct DiscogsClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl DiscogsClient {
    pub fn new(token: String) -> Result<Self, crate::error::AppError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| crate::error::AppError::Internal(anyhow::anyhow!(e)))?;
        Ok(Self {
            http,
            base_url: "https://api.discogs.com".to_string(),
            token,
        })
    }

    /// Look up an artist by name. Returns `None` when no exact-title match
    /// exists.
    pub async fn lookup_artist(&self, name: &str) -> Result<Option<DiscogsArtist>, FetchError> {
        let Some(artist_id) = self.search_exact(name).await? else {
            return Ok(None);
        };

        let members = self.fetch_member_count(artist_id).await?;
        let debut_year = self.fetch_debut_year(artist_id).await?;

        Ok(Some(DiscogsArtist {
            members,
            debut_year,
        }))
    }

    /// Search and keep only a case-insensitive exact title match.
    async fn search_exact(&self, name: &str) -> Result<Option<u64>, FetchError> {
        let url = format!("{}/database/search", self.base_url);
        let body: SearchResponse = self
            .get_json(
                &url,
                &[
                    ("q", name.to_string()),
                    ("type", "artist".to_string()),
                    ("per_page", "5".to_string()),
                ],
                "discogs search",
            )
            .await?;

        Ok(body
            .results
            .into_iter()
            .find(|r| r.title.eq_ignore_ascii_case(name))
            .map(|r| r.id))
    }

    async fn fetch_member_count(&self, artist_id: u64) -> Result<Option<u32>, FetchError> {
        let url = format!("{}/artists/{}", self.base_url, artist_id);
        let body: ArtistResponse = self.get_json(&url, &[], "discogs artist").await?;

        // A missing member list means a solo act
        Ok(Some(body.members.map_or(1, |m| m.len() as u32)))
    }

    async fn fetch_debut_year(&self, artist_id: u64) -> Result<Option<i32>, FetchError> {
        let url = format!("{}/artists/{}/releases", self.base_url, artist_id);
        let body: ReleasesResponse = self
            .get_json(
                &url,
                &[
                    ("sort", "year".to_string()),
                    ("sort_order", "asc".to_string()),
                    ("per_page", "5".to_string()),
                ],
                "discogs releases",
            )
            .await?;

        Ok(body
            .releases
            .into_iter()
            .filter_map(|r| r.year)
            .find(|&y| y > 0))
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: &str,
        query: &[(&str, String)],
        context: &str,
    ) -> Result<T, FetchError> {
        let response = self
            .http
            .get(url)
            .header("Authorization", format!("Discogs token={}", self.token))
            .query(query)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(e, context))?;

        if !response.status().is_success() {
            return Err(FetchError::from_status(response.status().as_u16(), context));
        }

        response
            .json()
            .await
            .map_err(|e| FetchError::from_reqwest(e, context))
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    id: u64,
    title: String,
}

#[derive(Debug, Deserialize)]
struct ArtistResponse {
    members: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct ReleasesResponse {
    #[serde(default)]
    releases: Vec<Release>,
}

#[derive(Debug, Deserialize)]
struct Release {
    year: Option<i32>,
}
