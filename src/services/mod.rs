// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod cache;
pub mod content;
pub mod discogs;
pub mod enrichment;
pub mod lyrics;
pub mod musicbrainz;
pub mod retry;
pub mod spotify;
pub mod stats;
pub mod wiki;

pub use cache::TtlCache;
pub use content::ContentClient;
pub use discogs::DiscogsClient;
pub use enrichment::{EnrichmentReport, EnrichmentService};
pub use lyrics::LyricsClient;
pub use musicbrainz::MusicBrainzClient;
pub use spotify::{OAuthResult, SpotifyService};
pub use stats::StatsService;
pub use wiki::WikipediaClient;
