//! User model for storage and API.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// User profile stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Spotify user ID (also used as document ID)
    pub spotify_user_id: String,
    /// Display name from the Spotify profile
    pub display_name: String,
    /// Email address (may be None if not shared)
    pub email: Option<String>,
    /// Two-letter country code
    pub country: Option<String>,
    /// Profile picture URL
    pub profile_picture: Option<String>,
    /// When user first connected
    pub created_at: String,
    /// Last library sync timestamp
    pub last_synced_at: Option<String>,
}

/// User's OAuth tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserTokens {
    /// Spotify access token
    pub access_token: String,
    /// Refresh token (Spotify may omit it on refresh responses)
    pub refresh_token: Option<String>,
    /// When the access token expires (ISO 8601)
    pub expires_at: String,
    /// Granted OAuth scopes
    pub scopes: Vec<String>,
}

impl UserTokens {
    /// True if the access token expires within `buffer_secs` from now.
    ///
    /// An unparseable `expires_at` counts as expired so a refresh is
    /// attempted rather than sending a token of unknown validity.
    pub fn is_expired(&self, buffer_secs: i64) -> bool {
        match DateTime::parse_from_rfc3339(&self.expires_at) {
            Ok(expires) => {
                let expires_utc = expires.with_timezone(&Utc);
                Utc::now() + Duration::seconds(buffer_secs) >= expires_utc
            }
            Err(_) => true,
        }
    }
}
