//! Remote backend configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the hosted backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// Base URL of the backend (e.g., "https://xyz.supabase.co").
    pub api_base_url: String,

    /// Public API key sent with every request.
    pub anon_key: String,

    /// Session token of the signed-in user, if any.
    pub access_token: Option<String>,

    /// Storage bucket holding progress photos.
    pub photo_bucket: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:54321".to_string(),
            anon_key: String::new(),
            access_token: None,
            photo_bucket: "progress-photos".to_string(),
            request_timeout_secs: 30,
        }
    }
}
