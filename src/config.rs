// ABOUTME: Environment-based configuration for both provider connections
// ABOUTME: Loads .env through dotenvy and fails fast on missing credentials
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use tracing::debug;

/// OAuth application credentials plus the token persistence path for one
/// provider.
#[derive(Debug, Clone)]
pub struct ProviderCredentials {
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// Where this provider's token JSON lives
    pub token_file: PathBuf,
}

/// Complete runtime configuration resolved from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// Strava OAuth application credentials
    pub strava: ProviderCredentials,
    /// FitTrackee OAuth application credentials
    pub fittrackee: ProviderCredentials,
    /// Hostname of the FitTrackee instance (no scheme)
    pub fittrackee_host: String,
    /// Single-instance lock marker path
    pub lock_file: PathBuf,
}

impl Config {
    /// Resolve configuration from the process environment, reading a `.env`
    /// file first if one is present.
    ///
    /// # Errors
    ///
    /// Returns an error when any required variable is missing; missing
    /// credentials are a fatal startup condition, not something to retry.
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            debug!("No .env file loaded: {e}");
        }

        Ok(Self {
            strava: ProviderCredentials {
                client_id: require("STRAVA_CLIENT_ID")?,
                client_secret: require("STRAVA_CLIENT_SECRET")?,
                token_file: PathBuf::from(require("STRAVA_TOKEN_FILE")?),
            },
            fittrackee: ProviderCredentials {
                client_id: require("FITTRACKEE_CLIENT_ID")?,
                client_secret: require("FITTRACKEE_CLIENT_SECRET")?,
                token_file: PathBuf::from(require("FITTRACKEE_TOKEN_FILE")?),
            },
            fittrackee_host: require("FITTRACKEE_HOST")?,
            lock_file: env::var("FITSYNC_LOCK_FILE")
                .map_or_else(|_| PathBuf::from("fitsync.pid"), PathBuf::from),
        })
    }
}

fn require(key: &str) -> Result<String> {
    env::var(key).with_context(|| {
        format!("No {key} defined in environment, please check the .env file (or README.md)")
    })
}
