// ABOUTME: On-disk persistence for OAuth2 token material, one JSON file per provider
// ABOUTME: Read at startup, rewritten after every exchange or refresh
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::{ProviderError, ProviderResult};
use crate::oauth::OAuth2Token;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

/// Persists one provider's token file.
///
/// The file is owned exclusively by that provider's session; the instance
/// lock guarantees no other process rewrites it concurrently.
#[derive(Debug, Clone)]
pub struct TokenStore {
    provider: &'static str,
    path: PathBuf,
}

impl TokenStore {
    /// Create a store for `provider` backed by `path`.
    #[must_use]
    pub fn new(provider: &'static str, path: PathBuf) -> Self {
        Self { provider, path }
    }

    /// Load the persisted token, or `None` when no file exists yet.
    ///
    /// # Errors
    ///
    /// Returns an error when the file exists but cannot be read or decoded;
    /// a corrupt token file needs operator attention, not a silent re-auth.
    pub fn load(&self) -> ProviderResult<Option<OAuth2Token>> {
        if !self.path.exists() {
            debug!("No {} token file at {}", self.provider, self.path.display());
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path).map_err(|e| ProviderError::AuthFailed {
            provider: self.provider,
            message: format!("cannot read token file {}: {e}", self.path.display()),
        })?;
        let token = serde_json::from_str(&raw).map_err(|e| ProviderError::AuthFailed {
            provider: self.provider,
            message: format!("corrupt token file {}: {e}", self.path.display()),
        })?;
        Ok(Some(token))
    }

    /// Rewrite the token file with `token`.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be serialized or written.
    pub fn save(&self, token: &OAuth2Token) -> ProviderResult<()> {
        debug!("Saving {} tokens to {}", self.provider, self.path.display());
        let raw =
            serde_json::to_string_pretty(token).map_err(|e| ProviderError::AuthFailed {
                provider: self.provider,
                message: format!("cannot serialize token: {e}"),
            })?;
        fs::write(&self.path, raw).map_err(|e| ProviderError::AuthFailed {
            provider: self.provider,
            message: format!("cannot write token file {}: {e}", self.path.display()),
        })
    }
}
