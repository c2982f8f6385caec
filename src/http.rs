// ABOUTME: Shared HTTP client with connection pooling for provider API calls
// ABOUTME: Lazily initialized singleton with fixed request and connect timeouts
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use reqwest::{Client, ClientBuilder};
use std::sync::OnceLock;
use std::time::Duration;

/// Request timeout in seconds
const TIMEOUT_SECS: u64 = 30;

/// Connection timeout in seconds
const CONNECT_TIMEOUT_SECS: u64 = 10;

static SHARED_CLIENT: OnceLock<Client> = OnceLock::new();

/// Get the shared HTTP client used by every provider session.
///
/// Both providers reuse the same connection pool; throttling happens per
/// provider in the rate limiter, not here.
pub fn shared_client() -> &'static Client {
    SHARED_CLIENT.get_or_init(|| {
        ClientBuilder::new()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new())
    })
}
