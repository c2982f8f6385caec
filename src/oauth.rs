// ABOUTME: OAuth2 session per provider: interactive exchange, transparent refresh,
// ABOUTME: and the quota-aware request loop feeding usage metadata back to the limiter
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::{ProviderError, ProviderResult};
use crate::http::shared_client;
use crate::rate_limit::{RateLimiter, UsageSnapshot};
use crate::token_store::TokenStore;
use chrono::{DateTime, Duration, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::header::HeaderMap;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::io;
use tracing::{debug, info, warn};
use url::Url;

/// Transport failures and 5xx responses are reissued at most this many
/// times, each attempt preceded by the standard rate-limit wait.
const MAX_TRANSPORT_ATTEMPTS: u32 = 3;

/// Fallback token lifetime when the provider reports no expiry.
const DEFAULT_TOKEN_LIFETIME_HOURS: i64 = 6;

/// OAuth 2.0 endpoint configuration for one provider.
#[derive(Debug, Clone)]
pub struct OAuth2Config {
    /// OAuth client ID from the provider
    pub client_id: String,
    /// OAuth client secret from the provider
    pub client_secret: String,
    /// Authorization endpoint URL
    pub auth_url: String,
    /// Token endpoint URL
    pub token_url: String,
    /// Redirect URI registered with the provider
    pub redirect_uri: String,
    /// OAuth scopes to request
    pub scopes: Vec<String>,
    /// Whether responses carry authoritative usage counters
    /// (`X-RateLimit-Usage` / `X-RateLimit-Limit`)
    pub authoritative_usage: bool,
}

/// OAuth 2.0 token material as persisted to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuth2Token {
    /// The access token string
    pub access_token: String,
    /// Token type, usually "Bearer"
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Absolute expiration instant (UTC)
    pub expires_at: DateTime<Utc>,
    /// Refresh token for obtaining new access tokens
    pub refresh_token: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".into()
}

impl OAuth2Token {
    /// Check if the token is expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= Utc::now()
    }
}

/// Collaborator that completes the interactive authorization step: show the
/// URL to a human, block until they paste back the redirect result.
///
/// No assumption about terminal vs. other UI; the session only sees the
/// returned string.
pub trait AuthorizationPrompt: Send + Sync {
    /// Present `authorization_url` and return the redirect result (the full
    /// callback URL, or a bare authorization code).
    ///
    /// # Errors
    ///
    /// Returns an error when no interactive channel is available.
    fn authorize(&self, authorization_url: &str) -> io::Result<String>;
}

/// Prompt implementation reading the redirect result from stdin.
pub struct TerminalPrompt;

impl AuthorizationPrompt for TerminalPrompt {
    fn authorize(&self, authorization_url: &str) -> io::Result<String> {
        use std::io::{BufRead, Write};
        let mut stdout = io::stdout();
        writeln!(stdout, "\nPlease go to {authorization_url} and authorize access.")?;
        writeln!(
            stdout,
            "\nEnter the full callback URL from the browser address bar after you are redirected and press <enter>:\n"
        )?;
        stdout.flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim().to_owned())
    }
}

/// Wire shape of a token endpoint response.
///
/// Strava reports an absolute `expires_at`; FitTrackee only `expires_in`.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
}

impl TokenResponse {
    fn into_token(self, previous_refresh: Option<String>) -> OAuth2Token {
        let expires_at = self
            .expires_at
            .and_then(|at| DateTime::from_timestamp(at, 0))
            .or_else(|| self.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)))
            .unwrap_or_else(|| Utc::now() + Duration::hours(DEFAULT_TOKEN_LIFETIME_HOURS));
        OAuth2Token {
            access_token: self.access_token,
            token_type: self.token_type.unwrap_or_else(default_token_type),
            expires_at,
            refresh_token: self.refresh_token.or(previous_refresh),
        }
    }
}

/// One provider's authenticated session.
///
/// Owns the token store and rate limiter for that provider; used by a
/// single synchronous call chain, so no concurrent refresh races are
/// possible.
pub struct OAuthSession {
    provider: &'static str,
    config: OAuth2Config,
    store: TokenStore,
    limiter: RateLimiter,
    client: Client,
    token: Option<OAuth2Token>,
    prompt: Box<dyn AuthorizationPrompt>,
}

impl OAuthSession {
    /// Create a session; the token is loaded lazily on first use.
    #[must_use]
    pub fn new(
        provider: &'static str,
        config: OAuth2Config,
        store: TokenStore,
        limiter: RateLimiter,
        prompt: Box<dyn AuthorizationPrompt>,
    ) -> Self {
        Self {
            provider,
            config,
            store,
            limiter,
            client: shared_client().clone(),
            token: None,
            prompt,
        }
    }

    /// The provider this session authenticates against.
    #[must_use]
    pub fn provider(&self) -> &'static str {
        self.provider
    }

    /// Make sure a usable access token is held, running the interactive
    /// exchange or a refresh as needed.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::AuthFailed`] when neither a refresh nor the
    /// interactive exchange can establish authorization.
    pub async fn ensure_valid(&mut self) -> ProviderResult<()> {
        if self.token.is_none() {
            self.token = self.store.load()?;
        }
        match &self.token {
            None => {
                debug!("No {} tokens found; fetching new ones", self.provider);
                self.interactive_exchange().await
            }
            Some(token) if token.is_expired() => self.reauthorize().await,
            Some(_) => Ok(()),
        }
    }

    /// Issue an authorized request, waiting out rate-limit windows and
    /// retrying transport failures.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] classified per the error taxonomy; quota
    /// exhaustion is waited out internally and never surfaced.
    pub async fn authorized_request(
        &mut self,
        method: Method,
        url: &str,
        query: &[(&str, String)],
    ) -> ProviderResult<Response> {
        self.send_with_retry(|client, token| {
            client
                .request(method.clone(), url)
                .query(query)
                .bearer_auth(token)
        })
        .await
    }

    /// POST a multipart form; `form` is called once per attempt since a
    /// multipart body cannot be reused across retries.
    ///
    /// # Errors
    ///
    /// Same classification as [`OAuthSession::authorized_request`].
    pub async fn post_multipart<F>(&mut self, url: &str, form: F) -> ProviderResult<Response>
    where
        F: Fn() -> reqwest::multipart::Form + Send + Sync,
    {
        self.send_with_retry(|client, token| client.post(url).multipart(form()).bearer_auth(token))
            .await
    }

    async fn send_with_retry<F>(&mut self, build: F) -> ProviderResult<Response>
    where
        F: Fn(&Client, &str) -> RequestBuilder + Send + Sync,
    {
        self.ensure_valid().await?;
        let mut transport_attempts = 0u32;
        let mut reauthorized = false;
        loop {
            self.limiter.reserve().await;
            let token = self.access_token()?;
            let response = match build(&self.client, &token).send().await {
                Ok(response) => response,
                Err(e) => {
                    transport_attempts += 1;
                    if transport_attempts >= MAX_TRANSPORT_ATTEMPTS {
                        return Err(ProviderError::Transport {
                            provider: self.provider,
                            source: e,
                        });
                    }
                    warn!("{} request failed ({e}); retrying after wait", self.provider);
                    self.limiter.wait_out_short_window().await;
                    continue;
                }
            };

            let usage = if self.config.authoritative_usage {
                usage_from_headers(response.headers())
            } else {
                None
            };
            self.limiter.record(usage.as_ref());

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                warn!("{} answered 429 Too Many Requests", self.provider);
                self.limiter.mark_exhausted();
                continue;
            }
            if status == StatusCode::UNAUTHORIZED {
                if reauthorized {
                    return Err(ProviderError::AuthFailed {
                        provider: self.provider,
                        message: "still unauthorized after re-authorization".into(),
                    });
                }
                reauthorized = true;
                info!("{} access token rejected; re-authorizing", self.provider);
                self.reauthorize().await?;
                continue;
            }
            if status.is_server_error() {
                transport_attempts += 1;
                let message = truncated_body(response).await;
                if transport_attempts >= MAX_TRANSPORT_ATTEMPTS {
                    return Err(ProviderError::Api {
                        provider: self.provider,
                        status: status.as_u16(),
                        message,
                    });
                }
                warn!(
                    "{} answered {status} ({message}); retrying after wait",
                    self.provider
                );
                self.limiter.wait_out_short_window().await;
                continue;
            }
            if !status.is_success() {
                let message = truncated_body(response).await;
                return Err(ProviderError::Validation {
                    provider: self.provider,
                    message: format!("{status}: {message}"),
                });
            }
            return Ok(response);
        }
    }

    fn access_token(&self) -> ProviderResult<String> {
        self.token
            .as_ref()
            .map(|t| t.access_token.clone())
            .ok_or_else(|| ProviderError::AuthFailed {
                provider: self.provider,
                message: "no access token after authorization".into(),
            })
    }

    /// Refresh if possible, otherwise fall back to the full interactive
    /// exchange (the refresh token may have been revoked).
    async fn reauthorize(&mut self) -> ProviderResult<()> {
        match self.refresh().await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(
                    "{} token refresh failed ({e}); falling back to interactive authorization",
                    self.provider
                );
                self.interactive_exchange().await
            }
        }
    }

    async fn refresh(&mut self) -> ProviderResult<()> {
        let refresh_token = self
            .token
            .as_ref()
            .and_then(|t| t.refresh_token.clone())
            .ok_or_else(|| ProviderError::AuthFailed {
                provider: self.provider,
                message: "no refresh token available".into(),
            })?;
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];
        let token = self.token_endpoint(&params, Some(refresh_token.clone())).await?;
        info!("{} token refreshed", self.provider);
        self.store.save(&token)?;
        self.token = Some(token);
        Ok(())
    }

    /// Run the web application flow: emit the authorization URL, block on
    /// the prompt, exchange the returned code.
    async fn interactive_exchange(&mut self) -> ProviderResult<()> {
        let state: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect();
        let auth_url = self.authorization_url(&state)?;
        let redirect = self
            .prompt
            .authorize(&auth_url)
            .map_err(|e| ProviderError::AuthFailed {
                provider: self.provider,
                message: format!("no interactive authorization channel: {e}"),
            })?;
        let code = extract_code(&redirect).ok_or_else(|| ProviderError::AuthFailed {
            provider: self.provider,
            message: "redirect result contains no authorization code".into(),
        })?;
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("code", code.as_str()),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];
        let token = self.token_endpoint(&params, None).await?;
        info!("{} authorization complete", self.provider);
        self.store.save(&token)?;
        self.token = Some(token);
        Ok(())
    }

    /// Token endpoint calls are not subject to the API quota and bypass the
    /// limiter.
    async fn token_endpoint(
        &self,
        params: &[(&str, &str)],
        previous_refresh: Option<String>,
    ) -> ProviderResult<OAuth2Token> {
        let response = self
            .client
            .post(&self.config.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| ProviderError::Transport {
                provider: self.provider,
                source: e,
            })?;
        let status = response.status();
        if !status.is_success() {
            let message = truncated_body(response).await;
            return Err(ProviderError::AuthFailed {
                provider: self.provider,
                message: format!("token endpoint answered {status}: {message}"),
            });
        }
        let parsed: TokenResponse =
            response.json().await.map_err(|e| ProviderError::Decode {
                provider: self.provider,
                message: e.to_string(),
            })?;
        Ok(parsed.into_token(previous_refresh))
    }

    fn authorization_url(&self, state: &str) -> ProviderResult<String> {
        let mut url =
            Url::parse(&self.config.auth_url).map_err(|e| ProviderError::AuthFailed {
                provider: self.provider,
                message: format!("invalid auth URL {}: {e}", self.config.auth_url),
            })?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("state", state);
        Ok(url.into())
    }
}

/// Pull the authorization code out of a pasted redirect result. Accepts the
/// full callback URL or a bare code.
fn extract_code(redirect: &str) -> Option<String> {
    if let Ok(url) = Url::parse(redirect) {
        if let Some((_, code)) = url.query_pairs().find(|(key, _)| key == "code") {
            return Some(code.into_owned());
        }
    }
    let bare = redirect.trim();
    if !bare.is_empty() && !bare.contains(['/', '=', '&', '?']) {
        return Some(bare.to_owned());
    }
    None
}

/// Parse the comma-paired `X-RateLimit-Usage` / `X-RateLimit-Limit` headers
/// (short window first, daily second) into a usage snapshot.
fn usage_from_headers(headers: &HeaderMap) -> Option<UsageSnapshot> {
    let used = parse_counters(headers.get("x-ratelimit-usage")?)?;
    let limits = parse_counters(headers.get("x-ratelimit-limit")?)?;
    Some(UsageSnapshot {
        windows: used.into_iter().zip(limits).collect(),
    })
}

fn parse_counters(value: &reqwest::header::HeaderValue) -> Option<Vec<u32>> {
    value
        .to_str()
        .ok()?
        .split(',')
        .map(|v| v.trim().parse().ok())
        .collect()
}

async fn truncated_body(response: Response) -> String {
    const MAX_BODY: usize = 500;
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_BODY {
        body.truncate(MAX_BODY);
        body.push_str("...");
    }
    body
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::{extract_code, usage_from_headers, OAuth2Token, TokenResponse};
    use chrono::{Duration, Utc};
    use reqwest::header::{HeaderMap, HeaderValue};

    #[test]
    fn expired_token_is_detected() {
        let token = OAuth2Token {
            access_token: "a".into(),
            token_type: "Bearer".into(),
            expires_at: Utc::now() - Duration::minutes(1),
            refresh_token: None,
        };
        assert!(token.is_expired());
    }

    #[test]
    fn unexpired_token_is_not_expired() {
        let token = OAuth2Token {
            access_token: "a".into(),
            token_type: "Bearer".into(),
            expires_at: Utc::now() + Duration::hours(1),
            refresh_token: None,
        };
        assert!(!token.is_expired());
    }

    #[test]
    fn code_is_extracted_from_callback_url() {
        let code = extract_code("https://localhost/?state=xyz&code=abc123&scope=read");
        assert_eq!(code.as_deref(), Some("abc123"));
    }

    #[test]
    fn bare_code_is_accepted() {
        assert_eq!(extract_code("abc123").as_deref(), Some("abc123"));
    }

    #[test]
    fn garbage_redirect_yields_none() {
        assert!(extract_code("https://localhost/?state=xyz").is_none());
        assert!(extract_code("").is_none());
    }

    #[test]
    fn usage_headers_are_parsed_pairwise() {
        let mut headers = HeaderMap::new();
        headers.insert("x-ratelimit-usage", HeaderValue::from_static("42, 230"));
        headers.insert("x-ratelimit-limit", HeaderValue::from_static("100,1000"));
        let snapshot = usage_from_headers(&headers).unwrap();
        assert_eq!(snapshot.windows, vec![(42, 100), (230, 1000)]);
    }

    #[test]
    fn missing_usage_headers_yield_none() {
        assert!(usage_from_headers(&HeaderMap::new()).is_none());
    }

    #[test]
    fn token_response_keeps_previous_refresh_token() {
        let response = TokenResponse {
            access_token: "new".into(),
            token_type: None,
            expires_at: None,
            expires_in: Some(3600),
            refresh_token: None,
        };
        let token = response.into_token(Some("old-refresh".into()));
        assert_eq!(token.refresh_token.as_deref(), Some("old-refresh"));
        assert_eq!(token.token_type, "Bearer");
        assert!(!token.is_expired());
    }

    #[test]
    fn absolute_expiry_wins_over_relative() {
        let response = TokenResponse {
            access_token: "new".into(),
            token_type: Some("Bearer".into()),
            expires_at: Some(0),
            expires_in: Some(3600),
            refresh_token: Some("r".into()),
        };
        let token = response.into_token(None);
        assert!(token.is_expired());
    }
}
