// ABOUTME: Strava API client: paginated activity listing and stream assembly
// ABOUTME: Builds track payloads from the per-activity latlng/time/altitude/velocity streams
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{ActivitySource, ActivityStream};
use crate::config::ProviderCredentials;
use crate::errors::{ProviderError, ProviderResult};
use crate::models::{Activity, TrackPayload, TrackPoint};
use crate::oauth::{AuthorizationPrompt, OAuth2Config, OAuthSession};
use crate::rate_limit::RateLimiter;
use crate::token_store::TokenStore;
use async_stream::try_stream;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

const STRAVA_API_BASE: &str = "https://www.strava.com/api/v3";
const STRAVA_AUTH_URL: &str = "https://www.strava.com/oauth/authorize";

/// Activities fetched per listing request.
pub const ACTIVITIES_PER_PAGE: usize = 30;

/// Strava client owning the provider's OAuth session.
pub struct StravaClient {
    session: Mutex<OAuthSession>,
    base_url: String,
}

impl StravaClient {
    /// Build a client from OAuth application credentials and an
    /// authorization prompt for the interactive flow.
    #[must_use]
    pub fn new(credentials: &ProviderCredentials, prompt: Box<dyn AuthorizationPrompt>) -> Self {
        let config = OAuth2Config {
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            auth_url: STRAVA_AUTH_URL.to_owned(),
            token_url: format!("{STRAVA_API_BASE}/oauth/token"),
            redirect_uri: "https://localhost".to_owned(),
            scopes: vec!["activity:read_all".to_owned()],
            authoritative_usage: true,
        };
        let store = TokenStore::new("strava", credentials.token_file.clone());
        let session = OAuthSession::new("strava", config, store, RateLimiter::strava(), prompt);
        Self {
            session: Mutex::new(session),
            base_url: STRAVA_API_BASE.to_owned(),
        }
    }

    /// Run the token setup/refresh flow without issuing any API call.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::AuthFailed`] when authorization cannot be
    /// established.
    pub async fn ensure_authorized(&self) -> ProviderResult<()> {
        self.session.lock().await.ensure_valid().await
    }

    async fn activities_page(
        &self,
        cutoff: DateTime<Utc>,
        page: u32,
    ) -> ProviderResult<Vec<StravaActivity>> {
        let url = format!("{}/athlete/activities", self.base_url);
        let query = [
            ("per_page", ACTIVITIES_PER_PAGE.to_string()),
            ("page", page.to_string()),
            ("after", cutoff.timestamp().to_string()),
        ];
        let response = self
            .session
            .lock()
            .await
            .authorized_request(Method::GET, &url, &query)
            .await?;
        response.json().await.map_err(|e| ProviderError::Decode {
            provider: "strava",
            message: format!("activities page {page}: {e}"),
        })
    }

    /// Fetch one stream key for an activity; an absent key is an empty
    /// vector, not an error.
    async fn stream_values<T: DeserializeOwned>(
        &self,
        activity_id: u64,
        key: &str,
    ) -> ProviderResult<Vec<T>> {
        let url = format!("{}/activities/{activity_id}/streams", self.base_url);
        let query = [("keys", key.to_owned())];
        let response = self
            .session
            .lock()
            .await
            .authorized_request(Method::GET, &url, &query)
            .await?;
        let streams: Vec<StravaStream> =
            response.json().await.map_err(|e| ProviderError::Decode {
                provider: "strava",
                message: format!("streams for activity {activity_id}: {e}"),
            })?;
        let Some(stream) = streams.into_iter().find(|s| s.kind == key) else {
            return Ok(Vec::new());
        };
        serde_json::from_value(stream.data).map_err(|e| ProviderError::Decode {
            provider: "strava",
            message: format!("{key} stream for activity {activity_id}: {e}"),
        })
    }
}

#[async_trait]
impl ActivitySource for StravaClient {
    fn activities_since(&self, cutoff: DateTime<Utc>) -> ActivityStream<'_> {
        // Strava returns ascending start order when filtered with `after`,
        // so partial progress always leaves a correct cutoff behind.
        Box::pin(try_stream! {
            let mut page = 1u32;
            loop {
                let batch = self.activities_page(cutoff, page).await?;
                let count = batch.len();
                debug!("Fetched page {page} of activities ({count} entries)");
                for activity in batch {
                    yield Activity::from(activity);
                }
                if count < ACTIVITIES_PER_PAGE {
                    break;
                }
                page += 1;
            }
        })
    }

    async fn fetch_track(&self, activity: &Activity) -> ProviderResult<TrackPayload> {
        if activity.manual {
            return Err(ProviderError::MissingGeoData {
                activity_id: activity.id,
            });
        }
        debug!("Getting streams for activity {}", activity.id);
        let latlng: Vec<[f64; 2]> = self.stream_values(activity.id, "latlng").await?;
        if latlng.is_empty() {
            return Err(ProviderError::MissingGeoData {
                activity_id: activity.id,
            });
        }
        let time: Vec<i64> = self.stream_values(activity.id, "time").await?;
        let altitude: Vec<f64> = self.stream_values(activity.id, "altitude").await?;
        let velocity: Vec<f64> = self.stream_values(activity.id, "velocity_smooth").await?;

        let count = latlng.len().min(time.len());
        let points = (0..count)
            .map(|i| TrackPoint {
                latitude: latlng[i][0],
                longitude: latlng[i][1],
                elevation: altitude.get(i).copied(),
                speed: velocity.get(i).copied(),
                time: activity.start_date + Duration::seconds(time[i]),
            })
            .collect();

        Ok(TrackPayload {
            title: activity.name.clone(),
            sport: activity.sport.clone(),
            link: activity.link(),
            points,
        })
    }
}

#[derive(Debug, Deserialize)]
struct StravaActivity {
    id: u64,
    name: String,
    #[serde(rename = "type")]
    activity_type: String,
    start_date: DateTime<Utc>,
    #[serde(default)]
    manual: bool,
}

impl From<StravaActivity> for Activity {
    fn from(strava: StravaActivity) -> Self {
        Self {
            id: strava.id,
            name: strava.name,
            sport: strava.activity_type,
            start_date: strava.start_date,
            manual: strava.manual,
        }
    }
}

/// One entry of a streams response: `{"type": "latlng", "data": [...]}`.
#[derive(Debug, Deserialize)]
struct StravaStream {
    #[serde(rename = "type")]
    kind: String,
    data: serde_json::Value,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::{Activity, StravaActivity};

    #[test]
    fn wire_activity_maps_into_domain_model() {
        let raw = r#"{
            "id": 8765,
            "name": "Morning Ride",
            "type": "Ride",
            "start_date": "2023-03-21T06:11:44Z",
            "manual": false,
            "distance": 24312.5
        }"#;
        let parsed: StravaActivity = serde_json::from_str(raw).unwrap();
        let activity = Activity::from(parsed);
        assert_eq!(activity.id, 8765);
        assert_eq!(activity.sport, "Ride");
        assert!(activity.has_geo_data());
        assert_eq!(activity.link(), "https://strava.com/activities/8765");
    }

    #[test]
    fn missing_manual_flag_defaults_to_gps_backed() {
        let raw = r#"{"id": 1, "name": "x", "type": "Run", "start_date": "2023-01-01T00:00:00Z"}"#;
        let parsed: StravaActivity = serde_json::from_str(raw).unwrap();
        assert!(!parsed.manual);
    }
}
