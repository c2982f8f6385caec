// ABOUTME: FitTrackee API client: workout listing, GPX upload, bulk delete
// ABOUTME: Resolves destination sport labels to instance sport ids, cached per client
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::WorkoutDestination;
use crate::config::ProviderCredentials;
use crate::errors::{ProviderError, ProviderResult};
use crate::models::{TrackPayload, Workout};
use crate::oauth::{AuthorizationPrompt, OAuth2Config, OAuthSession};
use crate::rate_limit::RateLimiter;
use crate::token_store::TokenStore;
use crate::track;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde::Deserialize;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Workouts fetched per listing request (the instance's fixed page size).
pub const WORKOUTS_PER_PAGE: u32 = 30;

/// Local request budget: FitTrackee publishes no usage counters, so the
/// session counts its own requests against a generous per-minute window.
const LOCAL_WINDOW_LIMIT: u32 = 300;

/// FitTrackee client owning the provider's OAuth session.
pub struct FitTrackeeClient {
    session: Mutex<OAuthSession>,
    base_url: String,
    sports: Mutex<Option<HashMap<String, i64>>>,
}

impl FitTrackeeClient {
    /// Build a client for the instance at `host` (hostname, no scheme).
    #[must_use]
    pub fn new(
        credentials: &ProviderCredentials,
        host: &str,
        prompt: Box<dyn AuthorizationPrompt>,
    ) -> Self {
        let base_url = format!("https://{host}/api");
        let config = OAuth2Config {
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            auth_url: format!("https://{host}/profile/apps/authorize"),
            token_url: format!("{base_url}/oauth/token"),
            redirect_uri: format!("https://{host}/callback"),
            scopes: vec!["workouts:read".to_owned(), "workouts:write".to_owned()],
            authoritative_usage: false,
        };
        let store = TokenStore::new("fittrackee", credentials.token_file.clone());
        let limiter = RateLimiter::local("fittrackee", Duration::minutes(1), LOCAL_WINDOW_LIMIT);
        let session = OAuthSession::new("fittrackee", config, store, limiter, prompt);
        Self {
            session: Mutex::new(session),
            base_url,
            sports: Mutex::new(None),
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

    async fn workouts_page(&self, page: u32) -> ProviderResult<(Vec<FitTrackeeWorkout>, bool)> {
        let url = format!("{}/workouts", self.base_url);
        let query = [
            ("per_page", WORKOUTS_PER_PAGE.to_string()),
            ("page", page.to_string()),
        ];
        let response = self
            .session
            .lock()
            .await
            .authorized_request(Method::GET, &url, &query)
            .await?;
        let parsed: WorkoutsResponse =
            response.json().await.map_err(|e| ProviderError::Decode {
                provider: "fittrackee",
                message: format!("workouts page {page}: {e}"),
            })?;
        Ok((parsed.data.workouts, parsed.pagination.has_next))
    }

    /// List every workout on the instance, paging until exhausted.
    ///
    /// # Errors
    ///
    /// Returns a transport/API error when any page fails.
    pub async fn all_workouts(&self) -> ProviderResult<Vec<Workout>> {
        let mut workouts = Vec::new();
        let mut page = 1u32;
        loop {
            let (batch, has_next) = self.workouts_page(page).await?;
            debug!("Fetched page {page} of workouts ({} so far)", workouts.len() + batch.len());
            for w in batch {
                workouts.push(w.into_workout()?);
            }
            if !has_next {
                break;
            }
            page += 1;
        }
        Ok(workouts)
    }

    /// Delete one workout by id.
    ///
    /// # Errors
    ///
    /// Returns a transport/API error when the delete fails.
    pub async fn delete_workout(&self, id: &str) -> ProviderResult<()> {
        let url = format!("{}/workouts/{id}", self.base_url);
        self.session
            .lock()
            .await
            .authorized_request(Method::DELETE, &url, &[])
            .await?;
        Ok(())
    }

    /// Delete every workout on the instance, returning how many were
    /// removed. The caller is responsible for having obtained explicit
    /// confirmation first.
    ///
    /// # Errors
    ///
    /// Returns a transport/API error when listing or any delete fails.
    pub async fn delete_all(&self) -> ProviderResult<usize> {
        let workouts = self.all_workouts().await?;
        let total = workouts.len();
        for (i, workout) in workouts.iter().enumerate() {
            debug!("Deleting workout {} ({}/{total})", workout.id, i + 1);
            self.delete_workout(&workout.id).await?;
        }
        info!("Deleted {total} workouts");
        Ok(total)
    }

    /// Resolve a sport label against the instance's configured sports.
    async fn sport_id(&self, label: &str) -> ProviderResult<i64> {
        let mut cache = self.sports.lock().await;
        if cache.is_none() {
            debug!("Getting sport types");
            let url = format!("{}/sports", self.base_url);
            let response = self
                .session
                .lock()
                .await
                .authorized_request(Method::GET, &url, &[])
                .await?;
            let parsed: SportsResponse =
                response.json().await.map_err(|e| ProviderError::Decode {
                    provider: "fittrackee",
                    message: format!("sports list: {e}"),
                })?;
            *cache = Some(
                parsed
                    .data
                    .sports
                    .into_iter()
                    .map(|s| (s.label, s.id))
                    .collect(),
            );
        }
        cache
            .as_ref()
            .and_then(|sports| sports.get(label).copied())
            .ok_or_else(|| ProviderError::Validation {
                provider: "fittrackee",
                message: format!("sport {label:?} is not configured on the instance"),
            })
    }
}

#[async_trait]
impl WorkoutDestination for FitTrackeeClient {
    async fn latest_workout_time(&self) -> ProviderResult<Option<DateTime<Utc>>> {
        let mut latest: Option<DateTime<Utc>> = None;
        let mut page = 1u32;
        loop {
            let (batch, has_next) = self.workouts_page(page).await?;
            for w in batch {
                let date = parse_workout_date(&w.workout_date)?;
                latest = Some(latest.map_or(date, |l| l.max(date)));
            }
            if !has_next {
                break;
            }
            page += 1;
        }
        Ok(latest)
    }

    async fn upload(&self, payload: &TrackPayload, sport: &str) -> ProviderResult<()> {
        let sport_id = self.sport_id(sport).await?;
        let xml = track::to_xml(payload).map_err(|e| ProviderError::Validation {
            provider: "fittrackee",
            message: format!("cannot render GPX: {e}"),
        })?;
        let notes = format!(
            "Uploaded with fitsync\nOriginal activity type on Strava was {:?}\nOriginal Strava link: {}",
            payload.sport, payload.link
        );
        let data = serde_json::json!({ "sport_id": sport_id, "notes": notes }).to_string();

        debug!("POSTing workout {:?} to FitTrackee", payload.title);
        let url = format!("{}/workouts", self.base_url);
        self.session
            .lock()
            .await
            .post_multipart(&url, move || {
                Form::new()
                    .part("file", Part::text(xml.clone()).file_name("workout.gpx"))
                    .text("data", data.clone())
            })
            .await?;
        Ok(())
    }
}

/// FitTrackee reports workout dates in RFC 2822 form
/// (`Tue, 21 Mar 2023 06:11:44 GMT`).
fn parse_workout_date(raw: &str) -> ProviderResult<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ProviderError::Decode {
            provider: "fittrackee",
            message: format!("workout date {raw:?}: {e}"),
        })
}

#[derive(Debug, Deserialize)]
struct WorkoutsResponse {
    data: WorkoutsData,
    pagination: Pagination,
}

#[derive(Debug, Deserialize)]
struct WorkoutsData {
    workouts: Vec<FitTrackeeWorkout>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    has_next: bool,
}

#[derive(Debug, Deserialize)]
struct FitTrackeeWorkout {
    id: String,
    workout_date: String,
    sport_id: i64,
}

impl FitTrackeeWorkout {
    fn into_workout(self) -> ProviderResult<Workout> {
        Ok(Workout {
            workout_date: parse_workout_date(&self.workout_date)?,
            id: self.id,
            sport_id: self.sport_id,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SportsResponse {
    data: SportsData,
}

#[derive(Debug, Deserialize)]
struct SportsData {
    sports: Vec<Sport>,
}

#[derive(Debug, Deserialize)]
struct Sport {
    id: i64,
    label: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::{parse_workout_date, FitTrackeeWorkout, WorkoutsResponse};
    use chrono::{TimeZone, Utc};

    #[test]
    fn rfc2822_workout_dates_parse_to_utc() {
        let date = parse_workout_date("Tue, 21 Mar 2023 06:11:44 GMT").unwrap();
        assert_eq!(date, Utc.with_ymd_and_hms(2023, 3, 21, 6, 11, 44).single().unwrap());
    }

    #[test]
    fn malformed_workout_dates_are_decode_errors() {
        assert!(parse_workout_date("2023-03-21T06:11:44Z").is_err());
    }

    #[test]
    fn workouts_response_shape_parses() {
        let raw = r#"{
            "data": {"workouts": [
                {"id": "abc", "workout_date": "Tue, 21 Mar 2023 06:11:44 GMT", "sport_id": 1}
            ]},
            "pagination": {"has_next": false, "page": 1, "pages": 1}
        }"#;
        let parsed: WorkoutsResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.data.workouts.len(), 1);
        assert!(!parsed.pagination.has_next);
    }

    #[test]
    fn wire_workout_converts_to_domain_model() {
        let wire = FitTrackeeWorkout {
            id: "abc".into(),
            workout_date: "Tue, 21 Mar 2023 06:11:44 GMT".into(),
            sport_id: 4,
        };
        let workout = wire.into_workout().unwrap();
        assert_eq!(workout.id, "abc");
        assert_eq!(workout.sport_id, 4);
    }
}
