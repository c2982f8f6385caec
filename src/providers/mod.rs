// ABOUTME: Source and destination API clients plus the trait seams between them
// ABOUTME: The sync engine only sees these traits, so fakes can stand in for tests
//
// SPDX-License-Identifier: MIT OR Apache-2.0

/// FitTrackee destination client
pub mod fittrackee;
/// Fixed source-to-destination sport mapping table
pub mod sport_map;
/// Strava source client
pub mod strava;

use crate::errors::{ProviderError, ProviderResult};
use crate::models::{Activity, TrackPayload};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::Stream;
use std::pin::Pin;

/// Lazy sequence of activities as delivered by the source provider.
pub type ActivityStream<'a> =
    Pin<Box<dyn Stream<Item = Result<Activity, ProviderError>> + Send + 'a>>;

/// The source side: list activities after a cutoff and assemble their
/// geographic tracks.
#[async_trait]
pub trait ActivitySource {
    /// Stream activities with `start_date` after `cutoff`, oldest first,
    /// paginating transparently.
    fn activities_since(&self, cutoff: DateTime<Utc>) -> ActivityStream<'_>;

    /// Fetch the detail streams for one activity and build its track
    /// payload.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::MissingGeoData`] for activities recorded
    /// without GPS data (a skip, not a failure), or a transport/API error.
    async fn fetch_track(&self, activity: &Activity) -> ProviderResult<TrackPayload>;
}

/// The destination side: query existing workouts and upload new tracks.
#[async_trait]
pub trait WorkoutDestination {
    /// The most recent `workout_date` present at the destination, or `None`
    /// when it holds no workouts. Seeds the sync cutoff.
    ///
    /// # Errors
    ///
    /// Returns a transport/API error when listing fails.
    async fn latest_workout_time(&self) -> ProviderResult<Option<DateTime<Utc>>>;

    /// Upload one track payload as a workout of the given destination
    /// sport label.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Validation`] when the destination rejects
    /// the payload (permanent for this item), or a transport/API error.
    async fn upload(&self, payload: &TrackPayload, sport: &str) -> ProviderResult<()>;
}
