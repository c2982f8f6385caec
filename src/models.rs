// ABOUTME: Domain models exchanged between the source and destination providers
// ABOUTME: Activities, track payloads with geographic points, and destination workouts
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One exercise session recorded by the source provider.
///
/// Immutable once fetched; identity is the provider-side `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    /// Source-side identifier
    pub id: u64,
    /// Display name / title
    pub name: String,
    /// Source activity type string (e.g. "Ride", "TrailRun")
    pub sport: String,
    /// When the activity started (UTC)
    pub start_date: DateTime<Utc>,
    /// Manually logged, i.e. recorded without GPS data
    pub manual: bool,
}

impl Activity {
    /// Whether this activity carries GPS data and can become a track.
    #[must_use]
    pub fn has_geo_data(&self) -> bool {
        !self.manual
    }

    /// Public back-link to the source record, carried in upload notes.
    #[must_use]
    pub fn link(&self) -> String {
        format!("https://strava.com/activities/{}", self.id)
    }
}

/// One sampled point of a geographic track.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// Elevation in meters, when the provider recorded it
    pub elevation: Option<f64>,
    /// Smoothed speed in meters per second, when recorded
    pub speed: Option<f64>,
    /// Sample timestamp (UTC)
    pub time: DateTime<Utc>,
}

/// The unit of transfer: an ordered point sequence plus the descriptive
/// metadata the destination keeps (title, source sport, back-link).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackPayload {
    /// Activity title, becomes the track name
    pub title: String,
    /// Source activity type string, carried as the track description
    pub sport: String,
    /// Back-link to the source record
    pub link: String,
    /// Ordered samples, oldest first
    pub points: Vec<TrackPoint>,
}

impl TrackPayload {
    /// Start time of the track, if it has any points.
    #[must_use]
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.points.first().map(|p| p.time)
    }
}

/// A record already present at the destination.
///
/// Only used to find the most recent entry (the sync cutoff) and as the
/// iteration target for bulk delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workout {
    /// Destination-side identifier
    pub id: String,
    /// When the workout was recorded (UTC)
    pub workout_date: DateTime<Utc>,
    /// Destination sport identifier
    pub sport_id: i64,
}
