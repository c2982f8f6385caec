// ABOUTME: GPX 1.1 rendering and parsing for track payloads
// ABOUTME: Carries the activity type as the track description and the back-link as a track link
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::models::{Activity, TrackPayload, TrackPoint};
use chrono::{DateTime, Utc};
use geo_types::Point;
use gpx::{Gpx, GpxVersion, Link, Track, TrackSegment, Waypoint};
use thiserror::Error;
use time::OffsetDateTime;

/// Failures while rendering or parsing a GPX document.
#[derive(Debug, Error)]
pub enum TrackError {
    /// Underlying GPX reader/writer failure
    #[error("GPX error: {0}")]
    Gpx(#[from] gpx::errors::GpxError),
    /// Rendered bytes were not valid UTF-8
    #[error("GPX output is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    /// The document holds no track element
    #[error("file contains no track")]
    MissingTrack,
}

/// The file name a bulk-downloaded activity is stored under; existing files
/// are skipped on re-runs, so the name must be stable per activity.
#[must_use]
pub fn file_name(activity: &Activity) -> String {
    format!(
        "{}_{}.gpx",
        activity.start_date.format("%Y%m%d_%H%M%S"),
        activity.id
    )
}

/// Build the GPX document for a payload: one track, one segment, points
/// with elevation, speed, and time.
#[must_use]
pub fn to_gpx(payload: &TrackPayload) -> Gpx {
    let mut track = Track::new();
    track.name = Some(payload.title.clone());
    track.description = Some(payload.sport.clone());
    track.links.push(Link {
        href: payload.link.clone(),
        ..Link::default()
    });

    let mut segment = TrackSegment::new();
    for point in &payload.points {
        let mut waypoint = Waypoint::new(Point::new(point.longitude, point.latitude));
        waypoint.elevation = point.elevation;
        waypoint.speed = point.speed;
        waypoint.time = Some(to_offset(point.time).into());
        segment.points.push(waypoint);
    }
    track.segments.push(segment);

    Gpx {
        version: GpxVersion::Gpx11,
        creator: Some("fitsync".to_owned()),
        tracks: vec![track],
        ..Gpx::default()
    }
}

/// Render a payload as a GPX XML string.
///
/// # Errors
///
/// Returns an error when the document cannot be serialized.
pub fn to_xml(payload: &TrackPayload) -> Result<String, TrackError> {
    let mut buffer = Vec::new();
    gpx::write(&to_gpx(payload), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Parse a GPX document back into a payload, inverting [`to_xml`].
///
/// # Errors
///
/// Returns an error when the document is malformed or holds no track.
pub fn parse(xml: &str) -> Result<TrackPayload, TrackError> {
    let gpx = gpx::read(xml.as_bytes())?;
    let track = gpx.tracks.into_iter().next().ok_or(TrackError::MissingTrack)?;

    let mut points = Vec::new();
    for segment in track.segments {
        for waypoint in segment.points {
            let position = waypoint.point();
            points.push(TrackPoint {
                latitude: position.y(),
                longitude: position.x(),
                elevation: waypoint.elevation,
                speed: waypoint.speed,
                time: waypoint
                    .time
                    .map_or(DateTime::UNIX_EPOCH, |t| from_offset(t.into())),
            });
        }
    }

    Ok(TrackPayload {
        title: track.name.unwrap_or_default(),
        sport: track.description.unwrap_or_default(),
        link: track.links.first().map(|l| l.href.clone()).unwrap_or_default(),
        points,
    })
}

fn to_offset(time: DateTime<Utc>) -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(time.timestamp()).unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

fn from_offset(time: OffsetDateTime) -> DateTime<Utc> {
    DateTime::from_timestamp(time.unix_timestamp(), 0).unwrap_or(DateTime::UNIX_EPOCH)
}
