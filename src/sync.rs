// ABOUTME: Incremental sync engine: walk new source activities oldest-first and transfer them
// ABOUTME: Idempotency derives from re-querying the destination's latest workout, not local state
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::ProviderResult;
use crate::providers::{sport_map, ActivitySource, WorkoutDestination};
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use std::fmt;
use tracing::{info, warn};

/// Per-run outcome counts; per-item failures accumulate here instead of
/// aborting the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Activities uploaded as new workouts
    pub uploaded: u32,
    /// Activities skipped because they carry no GPS data
    pub skipped_no_geo: u32,
    /// Activities skipped because their type has no destination sport
    pub skipped_unmapped: u32,
    /// Activities the destination rejected as invalid
    pub failed: u32,
}

impl RunSummary {
    /// Total number of activities the run looked at.
    #[must_use]
    pub fn processed(&self) -> u32 {
        self.uploaded + self.skipped_no_geo + self.skipped_unmapped + self.failed
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} uploaded, {} without GPS data, {} without sport mapping, {} rejected",
            self.uploaded, self.skipped_no_geo, self.skipped_unmapped, self.failed
        )
    }
}

/// Transfer every source activity newer than the destination's latest
/// workout, oldest first.
///
/// Re-running with no new source activities is a no-op: the cutoff is
/// re-derived from the destination on every run, so source and destination
/// stay the only source of truth.
///
/// # Errors
///
/// Returns the first non-per-item error (exhausted transport retries,
/// failed authorization). Per-item outcomes are counted in the summary and
/// never abort the run.
pub async fn run<S, D>(source: &S, destination: &D) -> ProviderResult<RunSummary>
where
    S: ActivitySource + Sync,
    D: WorkoutDestination + Sync,
{
    let cutoff = match destination.latest_workout_time().await? {
        Some(latest) => {
            info!("Last destination workout was {latest}");
            latest
        }
        None => {
            info!("No destination workouts were found, so syncing all");
            DateTime::<Utc>::UNIX_EPOCH
        }
    };

    let mut summary = RunSummary::default();
    let mut activities = source.activities_since(cutoff);
    while let Some(next) = activities.next().await {
        let activity = next?;
        if !activity.has_geo_data() {
            warn!("Activity {} has no GPS data, skipping", activity.id);
            summary.skipped_no_geo += 1;
            continue;
        }
        let Some(sport) = sport_map::destination_sport(&activity.sport) else {
            warn!(
                "Activity type {:?} not recognized at destination, skipping activity {}",
                activity.sport, activity.id
            );
            summary.skipped_unmapped += 1;
            continue;
        };
        let payload = match source.fetch_track(&activity).await {
            Ok(payload) => payload,
            Err(e) if e.is_per_item() => {
                warn!("Skipping activity {}: {e}", activity.id);
                summary.skipped_no_geo += 1;
                continue;
            }
            Err(e) => return Err(e),
        };
        match destination.upload(&payload, sport).await {
            Ok(()) => {
                info!("Uploaded activity {} ({:?})", activity.id, activity.name);
                summary.uploaded += 1;
            }
            Err(e) if e.is_per_item() => {
                warn!("Destination rejected activity {}: {e}", activity.id);
                summary.failed += 1;
            }
            Err(e) => return Err(e),
        }
    }

    info!("Sync complete: {summary}");
    Ok(summary)
}
