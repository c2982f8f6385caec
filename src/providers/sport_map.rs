// ABOUTME: Fixed mapping from Strava activity types to FitTrackee sport labels
// ABOUTME: Unmapped types are a per-activity skip, never a run failure
//
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Map a Strava activity type to the FitTrackee sport label it should be
/// filed under, or `None` when no destination sport corresponds.
///
/// The label is resolved to a numeric sport id against the destination
/// instance's configured sports at upload time.
#[must_use]
pub fn destination_sport(activity_type: &str) -> Option<&'static str> {
    Some(match activity_type {
        "Ride" => "Cycling (Sport)",
        "VirtualRide" => "Cycling (Virtual)",
        "Hike" => "Hiking",
        "Walk" => "Walking",
        "MountainBikeRide" => "Mountain Biking",
        "EMountainBikeRide" => "Mountain Biking (Electric)",
        "Rowing" => "Rowing",
        "Run" => "Running",
        "AlpineSki" => "Skiing (Alpine)",
        "NordicSki" => "Skiing (Cross Country)",
        "Snowshoe" => "Snowshoes",
        "TrailRun" => "Trail",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::destination_sport;

    #[test]
    fn common_types_are_mapped() {
        assert_eq!(destination_sport("Ride"), Some("Cycling (Sport)"));
        assert_eq!(destination_sport("Run"), Some("Running"));
        assert_eq!(destination_sport("TrailRun"), Some("Trail"));
    }

    #[test]
    fn unknown_types_are_unmapped() {
        assert_eq!(destination_sport("Windsurf"), None);
        assert_eq!(destination_sport(""), None);
    }
}
