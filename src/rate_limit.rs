// ABOUTME: Sliding-window request budgeting for provider API quotas
// ABOUTME: Tracks overlapping windows and sleeps until the next safe send instant
//
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};

/// Default Strava quota: 100 requests per rolling 15 minutes.
pub const STRAVA_SHORT_WINDOW_LIMIT: u32 = 100;
/// Default Strava quota: 1000 requests per day.
pub const STRAVA_DAILY_WINDOW_LIMIT: u32 = 1000;

/// Authoritative usage counters reported by a provider response, ordered
/// the same way as the limiter's windows (shortest first for Strava).
#[derive(Debug, Clone, Default)]
pub struct UsageSnapshot {
    /// `(used, limit)` per window
    pub windows: Vec<(u32, u32)>,
}

/// One rolling quota window.
#[derive(Debug, Clone)]
struct RateLimitWindow {
    duration: Duration,
    limit: u32,
    used: u32,
    reset_at: DateTime<Utc>,
}

impl RateLimitWindow {
    fn new(duration: Duration, limit: u32, now: DateTime<Utc>) -> Self {
        Self {
            duration,
            limit,
            used: 0,
            reset_at: next_boundary(now, duration),
        }
    }

    fn roll(&mut self, now: DateTime<Utc>) {
        if now >= self.reset_at {
            self.used = 0;
            self.reset_at = next_boundary(now, self.duration);
        }
    }

    fn exhausted(&self) -> bool {
        self.used >= self.limit
    }
}

/// Round `now` up to the next wall-clock boundary that is a whole multiple
/// of `duration` since the epoch: the next quarter hour for a 15-minute
/// window, the next UTC midnight for a daily one.
fn next_boundary(now: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    let secs = duration.num_seconds().max(1);
    let next = (now.timestamp().div_euclid(secs) + 1) * secs;
    DateTime::from_timestamp(next, 0).unwrap_or_else(|| now + duration)
}

/// Tracks consumption inside one or more rolling windows for a provider and
/// computes how long to wait before the next request is safe.
///
/// All state is per provider instance; two sessions never share counters.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    provider: &'static str,
    windows: Vec<RateLimitWindow>,
}

impl RateLimiter {
    /// Build a limiter with one window per `(duration, limit)` spec,
    /// shortest window first.
    #[must_use]
    pub fn new(provider: &'static str, specs: &[(Duration, u32)]) -> Self {
        let now = Utc::now();
        Self {
            provider,
            windows: specs
                .iter()
                .map(|&(duration, limit)| RateLimitWindow::new(duration, limit, now))
                .collect(),
        }
    }

    /// The two overlapping Strava windows: 15 minutes and one day.
    #[must_use]
    pub fn strava() -> Self {
        Self::new(
            "strava",
            &[
                (Duration::minutes(15), STRAVA_SHORT_WINDOW_LIMIT),
                (Duration::days(1), STRAVA_DAILY_WINDOW_LIMIT),
            ],
        )
    }

    /// Single locally-counted window for providers that publish no usage
    /// counters.
    #[must_use]
    pub fn local(provider: &'static str, duration: Duration, limit: u32) -> Self {
        Self::new(provider, &[(duration, limit)])
    }

    /// Block (sleeping, not spinning) until every tracked window has budget
    /// for one more request.
    ///
    /// Each individual wait is bounded by the shortest window's length, so
    /// the caller always eventually proceeds; a day-long exhaustion is
    /// waited out in short-window steps rather than one day-long sleep.
    pub async fn reserve(&mut self) {
        loop {
            let now = Utc::now();
            self.roll(now);
            let Some(target) = self.sleep_target(now) else {
                return;
            };
            warn!(
                "Hit {} API limit; sleeping until {}",
                self.provider, target
            );
            sleep_until(now, target).await;
        }
    }

    /// Update window state after a completed request.
    ///
    /// With an authoritative `usage` snapshot the reported counts replace
    /// the local ones (including the limits, which providers may change
    /// server-side); without one each window's local counter is bumped.
    pub fn record(&mut self, usage: Option<&UsageSnapshot>) {
        let now = Utc::now();
        self.roll(now);
        match usage {
            Some(snapshot) => {
                for (window, &(used, limit)) in self.windows.iter_mut().zip(&snapshot.windows) {
                    window.used = used;
                    if limit > 0 {
                        window.limit = limit;
                    }
                }
                debug!("Current {} API usage -- {}", self.provider, self.format_usage());
            }
            None => {
                for window in &mut self.windows {
                    window.used = window.used.saturating_add(1);
                }
            }
        }
    }

    /// Force the shortest window to exhausted, used when the provider
    /// answers 429 without usage headers.
    pub fn mark_exhausted(&mut self) {
        if let Some(window) = self.windows.first_mut() {
            window.used = window.used.max(window.limit);
        }
    }

    /// The soonest instant any exhausted window resets, or `None` when no
    /// window is exhausted.
    #[must_use]
    pub fn time_until_clear(&mut self) -> Option<Duration> {
        let now = Utc::now();
        self.roll(now);
        self.soonest_exhausted_reset().map(|at| at - now)
    }

    /// Sleep out the remainder of the shortest window, the standard pause
    /// before retrying a transport failure.
    pub async fn wait_out_short_window(&mut self) {
        let now = Utc::now();
        self.roll(now);
        if let Some(target) = self.windows.iter().map(|w| w.reset_at).min() {
            debug!(
                "Waiting out {} window until {} before retrying",
                self.provider, target
            );
            sleep_until(now, target).await;
        }
    }

    fn roll(&mut self, now: DateTime<Utc>) {
        for window in &mut self.windows {
            window.roll(now);
        }
    }

    fn soonest_exhausted_reset(&self) -> Option<DateTime<Utc>> {
        self.windows
            .iter()
            .filter(|w| w.exhausted())
            .map(|w| w.reset_at)
            .min()
    }

    /// Where `reserve` should sleep to, given `now`; `None` means clear to
    /// send. The target never lies past the shortest window's next
    /// boundary, which keeps daily exhaustion retrying at short intervals.
    fn sleep_target(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let exhausted = self.soonest_exhausted_reset()?;
        let short_boundary = self
            .windows
            .iter()
            .min_by_key(|w| w.duration)
            .map_or(exhausted, |w| next_boundary(now, w.duration));
        Some(exhausted.min(short_boundary))
    }

    fn format_usage(&self) -> String {
        self.windows
            .iter()
            .map(|w| format!("{}/{}", w.used, w.limit))
            .collect::<Vec<_>>()
            .join(" -- ")
    }
}

async fn sleep_until(now: DateTime<Utc>, target: DateTime<Utc>) {
    let wait = (target - now).to_std().unwrap_or_default();
    tokio::time::sleep(wait).await;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::{next_boundary, RateLimiter, UsageSnapshot};
    use chrono::{Duration, TimeZone, Utc};

    fn limiter() -> RateLimiter {
        RateLimiter::new(
            "test",
            &[(Duration::minutes(15), 100), (Duration::days(1), 1000)],
        )
    }

    #[test]
    fn boundary_rounds_up_to_quarter_hour() {
        let now = Utc.with_ymd_and_hms(2023, 5, 1, 10, 7, 13).single().unwrap();
        let next = next_boundary(now, Duration::minutes(15));
        assert_eq!(next, Utc.with_ymd_and_hms(2023, 5, 1, 10, 15, 0).single().unwrap());
    }

    #[test]
    fn boundary_rounds_up_to_midnight_for_daily_window() {
        let now = Utc.with_ymd_and_hms(2023, 5, 1, 23, 59, 59).single().unwrap();
        let next = next_boundary(now, Duration::days(1));
        assert_eq!(next, Utc.with_ymd_and_hms(2023, 5, 2, 0, 0, 0).single().unwrap());
    }

    #[test]
    fn fresh_limiter_is_clear_to_send() {
        let limiter = limiter();
        assert!(limiter.sleep_target(Utc::now()).is_none());
    }

    #[test]
    fn authoritative_usage_below_limits_stays_clear() {
        let mut limiter = limiter();
        limiter.record(Some(&UsageSnapshot {
            windows: vec![(57, 100), (430, 1000)],
        }));
        assert!(limiter.sleep_target(Utc::now()).is_none());
        assert!(limiter.time_until_clear().is_none());
    }

    #[test]
    fn short_window_exhaustion_sleeps_to_next_boundary() {
        let mut limiter = limiter();
        limiter.record(Some(&UsageSnapshot {
            windows: vec![(100, 100), (430, 1000)],
        }));
        let now = Utc::now();
        let target = limiter.sleep_target(now).unwrap();
        assert!(target > now);
        assert!(target - now <= Duration::minutes(15));
        assert_eq!(target.timestamp() % (15 * 60), 0);
    }

    #[test]
    fn daily_exhaustion_still_retries_at_short_intervals() {
        let mut limiter = limiter();
        limiter.record(Some(&UsageSnapshot {
            windows: vec![(12, 100), (1000, 1000)],
        }));
        let now = Utc::now();
        let target = limiter.sleep_target(now).unwrap();
        // Bounded by the 15-minute boundary, not the daily reset.
        assert!(target - now <= Duration::minutes(15));
    }

    #[test]
    fn local_counting_exhausts_after_limit_requests() {
        let mut limiter = RateLimiter::local("test", Duration::minutes(15), 3);
        for _ in 0..3 {
            assert!(limiter.sleep_target(Utc::now()).is_none());
            limiter.record(None);
        }
        assert!(limiter.sleep_target(Utc::now()).is_some());
    }

    #[test]
    fn mark_exhausted_blocks_the_short_window() {
        let mut limiter = limiter();
        limiter.mark_exhausted();
        assert!(limiter.sleep_target(Utc::now()).is_some());
        assert!(limiter.time_until_clear().is_some());
    }

    #[test]
    fn time_until_clear_is_bounded_by_window_length() {
        let mut limiter = limiter();
        limiter.mark_exhausted();
        let wait = limiter.time_until_clear().unwrap();
        assert!(wait <= Duration::minutes(15));
    }
}
