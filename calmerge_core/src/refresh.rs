//! Timing of the periodic refetch and of the daily page reload.

use std::time::Duration;

use chrono::{DateTime, NaiveTime, TimeZone};

pub const REFRESH_INTERVAL: Duration = Duration::from_millis(60_000);
/// Longest DST gap searched past the reload time.
const MAX_GAP_MINUTES: i64 = 3 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshScheduler {
    pub interval: Duration,
    /// Local time of the daily full reload.
    pub reload_at: NaiveTime,
}

impl Default for RefreshScheduler {
    fn default() -> Self {
        RefreshScheduler {
            interval: REFRESH_INTERVAL,
            reload_at: NaiveTime::from_hms_opt(0, 1, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl RefreshScheduler {
    /// Whether a polling tick should start a new refresh cycle.
    ///
    /// Best effort: a skipped tick only delays the refresh by one interval.
    pub fn should_refetch(&self, loading: bool) -> bool {
        if loading {
            tracing::debug!("skipping refresh, previous cycle still loading");
        }
        !loading
    }

    /// Time from `now` until the next daily reload, strictly in the future.
    pub fn delay_until_reload<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Duration {
        let timezone = now.timezone();
        let local_now = now.naive_local();
        let mut date = local_now.date();
        loop {
            let target = date.and_time(self.reload_at);
            if target > local_now {
                // Inside a DST gap, the first valid local minute after it.
                let instant = (0..=MAX_GAP_MINUTES).find_map(|minutes| {
                    timezone
                        .from_local_datetime(&(target + chrono::Duration::minutes(minutes)))
                        .earliest()
                });
                if let Some(instant) = instant {
                    let delay = instant.signed_duration_since(now.clone());
                    if let Ok(delay) = delay.to_std() {
                        if !delay.is_zero() {
                            return delay;
                        }
                    }
                }
            }
            match date.succ_opt() {
                Some(next) => date = next,
                None => return self.interval,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{FixedOffset, NaiveDate, TimeZone, Utc};

    use super::*;

    #[test]
    fn test_should_refetch() {
        let scheduler = RefreshScheduler::default();
        assert!(scheduler.should_refetch(false));
        assert!(!scheduler.should_refetch(true));
        assert_eq!(scheduler.interval, Duration::from_secs(60));
    }

    #[test]
    fn test_delay_until_reload() {
        let scheduler = RefreshScheduler::default();
        let at = |h, m, s| Utc.with_ymd_and_hms(2024, 3, 10, h, m, s).unwrap();
        assert_eq!(
            scheduler.delay_until_reload(&at(23, 0, 0)),
            Duration::from_secs(61 * 60)
        );
        assert_eq!(
            scheduler.delay_until_reload(&at(0, 0, 30)),
            Duration::from_secs(30)
        );
        // Exactly at the reload time the next one is tomorrow.
        assert_eq!(
            scheduler.delay_until_reload(&at(0, 1, 0)),
            Duration::from_secs(24 * 60 * 60)
        );
    }

    #[test]
    fn test_delay_until_reload_uses_local_time() {
        let scheduler = RefreshScheduler::default();
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = offset
            .from_local_datetime(
                &NaiveDate::from_ymd_opt(2024, 6, 1)
                    .unwrap()
                    .and_hms_opt(23, 59, 0)
                    .unwrap(),
            )
            .unwrap();
        assert_eq!(scheduler.delay_until_reload(&now), Duration::from_secs(120));
    }

    #[test]
    fn test_delay_until_reload_across_dst_gap() {
        let scheduler = RefreshScheduler::default();
        // Chile skips 2024-09-08 00:00 to 01:00.
        let now = chrono_tz::America::Santiago
            .with_ymd_and_hms(2024, 9, 7, 23, 0, 0)
            .unwrap();
        assert_eq!(scheduler.delay_until_reload(&now), Duration::from_secs(60 * 60));
    }

    #[test]
    fn test_delay_until_reload_across_dst_overlap() {
        let scheduler = RefreshScheduler::default();
        // Berlin repeats 02:00 to 03:00 on 2024-10-27, after the reload time.
        let now = chrono_tz::Europe::Berlin
            .with_ymd_and_hms(2024, 10, 26, 23, 0, 0)
            .unwrap();
        assert_eq!(scheduler.delay_until_reload(&now), Duration::from_secs(61 * 60));
        // The day of the change is 25 hours long.
        let after = chrono_tz::Europe::Berlin
            .with_ymd_and_hms(2024, 10, 27, 0, 1, 0)
            .unwrap();
        assert_eq!(
            scheduler.delay_until_reload(&after),
            Duration::from_secs(25 * 60 * 60)
        );
    }
}
