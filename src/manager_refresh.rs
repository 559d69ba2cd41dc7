use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, TimeDelta, Timelike};
use log::{error, info, warn};
use crate::extractor::ForecastRecord;
use crate::schedule::{api_times, is_fresh, kst_now, Mode};

#[derive(Debug)]
pub struct RefreshError(pub String);

impl fmt::Display for RefreshError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RefreshError: {}", self.0)
    }
}

/// Source of full forecast batches, one issuance at a time
#[async_trait]
pub trait ForecastFetcher: Send + Sync {
    async fn fetch(&self, base_date: &str, base_time: &str) -> Result<Vec<ForecastRecord>, String>;
}

/// The cached forecast table plus its freshness marker
#[async_trait]
pub trait ForecastCache: Send + Sync {
    async fn replace(&self, rows: &[ForecastRecord]) -> Result<(), String>;
    async fn marker(&self) -> Result<Option<String>, String>;
    async fn set_marker(&self, base_time: &str) -> Result<(), String>;
}

/// Bounded retry contract for one refresh cycle: fixed delay, no backoff
#[derive(Debug, Copy, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy { max_attempts: 10, delay: Duration::from_secs(10) }
    }
}

/// Outcome of one refresh cycle
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// The stored marker already names the computed issuance, nothing fetched
    AlreadyFresh,
    /// The cache was replaced and the marker advanced
    Replaced,
}

/// Runs one gated refresh cycle against the given issuance.
///
/// When the marker is stale, fetch-and-replace is attempted up to the
/// policy's limit with a fixed pause in between. The marker only advances
/// after a successful replacement, so exhaustion leaves the previous cache
/// serving as-is.
///
/// # Arguments
///
/// * 'fetcher' - upstream forecast source
/// * 'cache' - forecast table and marker store
/// * 'base_date' - issuance date to fetch, YYYYMMDD
/// * 'base_time' - issuance time to fetch, HHMM
/// * 'policy' - retry contract
pub async fn refresh_once(
    fetcher: &dyn ForecastFetcher,
    cache: &dyn ForecastCache,
    base_date: &str,
    base_time: &str,
    policy: &RetryPolicy,
) -> Result<RefreshOutcome, RefreshError> {
    let stored = cache.marker().await.map_err(RefreshError)?;
    if is_fresh(stored.as_deref(), base_time) {
        info!("cache already holds issuance {}, skipping refresh", base_time);
        return Ok(RefreshOutcome::AlreadyFresh);
    }

    for attempt in 1..=policy.max_attempts {
        match try_replace(fetcher, cache, base_date, base_time).await {
            Ok(count) => {
                info!("refresh succeeded on attempt {}, {} rows cached", attempt, count);
                return Ok(RefreshOutcome::Replaced);
            }
            Err(e) => {
                warn!("refresh attempt {}/{} failed: {}", attempt, policy.max_attempts, e);
                if attempt < policy.max_attempts {
                    tokio::time::sleep(policy.delay).await;
                }
            }
        }
    }

    Err(RefreshError(format!(
        "refresh failed after {} attempts for {} {}", policy.max_attempts, base_date, base_time
    )))
}

async fn try_replace(
    fetcher: &dyn ForecastFetcher,
    cache: &dyn ForecastCache,
    base_date: &str,
    base_time: &str,
) -> Result<usize, RefreshError> {
    let rows = fetcher.fetch(base_date, base_time).await.map_err(RefreshError)?;
    cache.replace(&rows).await.map_err(RefreshError)?;
    cache.set_marker(base_time).await.map_err(RefreshError)?;
    Ok(rows.len())
}

/// Forecast refresh loop, fired every three hours at a fixed offset minute (KST)
///
/// # Arguments
///
/// * 'fetcher' - upstream forecast source
/// * 'cache' - forecast table and marker store
/// * 'offset_minute' - minute past the 3-hour mark to fire at
/// * 'publication_delay' - forwarded to the schedule resolver
pub async fn run_refresh(
    fetcher: Arc<dyn ForecastFetcher>,
    cache: Arc<dyn ForecastCache>,
    offset_minute: u32,
    publication_delay: u32,
) {
    let policy = RetryPolicy::default();

    loop {
        let pause = until_next_refresh(kst_now(), offset_minute);
        tokio::time::sleep(pause).await;

        let times = api_times(kst_now(), Mode::OnDemand, publication_delay);
        let cycle = refresh_once(
            fetcher.as_ref(), cache.as_ref(), &times.base_date, &times.base_time, &policy,
        ).await;
        if let Err(e) = cycle {
            error!("{}", e);
        }
    }
}

/// Duration until the next 3-hour refresh mark at the given offset minute
fn until_next_refresh(now: DateTime<FixedOffset>, offset_minute: u32) -> Duration {
    let slot_hour = now.hour() / 3 * 3;
    let mut next = now
        .with_hour(slot_hour).unwrap()
        .with_minute(offset_minute).unwrap()
        .with_second(0).unwrap()
        .with_nanosecond(0).unwrap();

    if next <= now {
        next += TimeDelta::hours(3);
    }

    (next - now).to_std().unwrap_or(Duration::from_secs(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;
    use chrono::TimeZone;

    struct FailingFetcher {
        calls: AtomicU32,
    }

    #[async_trait]
    impl ForecastFetcher for FailingFetcher {
        async fn fetch(&self, _: &str, _: &str) -> Result<Vec<ForecastRecord>, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err("connection reset".to_string())
        }
    }

    struct FlakyFetcher {
        calls: AtomicU32,
        fail_first: u32,
    }

    #[async_trait]
    impl ForecastFetcher for FlakyFetcher {
        async fn fetch(&self, date: &str, slot: &str) -> Result<Vec<ForecastRecord>, String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_first {
                return Err("timeout".to_string());
            }
            Ok(vec![ForecastRecord {
                date: date.to_string(),
                time_slot: slot.to_string(),
                category: "TMP".to_string(),
                value: "3.5".to_string(),
                grid_x: 60,
                grid_y: 127,
            }])
        }
    }

    #[derive(Default)]
    struct FakeCache {
        marker: Mutex<Option<String>>,
        replaced: Mutex<Vec<Vec<ForecastRecord>>>,
    }

    #[async_trait]
    impl ForecastCache for FakeCache {
        async fn replace(&self, rows: &[ForecastRecord]) -> Result<(), String> {
            self.replaced.lock().unwrap().push(rows.to_vec());
            Ok(())
        }
        async fn marker(&self) -> Result<Option<String>, String> {
            Ok(self.marker.lock().unwrap().clone())
        }
        async fn set_marker(&self, base_time: &str) -> Result<(), String> {
            *self.marker.lock().unwrap() = Some(base_time.to_string());
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn exhaustion_leaves_cache_and_marker_untouched() {
        let fetcher = FailingFetcher { calls: AtomicU32::new(0) };
        let cache = FakeCache::default();
        let policy = RetryPolicy::default();

        let started = tokio::time::Instant::now();
        let result = refresh_once(&fetcher, &cache, "20260302", "0800", &policy).await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("after 10 attempts"), "got {:?}", err);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 10);
        // nine pauses of ten seconds between the ten attempts
        assert_eq!(started.elapsed(), Duration::from_secs(90));
        assert!(cache.replaced.lock().unwrap().is_empty());
        assert_eq!(*cache.marker.lock().unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_before_attempts_run_out() {
        let fetcher = FlakyFetcher { calls: AtomicU32::new(0), fail_first: 2 };
        let cache = FakeCache::default();
        let policy = RetryPolicy::default();

        let outcome = refresh_once(&fetcher, &cache, "20260302", "0800", &policy).await.unwrap();

        assert_eq!(outcome, RefreshOutcome::Replaced);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 3);
        assert_eq!(cache.replaced.lock().unwrap().len(), 1);
        assert_eq!(cache.marker.lock().unwrap().as_deref(), Some("0800"));
    }

    #[tokio::test]
    async fn fresh_marker_skips_the_fetch() {
        let fetcher = FailingFetcher { calls: AtomicU32::new(0) };
        let cache = FakeCache::default();
        *cache.marker.lock().unwrap() = Some("0800".to_string());

        let outcome = refresh_once(&fetcher, &cache, "20260302", "0800", &RetryPolicy::default())
            .await
            .unwrap();

        assert_eq!(outcome, RefreshOutcome::AlreadyFresh);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn next_refresh_mark_rolls_to_the_following_slot() {
        let kst = FixedOffset::east_opt(9 * 3600).unwrap();
        let now = kst.with_ymd_and_hms(2026, 3, 2, 5, 20, 0).unwrap();
        // 05:20 is past the 03:10 mark, next is 06:10
        assert_eq!(until_next_refresh(now, 10), Duration::from_secs(50 * 60));

        let now = kst.with_ymd_and_hms(2026, 3, 2, 6, 5, 0).unwrap();
        assert_eq!(until_next_refresh(now, 10), Duration::from_secs(5 * 60));
    }
}
