//! Cache-aware, single-flight retrieval of metal rates.
//!
//! [`RateService`] hands out the freshest rates it can: a persisted snapshot
//! younger than the freshness window, otherwise a live fetch, otherwise the
//! fixed fallback rates together with a user-facing warning. Concurrent
//! callers share one in-flight operation; the feed is never hit twice at once.

use crate::cache::KeyValueCache;
use crate::clock::{Clock, SystemClock};
use crate::feed::PriceFeed;
use crate::rates::MetalRateSnapshot;
use crate::store;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};
use zakat_core::ZakatError;

/// Shown alongside fallback rates.
pub const FALLBACK_WARNING: &str = "Failed to fetch current metal prices. Using default values.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateServiceConfig {
    /// Snapshots younger than this are served without touching the network.
    pub freshness_window: Duration,
    /// How often the background task checks for staleness.
    pub check_interval: Duration,
    /// Upper bound on a single feed call, on top of the feed's own timeout.
    pub fetch_timeout: Duration,
}

impl Default for RateServiceConfig {
    fn default() -> Self {
        Self {
            freshness_window: Duration::from_secs(8 * 60 * 60),
            check_interval: Duration::from_secs(60),
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateSource {
    /// Restored from the persistent cache.
    Cache,
    /// Fetched from the feed during this process.
    Live,
    /// Built-in defaults after a failed fetch.
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateState {
    Uninitialized,
    Fetching,
    CachedValid,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateReport {
    pub snapshot: MetalRateSnapshot,
    pub source: RateSource,
    /// Set only when `source` is [`RateSource::Fallback`].
    pub error: Option<String>,
}

impl RateReport {
    pub fn is_fallback(&self) -> bool {
        self.source == RateSource::Fallback
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.snapshot.captured_at
    }
}

type Flight = Shared<BoxFuture<'static, RateReport>>;

struct InFlight {
    future: Flight,
    /// False while the flight may be satisfied from the cache alone.
    fetches: bool,
}

struct State {
    current: Option<RateReport>,
    /// Capture time of the last snapshot that did not come from the fallback.
    last_success: Option<DateTime<Utc>>,
    phase: RateState,
    in_flight: Option<InFlight>,
}

struct Inner {
    feed: Arc<dyn PriceFeed>,
    cache: Arc<dyn KeyValueCache>,
    clock: Arc<dyn Clock>,
    config: RateServiceConfig,
    state: Mutex<State>,
}

#[derive(Clone, Copy)]
enum Mode {
    Read,
    Refresh,
    Tick,
}

enum Step {
    Ready(RateReport),
    Await(Flight),
    /// A cache-only flight is running; wait for it, then decide again.
    Wait(Flight),
    Idle,
}

/// Shared handle to the rate state. Clones observe the same state.
#[derive(Clone)]
pub struct RateService {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for RateService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateService")
            .field("config", &self.inner.config)
            .field("state", &self.state())
            .finish()
    }
}

impl RateService {
    pub fn new(
        feed: Arc<dyn PriceFeed>,
        cache: Arc<dyn KeyValueCache>,
        config: RateServiceConfig,
    ) -> Self {
        Self::with_clock(feed, cache, Arc::new(SystemClock), config)
    }

    pub fn with_clock(
        feed: Arc<dyn PriceFeed>,
        cache: Arc<dyn KeyValueCache>,
        clock: Arc<dyn Clock>,
        config: RateServiceConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                feed,
                cache,
                clock,
                config,
                state: Mutex::new(State {
                    current: None,
                    last_success: None,
                    phase: RateState::Uninitialized,
                    in_flight: None,
                }),
            }),
        }
    }

    pub fn config(&self) -> &RateServiceConfig {
        &self.inner.config
    }

    /// Current rates, fetching only when nothing fresh is held.
    ///
    /// The first call consults the persistent cache. Fallback rates are
    /// held for one check interval before another fetch is attempted here;
    /// [`RateService::refresh`] retries immediately.
    pub async fn get_rates(&self) -> RateReport {
        match self.begin(Mode::Read) {
            Step::Ready(report) => report,
            Step::Await(flight) | Step::Wait(flight) => flight.await,
            Step::Idle => self.fallback_now(),
        }
    }

    /// Fetches from the feed regardless of cache freshness.
    ///
    /// Joins a fetch that is already running instead of starting another.
    pub async fn refresh(&self) -> RateReport {
        loop {
            match self.begin(Mode::Refresh) {
                Step::Ready(report) => return report,
                Step::Await(flight) => return flight.await,
                Step::Wait(flight) => {
                    let report = flight.await;
                    if report.source != RateSource::Cache {
                        return report;
                    }
                }
                Step::Idle => return self.fallback_now(),
            }
        }
    }

    /// One staleness check. Refetches once live rates have aged past the
    /// freshness window, or fallback rates past the check interval. A flight
    /// that is already running is awaited rather than duplicated. Returns the
    /// report when a flight was started or joined.
    pub async fn tick(&self) -> Option<RateReport> {
        match self.begin(Mode::Tick) {
            Step::Await(flight) | Step::Wait(flight) => Some(flight.await),
            Step::Ready(_) | Step::Idle => None,
        }
    }

    pub fn state(&self) -> RateState {
        self.lock().phase
    }

    pub fn current(&self) -> Option<RateReport> {
        self.lock().current.clone()
    }

    pub fn error(&self) -> Option<String> {
        self.lock().current.as_ref().and_then(|r| r.error.clone())
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.lock().current.as_ref().map(RateReport::last_updated)
    }

    /// When rates were last fetched or restored from the cache. Fallback
    /// reports leave this untouched.
    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        self.lock().last_success
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn fallback_now(&self) -> RateReport {
        Inner::fallback(self.inner.clock.now())
    }

    /// Fallback rates are only held until the next check; fetched or
    /// cached rates for the whole freshness window.
    fn is_current(&self, report: &RateReport, now: DateTime<Utc>) -> bool {
        let config = &self.inner.config;
        let window = if report.is_fallback() {
            config.check_interval
        } else {
            config.freshness_window
        };
        report.snapshot.is_fresh(now, window)
    }

    fn begin(&self, mode: Mode) -> Step {
        let mut guard = self.lock();
        let state = &mut *guard;
        let now = self.inner.clock.now();

        if let Some(flight) = &state.in_flight {
            return match mode {
                Mode::Read | Mode::Tick => Step::Await(flight.future.clone()),
                Mode::Refresh if flight.fetches => Step::Await(flight.future.clone()),
                Mode::Refresh => Step::Wait(flight.future.clone()),
            };
        }

        match mode {
            Mode::Read => {
                if let Some(report) = &state.current
                    && self.is_current(report, now)
                {
                    return Step::Ready(report.clone());
                }
                let consult_cache = state.current.is_none();
                Step::Await(self.launch(state, consult_cache))
            }
            Mode::Refresh => Step::Await(self.launch(state, false)),
            Mode::Tick => {
                let due = state
                    .current
                    .as_ref()
                    .is_some_and(|report| !self.is_current(report, now));
                if !due {
                    return Step::Idle;
                }
                match state.last_success {
                    Some(last_success) => debug!(%last_success, "Rates are stale, refreshing"),
                    None => debug!("No live rates yet, retrying"),
                }
                Step::Await(self.launch(state, false))
            }
        }
    }

    fn launch(&self, state: &mut State, consult_cache: bool) -> Flight {
        if !consult_cache {
            state.phase = RateState::Fetching;
        }

        let inner = Arc::clone(&self.inner);
        let future = async move {
            let report = inner.resolve(consult_cache).await;
            inner.finish(report.clone());
            report
        }
        .boxed()
        .shared();

        state.in_flight = Some(InFlight {
            future: future.clone(),
            fetches: !consult_cache,
        });
        future
    }
}

impl Inner {
    fn fallback(now: DateTime<Utc>) -> RateReport {
        RateReport {
            snapshot: MetalRateSnapshot::fallback(now),
            source: RateSource::Fallback,
            error: Some(FALLBACK_WARNING.to_string()),
        }
    }

    async fn resolve(&self, consult_cache: bool) -> RateReport {
        if consult_cache {
            let now = self.clock.now();
            match store::load_snapshot(self.cache.as_ref(), now).await {
                Some(snapshot) if snapshot.is_fresh(now, self.config.freshness_window) => {
                    info!(last_updated = %snapshot.captured_at, "Using cached metal rates");
                    return RateReport {
                        snapshot,
                        source: RateSource::Cache,
                        error: None,
                    };
                }
                Some(snapshot) => debug!(last_updated = %snapshot.captured_at, "Cached rates expired"),
                None => debug!("No cached rates"),
            }
            self.state.lock().unwrap_or_else(|e| e.into_inner()).phase = RateState::Fetching;
        }

        match self.fetch().await {
            Ok(snapshot) => {
                if let Err(e) = store::save_snapshot(self.cache.as_ref(), &snapshot).await {
                    warn!(error = %e, "Failed to persist metal rates");
                }
                info!(
                    gold_per_gram = %snapshot.gold.per_gram,
                    silver_per_gram = %snapshot.silver.per_gram,
                    "Fetched live metal rates"
                );
                RateReport {
                    snapshot,
                    source: RateSource::Live,
                    error: None,
                }
            }
            Err(e) => {
                warn!(error = %e, "Metal rate fetch failed, using fallback rates");
                Self::fallback(self.clock.now())
            }
        }
    }

    async fn fetch(&self) -> Result<MetalRateSnapshot, ZakatError> {
        let spot = tokio::time::timeout(self.config.fetch_timeout, self.feed.fetch_spot())
            .await
            .map_err(|_| ZakatError::NetworkError("Price feed timed out".to_string()))??;
        Ok(MetalRateSnapshot::from_spot(spot, self.clock.now()))
    }

    fn finish(&self, report: RateReport) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if report.is_fallback() {
            state.phase = RateState::Fallback;
        } else {
            state.phase = RateState::CachedValid;
            state.last_success = Some(report.last_updated());
        }
        state.current = Some(report);
        state.in_flight = None;
    }
}

/// Stops the background refresh when cancelled or dropped.
#[derive(Debug)]
pub struct RefreshHandle {
    task: tokio::task::JoinHandle<()>,
}

impl RefreshHandle {
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Runs [`RateService::tick`] every `check_interval` until the returned
/// handle is cancelled or dropped. Must be called inside a Tokio runtime.
pub fn spawn_refresh_task(service: RateService) -> RefreshHandle {
    let period = service.config().check_interval;
    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            if let Some(report) = service.tick().await {
                debug!(source = ?report.source, "Background rate refresh finished");
            }
        }
    });
    RefreshHandle { task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::clock::ManualClock;
    use crate::rates::SpotPrices;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts calls and can be switched between success and failure.
    struct CountingFeed {
        calls: AtomicUsize,
        fail: std::sync::atomic::AtomicBool,
        delay: Duration,
    }

    impl CountingFeed {
        fn new() -> Arc<Self> {
            Self::with_delay(Duration::ZERO)
        }

        fn with_delay(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail: std::sync::atomic::AtomicBool::new(false),
                delay,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn set_failing(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }
    }

    #[async_trait::async_trait]
    impl PriceFeed for CountingFeed {
        async fn fetch_spot(&self) -> Result<SpotPrices, ZakatError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(ZakatError::NetworkError("offline".to_string()));
            }
            Ok(SpotPrices {
                gold_per_ounce: dec!(2500),
                silver_per_ounce: dec!(28.5),
            })
        }
    }

    fn service(feed: Arc<CountingFeed>, cache: Arc<MemoryCache>, clock: &ManualClock) -> RateService {
        RateService::with_clock(feed, cache, Arc::new(clock.clone()), RateServiceConfig::default())
    }

    #[tokio::test]
    async fn test_first_read_fetches_and_persists() {
        let feed = CountingFeed::new();
        let cache = Arc::new(MemoryCache::new());
        let clock = ManualClock::new(Utc::now());
        let service = service(feed.clone(), cache.clone(), &clock);
        assert_eq!(service.state(), RateState::Uninitialized);

        let report = service.get_rates().await;

        assert_eq!(report.source, RateSource::Live);
        assert_eq!(report.snapshot.gold_price_per_gram(), dec!(80.38));
        assert!(report.error.is_none());
        assert_eq!(service.state(), RateState::CachedValid);
        assert_eq!(feed.calls(), 1);
        assert!(cache.get(store::RATES_KEY).await.is_some());
        assert!(cache.get(store::LAST_UPDATED_KEY).await.is_some());
    }

    #[tokio::test]
    async fn test_fresh_cache_skips_network() {
        let feed = CountingFeed::new();
        let cache = Arc::new(MemoryCache::new());
        let clock = ManualClock::new(Utc::now());
        let seeded = MetalRateSnapshot::from_spot(
            SpotPrices {
                gold_per_ounce: dec!(2600),
                silver_per_ounce: dec!(30),
            },
            clock.now() - chrono::Duration::hours(2),
        );
        store::save_snapshot(cache.as_ref(), &seeded).await.unwrap();

        let service = service(feed.clone(), cache, &clock);
        let report = service.get_rates().await;

        assert_eq!(report.source, RateSource::Cache);
        assert_eq!(report.snapshot.gold.per_ounce, dec!(2600));
        assert_eq!(feed.calls(), 0);
    }

    #[tokio::test]
    async fn test_expired_cache_triggers_fetch() {
        let feed = CountingFeed::new();
        let cache = Arc::new(MemoryCache::new());
        let clock = ManualClock::new(Utc::now());
        let seeded = MetalRateSnapshot::fallback(clock.now() - chrono::Duration::hours(9));
        store::save_snapshot(cache.as_ref(), &seeded).await.unwrap();

        let report = service(feed.clone(), cache, &clock).get_rates().await;
        assert_eq!(report.source, RateSource::Live);
        assert_eq!(feed.calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_yields_fallback_without_persisting() {
        let feed = CountingFeed::new();
        feed.set_failing(true);
        let cache = Arc::new(MemoryCache::new());
        let clock = ManualClock::new(Utc::now());
        let service = service(feed.clone(), cache.clone(), &clock);

        let report = service.get_rates().await;

        assert!(report.is_fallback());
        assert_eq!(report.error.as_deref(), Some(FALLBACK_WARNING));
        assert_eq!(report.snapshot.gold.per_gram, dec!(80.38));
        assert_eq!(service.state(), RateState::Fallback);
        assert!(cache.get(store::RATES_KEY).await.is_none());

        // Held until the next check.
        service.get_rates().await;
        assert_eq!(feed.calls(), 1);

        feed.set_failing(false);
        let report = service.refresh().await;
        assert_eq!(report.source, RateSource::Live);
        assert!(service.error().is_none());
        assert_eq!(service.state(), RateState::CachedValid);
    }

    #[tokio::test]
    async fn test_concurrent_reads_share_one_fetch() {
        let feed = CountingFeed::with_delay(Duration::from_millis(50));
        let clock = ManualClock::new(Utc::now());
        let service = service(feed.clone(), Arc::new(MemoryCache::new()), &clock);

        let (a, b, c) = tokio::join!(service.get_rates(), service.get_rates(), service.refresh());

        assert_eq!(feed.calls(), 1);
        assert_eq!(a, b);
        assert_eq!(b, c);
    }

    #[tokio::test]
    async fn test_refresh_after_cached_read_still_fetches() {
        let feed = CountingFeed::new();
        let cache = Arc::new(MemoryCache::new());
        let clock = ManualClock::new(Utc::now());
        let seeded = MetalRateSnapshot::fallback(clock.now());
        store::save_snapshot(cache.as_ref(), &seeded).await.unwrap();
        let service = service(feed.clone(), cache, &clock);

        let (read, refreshed) = tokio::join!(service.get_rates(), service.refresh());

        assert_eq!(read.source, RateSource::Cache);
        assert_eq!(refreshed.source, RateSource::Live);
        assert_eq!(feed.calls(), 1);
    }

    #[tokio::test]
    async fn test_tick_refetches_once_after_window() {
        let feed = CountingFeed::new();
        let clock = ManualClock::new(Utc::now());
        let service = service(feed.clone(), Arc::new(MemoryCache::new()), &clock);

        assert!(service.tick().await.is_none());
        service.get_rates().await;

        clock.advance(chrono::Duration::hours(7));
        assert!(service.tick().await.is_none());

        clock.advance(chrono::Duration::hours(1) + chrono::Duration::seconds(1));
        let report = service.tick().await.unwrap();
        assert_eq!(report.source, RateSource::Live);
        assert!(service.tick().await.is_none());
        assert_eq!(feed.calls(), 2);
    }

    #[tokio::test]
    async fn test_failed_tick_retries_on_next_check() {
        let feed = CountingFeed::new();
        let clock = ManualClock::new(Utc::now());
        let service = service(feed.clone(), Arc::new(MemoryCache::new()), &clock);
        service.get_rates().await;
        let fetched_at = service.last_success();
        assert!(fetched_at.is_some());

        feed.set_failing(true);
        clock.advance(chrono::Duration::hours(9));
        assert!(service.tick().await.unwrap().is_fallback());
        assert_eq!(service.last_success(), fetched_at);

        clock.advance(chrono::Duration::seconds(30));
        assert!(service.tick().await.is_none());

        feed.set_failing(false);
        clock.advance(chrono::Duration::seconds(30));
        let report = service.tick().await.unwrap();
        assert_eq!(report.source, RateSource::Live);
        assert_eq!(service.state(), RateState::CachedValid);
        assert!(service.last_success() > fetched_at);
        assert_eq!(feed.calls(), 3);
    }

    #[tokio::test]
    async fn test_fallback_read_retries_after_check_interval() {
        let feed = CountingFeed::new();
        feed.set_failing(true);
        let clock = ManualClock::new(Utc::now());
        let service = service(feed.clone(), Arc::new(MemoryCache::new()), &clock);

        assert!(service.get_rates().await.is_fallback());
        assert!(service.get_rates().await.is_fallback());
        assert_eq!(feed.calls(), 1);
        assert!(service.last_success().is_none());

        feed.set_failing(false);
        clock.advance(chrono::Duration::seconds(61));
        let report = service.get_rates().await;
        assert_eq!(report.source, RateSource::Live);
        assert_eq!(feed.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_tick_is_resumed_by_the_next_one() {
        let feed = CountingFeed::with_delay(Duration::from_millis(200));
        let clock = ManualClock::new(Utc::now());
        let service = service(feed.clone(), Arc::new(MemoryCache::new()), &clock);
        service.get_rates().await;

        clock.advance(chrono::Duration::hours(9));
        let abandoned = tokio::time::timeout(Duration::from_millis(20), service.tick()).await;
        assert!(abandoned.is_err());
        assert_eq!(service.state(), RateState::Fetching);

        let report = service.tick().await.unwrap();
        assert_eq!(report.source, RateSource::Live);
        assert_eq!(service.state(), RateState::CachedValid);
        assert_eq!(feed.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_task_dropped_mid_fetch_does_not_stall_ticks() {
        let feed = CountingFeed::with_delay(Duration::from_millis(200));
        let clock = ManualClock::new(Utc::now());
        let service = service(feed.clone(), Arc::new(MemoryCache::new()), &clock);
        service.get_rates().await;

        let handle = spawn_refresh_task(service.clone());
        clock.advance(chrono::Duration::hours(9));
        tokio::time::sleep(Duration::from_millis(60_100)).await;
        assert_eq!(feed.calls(), 2);
        drop(handle);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(service.state(), RateState::Fetching);

        assert_eq!(service.tick().await.unwrap().source, RateSource::Live);
        assert_eq!(service.state(), RateState::CachedValid);
        assert_eq!(feed.calls(), 2);
    }

    #[tokio::test]
    async fn test_stuck_feed_times_out_to_fallback() {
        let feed = CountingFeed::with_delay(Duration::from_secs(60));
        let clock = ManualClock::new(Utc::now());
        let config = RateServiceConfig {
            fetch_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let service = RateService::with_clock(feed, Arc::new(MemoryCache::new()), Arc::new(clock), config);

        assert!(service.get_rates().await.is_fallback());
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_task_refreshes_and_stops_on_drop() {
        let feed = CountingFeed::new();
        let clock = ManualClock::new(Utc::now());
        let service = service(feed.clone(), Arc::new(MemoryCache::new()), &clock);
        service.get_rates().await;

        let handle = spawn_refresh_task(service.clone());
        clock.advance(chrono::Duration::hours(8));
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(feed.calls(), 2);

        drop(handle);
        clock.advance(chrono::Duration::hours(8));
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(feed.calls(), 2);
    }
}
