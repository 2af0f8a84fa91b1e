//! Bounded-concurrency batch execution with result caching.

use crate::batch::BatchResult;
use crate::config::SchedulerConfig;
use crate::unit::WorkUnit;
use futures::future::{join_all, try_join_all};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use taskmill_cache::{CacheConfig, CacheStats, ResultCache};
use taskmill_config::Settings;
use taskmill_core::{Error, FailurePolicy, Result, ResultExt};
use taskmill_utils::tracing::{batch_span, cache_event, unit_span};
use tokio::sync::Semaphore;
use tokio::time::{timeout_at, Instant};
use tracing::Instrument;

/// Runs batches of independent units with at most `concurrency` executing
/// at once
///
/// All units of a batch are polled from the calling task, so they interleave
/// only where they await. A unit whose fingerprint has a live cache entry is
/// answered from the cache without taking a slot.
#[derive(Debug, Clone)]
pub struct TaskScheduler {
    config: SchedulerConfig,
    cache: Option<Arc<ResultCache>>,
}

impl TaskScheduler {
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cache: None,
        })
    }

    /// Scheduler from loaded settings, opening the result cache if enabled
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let scheduler = Self::new(SchedulerConfig::from_settings(&settings.scheduler))?;
        if !settings.cache.enabled {
            return Ok(scheduler);
        }
        let cache = ResultCache::open(CacheConfig::from_settings(&settings.cache))?;
        Ok(scheduler.with_cache(Arc::new(cache)))
    }

    pub fn with_cache(mut self, cache: Arc<ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn cache(&self) -> Option<&Arc<ResultCache>> {
        self.cache.as_ref()
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(|cache| cache.stats())
    }

    pub async fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear().await;
            tracing::info!("cache cleared");
        }
    }

    /// Execute `units` and return their results in submission order
    ///
    /// With [`FailurePolicy::Isolate`] every unit gets a slot in the result,
    /// failed or not. With [`FailurePolicy::Abort`] the first failure cancels
    /// the units still in flight and is returned as the error.
    pub async fn run<'a, T>(&self, units: Vec<WorkUnit<'a, T>>) -> Result<BatchResult<T>>
    where
        T: Serialize + DeserializeOwned + 'a,
    {
        let total = units.len();
        let span = batch_span(total, self.config.concurrency);

        async move {
            tracing::info!(
                policy = %self.config.failure_policy,
                "starting {total} units with at most {} concurrent",
                self.config.concurrency
            );

            let semaphore = Semaphore::new(self.config.concurrency);
            let deadline = self.config.timeout.map(|limit| (Instant::now() + limit, limit));

            let slots = units.into_iter().enumerate().map(|(index, unit)| {
                self.execute(index, unit, &semaphore, deadline)
            });

            let outcomes = match self.config.failure_policy {
                FailurePolicy::Isolate => join_all(slots).await,
                FailurePolicy::Abort => {
                    let slots = slots.enumerate().map(|(index, slot)| async move {
                        match slot.await {
                            (Ok(value), cached) => Ok((Ok(value), cached)),
                            (Err(error), _) => Err(error).context(format!("unit {index} failed")),
                        }
                    });
                    try_join_all(slots).await.inspect_err(|error| {
                        tracing::error!(error = %error, "batch aborted");
                    })?
                }
            };

            let (results, from_cache): (Vec<_>, Vec<_>) = outcomes.into_iter().unzip();
            let batch = BatchResult::new(results, from_cache);
            tracing::info!(
                failures = batch.failures(),
                cache_hits = batch.cache_hits(),
                "completed {total} units"
            );
            Ok(batch)
        }
        .instrument(span)
        .await
    }

    /// Run one unit; the flag reports whether the value came from the cache
    async fn execute<'a, T>(
        &self,
        index: usize,
        unit: WorkUnit<'a, T>,
        semaphore: &Semaphore,
        deadline: Option<(Instant, Duration)>,
    ) -> (Result<T>, bool)
    where
        T: Serialize + DeserializeOwned + 'a,
    {
        let operation = unit.operation().to_string();
        let span = unit_span(index, &operation);

        async move {
            let attempt = self.execute_unbounded(unit, semaphore);
            let outcome = match deadline {
                Some((at, limit)) => match timeout_at(at, attempt).await {
                    Ok(outcome) => outcome,
                    Err(_) => (Err(Error::timeout(operation.as_str(), limit)), false),
                },
                None => attempt.await,
            };

            if let (Err(error), _) = &outcome {
                tracing::warn!(kind = %error.kind(), error = %error, "unit failed");
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn execute_unbounded<'a, T>(
        &self,
        unit: WorkUnit<'a, T>,
        semaphore: &Semaphore,
    ) -> (Result<T>, bool)
    where
        T: Serialize + DeserializeOwned + 'a,
    {
        let cache = self.cache.as_deref().filter(|_| unit.is_cacheable());
        let key = unit.fingerprint().to_string();
        let operation = unit.operation().to_string();

        if let Some(cache) = cache {
            if let Some(value) = cache.get_as::<T>(&key) {
                cache_event(&operation, &key, true);
                return (Ok(value), true);
            }
            cache_event(&operation, &key, false);
        }

        let result = {
            let _permit = match semaphore.acquire().await {
                Ok(permit) => permit,
                Err(_) => {
                    return (
                        Err(Error::cancelled(operation, "scheduler slots closed")),
                        false,
                    )
                }
            };
            tracing::debug!(operation = %operation, "executing");
            unit.into_future().await
        };

        if let (Some(cache), Ok(value)) = (cache, &result) {
            cache.set(&key, value).await;
        }
        (result, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use taskmill_core::ErrorKind;
    use tempfile::TempDir;
    use tokio::time::sleep;

    fn scheduler(concurrency: usize) -> TaskScheduler {
        TaskScheduler::new(SchedulerConfig::with_concurrency(concurrency)).unwrap()
    }

    fn sleeper(label: &'static str, millis: u64) -> WorkUnit<'static, String> {
        WorkUnit::new("sleep", (label, millis), |(label, millis): (&'static str, u64)| async move {
            sleep(Duration::from_millis(millis)).await;
            Ok(label.to_string())
        })
        .unwrap()
    }

    fn cached_scheduler(dir: &TempDir) -> TaskScheduler {
        let cache = ResultCache::open(CacheConfig::at(dir.path().join("cache.json"))).unwrap();
        scheduler(2).with_cache(Arc::new(cache))
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        assert!(TaskScheduler::new(SchedulerConfig::with_concurrency(0)).is_err());
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let batch = scheduler(3).run::<()>(Vec::new()).await.unwrap();
        assert!(batch.is_empty());
    }

    #[tokio::test]
    async fn test_results_follow_submission_order() {
        let units = vec![sleeper("A", 300), sleeper("B", 50), sleeper("C", 150)];

        let values = scheduler(3).run(units).await.unwrap().into_values().unwrap();

        assert_eq!(values, vec!["A", "B", "C"]);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let active = Rc::new(Cell::new(0usize));
        let peak = Rc::new(Cell::new(0usize));

        let units = (0..10)
            .map(|i| {
                let active = Rc::clone(&active);
                let peak = Rc::clone(&peak);
                WorkUnit::new("work", i, move |i: u32| async move {
                    active.set(active.get() + 1);
                    peak.set(peak.get().max(active.get()));
                    sleep(Duration::from_millis(200)).await;
                    active.set(active.get() - 1);
                    Ok(i)
                })
                .unwrap()
            })
            .collect();

        let started = std::time::Instant::now();
        let batch = scheduler(3).run(units).await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(700));
        assert_eq!(peak.get(), 3);
        assert_eq!(batch.into_values().unwrap(), (0..10).collect::<Vec<u32>>());
    }

    #[tokio::test]
    async fn test_isolate_keeps_other_results() {
        let units = vec![
            sleeper("A", 10),
            WorkUnit::new("broken", (), |_| async {
                Err(Error::malformed_data("bad row"))
            })
            .unwrap(),
            sleeper("C", 10),
        ];

        let batch = scheduler(2).run(units).await.unwrap();

        assert_eq!(batch.failures(), 1);
        let results = batch.into_results();
        assert_eq!(results[0].as_ref().unwrap(), "A");
        assert_eq!(
            results[1].as_ref().unwrap_err().kind(),
            ErrorKind::MalformedData
        );
        assert_eq!(results[2].as_ref().unwrap(), "C");
    }

    #[tokio::test]
    async fn test_abort_cancels_in_flight_units() {
        let finished = Rc::new(Cell::new(false));
        let flag = Rc::clone(&finished);

        let units = vec![
            WorkUnit::new("slow", (), move |_| async move {
                sleep(Duration::from_secs(2)).await;
                flag.set(true);
                Ok(1)
            })
            .unwrap(),
            WorkUnit::new("fails", (), |_| async {
                sleep(Duration::from_millis(20)).await;
                Err(Error::network("api", "connection refused"))
            })
            .unwrap(),
        ];

        let config = SchedulerConfig {
            concurrency: 2,
            failure_policy: FailurePolicy::Abort,
            timeout: None,
        };
        let started = std::time::Instant::now();
        let err = TaskScheduler::new(config).unwrap().run(units).await.unwrap_err();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(err.kind(), ErrorKind::TransientConnection);
        assert!(!finished.get());
    }

    #[tokio::test]
    async fn test_batch_timeout_marks_unfinished_units() {
        let config = SchedulerConfig {
            concurrency: 2,
            failure_policy: FailurePolicy::Isolate,
            timeout: Some(Duration::from_millis(100)),
        };
        let units = vec![sleeper("fast", 10), sleeper("slow", 5_000)];

        let batch = TaskScheduler::new(config).unwrap().run(units).await.unwrap();
        let results = batch.into_results();

        assert_eq!(results[0].as_ref().unwrap(), "fast");
        assert_eq!(results[1].as_ref().unwrap_err().kind(), ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_cache_short_circuits_second_run() {
        let temp_dir = TempDir::new().unwrap();
        let scheduler = cached_scheduler(&temp_dir);
        let calls = Arc::new(AtomicUsize::new(0));

        let unit = || {
            let calls = Arc::clone(&calls);
            WorkUnit::new("lookup", "isbn:123", move |_| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("Dune".to_string())
            })
            .unwrap()
        };

        let first = scheduler.run(vec![unit()]).await.unwrap();
        let second = scheduler.run(vec![unit()]).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!first.was_cached(0));
        assert!(second.was_cached(0));
        assert_eq!(second.into_values().unwrap(), vec!["Dune".to_string()]);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let temp_dir = TempDir::new().unwrap();
        let scheduler = cached_scheduler(&temp_dir);
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = Arc::clone(&calls);
            let unit = WorkUnit::new("flaky", (), move |_| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<u8, _>(Error::network("api", "reset"))
            })
            .unwrap();
            scheduler.run(vec![unit]).await.unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.cache_stats().unwrap().total_entries, 0);
    }

    #[tokio::test]
    async fn test_uncached_units_always_run() {
        let temp_dir = TempDir::new().unwrap();
        let scheduler = cached_scheduler(&temp_dir);
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = Arc::clone(&calls);
            let unit = WorkUnit::new("clock", (), move |_| async move {
                Ok(calls.fetch_add(1, Ordering::SeqCst))
            })
            .unwrap()
            .uncached();
            scheduler.run(vec![unit]).await.unwrap();
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cache_hits_take_no_slot() {
        use futures::FutureExt;

        let temp_dir = TempDir::new().unwrap();
        let scheduler = cached_scheduler(&temp_dir);
        let warm = WorkUnit::new("warm", 1, |n: u32| async move { Ok(n) }).unwrap();
        scheduler.run(vec![warm]).await.unwrap();

        // no permits at all: anything that waits for a slot stays pending
        let exhausted = Semaphore::new(0);

        let hit = WorkUnit::new("warm", 1, |_: u32| async { Ok(99) }).unwrap();
        let (value, cached) = scheduler
            .execute_unbounded(hit, &exhausted)
            .now_or_never()
            .expect("cache hit should resolve without a permit");
        assert_eq!(value.unwrap(), 1);
        assert!(cached);

        let miss = WorkUnit::new("cold", 2, |n: u32| async move { Ok(n) }).unwrap();
        assert!(scheduler
            .execute_unbounded(miss, &exhausted)
            .now_or_never()
            .is_none());
    }

    #[tokio::test]
    async fn test_clear_cache_passthrough() {
        let temp_dir = TempDir::new().unwrap();
        let scheduler = cached_scheduler(&temp_dir);
        let unit = WorkUnit::new("x", 1, |n: u32| async move { Ok(n) }).unwrap();
        scheduler.run(vec![unit]).await.unwrap();
        assert_eq!(scheduler.cache_stats().unwrap().total_entries, 1);

        scheduler.clear_cache().await;
        assert_eq!(scheduler.cache_stats().unwrap().total_entries, 0);
    }
}
