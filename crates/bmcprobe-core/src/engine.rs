//! Fixed-cadence sampling engine.
//!
//! One controlling thread drives ticks. Each tick fans out one fetch per
//! endpoint over a [`WorkerPool`], joins, and merges every outcome into the
//! [`SeriesStore`] at a single elapsed time taken when the tick started.
//! Failures are contained per endpoint and never abort the run.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::client::TelemetryClient;
use crate::endpoint::Endpoint;
use crate::error::FetchError;
use crate::extract::{Decoded, Extraction, extract, primary_column};
use crate::pool::WorkerPool;
use crate::store::{Domain, SeriesStore};

/// Longest uninterrupted sleep between stop-flag checks.
const STOP_POLL: Duration = Duration::from_millis(20);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub duration: Duration,
    pub cadence_hz: f64,
    pub max_workers: usize,
}

impl EngineConfig {
    /// Target tick period. Zero for a non-positive cadence, saturating at
    /// `Duration::MAX` for one too slow to represent.
    pub fn period(&self) -> Duration {
        if self.cadence_hz.is_finite() && self.cadence_hz > 0.0 {
            Duration::try_from_secs_f64(1.0 / self.cadence_hz).unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Complete,
}

/// Per-run counters gathered alongside the store.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunStats {
    pub ticks: u64,
    pub fetches: u64,
    /// Failed fetches per endpoint identity; endpoints that never failed are absent.
    pub failures: BTreeMap<String, u64>,
    /// Ticks whose processing exceeded the cadence period.
    pub overruns: u64,
    pub wall_time: Duration,
    /// The run ended on the stop flag rather than the duration.
    pub stopped: bool,
}

impl RunStats {
    pub fn failure_count(&self) -> u64 {
        self.failures.values().sum()
    }
}

/// Output of [`SamplingEngine::run`].
#[derive(Debug, Clone)]
pub struct SampleRun {
    pub store: SeriesStore,
    pub stats: RunStats,
    /// The sampled endpoints, with units resolved from responses where possible.
    pub endpoints: Vec<Endpoint>,
}

/// What the observer sees after each tick's join.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub index: u64,
    pub elapsed: f64,
    pub readings: Vec<Extraction>,
    pub failed: Vec<String>,
}

pub struct SamplingEngine {
    client: Arc<dyn TelemetryClient>,
    endpoints: Vec<Endpoint>,
    /// Columns each endpoint has produced so far, indexed like `endpoints`.
    owned: Vec<BTreeSet<(Domain, String)>>,
    config: EngineConfig,
    pool: WorkerPool,
    stop: Option<Arc<AtomicBool>>,
    state: RunState,
}

impl SamplingEngine {
    pub fn new(
        client: Arc<dyn TelemetryClient>,
        endpoints: Vec<Endpoint>,
        config: EngineConfig,
    ) -> Self {
        let owned = endpoints
            .iter()
            .map(|e| primary_column(e).into_iter().collect())
            .collect();
        Self {
            client,
            endpoints,
            owned,
            pool: WorkerPool::new(config.max_workers),
            config,
            stop: None,
            state: RunState::Idle,
        }
    }

    /// Stop after the in-flight tick once `flag` becomes `true`.
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn run(&mut self) -> SampleRun {
        self.run_with_observer(|_| {})
    }

    /// Run to completion, calling `observer` on this thread after every tick.
    ///
    /// An engine runs once; calling this again after completion returns an
    /// empty run without touching the client.
    pub fn run_with_observer<F>(&mut self, mut observer: F) -> SampleRun
    where
        F: FnMut(&TickReport),
    {
        let mut store = SeriesStore::new();
        let mut stats = RunStats::default();
        if self.state != RunState::Idle {
            log::warn!("Sampling engine already ran; ignoring second run");
            return self.finish(store, stats);
        }
        self.state = RunState::Running;

        let period = self.config.period();
        if self.endpoints.is_empty() && !self.config.duration.is_zero() {
            log::warn!(
                "No endpoints to sample; idling for {:.1}s",
                self.config.duration.as_secs_f64()
            );
        } else {
            log::info!(
                "Sampling {} endpoints at {} Hz for {:.1}s ({} workers)",
                self.endpoints.len(),
                self.config.cadence_hz,
                self.config.duration.as_secs_f64(),
                self.pool.capacity().min(self.endpoints.len().max(1)),
            );
        }

        let run_start = Instant::now();
        loop {
            if self.stop_requested() {
                stats.stopped = true;
                break;
            }
            let tick_start = Instant::now();
            let since_start = tick_start.duration_since(run_start);
            if since_start >= self.config.duration {
                break;
            }
            let elapsed = since_start.as_secs_f64();

            let report = self.tick(stats.ticks, elapsed, &mut store, &mut stats);
            observer(&report);
            stats.ticks += 1;

            let busy = tick_start.elapsed();
            if busy > period {
                stats.overruns += 1;
                log::debug!(
                    "Tick {} took {}ms, longer than the {}ms period",
                    report.index,
                    busy.as_millis(),
                    period.as_millis()
                );
            }
            let remaining = self.config.duration.saturating_sub(run_start.elapsed());
            self.sleep(period.saturating_sub(busy).min(remaining));
        }

        stats.wall_time = run_start.elapsed();
        log::info!(
            "Sampling complete: {} ticks, {} failed fetches in {:.1}s",
            stats.ticks,
            stats.failure_count(),
            stats.wall_time.as_secs_f64()
        );
        self.finish(store, stats)
    }

    fn tick(
        &mut self,
        index: u64,
        elapsed: f64,
        store: &mut SeriesStore,
        stats: &mut RunStats,
    ) -> TickReport {
        store.mark_tick(elapsed);
        let client = self.client.as_ref();
        let outcomes = self.pool.map(&self.endpoints, |endpoint| fetch(client, endpoint));
        stats.fetches += outcomes.len() as u64;

        let mut report = TickReport {
            index,
            elapsed,
            readings: Vec::new(),
            failed: Vec::new(),
        };

        for (i, outcome) in outcomes.into_iter().enumerate() {
            let outcome = outcome.unwrap_or(Err(FetchError::WorkerPanic));
            let endpoint = &mut self.endpoints[i];
            match outcome {
                Ok(decoded) => {
                    if endpoint.units.is_none() && decoded.units.is_some() {
                        endpoint.units = decoded.units;
                    }
                    for reading in decoded.readings {
                        store.record(reading.domain, &reading.identity, elapsed, reading.value);
                        self.owned[i].insert((reading.domain, reading.identity.clone()));
                        report.readings.push(reading);
                    }
                }
                Err(e) => {
                    log::warn!("{} failed at {elapsed:.3}s: {e}", endpoint.identity);
                    *stats.failures.entry(endpoint.identity.clone()).or_default() += 1;
                    for (domain, identity) in &self.owned[i] {
                        store.record(*domain, identity, elapsed, None);
                    }
                    report.failed.push(endpoint.identity.clone());
                }
            }
        }
        report
    }

    fn stop_requested(&self) -> bool {
        self.stop
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn sleep(&self, total: Duration) {
        let deadline = Instant::now() + total;
        loop {
            let now = Instant::now();
            if now >= deadline || self.stop_requested() {
                return;
            }
            std::thread::sleep((deadline - now).min(STOP_POLL));
        }
    }

    fn finish(&mut self, store: SeriesStore, stats: RunStats) -> SampleRun {
        self.state = RunState::Complete;
        SampleRun {
            store,
            stats,
            endpoints: self.endpoints.clone(),
        }
    }
}

fn fetch(client: &dyn TelemetryClient, endpoint: &Endpoint) -> Result<Decoded, FetchError> {
    let doc = client.get_json(&endpoint.resource_path)?;
    Ok(extract(endpoint, &doc)?)
}
