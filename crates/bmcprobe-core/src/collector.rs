//! One complete collection: discover, sample, record.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crate::client::TelemetryClient;
use crate::config::{CollectConfig, EmptyDiscoveryPolicy};
use crate::discovery::{Discovery, discover};
use crate::engine::{SampleRun, SamplingEngine, TickReport};
use crate::error::CollectError;
use crate::session::{RunOutput, RunRecorder};

/// Everything a finished collection produced.
#[derive(Debug, Clone)]
pub struct Collection {
    pub discovery: Discovery,
    pub run: SampleRun,
    pub output: RunOutput,
}

pub struct Collector {
    client: Arc<dyn TelemetryClient>,
    config: CollectConfig,
    stop: Option<Arc<AtomicBool>>,
}

impl Collector {
    /// Rejects an invalid configuration before any request is made.
    pub fn new(client: Arc<dyn TelemetryClient>, config: CollectConfig) -> Result<Self, CollectError> {
        config.validate()?;
        Ok(Self {
            client,
            config,
            stop: None,
        })
    }

    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop = Some(flag);
        self
    }

    pub fn config(&self) -> &CollectConfig {
        &self.config
    }

    /// Discover endpoints and apply the empty-discovery policy.
    pub fn discover(&self) -> Result<Discovery, CollectError> {
        let discovery = discover(self.client.as_ref());
        if discovery.is_empty() {
            match self.config.on_empty {
                EmptyDiscoveryPolicy::Fatal => return Err(CollectError::NoEndpoints),
                EmptyDiscoveryPolicy::Warn => {
                    log::warn!("Discovery found no endpoints; continuing with an empty run");
                }
            }
        }
        Ok(discovery)
    }

    /// Sample the discovered endpoints for the configured duration.
    pub fn sample<F>(&self, discovery: &Discovery, observer: F) -> SampleRun
    where
        F: FnMut(&TickReport),
    {
        let mut engine = SamplingEngine::new(
            Arc::clone(&self.client),
            discovery.endpoints(),
            self.config.engine_config(),
        );
        if let Some(flag) = &self.stop {
            engine = engine.with_stop_flag(Arc::clone(flag));
        }
        engine.run_with_observer(observer)
    }

    /// Discover, sample, and write the run's tables and summary under the
    /// configured output directory, naming files after `host`.
    pub fn collect<F>(&self, host: &str, observer: F) -> Result<Collection, CollectError>
    where
        F: FnMut(&TickReport),
    {
        let discovery = self.discover()?;
        let recorder = RunRecorder::start(&self.config.output_dir, host, self.config.sample_hz)
            .with_discovery_warnings(&discovery.warnings);
        let run = self.sample(&discovery, observer);
        let output = recorder.finish(&run)?;
        Ok(Collection {
            discovery,
            run,
            output,
        })
    }
}
