//! # bmcprobe-core
//!
//! Samples power, temperature and fan telemetry from a Redfish BMC at a fixed
//! cadence and aligns the readings into per-domain time series.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use bmcprobe_core::{CollectConfig, Collector, Credentials, RedfishClient};
//!
//! let mut client = RedfishClient::new("bmc-node17", Duration::from_secs(10), false)?;
//! client.login(&Credentials::new("admin", "secret"))?;
//!
//! let config = CollectConfig {
//!     duration: Duration::from_secs(60),
//!     ..CollectConfig::default()
//! };
//! let collection = Collector::new(Arc::new(client), config)?
//!     .collect("bmc-node17", |tick| println!("tick {} at {:.1}s", tick.index, tick.elapsed))?;
//! println!("{} ticks", collection.run.stats.ticks);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! Discovery → Sampling engine (worker pool per tick) → Series store → CSV + JSON
//!
//! Every remote read goes through the [`TelemetryClient`] trait, so the
//! engine runs unchanged against a live BMC or an in-memory double.

pub mod client;
pub mod collector;
pub mod config;
pub mod discovery;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod extract;
pub mod pool;
pub mod session;
pub mod store;

#[cfg(test)]
mod testing;

pub use client::{Credentials, RedfishClient, RemoteResponse, TelemetryClient};
pub use collector::{Collection, Collector};
pub use config::{CollectConfig, EmptyDiscoveryPolicy};
pub use discovery::{Discovery, classify_sensor, discover};
pub use endpoint::{Board, Endpoint, ResourceShape, TelemetryKind, Units};
pub use engine::{EngineConfig, RunState, RunStats, SampleRun, SamplingEngine, TickReport};
pub use error::{AuthError, CollectError, ConfigError, FetchError, ParseError, TransportError};
pub use extract::{Decoded, Extraction, extract};
pub use pool::WorkerPool;
pub use session::{RunMeta, RunOutput, RunRecorder, host_label};
pub use store::{Domain, Elapsed, Series, SeriesStore, Table};

/// Library version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
