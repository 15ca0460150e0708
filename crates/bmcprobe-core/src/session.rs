//! Run recording.
//!
//! A finished run is written into the output directory as one CSV table per
//! non-empty domain plus a JSON summary:
//!
//! - `{host}_{Domain}.csv`: `elapsed_s` then one column per identity
//! - `{host}_session.json`: [`RunMeta`]

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::SampleRun;
use crate::error::CollectError;

pub const META_VERSION: u32 = 1;

// ---------------------------------------------------------------------------
// Run metadata (session.json)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndpointMeta {
    pub identity: String,
    pub kind: String,
    pub path: String,
    pub units: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbsentCount {
    pub domain: String,
    pub identity: String,
    pub count: usize,
}

/// Summary written next to the CSV tables when a run ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub version: u32,
    pub id: String,
    pub host: String,
    pub started_at: String,
    pub ended_at: String,
    pub duration_ms: u64,
    pub sample_hz: f64,
    pub ticks: u64,
    pub fetches: u64,
    pub stopped_early: bool,
    pub endpoints: Vec<EndpointMeta>,
    pub absent_samples: Vec<AbsentCount>,
    pub failures: BTreeMap<String, u64>,
    pub discovery_warnings: Vec<String>,
    pub tables: Vec<String>,
    pub bmcprobe_version: String,
}

/// Files produced by [`RunRecorder::finish`].
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub tables: Vec<PathBuf>,
    pub summary: PathBuf,
    pub meta: RunMeta,
}

// ---------------------------------------------------------------------------
// Recorder
// ---------------------------------------------------------------------------

/// Tracks wall-clock bounds of a run and writes its output.
pub struct RunRecorder {
    output_dir: PathBuf,
    host: String,
    id: String,
    sample_hz: f64,
    started_at: SystemTime,
    started_instant: Instant,
    discovery_warnings: Vec<String>,
}

impl RunRecorder {
    /// Start timing a run. `host` is the BMC hostname as given by the user.
    pub fn start(output_dir: impl Into<PathBuf>, host: &str, sample_hz: f64) -> Self {
        Self {
            output_dir: output_dir.into(),
            host: host_label(host),
            id: Uuid::new_v4().to_string(),
            sample_hz,
            started_at: SystemTime::now(),
            started_instant: Instant::now(),
            discovery_warnings: Vec::new(),
        }
    }

    pub fn with_discovery_warnings(mut self, warnings: &[String]) -> Self {
        self.discovery_warnings = warnings.to_vec();
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn table_path(&self, domain: &str) -> PathBuf {
        self.output_dir.join(format!("{}_{domain}.csv", self.host))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}_session.json", self.host))
    }

    /// Write every non-empty domain table and the summary.
    pub fn finish(self, run: &SampleRun) -> Result<RunOutput, CollectError> {
        fs::create_dir_all(&self.output_dir).map_err(|source| CollectError::Io {
            path: self.output_dir.display().to_string(),
            source,
        })?;

        let mut tables = Vec::new();
        for (domain, table) in run.store.export() {
            let path = self.table_path(domain.as_str());
            let io_err = |source| CollectError::Io {
                path: path.display().to_string(),
                source,
            };
            let file = File::create(&path).map_err(io_err)?;
            table.write_csv(BufWriter::new(file)).map_err(io_err)?;
            log::info!(
                "Wrote {} ({} rows x {} columns)",
                path.display(),
                table.rows.len(),
                table.columns.len()
            );
            tables.push(path);
        }

        let meta = self.meta(run, &tables);
        let summary = self.summary_path();
        let json = serde_json::to_string_pretty(&meta)?;
        fs::write(&summary, json).map_err(|source| CollectError::Io {
            path: summary.display().to_string(),
            source,
        })?;

        Ok(RunOutput {
            tables,
            summary,
            meta,
        })
    }

    fn meta(&self, run: &SampleRun, tables: &[PathBuf]) -> RunMeta {
        let ended_at = SystemTime::now();
        let endpoints = run
            .endpoints
            .iter()
            .map(|e| EndpointMeta {
                identity: e.identity.clone(),
                kind: e.kind.to_string(),
                path: e.resource_path.clone(),
                units: e.units.map(|u| u.to_string()),
            })
            .collect();
        let absent_samples = run
            .store
            .absent_counts()
            .into_iter()
            .map(|((domain, identity), count)| AbsentCount {
                domain: domain.to_string(),
                identity,
                count,
            })
            .collect();

        RunMeta {
            version: META_VERSION,
            id: self.id.clone(),
            host: self.host.clone(),
            started_at: format_iso8601(since_epoch(self.started_at)),
            ended_at: format_iso8601(since_epoch(ended_at)),
            duration_ms: self.started_instant.elapsed().as_millis() as u64,
            sample_hz: self.sample_hz,
            ticks: run.stats.ticks,
            fetches: run.stats.fetches,
            stopped_early: run.stats.stopped,
            endpoints,
            absent_samples,
            failures: run.stats.failures.clone(),
            discovery_warnings: self.discovery_warnings.clone(),
            tables: tables
                .iter()
                .filter_map(|p| p.file_name())
                .map(|n| n.to_string_lossy().into_owned())
                .collect(),
            bmcprobe_version: crate::VERSION.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// File-name prefix for a BMC: the hostname without `bmc` and `-`.
///
/// `bmc-node17` becomes `node17`. A hostname that would reduce to nothing is
/// used as-is. Any scheme is dropped and path separators become `_`.
pub fn host_label(hostname: &str) -> String {
    let bare = hostname
        .split_once("://")
        .map_or(hostname, |(_, rest)| rest)
        .trim_end_matches('/');
    let stripped = bare.replace("bmc", "").replace('-', "");
    let label = if stripped.is_empty() { bare } else { &stripped };
    label.replace(['/', ':', '\\'], "_")
}

fn since_epoch(t: SystemTime) -> Duration {
    t.duration_since(UNIX_EPOCH).unwrap_or_default()
}

/// `2026-02-15T01:30:00Z`
fn format_iso8601(since_epoch: Duration) -> String {
    let secs = since_epoch.as_secs();
    let (year, month, day) = civil_from_days((secs / 86_400) as i64);
    let rem = secs % 86_400;
    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}Z",
        rem / 3600,
        (rem / 60) % 60,
        rem % 60
    )
}

/// Days since 1970-01-01 to a proleptic Gregorian (year, month, day).
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = yoe + era * 400 + i64::from(month <= 2);
    (year, month, day)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
