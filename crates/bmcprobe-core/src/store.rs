//! In-memory series store.
//!
//! Maps `(domain, identity)` to an elapsed-ordered series of optional
//! values. Owned and mutated only by the thread driving the sampling loop;
//! read-only once the run completes.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::{self, Write};

use serde::{Deserialize, Serialize};

/// Export grouping of endpoints. One table per domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Domain {
    Power,
    PowerSupplies,
    Temperatures,
    Fans,
    Sensors,
}

impl Domain {
    pub const ALL: [Domain; 5] = [
        Domain::Power,
        Domain::PowerSupplies,
        Domain::Temperatures,
        Domain::Fans,
        Domain::Sensors,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Power => "Power",
            Self::PowerSupplies => "PowerSupplies",
            Self::Temperatures => "Temperatures",
            Self::Fans => "Fans",
            Self::Sensors => "Sensors",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Seconds since run start, totally ordered so it can key a map.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Elapsed(pub f64);

impl Elapsed {
    pub fn secs(self) -> f64 {
        self.0
    }
}

impl PartialEq for Elapsed {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Elapsed {}

impl PartialOrd for Elapsed {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Elapsed {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl From<f64> for Elapsed {
    fn from(secs: f64) -> Self {
        Self(secs)
    }
}

/// One endpoint column: elapsed → value, `None` for an absent read.
pub type Series = BTreeMap<Elapsed, Option<f64>>;

#[derive(Debug, Clone, Default)]
pub struct SeriesStore {
    series: BTreeMap<Domain, BTreeMap<String, Series>>,
    /// Elapsed times of every sampling tick, whether or not it produced a sample.
    ticks: BTreeSet<Elapsed>,
}

impl SeriesStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one sample. Re-recording the same `(domain, identity, elapsed)`
    /// replaces the earlier value.
    pub fn record(
        &mut self,
        domain: Domain,
        identity: &str,
        elapsed: impl Into<Elapsed>,
        value: Option<f64>,
    ) {
        self.series
            .entry(domain)
            .or_default()
            .entry(identity.to_string())
            .or_default()
            .insert(elapsed.into(), value);
    }

    /// Note that a tick ran at `elapsed`. Every exported table gets a row
    /// for it, with absent cells where nothing was recorded.
    pub fn mark_tick(&mut self, elapsed: impl Into<Elapsed>) {
        self.ticks.insert(elapsed.into());
    }

    pub fn tick_count(&self) -> usize {
        self.ticks.len()
    }

    pub fn series(&self, domain: Domain, identity: &str) -> Option<&Series> {
        self.series.get(&domain)?.get(identity)
    }

    /// Identities recorded under `domain`, sorted.
    pub fn identities(&self, domain: Domain) -> Vec<&str> {
        self.series
            .get(&domain)
            .map(|cols| cols.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.series.values().all(BTreeMap::is_empty)
    }

    /// Total number of samples, absent ones included.
    pub fn sample_count(&self) -> usize {
        self.series
            .values()
            .flat_map(BTreeMap::values)
            .map(BTreeMap::len)
            .sum()
    }

    /// Number of absent samples per column, for columns with at least one.
    /// A marked tick with nothing recorded for the column counts as absent.
    pub fn absent_counts(&self) -> BTreeMap<(Domain, String), usize> {
        let mut counts = BTreeMap::new();
        for (domain, cols) in &self.series {
            for (identity, series) in cols {
                let unrecorded = self.ticks.iter().filter(|t| !series.contains_key(t)).count();
                let absent = unrecorded + series.values().filter(|v| v.is_none()).count();
                if absent > 0 {
                    counts.insert((*domain, identity.clone()), absent);
                }
            }
        }
        counts
    }

    /// One table per non-empty domain: rows are the marked ticks plus any
    /// other elapsed time recorded in the domain, columns the identities;
    /// missing cells are `None`.
    pub fn export(&self) -> BTreeMap<Domain, Table> {
        self.series
            .iter()
            .filter(|(_, cols)| !cols.is_empty())
            .map(|(domain, cols)| (*domain, Table::from_columns(cols, &self.ticks)))
            .collect()
    }
}

/// Rectangular view of one domain.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub elapsed: f64,
    pub cells: Vec<Option<f64>>,
}

impl Table {
    fn from_columns(cols: &BTreeMap<String, Series>, ticks: &BTreeSet<Elapsed>) -> Self {
        let mut times = ticks.clone();
        times.extend(cols.values().flat_map(|s| s.keys().copied()));
        let rows = times
            .into_iter()
            .map(|t| Row {
                elapsed: t.secs(),
                cells: cols.values().map(|s| s.get(&t).copied().flatten()).collect(),
            })
            .collect();

        Self {
            columns: cols.keys().cloned().collect(),
            rows,
        }
    }

    pub fn column_index(&self, identity: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == identity)
    }

    /// Write as CSV: `elapsed_s` then one column per identity; absent cells
    /// are empty fields.
    pub fn write_csv<W: Write>(&self, mut out: W) -> io::Result<()> {
        let header: Vec<String> = std::iter::once("elapsed_s".to_string())
            .chain(self.columns.iter().map(|c| csv_field(c)))
            .collect();
        writeln!(out, "{}", header.join(","))?;

        for row in &self.rows {
            write!(out, "{:.3}", row.elapsed)?;
            for cell in &row.cells {
                match cell {
                    Some(v) => write!(out, ",{v}")?,
                    None => write!(out, ",")?,
                }
            }
            writeln!(out)?;
        }
        out.flush()
    }
}

fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}
