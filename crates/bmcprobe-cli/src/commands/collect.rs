//! `bmcprobe` default mode: discover, sample for the configured duration,
//! write CSV tables and a session summary.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bmcprobe_core::{
    CollectConfig, CollectError, Collection, Collector, EmptyDiscoveryPolicy, SampleRun,
    TickReport,
};

use super::{EXIT_CONFIG, EXIT_FAILURE, EXIT_OK, Target, connect};

/// Sampling options, as given on the command line.
pub struct CollectCommandConfig<'a> {
    pub collect_duration: i64,
    pub sample_hz: f64,
    pub max_workers: usize,
    pub output_dir: &'a str,
    pub on_empty: &'a str,
}

pub fn run(target: &Target<'_>, cmd: &CollectCommandConfig<'_>) -> u8 {
    let config = match build_config(target, cmd) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            return EXIT_CONFIG;
        }
    };

    let client = match connect(target, config.request_timeout) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: login to {} failed: {e}", target.hostname);
            return EXIT_FAILURE;
        }
    };

    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        log::warn!("Could not install Ctrl+C handler: {e}");
    }

    println!("Sampling {}", target.hostname);
    println!("  Duration:  {}s", config.duration.as_secs());
    println!("  Cadence:   {} Hz", config.sample_hz);
    println!("  Workers:   {}", config.max_workers);
    println!("  Output:    {}", config.output_dir.display());
    println!();

    let collector = match Collector::new(Arc::new(client), config) {
        Ok(c) => c.with_stop_flag(stop),
        Err(e) => {
            eprintln!("Error: {e}");
            return EXIT_CONFIG;
        }
    };

    let result = collector.collect(target.hostname, print_progress);
    println!();

    match result {
        Ok(collection) => {
            for line in summary_lines(&collection) {
                println!("{line}");
            }
            EXIT_OK
        }
        Err(CollectError::NoEndpoints) => {
            eprintln!("Error: discovery found no endpoints to sample (use --on_empty warn to run anyway)");
            EXIT_FAILURE
        }
        Err(CollectError::Config(e)) => {
            eprintln!("Error: {e}");
            EXIT_CONFIG
        }
        Err(e) => {
            eprintln!("Error: {e}");
            EXIT_FAILURE
        }
    }
}

fn build_config(
    target: &Target<'_>,
    cmd: &CollectCommandConfig<'_>,
) -> Result<CollectConfig, CollectError> {
    let on_empty: EmptyDiscoveryPolicy = cmd.on_empty.parse()?;
    let config = CollectConfig {
        on_empty,
        output_dir: PathBuf::from(cmd.output_dir),
        verify_tls: target.verify_tls,
        ..CollectConfig::from_args(
            cmd.collect_duration,
            cmd.sample_hz,
            cmd.max_workers,
            target.request_timeout,
        )?
    };
    Ok(config)
}

fn print_progress(tick: &TickReport) {
    for line in progress_lines(tick) {
        println!("{line}");
    }
}

/// One line per reading, `elapsed domain/identity value`, then one per
/// failed endpoint. Absent values print as `-`.
fn progress_lines(tick: &TickReport) -> Vec<String> {
    let mut lines: Vec<String> = tick
        .readings
        .iter()
        .map(|r| {
            let value = r.value.map_or_else(|| "-".to_string(), |v| v.to_string());
            format!("{:>9.3}  {}/{}  {value}", tick.elapsed, r.domain, r.identity)
        })
        .collect();
    lines.extend(
        tick.failed
            .iter()
            .map(|identity| format!("{:>9.3}  {identity}  failed", tick.elapsed)),
    );
    lines
}

fn summary_lines(collection: &Collection) -> Vec<String> {
    let mut lines = Vec::new();
    if collection.run.stats.stopped {
        lines.push("Interrupted; partial run saved.".to_string());
    }
    lines.push(format!(
        "Collected {} ticks from {} endpoints in {:.1}s",
        collection.run.stats.ticks,
        collection.run.endpoints.len(),
        collection.run.stats.wall_time.as_secs_f64()
    ));
    for path in &collection.output.tables {
        lines.push(format!("  {}", path.display()));
    }
    lines.push(format!("  {}", collection.output.summary.display()));
    lines.extend(gap_lines(&collection.run));
    if !collection.discovery.warnings.is_empty() {
        lines.push("Discovery warnings:".to_string());
        lines.extend(collection.discovery.warnings.iter().map(|w| format!("  {w}")));
    }
    lines
}

/// Columns with absent samples and endpoints with failed fetches.
fn gap_lines(run: &SampleRun) -> Vec<String> {
    let mut lines = Vec::new();
    let absent = run.store.absent_counts();
    if !absent.is_empty() {
        lines.push("Absent samples:".to_string());
        for ((domain, identity), count) in &absent {
            lines.push(format!("  {domain}/{identity}: {count}/{}", run.stats.ticks));
        }
    }
    if !run.stats.failures.is_empty() {
        lines.push("Failed fetches:".to_string());
        for (identity, count) in &run.stats.failures {
            lines.push(format!("  {identity}: {count}"));
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use bmcprobe_core::{Domain, Extraction, RunStats, SeriesStore};

    use super::*;

    fn target(timeout: f64) -> Target<'static> {
        Target {
            hostname: "bmc-unreachable.invalid",
            username: "admin",
            password: "x",
            request_timeout: timeout,
            verify_tls: false,
        }
    }

    fn cmd<'a>(dir: &'a str, duration: i64, on_empty: &'a str) -> CollectCommandConfig<'a> {
        CollectCommandConfig {
            collect_duration: duration,
            sample_hz: 1.0,
            max_workers: 4,
            output_dir: dir,
            on_empty,
        }
    }

    #[test]
    fn test_build_config_applies_flags() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_str().unwrap();
        let config = build_config(&target(3.0), &cmd(dir, 30, "warn")).unwrap();
        assert_eq!(config.duration.as_secs(), 30);
        assert_eq!(config.on_empty, EmptyDiscoveryPolicy::Warn);
        assert_eq!(config.output_dir, tmp.path());
        assert!(!config.verify_tls);
    }

    #[test]
    fn test_config_errors_exit_before_network() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().to_str().unwrap();
        assert_eq!(run(&target(5.0), &cmd(dir, 0, "fatal")), EXIT_CONFIG);
        assert_eq!(run(&target(5.0), &cmd(dir, -10, "fatal")), EXIT_CONFIG);
        assert_eq!(run(&target(5.0), &cmd(dir, 10, "sometimes")), EXIT_CONFIG);
        assert_eq!(run(&target(-1.0), &cmd(dir, 10, "fatal")), EXIT_CONFIG);
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_progress_shows_each_reading_and_failure() {
        let tick = TickReport {
            index: 3,
            elapsed: 3.0012,
            readings: vec![
                Extraction {
                    domain: Domain::Power,
                    identity: "Motherboard".to_string(),
                    value: Some(431.5),
                },
                Extraction {
                    domain: Domain::Sensors,
                    identity: "motherboard/sensors/total_pwr".to_string(),
                    value: None,
                },
            ],
            failed: vec!["self/thermal".to_string()],
        };
        assert_eq!(
            progress_lines(&tick),
            vec![
                "    3.001  Power/Motherboard  431.5",
                "    3.001  Sensors/motherboard/sensors/total_pwr  -",
                "    3.001  self/thermal  failed",
            ]
        );
    }

    #[test]
    fn test_gap_lines() {
        let mut store = SeriesStore::new();
        store.record(Domain::Sensors, "motherboard/sensors/total_pwr", 0.0, Some(500.0));
        store.record(Domain::Sensors, "motherboard/sensors/total_pwr", 1.0, None);
        let mut stats = RunStats {
            ticks: 2,
            ..Default::default()
        };
        stats.failures.insert("motherboard/sensors/total_pwr".to_string(), 1);
        let run = SampleRun {
            store,
            stats,
            endpoints: Vec::new(),
        };

        assert_eq!(
            gap_lines(&run),
            vec![
                "Absent samples:",
                "  Sensors/motherboard/sensors/total_pwr: 1/2",
                "Failed fetches:",
                "  motherboard/sensors/total_pwr: 1",
            ]
        );
    }

    #[test]
    fn test_gap_lines_empty_for_clean_run() {
        let run = SampleRun {
            store: SeriesStore::new(),
            stats: RunStats::default(),
            endpoints: Vec::new(),
        };
        assert!(gap_lines(&run).is_empty());
    }
}
