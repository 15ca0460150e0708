//! CLI for bmcprobe: sample BMC power and thermal telemetry into CSV tables.

mod commands;

use std::process::ExitCode;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "bmcprobe")]
#[command(about = "bmcprobe: sample power, temperature and fan telemetry from a Redfish BMC")]
#[command(version = bmcprobe_core::VERSION)]
struct Cli {
    /// BMC hostname or base URL (https:// is assumed)
    #[arg(long = "bmc_hostname")]
    bmc_hostname: String,

    /// BMC login user
    #[arg(long = "bmc_username")]
    bmc_username: String,

    /// BMC login password
    #[arg(long = "bmc_password", env = "BMC_PASSWORD", hide_env_values = true)]
    bmc_password: String,

    /// How long to sample, in seconds
    #[arg(long = "collect_duration", default_value = "300", allow_negative_numbers = true)]
    collect_duration: i64,

    /// Sampling cadence in ticks per second
    #[arg(long = "sample_hz", default_value = "1.0")]
    sample_hz: f64,

    /// Maximum concurrent requests per tick
    #[arg(long = "max_workers", default_value = "8")]
    max_workers: usize,

    /// Per-request timeout in seconds
    #[arg(long = "request_timeout", default_value = "10")]
    request_timeout: f64,

    /// Directory for the CSV tables and session.json
    #[arg(long = "output_dir", default_value = ".")]
    output_dir: String,

    /// What to do when discovery finds no endpoints
    #[arg(long = "on_empty", default_value = "fatal", value_parser = ["fatal", "warn"])]
    on_empty: String,

    /// Verify the BMC's TLS certificate
    #[arg(long = "verify_tls")]
    verify_tls: bool,

    /// Discover and print endpoints, then exit without sampling
    #[arg(long = "list_endpoints")]
    list_endpoints: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let target = commands::Target {
        hostname: &cli.bmc_hostname,
        username: &cli.bmc_username,
        password: &cli.bmc_password,
        request_timeout: cli.request_timeout,
        verify_tls: cli.verify_tls,
    };

    let code = if cli.list_endpoints {
        commands::scan::run(&target)
    } else {
        commands::collect::run(
            &target,
            &commands::collect::CollectCommandConfig {
                collect_duration: cli.collect_duration,
                sample_hz: cli.sample_hz,
                max_workers: cli.max_workers,
                output_dir: &cli.output_dir,
                on_empty: &cli.on_empty,
            },
        )
    };
    ExitCode::from(code)
}
