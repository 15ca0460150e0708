//! `bmcprobe --list_endpoints`: discover and print, no sampling.

use bmcprobe_core::{CollectConfig, Discovery, discover};

use super::{EXIT_CONFIG, EXIT_FAILURE, EXIT_OK, Target, connect};

pub fn run(target: &Target<'_>) -> u8 {
    // Only the timeout matters here; the sampling fields take their defaults.
    let defaults = CollectConfig::default();
    let config = match CollectConfig::from_args(
        defaults.duration.as_secs() as i64,
        defaults.sample_hz,
        defaults.max_workers,
        target.request_timeout,
    ) {
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

    let discovery = discover(&client);
    for line in render(&discovery) {
        println!("{line}");
    }
    EXIT_OK
}

fn render(discovery: &Discovery) -> Vec<String> {
    let mut lines = vec![format!(
        "Found {} endpoint(s) on {} board(s):",
        discovery.endpoint_count(),
        discovery.boards.len()
    )];
    for board in &discovery.boards {
        lines.push(String::new());
        lines.push(format!("  {}", board.name));
        for e in &board.endpoints {
            lines.push(format!(
                "    {:<40} {:<8} {}",
                e.identity,
                e.kind.to_string(),
                e.resource_path
            ));
        }
    }
    if discovery.boards.is_empty() {
        lines.push("  (none found)".to_string());
    }
    if !discovery.warnings.is_empty() {
        lines.push(String::new());
        lines.push("Warnings:".to_string());
        lines.extend(discovery.warnings.iter().map(|w| format!("  {w}")));
    }
    lines
}

#[cfg(test)]
mod tests {
    use bmcprobe_core::{Board, Endpoint, ResourceShape, TelemetryKind};

    use super::*;

    #[test]
    fn test_render_lists_boards_and_warnings() {
        let discovery = Discovery {
            boards: vec![Board {
                name: "Self".to_string(),
                endpoints: vec![Endpoint::new(
                    TelemetryKind::Power,
                    ResourceShape::BoardPower,
                    "/redfish/v1/Chassis/Self/Power",
                    "Self",
                )],
            }],
            warnings: vec!["Sensor collection for Self unavailable".to_string()],
        };
        let lines = render(&discovery);
        assert_eq!(lines[0], "Found 1 endpoint(s) on 1 board(s):");
        assert!(lines.iter().any(|l| l.contains("self/power") && l.contains("power")));
        assert_eq!(lines.last().unwrap(), "  Sensor collection for Self unavailable");
    }

    #[test]
    fn test_render_empty() {
        let lines = render(&Discovery::default());
        assert!(lines.contains(&"  (none found)".to_string()));
    }

    #[test]
    fn test_bad_timeout_is_config_error() {
        let target = Target {
            hostname: "bmc-unreachable.invalid",
            username: "admin",
            password: "x",
            request_timeout: 0.0,
            verify_tls: false,
        };
        assert_eq!(run(&target), EXIT_CONFIG);
    }
}
