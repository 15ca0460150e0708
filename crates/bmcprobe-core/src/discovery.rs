//! Endpoint discovery.
//!
//! Walks the chassis collection, keeps the boards on the allow-list, and
//! classifies each board's sensors. Any collection that cannot be read
//! degrades to an empty set for its scope and is reported as a warning.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::Value;

use crate::client::{REDFISH_BASE, TelemetryClient};
use crate::endpoint::{Board, Endpoint, ResourceShape, TelemetryKind, terminal_segment};

/// Chassis members sampled, matched case-insensitively on the last path segment.
pub const BOARD_ALLOW_LIST: [&str; 3] = ["motherboard", "self", "gpu_board"];

const VOLTAGE_REGULATOR_PREFIX: &str = "vr_";

#[derive(Deserialize)]
struct Collection {
    #[serde(rename = "Members")]
    members: Vec<MemberRef>,
}

#[derive(Deserialize)]
struct MemberRef {
    #[serde(rename = "@odata.id")]
    odata_id: String,
}

/// Result of one discovery pass.
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    pub boards: Vec<Board>,
    /// Scopes that could not be enumerated.
    pub warnings: Vec<String>,
}

impl Discovery {
    /// All endpoints, boards in collection order.
    pub fn endpoints(&self) -> Vec<Endpoint> {
        self.boards
            .iter()
            .flat_map(|b| b.endpoints.iter().cloned())
            .collect()
    }

    pub fn endpoint_count(&self) -> usize {
        self.boards.iter().map(|b| b.endpoints.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoint_count() == 0
    }

    fn warn(&mut self, message: String) {
        log::warn!("{message}");
        self.warnings.push(message);
    }
}

pub fn is_allowed_board(name: &str) -> bool {
    let name = name.to_lowercase();
    BOARD_ALLOW_LIST.contains(&name.as_str())
}

/// Classify a sensor by its name; `None` means it is not sampled.
pub fn classify_sensor(name: &str) -> Option<TelemetryKind> {
    let name = name.to_lowercase();
    if name.contains("temp") {
        return Some(TelemetryKind::Thermal);
    }
    if (name.contains("pwr") || name.contains("power"))
        && !name.starts_with(VOLTAGE_REGULATOR_PREFIX)
    {
        return Some(TelemetryKind::Power);
    }
    None
}

/// Enumerate boards and endpoints. Never fails; unreadable scopes are
/// empty and listed in [`Discovery::warnings`].
pub fn discover(client: &dyn TelemetryClient) -> Discovery {
    let mut discovery = Discovery::default();
    let chassis_path = format!("{REDFISH_BASE}/Chassis");

    let members = match fetch_members(client, &chassis_path) {
        Ok(members) => members,
        Err(reason) => {
            discovery.warn(format!("Chassis collection unavailable, nothing to sample: {reason}"));
            return discovery;
        }
    };

    let mut seen = HashSet::new();
    for board_path in members {
        let board_path = board_path.trim_end_matches('/').to_string();
        let name = terminal_segment(&board_path).to_string();
        if !is_allowed_board(&name) {
            log::debug!("Skipping chassis member {name}");
            continue;
        }
        if !seen.insert(name.to_lowercase()) {
            discovery.warn(format!("Duplicate chassis member {board_path}, ignoring"));
            continue;
        }

        let board = discover_board(client, &board_path, &name, &mut discovery);
        log::info!(
            "Board {}: {} endpoints",
            board.name,
            board.endpoints.len()
        );
        discovery.boards.push(board);
    }

    if discovery.boards.is_empty() {
        discovery.warn(format!(
            "No chassis member matched {BOARD_ALLOW_LIST:?}"
        ));
    }
    discovery
}

fn discover_board(
    client: &dyn TelemetryClient,
    board_path: &str,
    name: &str,
    discovery: &mut Discovery,
) -> Board {
    let mut endpoints = vec![
        Endpoint::new(
            TelemetryKind::Power,
            ResourceShape::BoardPower,
            format!("{board_path}/Power"),
            name,
        ),
        Endpoint::new(
            TelemetryKind::Thermal,
            ResourceShape::BoardThermal,
            format!("{board_path}/Thermal"),
            name,
        ),
    ];
    let mut identities: HashSet<String> = endpoints.iter().map(|e| e.identity.clone()).collect();

    let sensors_path = format!("{board_path}/Sensors");
    let sensors = match fetch_members(client, &sensors_path) {
        Ok(sensors) => sensors,
        Err(reason) => {
            discovery.warn(format!(
                "Sensor collection for {name} unavailable, sampling board resources only: {reason}"
            ));
            Vec::new()
        }
    };

    for sensor_path in sensors {
        let sensor_name = terminal_segment(&sensor_path);
        let Some(kind) = classify_sensor(sensor_name) else {
            log::debug!("Skipping sensor {sensor_name}");
            continue;
        };
        let endpoint = Endpoint::new(kind, ResourceShape::Sensor, sensor_path.clone(), name);
        if !identities.insert(endpoint.identity.clone()) {
            discovery.warn(format!("Duplicate sensor {sensor_path}, ignoring"));
            continue;
        }
        endpoints.push(endpoint);
    }

    Board {
        name: name.to_string(),
        endpoints,
    }
}

fn fetch_members(client: &dyn TelemetryClient, path: &str) -> Result<Vec<String>, String> {
    let body: Value = client.get_json(path).map_err(|e| e.to_string())?;
    let collection =
        Collection::deserialize(&body).map_err(|e| format!("{path}: unexpected shape: {e}"))?;
    Ok(collection.members.into_iter().map(|m| m.odata_id).collect())
}
