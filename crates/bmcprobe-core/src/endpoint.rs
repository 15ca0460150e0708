//! Pollable telemetry endpoints and the boards that own them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What an endpoint measures. Assigned once at discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TelemetryKind {
    Power,
    Thermal,
    Fan,
    PowerSupply,
}

impl fmt::Display for TelemetryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Power => write!(f, "power"),
            Self::Thermal => write!(f, "thermal"),
            Self::Fan => write!(f, "fan"),
            Self::PowerSupply => write!(f, "power_supply"),
        }
    }
}

/// Which response document an endpoint returns, and so which decoder applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceShape {
    /// `Chassis/{board}/Power`: power control plus power supplies.
    BoardPower,
    /// `Chassis/{board}/Thermal`: temperatures plus fans.
    BoardThermal,
    /// `Chassis/{board}/Sensors/{name}`: a single scalar reading.
    Sensor,
}

/// Measurement unit of a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Units {
    Watts,
    Celsius,
    Rpm,
}

impl Units {
    /// Map a Redfish `ReadingUnits` string (`W`, `Cel`, `RPM`, ...).
    pub fn from_redfish(units: &str) -> Option<Self> {
        match units.trim().to_ascii_lowercase().as_str() {
            "w" | "watts" => Some(Self::Watts),
            "cel" | "c" | "celsius" => Some(Self::Celsius),
            "rpm" => Some(Self::Rpm),
            _ => None,
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Watts => write!(f, "Watts"),
            Self::Celsius => write!(f, "Celsius"),
            Self::Rpm => write!(f, "RPM"),
        }
    }
}

/// One pollable telemetry resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub identity: String,
    pub kind: TelemetryKind,
    pub shape: ResourceShape,
    pub resource_path: String,
    pub board: String,
    pub units: Option<Units>,
}

impl Endpoint {
    pub fn new(
        kind: TelemetryKind,
        shape: ResourceShape,
        resource_path: impl Into<String>,
        board: impl Into<String>,
    ) -> Self {
        let resource_path = resource_path.into();
        let units = (shape == ResourceShape::BoardPower).then_some(Units::Watts);
        Self {
            identity: identity_from_path(&resource_path),
            kind,
            shape,
            resource_path,
            board: board.into(),
            units,
        }
    }

    /// Terminal segment of the resource path, as reported by the BMC.
    pub fn name(&self) -> &str {
        terminal_segment(&self.resource_path)
    }
}

/// A chassis/board grouping and its endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub name: String,
    pub endpoints: Vec<Endpoint>,
}

/// Stable endpoint key: the path below `/Chassis/`, lower-cased.
///
/// `/redfish/v1/Chassis/Motherboard/Sensors/CPU_TEMP_1` becomes
/// `motherboard/sensors/cpu_temp_1`.
pub fn identity_from_path(path: &str) -> String {
    let trimmed = path.trim_end_matches('/');
    let below = trimmed
        .split_once("/Chassis/")
        .map(|(_, rest)| rest)
        .unwrap_or(trimmed)
        .trim_start_matches('/');
    below.to_lowercase()
}

/// Last `/`-separated segment of a path.
pub fn terminal_segment(path: &str) -> &str {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(path)
}
