//! Scripted in-memory Redfish service for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use serde_json::{Value, json};

use crate::client::{RemoteResponse, TelemetryClient};
use crate::error::TransportError;

#[derive(Default)]
pub(crate) struct ScriptedClient {
    responses: HashMap<String, RemoteResponse>,
    failing: HashSet<String>,
    /// Path → (number of leading calls answered with `status`, status).
    outage: HashMap<String, (usize, u16)>,
    latency: HashMap<String, Duration>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_doc(mut self, path: &str, body: Value) -> Self {
        self.responses
            .insert(path.to_string(), RemoteResponse::ok(body));
        self
    }

    pub(crate) fn with_status(mut self, path: &str, status: u16) -> Self {
        self.responses.insert(
            path.to_string(),
            RemoteResponse {
                status,
                body: Value::Null,
            },
        );
        self
    }

    pub(crate) fn failing(mut self, path: &str) -> Self {
        self.failing.insert(path.to_string());
        self
    }

    /// Answer the first `calls` requests for `path` with `status`, then
    /// fall through to the scripted response.
    pub(crate) fn unavailable_for(mut self, path: &str, calls: usize, status: u16) -> Self {
        self.outage.insert(path.to_string(), (calls, status));
        self
    }

    pub(crate) fn with_latency(mut self, path: &str, latency: Duration) -> Self {
        self.latency.insert(path.to_string(), latency);
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self, path: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|p| *p == path).count()
    }
}

impl TelemetryClient for ScriptedClient {
    fn get(&self, path: &str) -> Result<RemoteResponse, TransportError> {
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(path.to_string());
            calls.iter().filter(|p| *p == path).count()
        };
        if let Some(latency) = self.latency.get(path) {
            std::thread::sleep(*latency);
        }
        if self.failing.contains(path) {
            return Err(TransportError::Request {
                path: path.to_string(),
                reason: "connection reset".to_string(),
            });
        }
        if let Some(&(calls, status)) = self.outage.get(path)
            && attempt <= calls
        {
            return Ok(RemoteResponse {
                status,
                body: Value::Null,
            });
        }
        Ok(self.responses.get(path).cloned().unwrap_or(RemoteResponse {
            status: 404,
            body: Value::Null,
        }))
    }
}

pub(crate) fn members(paths: &[&str]) -> Value {
    let members: Vec<Value> = paths.iter().map(|p| json!({ "@odata.id": p })).collect();
    json!({ "Members": members })
}

pub(crate) fn power_doc(board: &str, watts: f64) -> Value {
    json!({
        "PowerControl": [{ "PowerConsumedWatts": watts }],
        "PowerSupplies": [
            { "Name": format!("{board} PSU0"), "PowerInputWatts": watts / 2.0 },
            {
                "@odata.id": format!("/redfish/v1/Chassis/{board}/Power#/PowerSupplies/1"),
                "PowerInputWatts": watts / 2.0
            }
        ]
    })
}

pub(crate) fn thermal_doc(prefix: &str) -> Value {
    json!({
        "Temperatures": [
            { "Name": format!("{prefix} Inlet Temp"), "ReadingCelsius": 24.5 },
            { "Name": format!("{prefix} CPU0 Temp"), "Reading": 61.0 }
        ],
        "Fans": [
            { "Name": format!("{prefix} FAN1"), "Reading": 5400, "ReadingUnits": "RPM" }
        ]
    })
}

/// A motherboard with two classified sensors and one excluded voltage
/// regulator, plus a `Self` board whose sensor collection is unavailable.
pub(crate) fn two_board_bmc() -> ScriptedClient {
    ScriptedClient::new()
        .with_doc(
            "/redfish/v1/Chassis",
            members(&[
                "/redfish/v1/Chassis/Motherboard",
                "/redfish/v1/Chassis/PSU_Tray",
                "/redfish/v1/Chassis/Self",
            ]),
        )
        .with_doc(
            "/redfish/v1/Chassis/Motherboard/Sensors",
            members(&[
                "/redfish/v1/Chassis/Motherboard/Sensors/CPU_TEMP_1",
                "/redfish/v1/Chassis/Motherboard/Sensors/VR_CPU0_PWR",
                "/redfish/v1/Chassis/Motherboard/Sensors/TOTAL_PWR",
                "/redfish/v1/Chassis/Motherboard/Sensors/P12V_VOLT",
            ]),
        )
        .with_status("/redfish/v1/Chassis/Self/Sensors", 500)
        .with_doc("/redfish/v1/Chassis/Motherboard/Power", power_doc("Motherboard", 420.0))
        .with_doc("/redfish/v1/Chassis/Motherboard/Thermal", thermal_doc("MB"))
        .with_doc("/redfish/v1/Chassis/Self/Power", power_doc("Self", 80.0))
        .with_doc("/redfish/v1/Chassis/Self/Thermal", thermal_doc("Self"))
        .with_doc(
            "/redfish/v1/Chassis/Motherboard/Sensors/CPU_TEMP_1",
            json!({ "Reading": 58.0, "ReadingUnits": "Cel" }),
        )
        .with_doc(
            "/redfish/v1/Chassis/Motherboard/Sensors/TOTAL_PWR",
            json!({ "Reading": 512.0, "ReadingUnits": "W" }),
        )
}
