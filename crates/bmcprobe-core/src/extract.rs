//! Per-shape response decoders.
//!
//! Each decoder is a pure function from a raw document to a list of
//! [`Extraction`]s or a [`ParseError`]. A wrong top-level shape is an error;
//! a recognised entry with a null reading is an extraction with an absent
//! value.
//!
//! Column identities are unique per endpoint: a board's total is keyed by
//! the board name, a sensor by its endpoint identity, and list entries by
//! `{board}/{entry name}`.

use std::collections::BTreeSet;

use serde::Deserialize;
use serde_json::Value;

use crate::endpoint::{Endpoint, ResourceShape, Units, terminal_segment};
use crate::error::ParseError;
use crate::store::Domain;

/// One `(domain, identity, value)` reading pulled out of a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub domain: Domain,
    pub identity: String,
    pub value: Option<f64>,
}

impl Extraction {
    fn new(domain: Domain, identity: impl Into<String>, value: Option<f64>) -> Self {
        Self {
            domain,
            identity: identity.into(),
            value,
        }
    }
}

/// Decoded document: readings plus units reported alongside them, if any.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Decoded {
    pub readings: Vec<Extraction>,
    pub units: Option<Units>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PowerDocument {
    power_control: Vec<PowerControl>,
    #[serde(default)]
    power_supplies: Vec<PowerSupplyEntry>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PowerControl {
    power_consumed_watts: Option<f64>,
}

#[derive(Deserialize)]
struct EntityRef {
    #[serde(rename = "Name")]
    name: Option<String>,
    #[serde(rename = "@odata.id")]
    odata_id: Option<String>,
    #[serde(rename = "MemberId")]
    member_id: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PowerSupplyEntry {
    #[serde(flatten)]
    entity: EntityRef,
    power_input_watts: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ThermalDocument {
    temperatures: Option<Vec<TemperatureEntry>>,
    fans: Option<Vec<FanEntry>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TemperatureEntry {
    #[serde(flatten)]
    entity: EntityRef,
    reading_celsius: Option<f64>,
    reading: Option<f64>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FanEntry {
    #[serde(flatten)]
    entity: EntityRef,
    fan_name: Option<String>,
    reading: Option<f64>,
}

/// Decode `doc` according to the endpoint's resource shape.
pub fn extract(endpoint: &Endpoint, doc: &Value) -> Result<Decoded, ParseError> {
    match endpoint.shape {
        ResourceShape::BoardPower => decode_board_power(endpoint, doc),
        ResourceShape::BoardThermal => decode_board_thermal(endpoint, doc),
        ResourceShape::Sensor => decode_sensor(endpoint, doc),
    }
}

/// The column an endpoint always owns, if its documents have a fixed one.
///
/// Thermal documents carry a variable list of temperatures and fans, so a board
/// thermal endpoint has no primary column.
pub fn primary_column(endpoint: &Endpoint) -> Option<(Domain, String)> {
    match endpoint.shape {
        ResourceShape::BoardPower => Some((Domain::Power, endpoint.board.clone())),
        ResourceShape::Sensor => Some((Domain::Sensors, endpoint.identity.clone())),
        ResourceShape::BoardThermal => None,
    }
}

fn decode_board_power(endpoint: &Endpoint, doc: &Value) -> Result<Decoded, ParseError> {
    let power = PowerDocument::deserialize(doc)
        .map_err(|e| ParseError::new(&endpoint.identity, e.to_string()))?;
    let control = power
        .power_control
        .first()
        .ok_or_else(|| ParseError::new(&endpoint.identity, "PowerControl is empty"))?;

    let mut readings = vec![Extraction::new(
        Domain::Power,
        endpoint.board.clone(),
        control.power_consumed_watts,
    )];
    let mut supplies = EntryColumns::new(&endpoint.board);
    for supply in &power.power_supplies {
        let label = entity_label(&supply.entity, None, &endpoint.identity)?;
        readings.push(Extraction::new(
            Domain::PowerSupplies,
            supplies.column(&label),
            supply.power_input_watts,
        ));
    }

    Ok(Decoded {
        readings,
        units: Some(Units::Watts),
    })
}

fn decode_board_thermal(endpoint: &Endpoint, doc: &Value) -> Result<Decoded, ParseError> {
    let thermal = ThermalDocument::deserialize(doc)
        .map_err(|e| ParseError::new(&endpoint.identity, e.to_string()))?;
    if thermal.temperatures.is_none() && thermal.fans.is_none() {
        return Err(ParseError::new(
            &endpoint.identity,
            "neither Temperatures nor Fans present",
        ));
    }

    let mut readings = Vec::new();
    let mut temperatures = EntryColumns::new(&endpoint.board);
    for temp in thermal.temperatures.iter().flatten() {
        let label = entity_label(&temp.entity, None, &endpoint.identity)?;
        readings.push(Extraction::new(
            Domain::Temperatures,
            temperatures.column(&label),
            temp.reading_celsius.or(temp.reading),
        ));
    }
    let mut fans = EntryColumns::new(&endpoint.board);
    for fan in thermal.fans.iter().flatten() {
        let label = entity_label(&fan.entity, fan.fan_name.as_deref(), &endpoint.identity)?;
        readings.push(Extraction::new(Domain::Fans, fans.column(&label), fan.reading));
    }

    Ok(Decoded {
        readings,
        units: None,
    })
}

fn decode_sensor(endpoint: &Endpoint, doc: &Value) -> Result<Decoded, ParseError> {
    let value = match doc.get("Reading") {
        None => return Err(ParseError::new(&endpoint.identity, "missing field `Reading`")),
        Some(Value::Null) => None,
        Some(Value::Number(n)) => n.as_f64(),
        Some(other) => {
            return Err(ParseError::new(
                &endpoint.identity,
                format!("`Reading` is not a number: {other}"),
            ));
        }
    };
    let units = doc
        .get("ReadingUnits")
        .and_then(Value::as_str)
        .and_then(Units::from_redfish);

    Ok(Decoded {
        readings: vec![Extraction::new(Domain::Sensors, endpoint.identity.clone(), value)],
        units,
    })
}

/// Column names for one list of entries on one board.
///
/// Names repeated within the list get a `_2`, `_3`, ... suffix in document
/// order.
struct EntryColumns<'a> {
    board: &'a str,
    seen: BTreeSet<String>,
}

impl<'a> EntryColumns<'a> {
    fn new(board: &'a str) -> Self {
        Self {
            board,
            seen: BTreeSet::new(),
        }
    }

    fn column(&mut self, label: &str) -> String {
        let base = format!("{}/{label}", self.board);
        let mut column = base.clone();
        let mut n = 2;
        while !self.seen.insert(column.clone()) {
            column = format!("{base}_{n}");
            n += 1;
        }
        column
    }
}

/// Name of a list entry, falling back to its own resource identifier.
fn entity_label(
    entity: &EntityRef,
    alt_name: Option<&str>,
    context: &str,
) -> Result<String, ParseError> {
    if let Some(name) = entity.name.as_deref().or(alt_name).filter(|n| !n.trim().is_empty()) {
        return Ok(name.to_string());
    }
    if let Some(id) = entity.odata_id.as_deref() {
        return Ok(fallback_name(id));
    }
    if let Some(member) = entity.member_id.as_deref() {
        return Ok(format!("member_{}", member.to_lowercase()));
    }
    Err(ParseError::new(
        context,
        "entry has neither Name nor @odata.id",
    ))
}

/// `/redfish/v1/Chassis/Self/Power#/PowerSupplies/1` becomes
/// `powersupplies_1`: the last two segments, lower-cased.
pub fn fallback_name(odata_id: &str) -> String {
    let trimmed = odata_id.trim_end_matches('/');
    let mut tail: Vec<&str> = trimmed
        .rsplit('/')
        .filter(|s| !s.is_empty())
        .take(2)
        .collect();
    if tail.is_empty() {
        return terminal_segment(trimmed).to_lowercase();
    }
    tail.reverse();
    tail.join("_").replace('#', "").to_lowercase()
}
#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::endpoint::TelemetryKind;

    fn board_power() -> Endpoint {
        Endpoint::new(
            TelemetryKind::Power,
            ResourceShape::BoardPower,
            "/redfish/v1/Chassis/Motherboard/Power",
            "Motherboard",
        )
    }

    fn board_thermal() -> Endpoint {
        Endpoint::new(
            TelemetryKind::Thermal,
            ResourceShape::BoardThermal,
            "/redfish/v1/Chassis/Motherboard/Thermal",
            "Motherboard",
        )
    }

    fn sensor(name: &str) -> Endpoint {
        Endpoint::new(
            TelemetryKind::Power,
            ResourceShape::Sensor,
            format!("/redfish/v1/Chassis/Motherboard/Sensors/{name}"),
            "Motherboard",
        )
    }

    #[test]
    fn test_board_power_reads_first_control_and_supplies() {
        let doc = json!({
            "PowerControl": [
                { "PowerConsumedWatts": 431.0 },
                { "PowerConsumedWatts": 9999.0 }
            ],
            "PowerSupplies": [
                { "Name": "PSU1", "PowerInputWatts": 220 },
                { "@odata.id": "/redfish/v1/Chassis/Motherboard/Power#/PowerSupplies/1", "PowerInputWatts": null }
            ]
        });
        let decoded = extract(&board_power(), &doc).unwrap();
        assert_eq!(
            decoded.readings,
            vec![
                Extraction::new(Domain::Power, "Motherboard", Some(431.0)),
                Extraction::new(Domain::PowerSupplies, "Motherboard/PSU1", Some(220.0)),
                Extraction::new(Domain::PowerSupplies, "Motherboard/powersupplies_1", None),
            ]
        );
        assert_eq!(decoded.units, Some(Units::Watts));
    }

    #[test]
    fn test_board_power_without_control_is_parse_error() {
        let err = extract(&board_power(), &json!({ "PowerSupplies": [] })).unwrap_err();
        assert_eq!(err.context, "motherboard/power");

        let err = extract(&board_power(), &json!({ "PowerControl": [] })).unwrap_err();
        assert!(err.reason.contains("empty"));
    }

    #[test]
    fn test_thermal_prefers_celsius_then_generic_reading() {
        let doc = json!({
            "Temperatures": [
                { "Name": "Inlet", "ReadingCelsius": 22.0, "Reading": 1.0 },
                { "Name": "Outlet", "Reading": 35.5 },
                { "MemberId": "7", "ReadingCelsius": null }
            ],
            "Fans": [
                { "FanName": "FAN_A", "Reading": 4800 },
                { "@odata.id": "/redfish/v1/Chassis/Motherboard/Thermal#/Fans/3", "Reading": 5100 }
            ]
        });
        let decoded = extract(&board_thermal(), &doc).unwrap();
        assert_eq!(
            decoded.readings,
            vec![
                Extraction::new(Domain::Temperatures, "Motherboard/Inlet", Some(22.0)),
                Extraction::new(Domain::Temperatures, "Motherboard/Outlet", Some(35.5)),
                Extraction::new(Domain::Temperatures, "Motherboard/member_7", None),
                Extraction::new(Domain::Fans, "Motherboard/FAN_A", Some(4800.0)),
                Extraction::new(Domain::Fans, "Motherboard/fans_3", Some(5100.0)),
            ]
        );
    }

    #[test]
    fn test_thermal_with_neither_list_is_parse_error() {
        assert!(extract(&board_thermal(), &json!({ "Id": "Thermal" })).is_err());
        assert!(extract(&board_thermal(), &json!({ "Fans": [] })).is_ok());
    }

    #[test]
    fn test_entry_without_any_identifier_is_parse_error() {
        let doc = json!({ "Temperatures": [ { "ReadingCelsius": 40.0 } ] });
        let err = extract(&board_thermal(), &doc).unwrap_err();
        assert!(err.reason.contains("neither Name"));
    }

    #[test]
    fn test_sensor_reading_and_units() {
        let decoded = extract(
            &sensor("CPU_TEMP_1"),
            &json!({ "Reading": 57.25, "ReadingUnits": "Cel" }),
        )
        .unwrap();
        assert_eq!(
            decoded.readings,
            vec![Extraction::new(
                Domain::Sensors,
                "motherboard/sensors/cpu_temp_1",
                Some(57.25)
            )]
        );
        assert_eq!(decoded.units, Some(Units::Celsius));
    }

    #[test]
    fn test_sensor_null_reading_is_absent_value() {
        let decoded = extract(&sensor("TOTAL_PWR"), &json!({ "Reading": null })).unwrap();
        assert_eq!(decoded.readings[0].value, None);
    }

    #[test]
    fn test_sensor_wrong_shape_is_parse_error() {
        assert!(extract(&sensor("TOTAL_PWR"), &json!({ "Status": {} })).is_err());
        assert!(extract(&sensor("TOTAL_PWR"), &json!({ "Reading": "high" })).is_err());
        assert!(extract(&sensor("TOTAL_PWR"), &json!([1, 2])).is_err());
    }

    #[test]
    fn test_primary_columns() {
        assert_eq!(
            primary_column(&board_power()),
            Some((Domain::Power, "Motherboard".to_string()))
        );
        assert_eq!(
            primary_column(&sensor("TOTAL_PWR")),
            Some((Domain::Sensors, "motherboard/sensors/total_pwr".to_string()))
        );
        assert_eq!(primary_column(&board_thermal()), None);
    }

    #[test]
    fn test_same_names_on_two_boards_get_distinct_columns() {
        let gpu_sensor = Endpoint::new(
            TelemetryKind::Power,
            ResourceShape::Sensor,
            "/redfish/v1/Chassis/GPU_Board/Sensors/TOTAL_PWR",
            "GPU_Board",
        );
        let gpu_thermal = Endpoint::new(
            TelemetryKind::Thermal,
            ResourceShape::BoardThermal,
            "/redfish/v1/Chassis/GPU_Board/Thermal",
            "GPU_Board",
        );
        let reading = json!({ "Reading": 500.0 });
        let thermal = json!({ "Temperatures": [{ "Name": "Inlet", "ReadingCelsius": 30.0 }] });

        let mut columns = BTreeSet::new();
        for (endpoint, doc) in [
            (sensor("TOTAL_PWR"), &reading),
            (gpu_sensor, &reading),
            (board_thermal(), &thermal),
            (gpu_thermal, &thermal),
        ] {
            for r in extract(&endpoint, doc).unwrap().readings {
                assert!(columns.insert((r.domain, r.identity.clone())), "{r:?} collides");
            }
        }
        assert_eq!(columns.len(), 4);
    }

    #[test]
    fn test_repeated_entry_names_in_one_document_are_suffixed() {
        let doc = json!({
            "Fans": [
                { "Name": "FAN", "Reading": 1000 },
                { "Name": "FAN", "Reading": 2000 },
                { "Name": "FAN", "Reading": 3000 }
            ]
        });
        let names: Vec<String> = extract(&board_thermal(), &doc)
            .unwrap()
            .readings
            .into_iter()
            .map(|r| r.identity)
            .collect();
        assert_eq!(names, vec!["Motherboard/FAN", "Motherboard/FAN_2", "Motherboard/FAN_3"]);
    }

    #[test]
    fn test_fallback_name_variants() {
        assert_eq!(
            fallback_name("/redfish/v1/Chassis/Self/Power#/PowerSupplies/0"),
            "powersupplies_0"
        );
        assert_eq!(
            fallback_name("/redfish/v1/Chassis/GPU_Board/Thermal#/Fans/2/"),
            "fans_2"
        );
        assert_eq!(fallback_name("/redfish/v1/Chassis/Self"), "chassis_self");
        assert_eq!(fallback_name("PSU_7"), "psu_7");
    }
}
