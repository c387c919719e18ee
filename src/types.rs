use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Whether a mode drives the heat or the cold setpoint pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeatCold {
    Heat,
    Cold,
}

impl HeatCold {
    pub fn as_str(&self) -> &'static str {
        match self {
            HeatCold::Heat => "heat",
            HeatCold::Cold => "cold",
        }
    }
}

impl fmt::Display for HeatCold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the Airzone mode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModeInfo {
    pub code: &'static str,
    pub name: &'static str,
    pub kind: HeatCold,
    pub description: &'static str,
}

/// Raw mode codes as used by the DKN web application, in code order.
pub const MODES: &[ModeInfo] = &[
    ModeInfo { code: "1", name: "cool", kind: HeatCold::Cold, description: "Cooling mode" },
    ModeInfo { code: "2", name: "heat", kind: HeatCold::Heat, description: "Heating mode" },
    ModeInfo { code: "3", name: "ventilate", kind: HeatCold::Cold, description: "Ventilation in cold mode" },
    ModeInfo { code: "4", name: "heat-cold-auto", kind: HeatCold::Cold, description: "Auto mode" },
    ModeInfo { code: "5", name: "dehumidify", kind: HeatCold::Cold, description: "Dry mode" },
    ModeInfo { code: "6", name: "cool-air", kind: HeatCold::Cold, description: "Automatic cooling" },
    ModeInfo { code: "7", name: "heat-air", kind: HeatCold::Heat, description: "Automatic heating" },
    ModeInfo { code: "8", name: "ventilate", kind: HeatCold::Heat, description: "Ventilation in heating mode" },
];

impl ModeInfo {
    pub fn from_code(code: &str) -> Option<&'static ModeInfo> {
        MODES.iter().find(|m| m.code == code)
    }

    /// First entry whose name matches. `ventilate` resolves to code `3`.
    pub fn from_name(name: &str) -> Option<&'static ModeInfo> {
        MODES.iter().find(|m| m.name == name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsLocation {
    pub latitude: f64,
    pub longitude: f64,
}

/// Installation payload as returned inside `installation_relations[].installation`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallationData {
    #[serde(deserialize_with = "required_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient_string")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub scenary: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub complete_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_location")]
    pub location: Option<GpsLocation>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub time_zone: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub postal_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub role: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Device payload as returned by `/devices`.
///
/// Numeric fields come over the wire as strings (`"power": "0"`,
/// `"min_limit_cold": "16.0"`) and are kept that way.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceData {
    #[serde(deserialize_with = "required_string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub mac: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub pin: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub power: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub mode: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub local_temp: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub cold_consign: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub heat_consign: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub min_limit_cold: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub max_limit_cold: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub min_limit_heat: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub max_limit_heat: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub firmware: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub brand: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub connection_date: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(scalar_to_string))
}

fn required_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    scalar_to_string(value).ok_or_else(|| serde::de::Error::custom("id must not be null"))
}

fn lenient_location<'de, D>(deserializer: D) -> Result<Option<GpsLocation>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| serde_json::from_value(v).ok()))
}

/// Parse an optional wire temperature (`"16.0"`) into a float.
pub(crate) fn parse_temperature(raw: Option<&str>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse().ok())
}

/// String form stored in the consign fields; always carries a decimal part.
pub(crate) fn format_temperature(value: f64) -> String {
    if value.fract() == 0.0 && value.is_finite() {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}
