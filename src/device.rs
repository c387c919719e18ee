use std::fmt;

use chrono::{DateTime, FixedOffset, Utc};
use serde_json::{json, Value};
use tracing::{debug, info, trace};

use crate::diff::diff_json;
use crate::protocol::{
    event_message, OPTION_COLD_CONSIGN, OPTION_HEAT_CONSIGN, OPTION_MODE, OPTION_POWER,
};
use crate::registry::Identified;
use crate::session::Session;
use crate::types::{format_temperature, parse_temperature, DeviceData, HeatCold, ModeInfo};
use crate::{Error, Result};

/// A single controllable unit (DKN webserver) inside an installation.
#[derive(Debug, Clone)]
pub struct Device {
    data: DeviceData,
    installation_id: String,
    loaded_at: DateTime<Utc>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl Device {
    pub(crate) fn new(installation_id: &str, data: DeviceData) -> Self {
        let device = Self {
            data,
            installation_id: installation_id.to_string(),
            loaded_at: Utc::now(),
            refreshed_at: None,
        };
        info!("init {device:#}");
        debug!(data = ?device.data);
        device
    }

    /// Replace every attribute with fresh server data. The id is kept.
    pub(crate) fn set_data_refreshed(&mut self, data: DeviceData) {
        if tracing::enabled!(tracing::Level::TRACE)
            && let (Ok(old), Ok(new)) = (serde_json::to_value(&self.data), serde_json::to_value(&data))
        {
            let mut changes = Vec::new();
            diff_json(&old, &new, "", &mut changes);
            for change in &changes {
                trace!(device = %self.data.id, path = %change.path, old = %change.old, new = %change.new, "device field changed");
            }
        }

        let id = std::mem::take(&mut self.data.id);
        self.data = DeviceData { id, ..data };
        self.refreshed_at = Some(Utc::now());
        info!("data refreshed for {self:#}");
    }

    pub fn id(&self) -> &str {
        &self.data.id
    }

    pub fn name(&self) -> Option<&str> {
        self.data.name.as_deref()
    }

    pub fn status(&self) -> Option<&str> {
        self.data.status.as_deref()
    }

    pub fn mac(&self) -> Option<&str> {
        self.data.mac.as_deref()
    }

    pub fn pin(&self) -> Option<&str> {
        self.data.pin.as_deref()
    }

    pub fn is_on(&self) -> bool {
        self.data
            .power
            .as_deref()
            .and_then(|p| p.trim().parse::<i64>().ok())
            .is_some_and(|p| p != 0)
    }

    /// Raw mode code as sent by the API (`"1"`..`"8"`).
    pub fn mode_raw(&self) -> Option<&str> {
        self.data.mode.as_deref()
    }

    pub fn mode_info(&self) -> Option<&'static ModeInfo> {
        self.mode_raw().and_then(ModeInfo::from_code)
    }

    pub fn mode(&self) -> Option<&'static str> {
        self.mode_info().map(|m| m.name)
    }

    pub fn mode_description(&self) -> Option<&'static str> {
        self.mode_info().map(|m| m.description)
    }

    pub fn heat_cold_mode(&self) -> Option<HeatCold> {
        self.mode_info().map(|m| m.kind)
    }

    /// Setpoint pair in use; an unknown mode drives the cold pair.
    fn active_kind(&self) -> HeatCold {
        self.heat_cold_mode().unwrap_or(HeatCold::Cold)
    }

    pub fn current_temperature(&self) -> Option<f64> {
        parse_temperature(self.data.local_temp.as_deref())
    }

    pub fn target_temperature(&self) -> Option<f64> {
        match self.active_kind() {
            HeatCold::Heat => self.target_temperature_heat(),
            HeatCold::Cold => self.target_temperature_cold(),
        }
    }

    fn target_temperature_raw(&self) -> Option<&str> {
        match self.active_kind() {
            HeatCold::Heat => self.data.heat_consign.as_deref(),
            HeatCold::Cold => self.data.cold_consign.as_deref(),
        }
    }

    pub fn target_temperature_heat(&self) -> Option<f64> {
        parse_temperature(self.data.heat_consign.as_deref())
    }

    pub fn target_temperature_cold(&self) -> Option<f64> {
        parse_temperature(self.data.cold_consign.as_deref())
    }

    pub fn min_temperature(&self) -> Option<f64> {
        match self.active_kind() {
            HeatCold::Heat => self.min_temperature_heat(),
            HeatCold::Cold => self.min_temperature_cold(),
        }
    }

    pub fn min_temperature_heat(&self) -> Option<f64> {
        parse_temperature(self.data.min_limit_heat.as_deref())
    }

    pub fn min_temperature_cold(&self) -> Option<f64> {
        parse_temperature(self.data.min_limit_cold.as_deref())
    }

    pub fn max_temperature(&self) -> Option<f64> {
        match self.active_kind() {
            HeatCold::Heat => self.max_temperature_heat(),
            HeatCold::Cold => self.max_temperature_cold(),
        }
    }

    pub fn max_temperature_heat(&self) -> Option<f64> {
        parse_temperature(self.data.max_limit_heat.as_deref())
    }

    pub fn max_temperature_cold(&self) -> Option<f64> {
        parse_temperature(self.data.max_limit_cold.as_deref())
    }

    pub fn firmware(&self) -> Option<&str> {
        self.data.firmware.as_deref()
    }

    pub fn brand(&self) -> Option<&str> {
        self.data.brand.as_deref()
    }

    pub fn connection_date(&self) -> Option<DateTime<FixedOffset>> {
        self.data
            .connection_date
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
    }

    pub fn installation_id(&self) -> &str {
        &self.installation_id
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    /// Last payload received for this device, with local optimistic updates applied.
    pub fn data(&self) -> &DeviceData {
        &self.data
    }
}

impl Identified for Device {
    fn id(&self) -> &str {
        &self.data.id
    }
}

struct Opt<'a, T>(&'a Option<T>);

impl<T: fmt::Display> fmt::Display for Opt<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => fmt::Display::fmt(v, f),
            None => f.write_str("-"),
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Device(name={}, is_on={}, mode={}, current_temp={}, target_temp={}",
            Opt(&self.name()),
            self.is_on(),
            Opt(&self.mode()),
            Opt(&self.data.local_temp.as_deref()),
            Opt(&self.target_temperature_raw()),
        )?;
        if f.alternate() {
            write!(f, ", id={}, mac={}", self.id(), Opt(&self.mac()))?;
        }
        f.write_str(")")
    }
}

pub(crate) fn clamp_temperature(value: f64, min: Option<f64>, max: Option<f64>) -> f64 {
    let mut value = value;
    if let Some(min) = min
        && value < min
    {
        value = min;
    }
    if let Some(max) = max
        && value > max
    {
        value = max;
    }
    value
}

/// Mutable handle on a device, paired with the session used to send events.
///
/// Setters update local state optimistically; the remote event is best
/// effort and its failure is only logged.
pub struct DeviceControl<'a> {
    session: &'a Session,
    device: &'a mut Device,
}

impl<'a> DeviceControl<'a> {
    pub(crate) fn new(session: &'a Session, device: &'a mut Device) -> Self {
        Self { session, device }
    }

    pub fn device(&self) -> &Device {
        self.device
    }

    pub async fn turn_on(&mut self) {
        info!("call turn_on() on {:#}", self.device);
        self.send_event("turn_on", OPTION_POWER, json!(1)).await;
        self.device.data.power = Some("1".to_string());
    }

    pub async fn turn_off(&mut self) {
        info!("call turn_off() on {:#}", self.device);
        self.send_event("turn_off", OPTION_POWER, json!(0)).await;
        self.device.data.power = Some("0".to_string());
    }

    /// Switch to the first mode named `mode_name`.
    pub async fn set_mode(&mut self, mode_name: &str) -> Result<()> {
        info!("call set_mode({mode_name}) on {:#}", self.device);
        let mode = ModeInfo::from_name(mode_name)
            .ok_or_else(|| Error::InvalidMode(mode_name.to_string()))?;

        self.send_event("set_mode", OPTION_MODE, json!(mode.code)).await;
        self.device.data.mode = Some(mode.code.to_string());
        Ok(())
    }

    /// Set the target for the current heat/cold mode, clamped to its limits.
    pub async fn set_temperature(&mut self, temperature: f64) {
        info!("call set_temperature({temperature}) on {:#}", self.device);
        let temperature = clamp_temperature(
            temperature,
            self.device.min_temperature(),
            self.device.max_temperature(),
        );

        match self.device.active_kind() {
            HeatCold::Heat => {
                self.send_event("set_temperature", OPTION_HEAT_CONSIGN, json!(temperature))
                    .await;
                self.device.data.heat_consign = Some(format_temperature(temperature));
            }
            HeatCold::Cold => {
                self.send_event("set_temperature", OPTION_COLD_CONSIGN, json!(temperature))
                    .await;
                self.device.data.cold_consign = Some(format_temperature(temperature));
            }
        }
    }

    /// Ask the hardware to push fresh telemetry to the cloud. The data shows
    /// up on a later refresh, typically 3 to 5 seconds after.
    pub async fn ask_airzone_update(&self) {
        self.send_event("ask_airzone_update", "", json!("")).await;
    }

    async fn send_event(&self, action: &str, option: &str, value: Value) -> Option<Value> {
        let payload = event_message(self.device.id(), option, value);
        self.session.log_command(action, self.device.id(), &payload);
        self.session.send_event(&payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn device(value: Value) -> Device {
        Device::new("inst-1", serde_json::from_value(value).unwrap())
    }

    #[test]
    fn clamps_both_sides() {
        assert_eq!(clamp_temperature(10.0, Some(16.0), Some(32.0)), 16.0);
        assert_eq!(clamp_temperature(40.0, Some(16.0), Some(32.0)), 32.0);
        assert_eq!(clamp_temperature(21.5, Some(16.0), Some(32.0)), 21.5);
    }

    #[test]
    fn missing_bounds_do_not_clamp() {
        assert_eq!(clamp_temperature(5.0, None, Some(32.0)), 5.0);
        assert_eq!(clamp_temperature(50.0, Some(16.0), None), 50.0);
        assert_eq!(clamp_temperature(-3.0, None, None), -3.0);
    }

    #[test]
    fn mode_accessors_follow_table() {
        let d = device(json!({"id": "d", "mode": "7"}));
        assert_eq!(d.mode(), Some("heat-air"));
        assert_eq!(d.mode_description(), Some("Automatic heating"));
        assert_eq!(d.heat_cold_mode(), Some(HeatCold::Heat));
    }

    #[test]
    fn limits_follow_active_mode() {
        let d = device(json!({
            "id": "d",
            "mode": "2",
            "min_limit_heat": "15.0",
            "max_limit_heat": "30.0",
            "min_limit_cold": "18.0",
            "max_limit_cold": "32.0",
            "heat_consign": "24.0",
            "cold_consign": "26.0"
        }));
        assert_eq!(d.min_temperature(), Some(15.0));
        assert_eq!(d.max_temperature(), Some(30.0));
        assert_eq!(d.target_temperature(), Some(24.0));
    }

    #[test]
    fn unknown_mode_uses_cold_pair() {
        let d = device(json!({"id": "d", "mode": "42", "cold_consign": "26.0", "heat_consign": "20.0"}));
        assert_eq!(d.mode(), None);
        assert_eq!(d.target_temperature(), Some(26.0));
    }

    #[test]
    fn power_parsing() {
        assert!(device(json!({"id": "d", "power": "1"})).is_on());
        assert!(!device(json!({"id": "d", "power": "0"})).is_on());
        assert!(!device(json!({"id": "d"})).is_on());
        assert!(!device(json!({"id": "d", "power": "on"})).is_on());
    }

    #[test]
    fn refresh_replaces_fields_but_keeps_id() {
        let mut d = device(json!({"id": "d", "name": "Living", "local_temp": "24.0"}));
        let fresh: DeviceData = serde_json::from_value(json!({"id": "d", "name": "Salon"})).unwrap();
        d.set_data_refreshed(fresh);
        assert_eq!(d.id(), "d");
        assert_eq!(d.name(), Some("Salon"));
        assert_eq!(d.current_temperature(), None);
        assert!(d.refreshed_at().is_some());
    }

    #[test]
    fn connection_date_parses_rfc3339() {
        let d = device(json!({"id": "d", "connection_date": "2020-05-23T05:37:22.000+00:00"}));
        assert_eq!(d.connection_date().unwrap().timestamp(), 1_590_212_242);
    }

    #[test]
    fn display_forms() {
        let d = device(json!({"id": "d1", "name": "Dknwserver", "power": "1", "mode": "1",
            "local_temp": "26.0", "cold_consign": "24.5", "mac": "AA:BB"}));
        assert_eq!(
            format!("{d}"),
            "Device(name=Dknwserver, is_on=true, mode=cool, current_temp=26.0, target_temp=24.5)"
        );
        assert!(format!("{d:#}").ends_with(", id=d1, mac=AA:BB)"));
    }

    #[test]
    fn display_keeps_wire_strings() {
        let d = device(json!({"id": "d1", "name": "Dknwserver", "power": "0", "mode": "2",
            "local_temp": "19", "heat_consign": "21.50", "cold_consign": "24.0"}));
        assert_eq!(
            format!("{d}"),
            "Device(name=Dknwserver, is_on=false, mode=heat, current_temp=19, target_temp=21.50)"
        );
    }
}
