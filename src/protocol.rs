use serde_json::{json, Value};

use crate::types::{DeviceData, InstallationData};
use crate::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://dkn.airzonecloud.com";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Linux; Android 6.0.1; Nexus 7 Build/MOB30X; wv) \
    AppleWebKit/537.26 (KHTML, like Gecko) Version/4.0 Chrome/70.0.3538.110 Safari/537.36";

pub const API_LOGIN: &str = "/users/sign_in";
pub const API_INSTALLATION_RELATIONS: &str = "/installation_relations";
pub const API_DEVICES: &str = "/devices";
pub const API_EVENTS: &str = "/events";

pub(crate) const EVENT_CGI: &str = "modmaquina";

pub(crate) const OPTION_POWER: &str = "P1";
pub(crate) const OPTION_MODE: &str = "P2";
pub(crate) const OPTION_COLD_CONSIGN: &str = "P7";
pub(crate) const OPTION_HEAT_CONSIGN: &str = "P8";

pub(crate) const POST_HEADERS: &[(&str, &str)] = &[
    ("X-Requested-With", "XMLHttpRequest"),
    ("Content-Type", "application/json;charset=UTF-8"),
    ("Accept", "application/json, text/plain, */*"),
];

pub fn login_message(email: &str, password: &str) -> Value {
    json!({
        "email": email,
        "password": password,
    })
}

pub fn event_message(device_id: &str, option: &str, value: Value) -> Value {
    json!({
        "event": {
            "cgi": EVENT_CGI,
            "device_id": device_id,
            "option": option,
            "value": value,
        }
    })
}

pub fn parse_login_response(body: &Value) -> Result<String> {
    body.pointer("/user/authentication_token")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| Error::Authentication("response has no user.authentication_token".to_string()))
}

pub fn parse_installation_relations(body: &Value) -> Result<Vec<InstallationData>> {
    let relations = match body.get("installation_relations") {
        Some(Value::Array(items)) => items,
        _ => {
            return Err(Error::Protocol(
                "response has no installation_relations array".to_string(),
            ));
        }
    };
    relations
        .iter()
        .map(|relation| {
            let installation = relation.get("installation").ok_or_else(|| {
                Error::Protocol("installation relation without installation".to_string())
            })?;
            serde_json::from_value(installation.clone())
                .map_err(|e| Error::Protocol(format!("invalid installation: {e}")))
        })
        .collect()
}

pub fn parse_devices(body: &Value) -> Result<Vec<DeviceData>> {
    let devices = match body.get("devices") {
        Some(Value::Array(items)) => items,
        _ => return Err(Error::Protocol("response has no devices array".to_string())),
    };
    devices
        .iter()
        .map(|device| {
            serde_json::from_value(device.clone())
                .map_err(|e| Error::Protocol(format!("invalid device: {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_message_structure() {
        let msg = event_message("dev-1", OPTION_POWER, json!(1));
        assert_eq!(msg["event"]["cgi"], "modmaquina");
        assert_eq!(msg["event"]["device_id"], "dev-1");
        assert_eq!(msg["event"]["option"], "P1");
        assert_eq!(msg["event"]["value"], 1);
    }

    #[test]
    fn update_request_has_empty_option_and_value() {
        let msg = event_message("dev-1", "", json!(""));
        assert_eq!(msg["event"]["option"], "");
        assert_eq!(msg["event"]["value"], "");
    }

    #[test]
    fn login_token_extracted() {
        let body = json!({"user": {"authentication_token": "abc", "email": "a@b.c"}});
        assert_eq!(parse_login_response(&body).unwrap(), "abc");
    }

    #[test]
    fn login_without_token_is_auth_error() {
        for body in [json!({}), json!({"user": {}}), json!({"user": {"authentication_token": null}})] {
            let err = parse_login_response(&body).unwrap_err();
            assert!(matches!(err, Error::Authentication(_)), "got {err:?}");
        }
    }

    #[test]
    fn parse_relations_keeps_server_order() {
        let body = json!({"installation_relations": [
            {"installation": {"id": "b", "name": "Second"}},
            {"installation": {"id": "a", "name": "First"}}
        ]});
        let installations = parse_installation_relations(&body).unwrap();
        let ids: Vec<_> = installations.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["b", "a"]);
    }

    #[test]
    fn parse_relations_missing_array() {
        let err = parse_installation_relations(&json!({"error": "nope"})).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn parse_devices_rejects_missing_id() {
        let err = parse_devices(&json!({"devices": [{"name": "x"}]})).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn parse_devices_empty() {
        assert!(parse_devices(&json!({"devices": []})).unwrap().is_empty());
    }
}
