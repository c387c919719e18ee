use airzone_cloud_daikin::{AirzoneClient, Error, HeatCold};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EMAIL: &str = "user@example.com";

async fn client_with_device(server: &MockServer, device: Value) -> AirzoneClient {
    Mock::given(method("POST"))
        .and(path("/users/sign_in"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "user": { "authentication_token": "tok-1" }
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/installation_relations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "installation_relations": [{ "installation": { "id": "inst-1", "name": "Casa" } }]
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/devices"))
        .and(query_param("installation_id", "inst-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "devices": [device] })))
        .mount(server)
        .await;

    AirzoneClient::builder(EMAIL, "pw")
        .base_url(server.uri())
        .connect()
        .await
        .expect("connect should succeed")
}

fn cooling_device() -> Value {
    json!({
        "id": "d1",
        "name": "Dknwserver",
        "mode": "1",
        "power": "0",
        "local_temp": "26.0",
        "cold_consign": "26.0",
        "heat_consign": "24.0",
        "min_limit_cold": "16.0",
        "max_limit_cold": "32.0",
        "min_limit_heat": "16.0",
        "max_limit_heat": "30.0"
    })
}

fn event_mock(option: &str, value: Value) -> Mock {
    Mock::given(method("POST"))
        .and(path("/events"))
        .and(query_param("user_email", EMAIL))
        .and(query_param("user_token", "tok-1"))
        .and(header("X-Requested-With", "XMLHttpRequest"))
        .and(header("Content-Type", "application/json;charset=UTF-8"))
        .and(body_partial_json(json!({
            "event": { "cgi": "modmaquina", "device_id": "d1", "option": option, "value": value }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "event": { "id": "e1" } })))
}

#[tokio::test]
async fn turn_on_and_off_send_power_events() {
    let server = MockServer::start().await;
    event_mock("P1", json!(1)).expect(1).mount(&server).await;
    event_mock("P1", json!(0)).expect(1).mount(&server).await;

    let mut client = client_with_device(&server, cooling_device()).await;
    let mut control = client.device_mut("d1").expect("device d1");

    control.turn_on().await;
    assert!(control.device().is_on());
    assert_eq!(control.device().data().power.as_deref(), Some("1"));

    control.turn_off().await;
    assert!(!control.device().is_on());
}

#[tokio::test]
async fn set_mode_heat_sends_code_and_updates_mode() {
    let server = MockServer::start().await;
    event_mock("P2", json!("2")).expect(1).mount(&server).await;

    let mut client = client_with_device(&server, cooling_device()).await;
    client
        .device_mut("d1")
        .unwrap()
        .set_mode("heat")
        .await
        .expect("heat is a known mode");

    let device = client.device("d1").unwrap();
    assert_eq!(device.mode_raw(), Some("2"));
    assert_eq!(device.mode(), Some("heat"));
    assert_eq!(device.heat_cold_mode(), Some(HeatCold::Heat));
    assert_eq!(device.target_temperature(), Some(24.0));
}

#[tokio::test]
async fn set_mode_unknown_is_rejected_without_event() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut client = client_with_device(&server, cooling_device()).await;
    let err = client
        .device_mut("d1")
        .unwrap()
        .set_mode("unknown")
        .await
        .unwrap_err();

    assert!(matches!(err, Error::InvalidMode(ref name) if name == "unknown"), "got {err:?}");
    assert_eq!(client.device("d1").unwrap().mode_raw(), Some("1"));
}

#[tokio::test]
async fn set_temperature_clamps_to_cold_minimum() {
    let server = MockServer::start().await;
    event_mock("P7", json!(16.0)).expect(1).mount(&server).await;

    let mut client = client_with_device(&server, cooling_device()).await;
    client.device_mut("d1").unwrap().set_temperature(10.0).await;

    let device = client.device("d1").unwrap();
    assert_eq!(device.data().cold_consign.as_deref(), Some("16.0"));
    assert_eq!(device.data().heat_consign.as_deref(), Some("24.0"));
    assert_eq!(device.target_temperature(), Some(16.0));
}

#[tokio::test]
async fn set_temperature_clamps_to_heat_maximum() {
    let server = MockServer::start().await;
    event_mock("P8", json!(30.0)).expect(1).mount(&server).await;

    let mut device = cooling_device();
    device["mode"] = json!("2");
    let mut client = client_with_device(&server, device).await;
    client.device_mut("d1").unwrap().set_temperature(35.0).await;

    let device = client.device("d1").unwrap();
    assert_eq!(device.data().heat_consign.as_deref(), Some("30.0"));
    assert_eq!(device.data().cold_consign.as_deref(), Some("26.0"));
}

#[tokio::test]
async fn set_temperature_without_limits_keeps_value() {
    let server = MockServer::start().await;
    event_mock("P7", json!(12.5)).expect(1).mount(&server).await;

    let mut client = client_with_device(&server, json!({ "id": "d1", "mode": "5" })).await;
    client.device_mut("d1").unwrap().set_temperature(12.5).await;

    assert_eq!(client.device("d1").unwrap().data().cold_consign.as_deref(), Some("12.5"));
}

#[tokio::test]
async fn ask_airzone_update_sends_empty_event() {
    let server = MockServer::start().await;
    event_mock("", json!("")).expect(1).mount(&server).await;

    let mut client = client_with_device(&server, cooling_device()).await;
    client.device_mut("d1").unwrap().ask_airzone_update().await;
}

#[tokio::test]
async fn failed_event_is_best_effort() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/events"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client_with_device(&server, cooling_device()).await;
    client.device_mut("d1").unwrap().turn_on().await;

    assert!(client.device("d1").unwrap().is_on());
}

#[tokio::test]
async fn expired_token_on_event_relogs_and_retries() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/events"))
        .and(query_param("user_token", "tok-1"))
        .respond_with(ResponseTemplate::new(401))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    event_mock("P1", json!(1)).expect(1).mount(&server).await;

    let mut client = client_with_device(&server, cooling_device()).await;
    client.device_mut("d1").unwrap().turn_on().await;

    let logins = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/users/sign_in")
        .count();
    assert_eq!(logins, 2);
}
