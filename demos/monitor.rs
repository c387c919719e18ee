use airzone_cloud_daikin::AirzoneClient;
use std::env;
use std::time::Duration;

/// Usage: AIRZONE_USERNAME=.. AIRZONE_PASSWORD=.. [AIRZONE_BASE_URL=..] monitor [interval_secs]
#[tokio::main]
async fn main() -> airzone_cloud_daikin::Result<()> {
    tracing_subscriber::fmt::init();

    let username = env::var("AIRZONE_USERNAME").expect("AIRZONE_USERNAME must be set");
    let password = env::var("AIRZONE_PASSWORD").expect("AIRZONE_PASSWORD must be set");
    let interval = env::args()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or(30);

    let mut builder = AirzoneClient::builder(username, password);
    if let Ok(base_url) = env::var("AIRZONE_BASE_URL") {
        builder = builder.base_url(base_url);
    }

    println!("Connecting to AirzoneCloud...");
    let mut client = builder.connect().await?;

    loop {
        for installation in client.installations() {
            println!("{installation:#}");
            for device in installation.devices() {
                println!(
                    "  [{}] {} | {} | {:?}\u{00b0}C -> {:?}\u{00b0}C",
                    device.name().unwrap_or("?"),
                    if device.is_on() { "ON" } else { "off" },
                    device.mode_description().unwrap_or("unknown mode"),
                    device.current_temperature(),
                    device.target_temperature(),
                );
            }
        }

        tokio::time::sleep(Duration::from_secs(interval)).await;

        let ids: Vec<String> = client.all_devices().iter().map(|d| d.id().to_string()).collect();
        for id in &ids {
            if let Some(control) = client.device_mut(id) {
                control.ask_airzone_update().await;
            }
        }
        if let Err(e) = client.refresh_installations().await {
            eprintln!("Refresh error: {e}");
            continue;
        }
        let installation_ids: Vec<String> =
            client.installations().iter().map(|i| i.id().to_string()).collect();
        for id in &installation_ids {
            if let Err(e) = client.refresh_devices(id).await {
                eprintln!("Device refresh error: {e}");
            }
        }
    }
}
