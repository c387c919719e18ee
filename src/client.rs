use std::collections::HashSet;
use std::path::PathBuf;

use tracing::debug;

use crate::device::{Device, DeviceControl};
use crate::installation::Installation;
use crate::logger::{MessageLogMode, MessageLogger};
use crate::protocol::{DEFAULT_BASE_URL, DEFAULT_USER_AGENT};
use crate::registry::index_by_id;
use crate::session::Session;
use crate::types::InstallationData;
use crate::{Error, Result};

pub struct AirzoneClientBuilder {
    username: String,
    password: String,
    user_agent: Option<String>,
    base_url: Option<String>,
    log_mode: Option<MessageLogMode>,
    log_path: Option<PathBuf>,
}

impl AirzoneClientBuilder {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            user_agent: None,
            base_url: None,
            log_mode: None,
            log_path: None,
        }
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Append an NDJSON trace of requests, responses and commands to `path`.
    pub fn message_log(mut self, mode: MessageLogMode, path: impl Into<PathBuf>) -> Self {
        self.log_mode = Some(mode);
        self.log_path = Some(path.into());
        self
    }

    /// Log in and load every installation with its devices.
    pub async fn connect(self) -> Result<AirzoneClient> {
        let http = reqwest::Client::builder().build()?;

        let logger = match (self.log_mode, self.log_path) {
            (Some(mode), Some(path)) => Some(MessageLogger::new(mode, path)?),
            _ => None,
        };

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let session = Session::new(
            http,
            base_url,
            self.user_agent
                .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
            self.username,
            self.password,
            logger,
        );
        session.login().await?;

        let mut client = AirzoneClient {
            session,
            installations: Vec::new(),
        };
        client.load_installations().await?;
        Ok(client)
    }
}

enum Slot {
    Existing(InstallationData),
    New(Installation),
}

/// Entry point: an authenticated session plus the cached installations.
#[derive(Debug)]
pub struct AirzoneClient {
    session: Session,
    installations: Vec<Installation>,
}

impl AirzoneClient {
    pub fn builder(username: impl Into<String>, password: impl Into<String>) -> AirzoneClientBuilder {
        AirzoneClientBuilder::new(username, password)
    }

    pub async fn connect(username: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        Self::builder(username, password).connect().await
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Installations in the same order as in the app.
    pub fn installations(&self) -> &[Installation] {
        &self.installations
    }

    pub fn installation(&self, installation_id: &str) -> Option<&Installation> {
        self.installations.iter().find(|i| i.id() == installation_id)
    }

    /// Devices of all installations, in installation then device order.
    pub fn all_devices(&self) -> Vec<&Device> {
        self.installations
            .iter()
            .flat_map(|i| i.devices())
            .collect()
    }

    pub fn device(&self, device_id: &str) -> Option<&Device> {
        self.installations.iter().find_map(|i| i.device(device_id))
    }

    pub fn device_mut(&mut self, device_id: &str) -> Option<DeviceControl<'_>> {
        let session = &self.session;
        self.installations
            .iter_mut()
            .find_map(|i| i.device_mut(device_id))
            .map(|device| DeviceControl::new(session, device))
    }

    pub async fn refresh_installations(&mut self) -> Result<()> {
        self.load_installations().await
    }

    /// Refresh installations, then optionally this installation's devices.
    pub async fn refresh_installation(&mut self, installation_id: &str, refresh_devices: bool) -> Result<()> {
        self.refresh_installations().await?;
        if refresh_devices {
            self.refresh_devices(installation_id).await?;
        } else if self.installation(installation_id).is_none() {
            return Err(Error::UnknownInstallation(installation_id.to_string()));
        }
        Ok(())
    }

    pub async fn refresh_devices(&mut self, installation_id: &str) -> Result<()> {
        let installation = self
            .installations
            .iter_mut()
            .find(|i| i.id() == installation_id)
            .ok_or_else(|| Error::UnknownInstallation(installation_id.to_string()))?;
        installation.load_devices(&self.session).await
    }

    /// Ask the hardware for fresh telemetry, then reload every device of the
    /// parent installation. New values usually land on the next refresh.
    pub async fn refresh_device(&mut self, device_id: &str) -> Result<()> {
        let session = &self.session;
        let installation = self
            .installations
            .iter_mut()
            .find(|i| i.device(device_id).is_some())
            .ok_or_else(|| Error::UnknownDevice(device_id.to_string()))?;

        if let Some(device) = installation.device_mut(device_id) {
            DeviceControl::new(session, device).ask_airzone_update().await;
        }
        installation.load_devices(session).await
    }

    /// Merge the server's installation list into the cache, keyed by id.
    ///
    /// New installations (and their devices) are loaded before the cache is
    /// touched, so a failure leaves the previous list intact.
    async fn load_installations(&mut self) -> Result<()> {
        let fetched = self
            .session
            .get_installation_relations()
            .await
            .map_err(|e| Error::LoadInstallations(Box::new(e)))?;

        let mut slots = Vec::with_capacity(fetched.len());
        {
            let known: HashSet<&str> = self.installations.iter().map(|i| i.id()).collect();
            let mut claimed = HashSet::new();
            for data in fetched {
                if known.contains(data.id.as_str()) && claimed.insert(data.id.clone()) {
                    slots.push(Slot::Existing(data));
                } else {
                    slots.push(Slot::New(Installation::load(&self.session, data).await?));
                }
            }
        }

        // Infallible from here on.
        let mut current = index_by_id(std::mem::take(&mut self.installations));
        self.installations = slots
            .into_iter()
            .filter_map(|slot| match slot {
                Slot::Existing(data) => current.remove(&data.id).map(|mut existing| {
                    existing.set_data_refreshed(data);
                    existing
                }),
                Slot::New(installation) => Some(installation),
            })
            .collect();

        if !current.is_empty() {
            debug!(dropped = current.len(), "installations no longer present");
        }
        Ok(())
    }
}
