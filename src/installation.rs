use std::fmt;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::device::Device;
use crate::registry::{index_by_id, Identified};
use crate::session::Session;
use crate::types::{GpsLocation, InstallationData};
use crate::{Error, Result};

/// A site grouping one or more devices, in the order the app shows them.
#[derive(Debug, Clone)]
pub struct Installation {
    data: InstallationData,
    devices: Vec<Device>,
    loaded_at: DateTime<Utc>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl Installation {
    /// Build a new installation and load its devices.
    pub(crate) async fn load(session: &Session, data: InstallationData) -> Result<Self> {
        let mut installation = Self {
            data,
            devices: Vec::new(),
            loaded_at: Utc::now(),
            refreshed_at: None,
        };
        info!("init {installation:#}");
        debug!(data = ?installation.data);

        installation.load_devices(session).await?;
        Ok(installation)
    }

    /// Replace every attribute with fresh server data. Devices are left alone.
    pub(crate) fn set_data_refreshed(&mut self, data: InstallationData) {
        let id = std::mem::take(&mut self.data.id);
        self.data = InstallationData { id, ..data };
        self.refreshed_at = Some(Utc::now());
        info!("data refreshed for {self:#}");
    }

    pub fn id(&self) -> &str {
        &self.data.id
    }

    pub fn name(&self) -> Option<&str> {
        self.data.name.as_deref()
    }

    /// Installation type (`home`, ...).
    pub fn kind(&self) -> Option<&str> {
        self.data.kind.as_deref()
    }

    /// Occupancy scenario (`scenary` on the wire).
    pub fn scenario(&self) -> Option<&str> {
        self.data.scenary.as_deref()
    }

    /// Human readable location, e.g. `Madrid,Madrid,Community of Madrid,Spain`.
    pub fn location(&self) -> Option<&str> {
        self.data.complete_name.as_deref()
    }

    pub fn gps_location(&self) -> Option<GpsLocation> {
        self.data.location
    }

    pub fn time_zone(&self) -> Option<&str> {
        self.data.time_zone.as_deref()
    }

    pub fn postal_code(&self) -> Option<&str> {
        self.data.postal_code.as_deref()
    }

    pub fn role(&self) -> Option<&str> {
        self.data.role.as_deref()
    }

    pub fn data(&self) -> &InstallationData {
        &self.data
    }

    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    pub fn device(&self, device_id: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.id() == device_id)
    }

    pub(crate) fn device_mut(&mut self, device_id: &str) -> Option<&mut Device> {
        self.devices.iter_mut().find(|d| d.id() == device_id)
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }

    /// Reload the device list, keeping existing `Device`s for ids still present.
    pub(crate) async fn load_devices(&mut self, session: &Session) -> Result<()> {
        let fetched = session
            .get_devices(self.id())
            .await
            .map_err(|e| Error::LoadDevices {
                installation: self.name().unwrap_or_default().to_string(),
                id: self.id().to_string(),
                source: Box::new(e),
            })?;

        let installation_id = self.data.id.clone();
        let mut current = index_by_id(std::mem::take(&mut self.devices));
        let devices: Vec<Device> = fetched
            .into_iter()
            .map(|data| match current.remove(&data.id) {
                Some(mut device) => {
                    device.set_data_refreshed(data);
                    device
                }
                None => Device::new(&installation_id, data),
            })
            .collect();

        if !current.is_empty() {
            debug!(installation = %installation_id, dropped = current.len(), "devices no longer present");
        }
        self.devices = devices;
        Ok(())
    }
}

impl Identified for Installation {
    fn id(&self) -> &str {
        &self.data.id
    }
}

impl fmt::Display for Installation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Installation(name={}, type={}",
            self.name().unwrap_or("-"),
            self.kind().unwrap_or("-"),
        )?;
        if f.alternate() {
            write!(
                f,
                ", scenary={}, id={}",
                self.scenario().unwrap_or("-"),
                self.id()
            )?;
        }
        f.write_str(")")
    }
}
