mod client;
mod device;
mod diff;
mod error;
mod installation;
mod logger;
mod protocol;
mod registry;
mod session;
mod types;

pub use client::{AirzoneClient, AirzoneClientBuilder};
pub use device::{Device, DeviceControl};
pub use error::{Error, Result};
pub use installation::Installation;
pub use logger::MessageLogMode;
pub use protocol::{
    event_message, API_DEVICES, API_EVENTS, API_INSTALLATION_RELATIONS, API_LOGIN,
    DEFAULT_BASE_URL, DEFAULT_USER_AGENT,
};
pub use session::Session;
pub use types::*;
