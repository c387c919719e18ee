use std::fmt;

#[derive(Debug)]
pub enum Error {
    Http(reqwest::Error),
    Status { status: u16, url: String },
    Authentication(String),
    InvalidMode(String),
    Protocol(String),
    LoadInstallations(Box<Error>),
    LoadDevices {
        installation: String,
        id: String,
        source: Box<Error>,
    },
    UnknownInstallation(String),
    UnknownDevice(String),
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Status { status, url } => write!(f, "HTTP status {status} from {url}"),
            Error::Authentication(msg) => {
                write!(f, "unable to login to Daikin AirzoneCloud: {msg}")
            }
            Error::InvalidMode(name) => write!(f, "mode name \"{name}\" not found"),
            Error::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Error::LoadInstallations(e) => {
                write!(f, "unable to load installations from AirzoneCloud: {e}")
            }
            Error::LoadDevices {
                installation,
                id,
                source,
            } => write!(
                f,
                "unable to load devices of installation {installation} ({id}) from AirzoneCloud: {source}"
            ),
            Error::UnknownInstallation(id) => write!(f, "unknown installation: {id}"),
            Error::UnknownDevice(id) => write!(f, "unknown device: {id}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Http(e) => Some(e),
            Error::Io(e) => Some(e),
            Error::LoadInstallations(e) => Some(e.as_ref()),
            Error::LoadDevices { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl Error {
    /// HTTP status carried by this error, looking through load wrappers.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Status { status, .. } => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            Error::LoadInstallations(e) => e.status(),
            Error::LoadDevices { source, .. } => source.status(),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Http(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
