pub mod admin;
#[cfg(feature = "config")]
pub mod config;
pub mod error;
pub mod host;
pub mod link;
pub mod protocol;
pub mod types;

// Re-export commonly used public API
pub use admin::{CrowAdmin, DeviceInfo, PortInfo};
#[cfg(feature = "config")]
pub use config::{ConfigError, HostConfig};
pub use error::{CrowError, ErrorDetails, LinkError, RemoteError, RemoteErrorKind};
pub use host::Host;
#[cfg(feature = "serial")]
pub use link::SharedPort;
pub use link::{SerialLink, StopBits};
pub use protocol::{Command, ParseResult, Parser};
pub use types::{SerialSettings, Transaction};
