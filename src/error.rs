use std::fmt;

use thiserror::Error;

/// Errors raised by the host and its clients.
///
/// Two families: local errors detected on the host side, and [`RemoteError`]
/// reported by the device through an error response.
#[derive(Error, Debug)]
pub enum CrowError {
    /// A caller passed an out-of-range or inconsistent argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Serial transport failure, propagated unchanged.
    #[error(transparent)]
    Link(#[from] LinkError),

    /// The host could not make sense of response data it received.
    /// `details` carries whatever was decoded before the failure.
    #[error("host-side failure at address {address}, port {port}: {message}")]
    Host {
        address: u8,
        port: u16,
        message: String,
        details: Option<ErrorDetails>,
    },

    /// No usable response arrived before the transaction timed out.
    #[error(
        "no response from address {address}, port {port}: {message} \
         ({byte_count} bytes received)"
    )]
    NoResponse {
        address: u8,
        port: u16,
        byte_count: usize,
        message: String,
    },

    /// A response parsed but did not mean what the client layer expected.
    #[error("invalid response from address {address}, port {port}: {message}")]
    InvalidResponse {
        address: u8,
        port: u16,
        message: String,
    },

    /// The device answered with an error response.
    #[error(transparent)]
    Remote(#[from] RemoteError),
}

/// Serial transport errors.
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serial port error: {0}")]
    Port(String),
}

/// An error reported by the device, decoded from an error response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} Error number {number}, address {address}, port {port}{details}.")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    pub number: u8,
    pub address: u8,
    pub port: u16,
    pub details: ErrorDetails,
}

impl RemoteError {
    /// Numbers below 64 are assigned to the device implementation itself.
    pub fn is_device_error(&self) -> bool {
        self.number < 64
    }

    /// Numbers 64 and up are assigned to the service behind the port.
    pub fn is_service_error(&self) -> bool {
        !self.is_device_error()
    }
}

/// Taxonomy of device-reported error numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    UnspecifiedDevice,
    DeviceFault,
    ServiceFault,
    DeviceUnavailable,
    DeviceIsBusy,
    OversizedCommand,
    CorruptCommandPayload,
    PortNotOpen,
    DeviceLowResources,
    /// A device error number with no assigned meaning (9 to 31).
    UnknownDevice,
    /// A generic assigned device error (32 to 63).
    Device,
    UnspecifiedService,
    UnknownCommandFormat,
    RequestTooLarge,
    ServiceLowResources,
    CommandNotAvailable,
    CommandNotImplemented,
    CommandNotAllowed,
    InvalidCommand,
    IncorrectCommandSize,
    MissingCommandData,
    TooMuchCommandData,
    /// A service error number with no assigned meaning (75 to 127).
    UnknownService,
    /// A user-defined service error (128 and up).
    Service,
}

impl RemoteErrorKind {
    /// Map a wire error number onto its kind.
    pub fn from_number(number: u8) -> Self {
        match number {
            0 => Self::UnspecifiedDevice,
            1 => Self::DeviceFault,
            2 => Self::ServiceFault,
            3 => Self::DeviceUnavailable,
            4 => Self::DeviceIsBusy,
            5 => Self::OversizedCommand,
            6 => Self::CorruptCommandPayload,
            7 => Self::PortNotOpen,
            8 => Self::DeviceLowResources,
            9..=31 => Self::UnknownDevice,
            32..=63 => Self::Device,
            64 => Self::UnspecifiedService,
            65 => Self::UnknownCommandFormat,
            66 => Self::RequestTooLarge,
            67 => Self::ServiceLowResources,
            68 => Self::CommandNotAvailable,
            69 => Self::CommandNotImplemented,
            70 => Self::CommandNotAllowed,
            71 => Self::InvalidCommand,
            72 => Self::IncorrectCommandSize,
            73 => Self::MissingCommandData,
            74 => Self::TooMuchCommandData,
            75..=127 => Self::UnknownService,
            _ => Self::Service,
        }
    }
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::UnspecifiedDevice => "The device experienced an unspecified error.",
            Self::DeviceFault => {
                "An unexpected error occurred in the device's protocol implementation."
            }
            Self::ServiceFault => {
                "An unexpected error occurred in the device's service implementation."
            }
            Self::DeviceUnavailable => "The device is unavailable.",
            Self::DeviceIsBusy => "The device is busy.",
            Self::OversizedCommand => "The command payload exceeded the device's capacity.",
            Self::CorruptCommandPayload => "The command payload checksum test failed.",
            Self::PortNotOpen => "The port was not open.",
            Self::DeviceLowResources => "The device reports low resources.",
            Self::UnknownDevice => "Unknown device error.",
            Self::Device => "Device error.",
            Self::UnspecifiedService => "The service experienced an unspecified error.",
            Self::UnknownCommandFormat => "The service does not recognize the command format.",
            Self::RequestTooLarge => {
                "The required response would exceed the device's capacity."
            }
            Self::ServiceLowResources => "The service reports low resources.",
            Self::CommandNotAvailable => "The command is not available.",
            Self::CommandNotImplemented => "The command is not implemented.",
            Self::CommandNotAllowed => "The command is not allowed.",
            Self::InvalidCommand => "The command format was recognized, but it is invalid.",
            Self::IncorrectCommandSize => {
                "The command payload had a different size than expected."
            }
            Self::MissingCommandData => "The command payload was smaller than expected.",
            Self::TooMuchCommandData => "The command payload was larger than expected.",
            Self::UnknownService => "Unknown service error.",
            Self::Service => "Service error.",
        };
        f.write_str(text)
    }
}

/// Optional diagnostic fields a device may attach to an error response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorDetails {
    pub message: Option<String>,
    pub crow_version: Option<u8>,
    pub max_command_size: Option<u16>,
    pub max_response_size: Option<u16>,
    pub address: Option<u8>,
    pub port: Option<u8>,
    pub service_identifier: Option<String>,
}

impl ErrorDetails {
    pub fn is_empty(&self) -> bool {
        self.message.is_none()
            && self.crow_version.is_none()
            && self.max_command_size.is_none()
            && self.max_response_size.is_none()
            && self.address.is_none()
            && self.port.is_none()
            && self.service_identifier.is_none()
    }
}

impl fmt::Display for ErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return Ok(());
        }
        let mut parts = Vec::new();
        if let Some(ref message) = self.message {
            parts.push(format!("message: {:?}", message));
        }
        if let Some(version) = self.crow_version {
            parts.push(format!("crow_version: {}", version));
        }
        if let Some(size) = self.max_command_size {
            parts.push(format!("max_command_size: {}", size));
        }
        if let Some(size) = self.max_response_size {
            parts.push(format!("max_response_size: {}", size));
        }
        if let Some(address) = self.address {
            parts.push(format!("address: {}", address));
        }
        if let Some(port) = self.port {
            parts.push(format!("port: {}", port));
        }
        if let Some(ref identifier) = self.service_identifier {
            parts.push(format!("service_identifier: {:?}", identifier));
        }
        write!(f, ", details: {{ {} }}", parts.join(", "))
    }
}
